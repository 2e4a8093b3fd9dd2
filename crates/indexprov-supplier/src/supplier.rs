//! CAR-backed content supplier.
//!
//! Registration records map a content id to the location of a CAR file and
//! back:
//!
//! - forward: `/<content id>` -> location bytes
//! - reverse: `/car://<base64(sha256(location))>` -> content id bytes
//!
//! Both keys are always written and deleted in one atomic batch.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use sha2::{Digest, Sha256};

use indexprov_core::cid::codec;
use indexprov_core::{Cid, Link, MultihashCode, MultihashHasher};
use indexprov_store::{Batch, Datastore};

use crate::car::{CarFile, ReadOptions};
use crate::error::{Result, SupplierError};
use crate::stream::EntryStream;

/// Namespace of reverse (location -> id) keys.
pub const CAR_PATH_KEY_PREFIX: &str = "/car://";

/// A lazy, forward-only sequence of block CIDs.
pub type CidIterator = Box<dyn Iterator<Item = Result<Cid>> + Send>;

/// Configuration for [`CarSupplier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplierConfig {
    /// Hash function used to derive content ids.
    pub id_hash: MultihashCode,

    /// Treat a zero-length CAR section as end of data.
    pub zero_length_section_as_eof: bool,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            id_hash: MultihashCode::Sha2_256,
            zero_length_section_as_eof: false,
        }
    }
}

impl SupplierConfig {
    fn read_options(&self) -> ReadOptions {
        ReadOptions {
            zero_length_section_as_eof: self.zero_length_section_as_eof,
        }
    }
}

/// Outcome of [`CarSupplier::repair`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Forward records checked.
    pub forward_checked: usize,
    /// Forward records deleted for lacking a matching reverse record.
    pub forward_removed: usize,
    /// Reverse records deleted for lacking a matching forward record.
    pub reverse_removed: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.forward_removed == 0 && self.reverse_removed == 0
    }
}

/// Supplies the block CIDs of registered CAR files.
///
/// The datastore must be dedicated to this supplier; [`CarSupplier::repair`]
/// treats every key it holds as a registration record.
pub struct CarSupplier<D> {
    ds: D,
    config: SupplierConfig,
}

impl<D: Datastore> CarSupplier<D> {
    pub fn new(ds: D) -> Self {
        Self::with_config(ds, SupplierConfig::default())
    }

    pub fn with_config(ds: D, config: SupplierConfig) -> Self {
        Self { ds, config }
    }

    pub fn config(&self) -> &SupplierConfig {
        &self.config
    }

    /// Register the CAR at `path` under an id derived from its contents.
    ///
    /// Accepts CARv1 and CARv2.
    pub async fn put(&self, path: impl AsRef<Path>) -> Result<Link> {
        let location = clean_path(path.as_ref());
        let config = self.config;
        let loc = location.clone();
        let id = tokio::task::spawn_blocking(move || generate_id(Path::new(&loc), &config)).await??;
        self.put_with_id(id, &location).await
    }

    /// Register the CAR at `path` under a known id.
    pub async fn put_with_id(&self, id: Link, path: impl AsRef<Path>) -> Result<Link> {
        let location = clean_path(path.as_ref());
        let batch = Batch::new()
            .put(forward_key(&id), Bytes::from(location.clone().into_bytes()))
            .put(path_key(&location), Bytes::from(id.to_bytes()));
        self.ds.batch(batch).await?;
        tracing::info!(%id, path = %location, "registered CAR");
        Ok(id)
    }

    /// Unregister the CAR at `path`, returning its id.
    pub async fn remove(&self, path: impl AsRef<Path>) -> Result<Link> {
        let location = clean_path(path.as_ref());
        let reverse = path_key(&location);
        let id_bytes = self
            .ds
            .get(&reverse)
            .await?
            .ok_or_else(|| SupplierError::NotFound(location.clone()))?;
        let id = Cid::from_bytes(&id_bytes)?;

        self.ds
            .batch(Batch::new().delete(forward_key(&id)).delete(reverse))
            .await?;
        tracing::info!(%id, path = %location, "removed CAR");
        Ok(id)
    }

    /// Location registered for `id`.
    pub async fn location(&self, id: &Link) -> Result<String> {
        let bytes = self
            .ds
            .get(&forward_key(id))
            .await?
            .ok_or_else(|| SupplierError::NotFound(id.to_string()))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| SupplierError::NotFound(format!("{} has a non UTF-8 location", id)))
    }

    /// A lazy iterator over the block CIDs of the CAR registered as `id`.
    pub async fn supply(&self, id: &Link) -> Result<CidIterator> {
        let location = self.location(id).await?;
        let options = self.config.read_options();
        tokio::task::spawn_blocking(move || open_cid_iterator(Path::new(&location), options))
            .await?
    }

    /// [`Self::supply`] wrapped in an [`EntryStream`].
    pub async fn supply_stream(&self, id: &Link) -> Result<EntryStream> {
        Ok(EntryStream::spawn(self.supply(id).await?))
    }

    /// Delete one-sided or mismatched registration records.
    pub async fn repair(&self) -> Result<RepairReport> {
        let mut forward: BTreeMap<String, Bytes> = BTreeMap::new();
        let mut reverse: BTreeMap<String, Bytes> = BTreeMap::new();
        for (key, value) in self.ds.query_prefix("/").await? {
            if key.starts_with(CAR_PATH_KEY_PREFIX) {
                reverse.insert(key, value);
            } else {
                forward.insert(key, value);
            }
        }

        let mut report = RepairReport {
            forward_checked: forward.len(),
            ..RepairReport::default()
        };
        let mut batch = Batch::new();
        let mut consistent_reverse = BTreeSet::new();

        for (key, location) in &forward {
            let id = key[1..].parse::<Cid>().ok();
            let location = std::str::from_utf8(location).ok();
            let matched = match (id, location) {
                (Some(id), Some(location)) => {
                    let rk = path_key(location);
                    match reverse.get(&rk) {
                        Some(bytes) if bytes.as_ref() == id.to_bytes().as_slice() => {
                            consistent_reverse.insert(rk);
                            true
                        }
                        _ => false,
                    }
                }
                _ => false,
            };
            if !matched {
                tracing::warn!(key = %key, "removing dangling forward record");
                batch = batch.delete(key.clone());
                report.forward_removed += 1;
            }
        }

        for key in reverse.keys() {
            if !consistent_reverse.contains(key) {
                tracing::warn!(key = %key, "removing dangling reverse record");
                batch = batch.delete(key.clone());
                report.reverse_removed += 1;
            }
        }

        if !batch.is_empty() {
            self.ds.batch(batch).await?;
        }
        tracing::info!(
            checked = report.forward_checked,
            forward_removed = report.forward_removed,
            reverse_removed = report.reverse_removed,
            "registration records repaired"
        );
        Ok(report)
    }

    /// Close the underlying datastore. Later calls fail with [`SupplierError::Closed`].
    pub async fn close(&self) -> Result<()> {
        self.ds.close().await?;
        Ok(())
    }
}

/// Derive the content id of the CAR at `path`.
///
/// Hashes the multihash bytes of every block CID, in order. A CARv1 and its
/// CARv2 wrapping produce the same id.
pub fn generate_id(path: &Path, config: &SupplierConfig) -> Result<Link> {
    let mut hasher = MultihashHasher::new(config.id_hash);
    for cid in open_cid_iterator(path, config.read_options())? {
        hasher.update(&cid?.hash().to_bytes());
    }
    Ok(Cid::new_v1(codec::DAG_CBOR, hasher.finalize()))
}

fn open_cid_iterator(path: &Path, options: ReadOptions) -> Result<CidIterator> {
    let car = CarFile::open(path)?;
    let sections = car.sections(options)?;
    Ok(Box::new(sections.map(|section| {
        section.map(|s| s.cid).map_err(SupplierError::from)
    })))
}

fn forward_key(id: &Cid) -> String {
    format!("/{}", id)
}

/// Reverse key for a (cleaned) location.
pub fn path_key(location: &str) -> String {
    let digest = Sha256::digest(location.as_bytes());
    format!("{}{}", CAR_PATH_KEY_PREFIX, BASE64.encode(digest))
}

/// Lexically clean a path: collapse separators, drop `.`, resolve `..`.
pub fn clean_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let rooted = raw.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                // `..` at the root stays at the root.
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path() {
        let cases = [
            ("/a/b/../c", "/a/c"),
            ("a//b/./c/", "a/b/c"),
            ("", "."),
            ("/../x", "/x"),
            ("../../x", "../../x"),
            ("a/../..", ".."),
            ("/", "/"),
        ];
        for (input, want) in cases {
            assert_eq!(clean_path(Path::new(input)), want, "input {:?}", input);
        }
    }

    #[test]
    fn test_path_key_uses_cleaned_location() {
        assert_eq!(
            path_key(&clean_path(Path::new("/data//x.car"))),
            path_key(&clean_path(Path::new("/data/./x.car")))
        );
        assert!(path_key("/x.car").starts_with(CAR_PATH_KEY_PREFIX));
        // sha-256 is 32 bytes, 44 characters in padded base64.
        assert_eq!(path_key("/x.car").len(), CAR_PATH_KEY_PREFIX.len() + 44);
    }
}
