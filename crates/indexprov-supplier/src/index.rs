//! Multihash-sorted CAR index.
//!
//! Layout, after the `varint(0x0401)` codec:
//!
//! ```text
//! i32 LE  number of hash codes
//! per code (ascending):
//!   u64 LE  multihash code
//!   i32 LE  number of widths
//!   per width (ascending):
//!     u32 LE  record width (digest length + 8)
//!     u64 LE  byte length of the records
//!     records: digest || u64 LE payload offset, sorted by digest
//! ```

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use indexprov_core::{varint, Multihash};

use crate::car::Section;
use crate::error::CarError;

/// Multicodec of the multihash-sorted index format.
pub const MULTIHASH_INDEX_SORTED: u64 = 0x0401;

const OFFSET_LEN: u32 = 8;

/// Longest digest accepted when reading an index (sha2-512 and friends fit).
pub const MAX_DIGEST_LEN: u32 = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Record {
    digest: Vec<u8>,
    offset: u64,
}

/// An index from block multihash to section offset, grouped by hash code and
/// digest width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultihashIndex {
    buckets: BTreeMap<u64, BTreeMap<u32, Vec<Record>>>,
}

impl MultihashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(multihash, offset)` pairs. Duplicate multihashes keep the first offset.
    pub fn from_entries(entries: impl IntoIterator<Item = (Multihash, u64)>) -> Self {
        let mut index = Self::new();
        for (mh, offset) in entries {
            index
                .buckets
                .entry(mh.code())
                .or_default()
                .entry(mh.digest().len() as u32 + OFFSET_LEN)
                .or_default()
                .push(Record {
                    digest: mh.digest().to_vec(),
                    offset,
                });
        }
        for widths in index.buckets.values_mut() {
            for records in widths.values_mut() {
                // Stable sort keeps the first-seen offset ahead of later duplicates.
                records.sort_by(|a, b| a.digest.cmp(&b.digest));
                records.dedup_by(|later, earlier| later.digest == earlier.digest);
            }
        }
        index
    }

    /// Build by walking CAR sections.
    pub fn from_sections(
        sections: impl Iterator<Item = Result<Section, CarError>>,
    ) -> Result<Self, CarError> {
        let mut entries = Vec::new();
        for section in sections {
            let section = section?;
            entries.push((section.cid.hash().clone(), section.offset));
        }
        Ok(Self::from_entries(entries))
    }

    /// Number of indexed multihashes.
    pub fn len(&self) -> usize {
        self.buckets
            .values()
            .flat_map(|widths| widths.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexed multihashes in index order (code, width, digest).
    pub fn multihashes(&self) -> impl Iterator<Item = Multihash> + '_ {
        self.buckets.iter().flat_map(|(&code, widths)| {
            widths
                .values()
                .flat_map(move |records| records.iter().map(move |r| Multihash::wrap(code, r.digest.clone())))
        })
    }

    /// Payload offset of the section holding `mh`.
    pub fn offset_of(&self, mh: &Multihash) -> Option<u64> {
        let records = self
            .buckets
            .get(&mh.code())?
            .get(&(mh.digest().len() as u32 + OFFSET_LEN))?;
        records
            .binary_search_by(|r| r.digest.as_slice().cmp(mh.digest()))
            .ok()
            .map(|i| records[i].offset)
    }

    /// Write the codec prefix and the index body.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&varint::to_vec(MULTIHASH_INDEX_SORTED))?;
        writer.write_all(&(self.buckets.len() as i32).to_le_bytes())?;
        for (code, widths) in &self.buckets {
            writer.write_all(&code.to_le_bytes())?;
            writer.write_all(&(widths.len() as i32).to_le_bytes())?;
            for (width, records) in widths {
                writer.write_all(&width.to_le_bytes())?;
                writer.write_all(&(*width as u64 * records.len() as u64).to_le_bytes())?;
                for record in records {
                    writer.write_all(&record.digest)?;
                    writer.write_all(&record.offset.to_le_bytes())?;
                }
            }
        }
        Ok(())
    }

    /// Serialized form, codec prefix included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        buf
    }

    /// Read an index that starts with its codec.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, CarError> {
        let codec = varint::read(reader)?
            .ok_or_else(|| CarError::InvalidIndex("empty index".into()))?;
        if codec != MULTIHASH_INDEX_SORTED {
            return Err(CarError::UnsupportedIndex(codec));
        }
        Self::read_body(reader)
    }

    /// Read the index body, after the codec.
    pub fn read_body<R: Read>(reader: &mut R) -> Result<Self, CarError> {
        let code_count = read_count(reader)?;
        let mut buckets = BTreeMap::new();

        for _ in 0..code_count {
            let code = read_u64(reader)?;
            let width_count = read_count(reader)?;
            let mut widths = BTreeMap::new();

            for _ in 0..width_count {
                let width = read_u32(reader)?;
                let byte_len = read_u64(reader)?;
                if width <= OFFSET_LEN || width > OFFSET_LEN + MAX_DIGEST_LEN {
                    return Err(CarError::InvalidIndex(format!("record width {} out of range", width)));
                }
                if byte_len % width as u64 != 0 {
                    return Err(CarError::InvalidIndex(format!(
                        "width {} does not divide {} bytes",
                        width, byte_len
                    )));
                }

                let digest_len = (width - OFFSET_LEN) as usize;
                let count = byte_len / width as u64;
                let mut records = Vec::new();
                let mut record = vec![0u8; width as usize];
                for _ in 0..count {
                    reader.read_exact(&mut record)?;
                    let mut offset = [0u8; 8];
                    offset.copy_from_slice(&record[digest_len..]);
                    records.push(Record {
                        digest: record[..digest_len].to_vec(),
                        offset: u64::from_le_bytes(offset),
                    });
                }
                if records.windows(2).any(|w| w[0].digest > w[1].digest) {
                    return Err(CarError::InvalidIndex("records are not sorted".into()));
                }
                widths.insert(width, records);
            }
            buckets.insert(code, widths);
        }

        Ok(Self { buckets })
    }
}

fn read_count<R: Read>(reader: &mut R) -> Result<usize, CarError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    let count = i32::from_le_bytes(buf);
    usize::try_from(count).map_err(|_| CarError::InvalidIndex(format!("negative count {}", count)))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, CarError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, CarError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
