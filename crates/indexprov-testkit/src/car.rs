//! CAR files built from generated blocks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::{Rng, SeedableRng};

use indexprov_core::cid::codec;
use indexprov_core::{Cid, Multihash, MultihashCode};
use indexprov_supplier::car::{write_section, CarHeader, V2Header, V2_HEADER_LEN, V2_PRAGMA};
use indexprov_supplier::MultihashIndex;

/// An ordered set of raw blocks and the roots to put in the CAR header.
#[derive(Debug, Clone)]
pub struct CarFixture {
    pub roots: Vec<Cid>,
    pub blocks: Vec<(Cid, Vec<u8>)>,
}

impl CarFixture {
    /// `n` blocks of random content.
    pub fn random(n: usize) -> Self {
        Self::from_rng(&mut rand::thread_rng(), n)
    }

    /// `n` blocks derived from `seed`.
    pub fn from_seed(seed: u64, n: usize) -> Self {
        Self::from_rng(&mut rand::rngs::StdRng::seed_from_u64(seed), n)
    }

    fn from_rng<R: Rng>(rng: &mut R, n: usize) -> Self {
        let blocks: Vec<(Cid, Vec<u8>)> = (0..n)
            .map(|_| {
                let len = rng.gen_range(1..256);
                let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
                (raw_cid(&data), data)
            })
            .collect();
        let roots = blocks.first().map(|(cid, _)| vec![cid.clone()]).unwrap_or_default();
        Self { roots, blocks }
    }

    /// Replace the header roots. The block sequence is unchanged.
    pub fn with_roots(mut self, roots: Vec<Cid>) -> Self {
        self.roots = roots;
        self
    }

    pub fn cids(&self) -> Vec<Cid> {
        self.blocks.iter().map(|(cid, _)| cid.clone()).collect()
    }

    pub fn multihashes(&self) -> Vec<Multihash> {
        self.blocks.iter().map(|(cid, _)| cid.hash().clone()).collect()
    }

    /// CARv1 encoding.
    pub fn to_v1(&self) -> Vec<u8> {
        self.encode_v1().0
    }

    /// The multihash-sorted index of the CARv1 payload.
    pub fn index(&self) -> MultihashIndex {
        MultihashIndex::from_entries(self.encode_v1().1)
    }

    /// CARv2 encoding wrapping [`Self::to_v1`], optionally with an index.
    pub fn to_v2(&self, with_index: bool) -> Vec<u8> {
        let (payload, offsets) = self.encode_v1();
        let data_offset = (V2_PRAGMA.len() + V2_HEADER_LEN) as u64;
        let data_size = payload.len() as u64;
        let header = V2Header {
            characteristics: [0u8; 16],
            data_offset,
            data_size,
            index_offset: if with_index { data_offset + data_size } else { 0 },
        };

        let mut out = Vec::with_capacity(payload.len() + 64);
        out.extend_from_slice(&V2_PRAGMA);
        out.extend_from_slice(&header.to_bytes());
        out.extend(payload);
        if with_index {
            out.extend(MultihashIndex::from_entries(offsets).to_bytes());
        }
        out
    }

    pub fn write_v1(&self, path: impl AsRef<Path>) -> io::Result<PathBuf> {
        write(path.as_ref(), &self.to_v1())
    }

    pub fn write_v2(&self, path: impl AsRef<Path>, with_index: bool) -> io::Result<PathBuf> {
        write(path.as_ref(), &self.to_v2(with_index))
    }

    /// Write a standalone index file.
    pub fn write_index(&self, path: impl AsRef<Path>) -> io::Result<PathBuf> {
        write(path.as_ref(), &self.index().to_bytes())
    }

    fn encode_v1(&self) -> (Vec<u8>, Vec<(Multihash, u64)>) {
        let mut out = CarHeader {
            version: 1,
            roots: self.roots.clone(),
        }
        .to_bytes()
        .expect("header of raw CIDs encodes");

        let mut offsets = Vec::with_capacity(self.blocks.len());
        for (cid, data) in &self.blocks {
            offsets.push((cid.hash().clone(), out.len() as u64));
            write_section(&mut out, cid, data);
        }
        (out, offsets)
    }
}

/// The raw-codec sha2-256 CID of `data`.
pub fn raw_cid(data: &[u8]) -> Cid {
    Cid::new_v1(codec::RAW, Multihash::sum(MultihashCode::Sha2_256, data))
}

fn write(path: &Path, bytes: &[u8]) -> io::Result<PathBuf> {
    fs::write(path, bytes)?;
    Ok(path.to_path_buf())
}
