//! # indexprov supplier
//!
//! Maps content ids to CAR files and supplies the CIDs of their blocks, either
//! as a blocking iterator or as an async [`EntryStream`].
//!
//! ## Key Types
//!
//! - [`CarSupplier`] - Registration records and CID supply
//! - [`CarFile`] - CARv1/CARv2 reader
//! - [`MultihashIndex`] - Multihash-sorted index reader and writer
//! - [`EntryStream`] - Bounded async stream over a CID iterator

pub mod car;
pub mod error;
pub mod index;
pub mod stream;
pub mod supplier;

pub use car::{CarFile, CarHeader, ReadOptions, Section, SectionReader, V2Header};
pub use error::{CarError, Result, SupplierError};
pub use index::{MultihashIndex, MAX_DIGEST_LEN, MULTIHASH_INDEX_SORTED};
pub use stream::EntryStream;
pub use supplier::{generate_id, CarSupplier, CidIterator, RepairReport, SupplierConfig};
