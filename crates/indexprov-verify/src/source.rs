//! Reading multihashes from a CAR or a CAR index.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indexprov_core::Multihash;
use indexprov_supplier::{CarError, CarFile, MultihashIndex, ReadOptions};

use crate::config::MultihashSource;

impl MultihashSource {
    pub fn path(&self) -> &Path {
        match self {
            MultihashSource::Car(path) | MultihashSource::CarIndex(path) => path,
        }
    }

    /// Load the source as a multihash-sorted index.
    ///
    /// A CAR uses its embedded index when it is multihash-sorted and otherwise
    /// has one generated from its payload. An index file must already be
    /// multihash-sorted.
    pub fn load_index(&self) -> Result<MultihashIndex, CarError> {
        match self {
            MultihashSource::Car(path) => {
                let car = CarFile::open(path)?;
                car.multihash_index(ReadOptions::default())
            }
            MultihashSource::CarIndex(path) => {
                let mut reader = BufReader::new(File::open(path)?);
                MultihashIndex::read_from(&mut reader)
            }
        }
    }

    /// All multihashes of the source, in index order.
    pub fn multihashes(&self) -> Result<Vec<Multihash>, CarError> {
        Ok(self.load_index()?.multihashes().collect())
    }
}
