//! `provider car-id` -- Print the content id of a CAR file.

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use indexprov_core::MultihashCode;
use indexprov_supplier::{generate_id, SupplierConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum IdHash {
    #[value(name = "sha2-256")]
    Sha2_256,
    Blake3,
}

impl From<IdHash> for MultihashCode {
    fn from(hash: IdHash) -> Self {
        match hash {
            IdHash::Sha2_256 => MultihashCode::Sha2_256,
            IdHash::Blake3 => MultihashCode::Blake3,
        }
    }
}

#[derive(Args)]
pub struct CarIdArgs {
    /// Path to a CARv1 or CARv2 file
    pub path: PathBuf,
    /// Hash function for the id
    #[arg(long, value_enum, default_value = "sha2-256")]
    pub hash: IdHash,
    /// Stop at a zero-length section instead of failing
    #[arg(long)]
    pub zero_length_as_eof: bool,
}

pub async fn run(args: CarIdArgs) -> anyhow::Result<bool> {
    let config = SupplierConfig {
        id_hash: args.hash.into(),
        zero_length_section_as_eof: args.zero_length_as_eof,
    };
    let path = args.path;
    let id = tokio::task::spawn_blocking(move || generate_id(&path, &config)).await??;
    println!("{}", id);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexprov_testkit::CarFixture;

    #[tokio::test]
    async fn test_car_id_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = CarFixture::random(3).write_v1(dir.path().join("a.car")).unwrap();
        let ok = run(CarIdArgs {
            path,
            hash: IdHash::Blake3,
            zero_length_as_eof: false,
        })
        .await
        .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn test_car_id_missing_file() {
        let result = run(CarIdArgs {
            path: "/nonexistent.car".into(),
            hash: IdHash::Sha2_256,
            zero_length_as_eof: false,
        })
        .await;
        assert!(result.is_err());
    }
}
