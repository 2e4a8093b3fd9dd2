//! # indexprov testkit
//!
//! Testing utilities for indexprov.
//!
//! ## Features
//!
//! - **Fixtures**: Identities, addresses and extended providers for tests
//! - **CAR writers**: CARv1 and CARv2 files built from generated blocks
//! - **Generators**: Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use indexprov_testkit::{CarFixture, TestFixture};
//!
//! let fixture = TestFixture::new();
//! let car = CarFixture::random(16);
//! let dir = tempfile::tempdir().unwrap();
//! let path = car.write_v1(dir.path().join("a.car")).unwrap();
//! ```

pub mod car;
pub mod fixtures;
pub mod generators;

pub use car::CarFixture;
pub use fixtures::*;
pub use generators::*;
