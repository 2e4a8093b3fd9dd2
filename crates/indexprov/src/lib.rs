//! # indexprov
//!
//! An index provider: announces which content a provider holds by publishing
//! a signed, linked chain of advertisements, and supplies the block ids of
//! that content from CAR files.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use indexprov::{Engine, EngineConfig, DatastorePublisher};
//! use indexprov::core::{AdBuilder, AdParams, Keypair};
//! use indexprov::store::SqliteDatastore;
//!
//! async fn example() {
//!     let keypair = Keypair::generate();
//!     let addrs = vec!["/ip4/127.0.0.1/tcp/3104".parse().unwrap()];
//!
//!     let publisher = DatastorePublisher::new(SqliteDatastore::open("ads.db").unwrap());
//!     let engine = Engine::start(keypair.clone(), publisher, EngineConfig::default())
//!         .await
//!         .unwrap();
//!
//!     let ad = AdBuilder::new(keypair, addrs)
//!         .build_and_sign(AdParams {
//!             context_id: "my-content".into(),
//!             ..AdParams::default()
//!         })
//!         .unwrap();
//!     let link = engine.publish(ad).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `indexprov::core` - Advertisements, identities, CIDs
//! - `indexprov::store` - Datastore abstraction and SQLite
//! - `indexprov::supplier` - CAR supplier and entry streams

pub mod engine;
pub mod error;
pub mod publisher;

pub use indexprov_core as core;
pub use indexprov_store as store;
pub use indexprov_supplier as supplier;

pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, Result};
pub use publisher::{DatastorePublisher, MemoryPublisher, Publisher};

pub use indexprov_core::{
    AdBuilder, AdParams, Advertisement, BuildError, Entries, ExtendedProvider,
    ExtendedProviderInfo, Keypair, Link, Multiaddr, PeerId, XpInfo,
};
