//! Storage for ChatSa records.
//!
//! [`PersistenceClient`] is the seam the engine and the HTTP layer talk to.
//! Two backends implement it: MongoDB (feature `mongodb`) and an in-memory
//! store used for local runs and tests.

pub mod builder;
pub mod dbs;
pub mod error;
pub mod memory;
pub mod trait_client;

pub use builder::{PersistClientBuilder, StorageBackend};
pub use error::{PersistError, Result};
pub use memory::InMemoryPersistenceClient;
pub use trait_client::PersistenceClient;

#[cfg(feature = "mongodb")]
pub use dbs::mongo::MongoPersistenceClient;
