//! # Adapters
//!
//! In-memory implementations of the storage-side outbound ports. The
//! production peer plugs its own ledger and transient store in through the
//! same traits.

pub mod memory_ledger;
pub mod msp_registry;
pub mod transient_store;

pub use memory_ledger::{InMemoryLedger, InMemoryLedgerProvider};
pub use msp_registry::{InMemoryMspRegistry, RegistryDeserializerFactory};
pub use transient_store::{InMemoryTransientStore, InMemoryTransientStoreProvider};
