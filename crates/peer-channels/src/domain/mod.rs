//! # Domain Layer
//!
//! Configuration snapshots and the rules that govern them. No I/O.

pub mod bundle;
pub mod bundle_source;
pub mod capabilities;
pub mod errors;
pub mod msp;
pub mod policy;
pub mod sanity;
pub mod validation;

pub use bundle::ConfigBundle;
pub use bundle_source::{BundleSource, BundleSubscriber};
pub use capabilities::{
    check_supported, SUPPORTED_APPLICATION_CAPABILITIES, SUPPORTED_CHANNEL_CAPABILITIES,
};
pub use errors::{
    ChannelError, ChannelResult, LedgerError, LifecycleError, MspError, PluginError, StoreError,
    TransportError,
};
pub use msp::{Identity, IdentityDeserializer, Msp, MspManager, SerializedIdentity};
pub use policy::PolicyManager;
pub use sanity::{check_next_sequence, log_sanity_checks, validate_new_bundle};
pub use validation::{TxValidationCode, TxValidationFlags};
