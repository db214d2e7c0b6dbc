//! # Domain Module
//!
//! Core domain types and components of the messaging endpoint.

pub mod channel;
pub mod errors;
pub mod events;
pub mod invariants;
pub mod library;
pub mod nonce;
pub mod packet;
pub mod pathway;
pub mod security;
pub mod snapshot;
pub mod value_objects;
pub mod verification;

pub use channel::MessageChannel;
pub use errors::*;
pub use events::EndpointEvent;
pub use invariants::*;
pub use library::{LibraryMigration, LibraryRegistry};
pub use nonce::NonceManager;
pub use packet::*;
pub use pathway::*;
pub use security::SecurityValidator;
pub use snapshot::EndpointSnapshot;
pub use value_objects::*;
pub use verification::*;
