//! Offline-first action queue and space synchronization for Quorum
//!
//! Mutations are persisted as actions and delivered by per-type handlers with retries.
//! The sync engine decides when a space replica is behind its peers and feeds sync
//! traffic through the same queue.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![doc = include_str!("../README.md")]

pub mod clock;
pub mod config;
pub mod encryption;
pub mod error;
pub mod handlers;
pub mod keyring;
pub mod logging;
pub mod prelude;
pub mod queue;
pub mod sealer;
pub mod status;
pub mod sync;
#[cfg(test)]
pub mod test_util;
pub mod transport;
pub mod wire;

pub use self::config::{CoreConfig, QueueConfig, SyncConfig};
pub use self::error::Error;
pub use self::logging::init_logging;
pub use self::queue::{ActionQueue, QueueEvent};
pub use self::sync::SyncEngine;

// Re-export storage identifiers for convenience
pub use quorum_storage_traits::{ActionId, SpaceId, Timestamp};
