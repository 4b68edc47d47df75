//! # brillprime-store
//!
//! Local durable storage for the BrillPrime client, backed by SQLite.
//!
//! The crate exposes a synchronous, namespaced JSON key-value surface
//! (`set_item` / `get_item` / `remove_item` / `clear`) plus typed helpers
//! for the two well-known records: the user session and the offline action
//! queue. All client layers share one clonable [`Store`] handle.

pub mod database;
pub mod kv;
pub mod migrations;
pub mod queue;
pub mod session;

mod error;

pub use database::{Database, Store};
pub use error::StoreError;
