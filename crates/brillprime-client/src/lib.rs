//! # brillprime-client
//!
//! The assembled BrillPrime client core: local store, reachability, HTTP
//! client, offline action queue, chat reconciliation, and the push listener,
//! wired together behind one facade for the embedding UI layer.

pub mod client;
pub mod config;
pub mod error;

pub use client::{ActionOutcome, BrillPrime, PushSession};
pub use config::ClientConfig;
pub use error::ClientError;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Call once, early, from the
/// embedding application.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "brillprime_client=debug,brillprime_sync=debug,brillprime_net=debug,brillprime_store=info,warn",
        )
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
