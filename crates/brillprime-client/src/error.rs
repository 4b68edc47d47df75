use thiserror::Error;

use brillprime_shared::ApiFailure;
use brillprime_store::StoreError;

/// Errors surfaced by high-level client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The backend rejected the request, or it never got there.
    #[error("API error: {0}")]
    Api(#[from] ApiFailure),

    /// Local persistence failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}
