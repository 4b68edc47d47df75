use thiserror::Error;

/// Errors produced by the push transport.
#[derive(Error, Debug)]
pub enum PushError {
    /// The WebSocket endpoint URL did not parse.
    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    /// The WebSocket connection could not be established.
    #[error("WebSocket connect failed: {0}")]
    Connect(String),

    /// A frame arrived that does not match the `{event, data}` shape.
    #[error("Malformed push frame: {0}")]
    MalformedFrame(String),
}
