// Client-side networking: reachability observation, the shared HTTP client,
// and the WebSocket push listener.

pub mod error;
pub mod http;
pub mod push;
pub mod reachability;
pub mod transport;

pub use error::PushError;
pub use http::ApiClient;
pub use push::{decode_frame, spawn_push_listener, PushCommand};
pub use reachability::Reachability;
pub use transport::{
    HttpTransport, MultipartPayload, PreparedRequest, RawResponse, ReqwestTransport, RequestBody,
    TransportError,
};
