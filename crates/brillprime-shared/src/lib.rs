//! # brillprime-shared
//!
//! Domain types, wire models, and the uniform API outcome envelope shared by
//! every layer of the BrillPrime client core.

pub mod constants;
pub mod envelope;
pub mod protocol;
pub mod types;

pub use envelope::{ApiErrorKind, ApiFailure, ApiResult};
pub use protocol::{ChatMessage, Conversation, PendingAction, PushEvent, SessionRecord};
pub use types::{ConversationType, HttpMethod, LinkState, MessageId, MessageStatus, SenderRole};
