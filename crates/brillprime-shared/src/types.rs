use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::TEMP_ID_PREFIX;

/// HTTP verb of a live or queued request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery state of a chat message as shown to the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Optimistically displayed, network round-trip still in flight
    Sending,
    /// Confirmed by the server
    Sent,
    Delivered,
    Read,
    /// Send failed; the message stays visible so the user can retry
    Failed,
}

/// Role of a chat participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SenderRole {
    Consumer,
    Vendor,
    Driver,
}

/// Business context of a conversation. Determines which counterpart the
/// current user is talking to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationType {
    Quote,
    Order,
    Pickup,
    Delivery,
    General,
}

/// Observed network link state, as reported by the embedding platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LinkState {
    Online,
    Offline,
}

/// Identity of a chat message.
///
/// A locally authored message carries a temporary id (prefixed `temp_`)
/// until the server confirms the send and assigns the authoritative one.
/// The two spaces never collide because server ids never use the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Temporary, assigned at the moment of optimistic display
    Local(String),
    /// Authoritative, assigned by the server
    Server(String),
}

impl MessageId {
    /// Mint a fresh temporary id: `temp_<unix millis>_<random suffix>`.
    pub fn new_local() -> Self {
        Self::Local(format!(
            "{}{}_{}",
            TEMP_ID_PREFIX,
            chrono::Utc::now().timestamp_millis(),
            random_suffix()
        ))
    }

    /// Classify an id string coming off the wire.
    pub fn from_wire(id: String) -> Self {
        if id.starts_with(TEMP_ID_PREFIX) {
            Self::Local(id)
        } else {
            Self::Server(id)
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Local(id) | Self::Server(id) => id,
        }
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// On the wire a message id is a plain string; the Local/Server split is
// recovered from the prefix when deserializing.
impl Serialize for MessageId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        Ok(Self::from_wire(id))
    }
}

/// Eight hex chars of a fresh v4 UUID, used to de-collide time-based ids.
pub(crate) fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_carry_the_temp_prefix() {
        let id = MessageId::new_local();
        assert!(id.is_local());
        assert!(id.as_str().starts_with(TEMP_ID_PREFIX));
    }

    #[test]
    fn wire_ids_classify_by_prefix() {
        assert!(MessageId::from_wire("temp_1712000000000_ab12cd34".into()).is_local());
        assert!(!MessageId::from_wire("m-42".into()).is_local());
    }

    #[test]
    fn message_id_serializes_as_plain_string() {
        let id = MessageId::Server("m-42".into());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"m-42\"");

        let back: MessageId = serde_json::from_str("\"temp_17_a1b2c3d4\"").unwrap();
        assert!(back.is_local());
    }

    #[test]
    fn http_method_wire_form_is_uppercase() {
        assert_eq!(serde_json::to_string(&HttpMethod::Post).unwrap(), "\"POST\"");
        let method: HttpMethod = serde_json::from_str("\"DELETE\"").unwrap();
        assert_eq!(method, HttpMethod::Delete);
    }

    #[test]
    fn message_status_wire_form_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&MessageStatus::Sending).unwrap(),
            "\"sending\""
        );
    }
}
