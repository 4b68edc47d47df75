use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{
    random_suffix, ConversationType, HttpMethod, MessageId, MessageStatus, SenderRole,
};

/// A user-initiated mutation captured while offline, waiting for replay.
///
/// Serialized as part of one JSON array under the offline queue key, so the
/// whole queue survives process restarts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    /// Unique id: `<unix millis>_<random suffix>`
    pub id: String,
    /// Application-level action name, e.g. `place_order`
    pub kind: String,
    /// API path the action replays against
    pub endpoint: String,
    pub method: HttpMethod,
    /// JSON body; `null` means no body
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl PendingAction {
    pub fn new(kind: &str, endpoint: &str, method: HttpMethod, payload: Value) -> Self {
        let now = Utc::now();
        Self {
            id: format!("{}_{}", now.timestamp_millis(), random_suffix()),
            kind: kind.to_string(),
            endpoint: endpoint.to_string(),
            method,
            payload,
            created_at: now,
        }
    }
}

/// A chat message as displayed in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_role: SenderRole,
    pub content: String,
    /// Structured payload riding along with the text (quote, location, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_data: Option<Value>,
    /// Server payloads may omit this; a message we received was sent.
    #[serde(default = "default_inbound_status")]
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

fn default_inbound_status() -> MessageStatus {
    MessageStatus::Sent
}

impl ChatMessage {
    /// Build the optimistic local copy of a message the user just authored.
    pub fn new_outgoing(
        conversation_id: &str,
        sender_id: &str,
        sender_role: SenderRole,
        content: &str,
        attached_data: Option<Value>,
    ) -> Self {
        Self {
            id: MessageId::new_local(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_role,
            content: content.to_string(),
            attached_data,
            status: MessageStatus::Sending,
            created_at: Utc::now(),
        }
    }
}

/// A conversation between a customer and a vendor or driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub conversation_type: ConversationType,
    pub customer_id: String,
    pub vendor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
}

impl Conversation {
    /// The party `user_id` is talking to in this conversation.
    ///
    /// Pickup and delivery threads pair the customer with the driver; every
    /// other type pairs the customer with the vendor. Vendors and drivers
    /// always see the customer. Returns `None` for a user who is not a
    /// participant, or when the paired party is not assigned yet.
    pub fn counterpart_of(&self, user_id: &str) -> Option<&str> {
        if user_id == self.customer_id {
            return match self.conversation_type {
                ConversationType::Pickup | ConversationType::Delivery => self.driver_id.as_deref(),
                _ => Some(&self.vendor_id),
            };
        }
        if user_id == self.vendor_id || self.driver_id.as_deref() == Some(user_id) {
            return Some(&self.customer_id);
        }
        None
    }
}

/// The authenticated user session, stored durably across launches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Bearer token attached to authenticated requests
    pub token: String,
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    pub role: SenderRole,
}

/// An event pushed by the server over the WebSocket transport.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A message authored by the counterpart arrived
    MessageReceived(ChatMessage),
    /// Delivery state of an already confirmed message changed
    MessageStatusChanged {
        conversation_id: String,
        message_id: MessageId,
        status: MessageStatus,
    },
    /// Conversation metadata changed; the thread should be refetched
    ConversationUpdated { conversation_id: String },
    /// Recognizably framed event with an unknown name
    Unknown { event: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pending_action_wire_form_is_camel_case() {
        let action = PendingAction::new(
            "place_order",
            "/orders",
            HttpMethod::Post,
            json!({"commodityId": "c-1"}),
        );
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["method"], "POST");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn pending_action_ids_are_unique() {
        let a = PendingAction::new("a", "/x", HttpMethod::Post, Value::Null);
        let b = PendingAction::new("a", "/x", HttpMethod::Post, Value::Null);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn outgoing_messages_start_in_sending_state() {
        let message = ChatMessage::new_outgoing("conv-1", "u-1", SenderRole::Consumer, "hi", None);
        assert!(message.id.is_local());
        assert_eq!(message.status, MessageStatus::Sending);
    }

    #[test]
    fn inbound_message_without_status_defaults_to_sent() {
        let message: ChatMessage = serde_json::from_value(json!({
            "id": "m-7",
            "conversationId": "conv-1",
            "senderId": "u-2",
            "senderRole": "VENDOR",
            "content": "your order shipped",
            "createdAt": "2025-06-01T12:00:00Z",
        }))
        .unwrap();
        assert_eq!(message.status, MessageStatus::Sent);
        assert_eq!(message.id, MessageId::Server("m-7".into()));
    }

    #[test]
    fn counterpart_follows_conversation_type() {
        let mut conversation = Conversation {
            id: "conv-1".into(),
            conversation_type: ConversationType::Quote,
            customer_id: "cust".into(),
            vendor_id: "vend".into(),
            driver_id: Some("drv".into()),
        };
        assert_eq!(conversation.counterpart_of("cust"), Some("vend"));
        assert_eq!(conversation.counterpart_of("vend"), Some("cust"));
        assert_eq!(conversation.counterpart_of("drv"), Some("cust"));

        conversation.conversation_type = ConversationType::Delivery;
        assert_eq!(conversation.counterpart_of("cust"), Some("drv"));

        conversation.driver_id = None;
        assert_eq!(conversation.counterpart_of("cust"), None);
        assert_eq!(conversation.counterpart_of("stranger"), None);
    }
}
