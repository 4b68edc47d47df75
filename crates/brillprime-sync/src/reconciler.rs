//! Optimistic chat reconciliation.
//!
//! A locally authored message appears in the visible list immediately,
//! under a temporary id and status `Sending`. Once the server confirms the
//! send, the entry is replaced in place (matched by temporary id, never by
//! content) with the authoritative id and status `Sent`. A failed send
//! flips the entry to `Failed` and keeps it visible for retry.
//!
//! Inbound push messages are merged by id and flag the conversation for a
//! refetch of the authoritative list; push delivery alone is not trusted
//! as the record. Display order is insertion order. Nothing re-sorts by
//! server timestamp unless a caller explicitly asks for it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};

use brillprime_net::{ApiClient, RequestBody};
use brillprime_shared::{
    ApiFailure, ApiResult, ChatMessage, HttpMethod, MessageId, MessageStatus, PushEvent, SenderRole,
};
use brillprime_store::Store;

/// Visible per-conversation message list plus reconciliation bookkeeping.
#[derive(Debug, Default)]
pub struct ThreadState {
    messages: Vec<ChatMessage>,
    needs_refetch: bool,
}

impl ThreadState {
    /// Messages in display order (insertion order).
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// True when an inbound event has flagged this conversation for an
    /// authoritative refetch.
    pub fn needs_refetch(&self) -> bool {
        self.needs_refetch
    }

    pub fn flag_refetch(&mut self) {
        self.needs_refetch = true;
    }

    /// Append a locally authored message (displayed before any network).
    pub fn push_local(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Replace the temporary entry `temp_id` with its server-confirmed
    /// identity and status `Sent`.
    ///
    /// Matching is by id only; duplicate content must never misattribute a
    /// confirmation. If the authoritative copy already arrived through a
    /// push or refetch, the temporary entry is dropped instead of becoming
    /// a duplicate. Returns false when no such temporary entry exists.
    pub fn confirm(
        &mut self,
        temp_id: &MessageId,
        server_id: &str,
        server_created_at: Option<DateTime<Utc>>,
    ) -> bool {
        let Some(index) = self.messages.iter().position(|m| &m.id == temp_id) else {
            return false;
        };

        let confirmed = MessageId::Server(server_id.to_string());
        if self.messages.iter().any(|m| m.id == confirmed) {
            self.messages.remove(index);
            return true;
        }

        let message = &mut self.messages[index];
        message.id = confirmed;
        message.status = MessageStatus::Sent;
        if let Some(created_at) = server_created_at {
            message.created_at = created_at;
        }
        true
    }

    /// Mark the temporary entry `temp_id` as failed, keeping it visible.
    pub fn mark_failed(&mut self, temp_id: &MessageId) -> bool {
        match self.messages.iter_mut().find(|m| &m.id == temp_id) {
            Some(message) => {
                message.status = MessageStatus::Failed;
                true
            }
            None => false,
        }
    }

    /// Flip a failed local entry back to `Sending` and hand out what a
    /// retry needs to resend it.
    pub fn prepare_retry(&mut self, temp_id: &MessageId) -> Option<(String, Option<Value>)> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| &m.id == temp_id && m.status == MessageStatus::Failed)?;
        message.status = MessageStatus::Sending;
        Some((message.content.clone(), message.attached_data.clone()))
    }

    /// Update the delivery status of an already confirmed message.
    pub fn apply_status(&mut self, message_id: &MessageId, status: MessageStatus) -> bool {
        match self.messages.iter_mut().find(|m| &m.id == message_id) {
            Some(message) => {
                message.status = status;
                true
            }
            None => false,
        }
    }

    /// Merge one inbound message. A duplicate id is dropped; any accepted
    /// message flags the conversation for refetch.
    pub fn merge_inbound(&mut self, message: ChatMessage) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push(message);
        self.needs_refetch = true;
        true
    }

    /// Replace local state with the server's authoritative list, keeping
    /// locally unconfirmed messages at the tail in their original order.
    pub fn ingest_authoritative(&mut self, authoritative: Vec<ChatMessage>) {
        let pending: Vec<ChatMessage> = self
            .messages
            .drain(..)
            .filter(|m| m.id.is_local())
            .collect();
        self.messages = authoritative;
        self.messages.extend(pending);
        self.needs_refetch = false;
    }

    /// Re-sort by server timestamp, for callers that want server ordering
    /// after reconciliation. Stable, so equal timestamps keep insertion
    /// order. Never invoked implicitly.
    pub fn sort_by_server_time(&mut self) {
        self.messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }
}

/// Reconciles optimistic sends and push events across conversations.
pub struct ChatReconciler {
    client: Arc<ApiClient>,
    store: Store,
    threads: Mutex<HashMap<String, ThreadState>>,
}

impl ChatReconciler {
    pub fn new(client: Arc<ApiClient>, store: Store) -> Self {
        Self {
            client,
            store,
            threads: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ThreadState>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_thread<R>(&self, conversation_id: &str, f: impl FnOnce(&mut ThreadState) -> R) -> R {
        let mut threads = self.lock();
        f(threads.entry(conversation_id.to_string()).or_default())
    }

    /// Snapshot of the visible list for one conversation.
    pub fn messages(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.lock()
            .get(conversation_id)
            .map(|thread| thread.messages().to_vec())
            .unwrap_or_default()
    }

    /// True when the conversation is flagged for an authoritative refetch.
    pub fn needs_refetch(&self, conversation_id: &str) -> bool {
        self.lock()
            .get(conversation_id)
            .is_some_and(ThreadState::needs_refetch)
    }

    /// Send a message optimistically: it is visible in the thread before
    /// the network round-trip starts.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        attached_data: Option<Value>,
    ) -> ApiResult<MessageId> {
        let (sender_id, sender_role) = self.sender_identity();
        let message = ChatMessage::new_outgoing(
            conversation_id,
            &sender_id,
            sender_role,
            content,
            attached_data.clone(),
        );
        let temp_id = message.id.clone();

        self.with_thread(conversation_id, |thread| thread.push_local(message));
        debug!(conversation_id, temp_id = %temp_id, "optimistic message displayed");

        self.dispatch_send(conversation_id, &temp_id, content, attached_data.as_ref())
            .await
    }

    /// Resend a failed optimistic message under its existing temporary id.
    pub async fn retry_message(
        &self,
        conversation_id: &str,
        temp_id: &MessageId,
    ) -> ApiResult<MessageId> {
        let retryable = self.with_thread(conversation_id, |thread| thread.prepare_retry(temp_id));
        let Some((content, attached_data)) = retryable else {
            return Err(ApiFailure::server(
                None,
                "no failed local message with that id",
            ));
        };

        self.dispatch_send(conversation_id, temp_id, &content, attached_data.as_ref())
            .await
    }

    async fn dispatch_send(
        &self,
        conversation_id: &str,
        temp_id: &MessageId,
        content: &str,
        attached_data: Option<&Value>,
    ) -> ApiResult<MessageId> {
        let body = json!({
            "conversationId": conversation_id,
            "content": content,
            "attachedData": attached_data,
        });
        let path = format!("/conversations/{conversation_id}/messages");

        match self
            .client
            .request(HttpMethod::Post, &path, RequestBody::Json(body))
            .await
        {
            Ok(data) => {
                let Some(server_id) = extract_server_id(&data) else {
                    warn!(conversation_id, "send response carried no message id");
                    self.with_thread(conversation_id, |thread| thread.mark_failed(temp_id));
                    return Err(ApiFailure::server(None, "send response carried no message id"));
                };
                let server_created_at = extract_server_timestamp(&data);

                self.with_thread(conversation_id, |thread| {
                    if !thread.confirm(temp_id, &server_id, server_created_at) {
                        debug!(conversation_id, temp_id = %temp_id, "confirmed message no longer in thread");
                    }
                });
                debug!(conversation_id, server_id, "message send confirmed");
                Ok(MessageId::Server(server_id))
            }
            Err(failure) => {
                self.with_thread(conversation_id, |thread| thread.mark_failed(temp_id));
                warn!(conversation_id, temp_id = %temp_id, error = %failure, "message send failed");
                Err(failure)
            }
        }
    }

    /// Route one push event into the owning conversation.
    pub fn apply_push(&self, event: PushEvent) {
        match event {
            PushEvent::MessageReceived(message) => {
                let conversation_id = message.conversation_id.clone();
                let merged =
                    self.with_thread(&conversation_id, |thread| thread.merge_inbound(message));
                if merged {
                    debug!(conversation_id, "inbound message merged");
                } else {
                    debug!(conversation_id, "duplicate inbound message dropped");
                }
            }
            PushEvent::MessageStatusChanged {
                conversation_id,
                message_id,
                status,
            } => {
                let applied = self.with_thread(&conversation_id, |thread| {
                    thread.apply_status(&message_id, status)
                });
                if !applied {
                    debug!(conversation_id, message_id = %message_id, "status change for unknown message");
                }
            }
            PushEvent::ConversationUpdated { conversation_id } => {
                self.with_thread(&conversation_id, ThreadState::flag_refetch);
            }
            PushEvent::Unknown { event } => {
                debug!(event, "ignoring unrecognized push event");
            }
        }
    }

    /// Fetch the authoritative message list and reconcile local state
    /// against it. Returns how many messages the server reported.
    pub async fn refresh(&self, conversation_id: &str) -> ApiResult<usize> {
        let path = format!("/conversations/{conversation_id}/messages");
        let data = self
            .client
            .request(HttpMethod::Get, &path, RequestBody::Empty)
            .await?;

        let authoritative = parse_message_list(data);
        let count = authoritative.len();
        self.with_thread(conversation_id, |thread| {
            thread.ingest_authoritative(authoritative)
        });
        debug!(conversation_id, count, "conversation refreshed");
        Ok(count)
    }

    /// Explicitly re-sort one conversation by server timestamp.
    pub fn sort_by_server_time(&self, conversation_id: &str) {
        self.with_thread(conversation_id, ThreadState::sort_by_server_time);
    }

    fn sender_identity(&self) -> (String, SenderRole) {
        match self.store.load_session() {
            Ok(Some(session)) => (session.user_id, session.role),
            Ok(None) => (String::new(), SenderRole::Consumer),
            Err(e) => {
                warn!(error = %e, "could not read session for sender identity");
                (String::new(), SenderRole::Consumer)
            }
        }
    }
}

/// Find the object carrying the confirmed message in a send response.
/// Backends answer with the message at the top level, under `data`, or
/// under `message` depending on the route.
fn locate_confirmation(data: &Value) -> Option<&Value> {
    [Some(data), data.get("data"), data.get("message")]
        .into_iter()
        .flatten()
        .find(|candidate| candidate.get("id").is_some())
}

fn extract_server_id(data: &Value) -> Option<String> {
    match locate_confirmation(data)?.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn extract_server_timestamp(data: &Value) -> Option<DateTime<Utc>> {
    let raw = locate_confirmation(data)?.get("createdAt")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Accept the authoritative list as a bare array or nested under
/// `messages` / `data`. Entries that do not parse are skipped, not fatal.
fn parse_message_list(data: Value) -> Vec<ChatMessage> {
    let items = match data {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("messages").or_else(|| map.remove("data")) {
            Some(Value::Array(items)) => items,
            _ => {
                warn!("authoritative message response carried no list");
                Vec::new()
            }
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ChatMessage>(item) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(error = %e, "skipping unparseable message");
                None
            }
        })
        .collect()
}
