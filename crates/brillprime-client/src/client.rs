//! The assembled client core.
//!
//! [`BrillPrime`] wires the local store, reachability, the HTTP client, the
//! offline action queue, and the chat reconciler together and exposes the
//! operations the embedding UI layer calls. Every collaborator is injected
//! through the constructor chain; tests swap the HTTP transport for a
//! scripted fake and point the store at a temp directory.

use std::sync::Arc;

use anyhow::Context;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use brillprime_net::{
    spawn_push_listener, ApiClient, HttpTransport, PushCommand, PushError, Reachability,
    ReqwestTransport, RequestBody,
};
use brillprime_shared::{
    ApiErrorKind, ApiFailure, ChatMessage, HttpMethod, MessageId, PendingAction, PushEvent,
    SenderRole, SessionRecord,
};
use brillprime_store::Store;
use brillprime_sync::{spawn_reconnect_flush, ChatReconciler, FlushReport, OfflineQueue};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// What happened to a submitted user action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The request went out and the server answered.
    Performed(Value),
    /// The device was offline; the action is durably queued for replay.
    Enqueued(PendingAction),
}

/// Handle onto a running push listener.
///
/// Holds the command channel into the socket task plus the task handles, so
/// the embedder can wind the listener down cleanly.
pub struct PushSession {
    commands: mpsc::Sender<PushCommand>,
    socket: JoinHandle<()>,
    pump: JoinHandle<()>,
}

impl PushSession {
    /// Close the socket and wait for both background tasks to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(PushCommand::Shutdown).await;
        let _ = self.socket.await;
        // The pump ends once the socket task drops the event sender.
        let _ = self.pump.await;
    }
}

/// The client core facade.
pub struct BrillPrime {
    config: ClientConfig,
    store: Store,
    reachability: Reachability,
    api: Arc<ApiClient>,
    queue: Arc<OfflineQueue>,
    chats: Arc<ChatReconciler>,
}

impl BrillPrime {
    /// Build the core with the real HTTP transport.
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let transport = Arc::new(
            ReqwestTransport::new(config.request_timeout)
                .context("Failed to build HTTP transport")?,
        );
        Self::with_transport(config, transport)
    }

    /// Build the core around an injected transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> anyhow::Result<Self> {
        let store = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create data directory {}", dir.display())
                })?;
                Store::open_at(&dir.join("brillprime.db"))
                    .context("Failed to open local store")?
            }
            None => Store::open_default().context("Failed to open local store")?,
        };

        let reachability = Reachability::default();
        let api = Arc::new(
            ApiClient::new(
                transport,
                store.clone(),
                reachability.clone(),
                config.api_url.clone(),
            )
            .with_timeout(config.request_timeout),
        );
        let queue = Arc::new(
            OfflineQueue::load(store.clone(), api.clone())
                .context("Failed to restore offline action queue")?,
        );
        let chats = Arc::new(ChatReconciler::new(api.clone(), store.clone()));

        info!(
            api_url = %config.api_url,
            pending = queue.len(),
            "client core initialized"
        );

        Ok(Self {
            config,
            store,
            reachability,
            api,
            queue,
            chats,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn reachability(&self) -> &Reachability {
        &self.reachability
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub fn chats(&self) -> &Arc<ChatReconciler> {
        &self.chats
    }

    // --- Session ---

    /// Authenticate and persist the returned session.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionRecord, ClientError> {
        let data = self
            .api
            .request(
                HttpMethod::Post,
                "/auth/login",
                RequestBody::Json(json!({ "email": email, "password": password })),
            )
            .await?;

        let Some(session) = parse_session(&data) else {
            return Err(ApiFailure::server(None, "login response carried no token").into());
        };

        self.store.save_session(&session)?;
        info!(user_id = %session.user_id, "session established");
        Ok(session)
    }

    /// End the session: best-effort server-side invalidation, then clear the
    /// stored session and any pending offline actions.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if self.reachability.is_online() {
            if let Err(e) = self
                .api
                .request(HttpMethod::Post, "/auth/logout", RequestBody::Empty)
                .await
            {
                warn!(error = %e, "server-side logout failed, clearing locally anyway");
            }
        }

        self.store.clear_session()?;
        self.queue.clear()?;
        info!("session and pending offline actions cleared");
        Ok(())
    }

    /// The stored session, if one exists.
    pub fn current_session(&self) -> Result<Option<SessionRecord>, ClientError> {
        Ok(self.store.load_session()?)
    }

    // --- Actions ---

    /// Submit a user action, queueing it for later replay when offline.
    ///
    /// A `null` payload means the replayed request carries no body.
    pub async fn submit_action(
        &self,
        kind: &str,
        endpoint: &str,
        method: HttpMethod,
        payload: Value,
    ) -> Result<ActionOutcome, ClientError> {
        if self.reachability.is_online() {
            let body = if payload.is_null() {
                RequestBody::Empty
            } else {
                RequestBody::Json(payload.clone())
            };
            match self.api.request(method, endpoint, body).await {
                Ok(data) => return Ok(ActionOutcome::Performed(data)),
                // The link can drop between the check and the dispatch; that
                // race lands in the queue like any other offline submission.
                Err(failure) if failure.kind == ApiErrorKind::NetworkUnavailable => {}
                Err(failure) => return Err(failure.into()),
            }
        }

        let action = self.queue.enqueue(kind, endpoint, method, payload)?;
        info!(id = %action.id, kind, "action queued for later replay");
        Ok(ActionOutcome::Enqueued(action))
    }

    /// Replay queued offline actions now.
    pub async fn flush_offline_actions(&self) -> Result<FlushReport, ClientError> {
        Ok(self.queue.flush().await?)
    }

    /// Spawn the background task that flushes the queue whenever the link
    /// comes back online.
    pub fn start_reconnect_flush(&self) -> JoinHandle<()> {
        spawn_reconnect_flush(self.queue.clone())
    }

    // --- Push ---

    /// Connect the push listener and pump its events into the chat layer.
    pub async fn start_push_listener(&self) -> Result<PushSession, PushError> {
        let token = match self.store.auth_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "could not read stored session for push auth");
                None
            }
        };

        let (commands, mut events, socket) =
            spawn_push_listener(&self.config.ws_url, token).await?;

        let chats = self.chats.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                chats.apply_push(event);
            }
        });

        Ok(PushSession {
            commands,
            socket,
            pump,
        })
    }

    /// Route one push event into the chat layer. Embedders that own their
    /// own socket can feed events here instead of using the listener.
    pub fn apply_push_event(&self, event: PushEvent) {
        self.chats.apply_push(event);
    }

    // --- Chat ---

    /// Send a chat message; it is visible in the thread immediately.
    pub async fn send_chat_message(
        &self,
        conversation_id: &str,
        content: &str,
        attached_data: Option<Value>,
    ) -> Result<MessageId, ClientError> {
        Ok(self
            .chats
            .send_message(conversation_id, content, attached_data)
            .await?)
    }

    /// Resend a chat message that previously failed.
    pub async fn retry_chat_message(
        &self,
        conversation_id: &str,
        temp_id: &MessageId,
    ) -> Result<MessageId, ClientError> {
        Ok(self.chats.retry_message(conversation_id, temp_id).await?)
    }

    /// Snapshot of one conversation as currently displayed.
    pub fn conversation_messages(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.chats.messages(conversation_id)
    }

    /// Refetch one conversation from the server and reconcile local state.
    pub async fn refresh_conversation(&self, conversation_id: &str) -> Result<usize, ClientError> {
        Ok(self.chats.refresh(conversation_id).await?)
    }

    // --- Telemetry ---

    /// Record an analytics event. Failures are dropped, never surfaced.
    pub async fn track_event(&self, name: &str, properties: Value) {
        self.api.track_event(name, properties).await;
    }
}

/// Pull a [`SessionRecord`] out of a login response.
///
/// Login answers arrive either flat (`{"token": ..., "user": {...}}`) or
/// wrapped (`{"data": {"token": ...}}`) depending on the route version, and
/// older routes inline the user fields next to the token.
fn parse_session(data: &Value) -> Option<SessionRecord> {
    let root = if data.get("token").is_some() {
        data
    } else {
        data.get("data")?
    };

    let token = root.get("token")?.as_str()?.to_string();
    let user = root.get("user").unwrap_or(root);

    let user_id = string_field(user, &["id", "userId"])?;
    let full_name = string_field(user, &["fullName", "name"]).unwrap_or_default();
    let email = string_field(user, &["email"]).unwrap_or_default();
    let role = user
        .get("role")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or(SenderRole::Consumer);

    Some(SessionRecord {
        token,
        user_id,
        full_name,
        email,
        role,
    })
}

/// First of `keys` holding a string value.
fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}
