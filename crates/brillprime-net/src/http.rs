//! The shared HTTP client every outbound request goes through.
//!
//! One choke point applies the cross-cutting request policy:
//!
//! - reachability is checked before the wire is touched, so a known-offline
//!   device fails fast with [`ApiErrorKind::NetworkUnavailable`];
//! - the stored bearer token is attached when present (absence is fine,
//!   public endpoints exist);
//! - a fixed deadline bounds every request and maps to
//!   [`ApiErrorKind::Timeout`], distinct from being offline;
//! - an HTTP 401 invalidates the stored session before the failure is
//!   returned, so no later request retries a known-bad token.
//!
//! Expected failures come back as [`ApiFailure`] values, never panics.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use brillprime_shared::constants::REQUEST_TIMEOUT_SECS;
use brillprime_shared::{ApiFailure, ApiResult, HttpMethod, PendingAction};
use brillprime_store::Store;

use crate::reachability::Reachability;
use crate::transport::{
    HttpTransport, MultipartPayload, PreparedRequest, RawResponse, RequestBody, TransportError,
};

/// Single point of outbound request construction for the application.
///
/// Constructed once and handed to its consumers; tests inject a fake
/// [`HttpTransport`] to script responses.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    store: Store,
    reachability: Reachability,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Store,
        reachability: Reachability,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            store,
            reachability,
            base_url: base_url.into(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Override the fixed request deadline (tests, slow sandboxes).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The reachability handle this client consults before each request.
    pub fn reachability(&self) -> &Reachability {
        &self.reachability
    }

    /// Issue one request against `path` (joined to the base URL) and
    /// normalize the outcome into the uniform envelope.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: RequestBody,
    ) -> ApiResult<Value> {
        if !self.reachability.is_online() {
            debug!(%method, path, "skipping request, device is offline");
            return Err(ApiFailure::network_unavailable());
        }

        // A failing session read must not block public endpoints; the
        // request just goes out unauthenticated.
        let bearer_token = match self.store.auth_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "could not read stored session");
                None
            }
        };

        let request = PreparedRequest {
            method,
            url: join_url(&self.base_url, path),
            bearer_token,
            body,
        };

        debug!(%method, path, "dispatching request");

        let raw = match tokio::time::timeout(self.timeout, self.transport.execute(request)).await {
            Err(_elapsed) => return Err(ApiFailure::timeout(self.timeout.as_secs())),
            Ok(Err(TransportError::Timeout)) => {
                return Err(ApiFailure::timeout(self.timeout.as_secs()))
            }
            Ok(Err(TransportError::Connect(message))) => {
                return Err(ApiFailure::server(None, message))
            }
            Ok(Err(TransportError::Other(message))) => {
                return Err(ApiFailure::server(None, message))
            }
            Ok(Ok(raw)) => raw,
        };

        self.normalize(method, path, raw)
    }

    /// Fold a raw response into the envelope, handling session invalidation.
    fn normalize(&self, method: HttpMethod, path: &str, raw: RawResponse) -> ApiResult<Value> {
        if (200..300).contains(&raw.status) {
            let data = if raw.body.trim().is_empty() {
                Value::Null
            } else {
                // A non-JSON 2xx body (plain text, HTML health pages) is
                // surfaced as a string rather than treated as a failure.
                serde_json::from_str(&raw.body).unwrap_or(Value::String(raw.body))
            };
            return Ok(data);
        }

        let message = extract_error_message(raw.status, &raw.body);

        if raw.status == 401 {
            warn!(%method, path, "unauthorized response, clearing stored session");
            if let Err(e) = self.store.clear_session() {
                warn!(error = %e, "failed to clear session after 401");
            }
            return Err(ApiFailure::unauthorized(message));
        }

        debug!(%method, path, status = raw.status, "request failed");
        Err(ApiFailure::server(Some(raw.status), message))
    }

    /// GET `path` and decode the response payload.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        decode(self.request(HttpMethod::Get, path, RequestBody::Empty).await?)
    }

    /// POST a JSON body to `path` and decode the response payload.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiFailure::server(None, format!("unserializable request body: {e}")))?;
        decode(
            self.request(HttpMethod::Post, path, RequestBody::Json(value))
                .await?,
        )
    }

    /// PUT a JSON body to `path` and decode the response payload.
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiFailure::server(None, format!("unserializable request body: {e}")))?;
        decode(
            self.request(HttpMethod::Put, path, RequestBody::Json(value))
                .await?,
        )
    }

    /// DELETE `path` and decode the response payload.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        decode(self.request(HttpMethod::Delete, path, RequestBody::Empty).await?)
    }

    /// Upload a file via multipart form data. The transport chooses the
    /// content-type boundary.
    pub async fn upload(&self, path: &str, payload: MultipartPayload) -> ApiResult<Value> {
        self.request(HttpMethod::Post, path, RequestBody::Multipart(payload))
            .await
    }

    /// Replay one queued offline action.
    pub async fn execute_action(&self, action: &PendingAction) -> ApiResult<Value> {
        let body = if action.payload.is_null() {
            RequestBody::Empty
        } else {
            RequestBody::Json(action.payload.clone())
        };
        self.request(action.method, &action.endpoint, body).await
    }

    /// Record an analytics event, dropping any failure.
    ///
    /// Telemetry must never surface errors into user flows; a lost event is
    /// logged at debug and forgotten.
    pub async fn track_event(&self, name: &str, properties: Value) {
        let body = serde_json::json!({ "event": name, "properties": properties });
        match self
            .request(HttpMethod::Post, "/analytics/events", RequestBody::Json(body))
            .await
        {
            Ok(_) => {}
            Err(e) => debug!(event = name, error = %e, "analytics event dropped"),
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiFailure::server(None, format!("unexpected response shape: {e}")))
}

/// Join a base URL and a path without doubling or dropping the slash.
fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Pull a human-readable message out of an error body.
///
/// Backends answer with `{"error": "..."}`, `{"message": "..."}` or
/// `{"error": {"message": "..."}}` depending on the route; fall back to the
/// bare status when none of those match.
fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            match value.get(key) {
                Some(Value::String(message)) => return message.clone(),
                Some(Value::Object(inner)) => {
                    if let Some(Value::String(message)) = inner.get("message") {
                        return message.clone();
                    }
                }
                _ => {}
            }
        }
    }
    format!("HTTP {status}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use brillprime_shared::{ApiErrorKind, SenderRole, SessionRecord};

    /// Scripted transport: pops one outcome per call and records every
    /// request it sees.
    struct FakeTransport {
        script: Mutex<VecDeque<Outcome>>,
        calls: Mutex<Vec<PreparedRequest>>,
    }

    enum Outcome {
        Respond(u16, Value),
        RespondText(u16, String),
        Fail(TransportError),
        Hang,
    }

    impl FakeTransport {
        fn scripted(outcomes: Vec<Outcome>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<PreparedRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn execute(&self, request: PreparedRequest) -> Result<RawResponse, TransportError> {
            self.calls.lock().unwrap().push(request);
            let outcome = self.script.lock().unwrap().pop_front().expect("unscripted call");
            match outcome {
                Outcome::Respond(status, value) => Ok(RawResponse {
                    status,
                    body: value.to_string(),
                }),
                Outcome::RespondText(status, body) => Ok(RawResponse { status, body }),
                Outcome::Fail(e) => Err(e),
                Outcome::Hang => std::future::pending().await,
            }
        }
    }

    fn test_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_at(&dir.path().join("test.db")).expect("should open");
        (dir, store)
    }

    fn test_session() -> SessionRecord {
        SessionRecord {
            token: "tok-abc".into(),
            user_id: "u-1".into(),
            full_name: "Ada Obi".into(),
            email: "ada@example.com".into(),
            role: SenderRole::Consumer,
        }
    }

    fn client_with(
        transport: Arc<FakeTransport>,
        store: Store,
        reachability: Reachability,
    ) -> ApiClient {
        ApiClient::new(transport, store, reachability, "https://api.test/api")
    }

    #[tokio::test]
    async fn offline_fails_fast_without_touching_the_wire() {
        let (_dir, store) = test_store();
        let transport = FakeTransport::scripted(vec![]);
        let reachability = Reachability::default();
        reachability.set_offline();

        let client = client_with(transport.clone(), store, reachability);
        let err = client
            .request(HttpMethod::Get, "/orders", RequestBody::Empty)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ApiErrorKind::NetworkUnavailable);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn bearer_token_is_attached_when_a_session_exists() {
        let (_dir, store) = test_store();
        store.save_session(&test_session()).unwrap();

        let transport = FakeTransport::scripted(vec![Outcome::Respond(200, json!({"ok": true}))]);
        let client = client_with(transport.clone(), store, Reachability::default());

        client
            .request(HttpMethod::Get, "/orders", RequestBody::Empty)
            .await
            .unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].bearer_token.as_deref(), Some("tok-abc"));
        assert_eq!(calls[0].url, "https://api.test/api/orders");
    }

    #[tokio::test]
    async fn missing_session_sends_no_token() {
        let (_dir, store) = test_store();
        let transport = FakeTransport::scripted(vec![Outcome::Respond(200, json!(null))]);
        let client = client_with(transport.clone(), store, Reachability::default());

        client
            .request(HttpMethod::Get, "/commodities", RequestBody::Empty)
            .await
            .unwrap();

        assert_eq!(transport.calls()[0].bearer_token, None);
    }

    #[tokio::test]
    async fn unauthorized_clears_the_stored_session() {
        let (_dir, store) = test_store();
        store.save_session(&test_session()).unwrap();

        let transport = FakeTransport::scripted(vec![Outcome::Respond(
            401,
            json!({"error": "token expired"}),
        )]);
        let client = client_with(transport, store.clone(), Reachability::default());

        let err = client
            .request(HttpMethod::Get, "/orders", RequestBody::Empty)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ApiErrorKind::Unauthorized);
        assert_eq!(err.message, "token expired");
        assert_eq!(store.load_session().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_maps_to_timeout_kind() {
        let (_dir, store) = test_store();
        let transport = FakeTransport::scripted(vec![Outcome::Hang]);
        let client = client_with(transport, store, Reachability::default())
            .with_timeout(Duration::from_secs(30));

        let err = client
            .request(HttpMethod::Get, "/orders", RequestBody::Empty)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ApiErrorKind::Timeout);
        assert_ne!(err.kind, ApiErrorKind::NetworkUnavailable);
    }

    #[tokio::test]
    async fn transport_level_timeout_also_maps_to_timeout_kind() {
        let (_dir, store) = test_store();
        let transport = FakeTransport::scripted(vec![Outcome::Fail(TransportError::Timeout)]);
        let client = client_with(transport, store, Reachability::default());

        let err = client
            .request(HttpMethod::Get, "/orders", RequestBody::Empty)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Timeout);
    }

    #[tokio::test]
    async fn connection_refusal_is_a_server_failure() {
        let (_dir, store) = test_store();
        let transport = FakeTransport::scripted(vec![Outcome::Fail(TransportError::Connect(
            "connection refused".into(),
        ))]);
        let client = client_with(transport, store, Reachability::default());

        let err = client
            .request(HttpMethod::Get, "/orders", RequestBody::Empty)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Server);
        assert_eq!(err.status, None);
    }

    #[tokio::test]
    async fn server_errors_carry_status_and_extracted_message() {
        let (_dir, store) = test_store();
        let transport = FakeTransport::scripted(vec![
            Outcome::Respond(500, json!({"message": "database on fire"})),
            Outcome::Respond(422, json!({"error": {"message": "bad quantity"}})),
            Outcome::RespondText(503, "<html>gateway</html>".into()),
        ]);
        let client = client_with(transport, store, Reachability::default());

        let err = client
            .request(HttpMethod::Get, "/a", RequestBody::Empty)
            .await
            .unwrap_err();
        assert_eq!((err.kind, err.status), (ApiErrorKind::Server, Some(500)));
        assert_eq!(err.message, "database on fire");

        let err = client
            .request(HttpMethod::Get, "/b", RequestBody::Empty)
            .await
            .unwrap_err();
        assert_eq!(err.message, "bad quantity");

        let err = client
            .request(HttpMethod::Get, "/c", RequestBody::Empty)
            .await
            .unwrap_err();
        assert_eq!(err.message, "HTTP 503");
    }

    #[tokio::test]
    async fn success_bodies_parse_to_json_with_text_fallback() {
        let (_dir, store) = test_store();
        let transport = FakeTransport::scripted(vec![
            Outcome::Respond(200, json!({"id": "o-1"})),
            Outcome::RespondText(200, "pong".into()),
            Outcome::RespondText(204, "".into()),
        ]);
        let client = client_with(transport, store, Reachability::default());

        let data = client
            .request(HttpMethod::Get, "/a", RequestBody::Empty)
            .await
            .unwrap();
        assert_eq!(data, json!({"id": "o-1"}));

        let data = client
            .request(HttpMethod::Get, "/b", RequestBody::Empty)
            .await
            .unwrap();
        assert_eq!(data, json!("pong"));

        let data = client
            .request(HttpMethod::Get, "/c", RequestBody::Empty)
            .await
            .unwrap();
        assert_eq!(data, Value::Null);
    }

    #[tokio::test]
    async fn typed_helpers_decode_payloads() {
        #[derive(serde::Deserialize)]
        struct Order {
            id: String,
        }

        let (_dir, store) = test_store();
        let transport = FakeTransport::scripted(vec![
            Outcome::Respond(200, json!({"id": "o-9"})),
            Outcome::Respond(201, json!({"id": "o-10"})),
            Outcome::Respond(200, json!({"id": "o-10"})),
            Outcome::Respond(200, json!({"id": "o-10"})),
        ]);
        let client = client_with(transport.clone(), store, Reachability::default());

        let order: Order = client.get("/orders/o-9").await.unwrap();
        assert_eq!(order.id, "o-9");

        let order: Order = client
            .post("/orders", &json!({"commodityId": "c-1"}))
            .await
            .unwrap();
        assert_eq!(order.id, "o-10");
        assert_eq!(
            transport.calls()[1].body,
            RequestBody::Json(json!({"commodityId": "c-1"}))
        );

        let order: Order = client
            .put("/orders/o-10", &json!({"quantity": 2}))
            .await
            .unwrap();
        assert_eq!(order.id, "o-10");

        let order: Order = client.delete("/orders/o-10").await.unwrap();
        assert_eq!(order.id, "o-10");

        let calls = transport.calls();
        assert_eq!(calls[2].method, HttpMethod::Put);
        assert_eq!(calls[3].method, HttpMethod::Delete);
        assert_eq!(calls[3].body, RequestBody::Empty);
    }

    #[tokio::test]
    async fn execute_action_replays_method_endpoint_and_payload() {
        let (_dir, store) = test_store();
        let transport = FakeTransport::scripted(vec![
            Outcome::Respond(200, json!({"ok": true})),
            Outcome::Respond(200, json!({"ok": true})),
        ]);
        let client = client_with(transport.clone(), store, Reachability::default());

        let with_body =
            PendingAction::new("place_order", "/orders", HttpMethod::Post, json!({"n": 1}));
        let without_body =
            PendingAction::new("cancel_order", "/orders/7", HttpMethod::Delete, Value::Null);

        client.execute_action(&with_body).await.unwrap();
        client.execute_action(&without_body).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls[0].body, RequestBody::Json(json!({"n": 1})));
        assert_eq!(calls[0].method, HttpMethod::Post);
        assert_eq!(calls[1].body, RequestBody::Empty);
        assert_eq!(calls[1].url, "https://api.test/api/orders/7");
    }

    #[tokio::test]
    async fn track_event_swallows_failures() {
        let (_dir, store) = test_store();
        let transport = FakeTransport::scripted(vec![Outcome::Fail(TransportError::Connect(
            "refused".into(),
        ))]);
        let client = client_with(transport, store, Reachability::default());

        // Must not panic or surface the error.
        client.track_event("order_placed", json!({"orderId": "o-1"})).await;
    }

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("https://a/api", "/x"), "https://a/api/x");
        assert_eq!(join_url("https://a/api/", "x"), "https://a/api/x");
        assert_eq!(join_url("https://a/api/", "/x"), "https://a/api/x");
        assert_eq!(join_url("https://a/api", "x"), "https://a/api/x");
    }
}
