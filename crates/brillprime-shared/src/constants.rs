/// Application name
pub const APP_NAME: &str = "BrillPrime";

/// Namespace prefix applied to every key this application writes into the
/// shared device store. `clear` removes only keys under this prefix.
pub const STORAGE_PREFIX: &str = "brillprime:";

/// Store key holding the authenticated user session
pub const SESSION_KEY: &str = "user_session";

/// Store key holding the offline action queue (one JSON array)
pub const OFFLINE_QUEUE_KEY: &str = "offline_actions";

/// Prefix marking a locally generated temporary message id
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Fixed outbound request deadline in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default REST API base URL (local development backend)
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

/// Default WebSocket endpoint for push events (local development backend)
pub const DEFAULT_WS_URL: &str = "ws://localhost:3000/ws";
