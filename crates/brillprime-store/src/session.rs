//! Typed helpers for the durable user session.

use brillprime_shared::constants::SESSION_KEY;
use brillprime_shared::SessionRecord;

use crate::database::Store;
use crate::error::Result;

impl Store {
    /// Persist the session returned by a successful login.
    pub fn save_session(&self, session: &SessionRecord) -> Result<()> {
        self.set_item(SESSION_KEY, session)
    }

    /// Load the stored session, if any.
    pub fn load_session(&self) -> Result<Option<SessionRecord>> {
        self.get_item(SESSION_KEY)
    }

    /// Drop the stored session (logout, or invalidation after a 401).
    pub fn clear_session(&self) -> Result<()> {
        self.remove_item(SESSION_KEY)
    }

    /// Bearer token of the current session, if one is stored.
    pub fn auth_token(&self) -> Result<Option<String>> {
        Ok(self.load_session()?.map(|session| session.token))
    }
}
