//! Gateway session
//!
//! Credentials and identity of one connection. A new session is created for
//! every connection, so the session id never survives a reconnect.

use chorus_core::Snowflake;

/// Session data owned by the connection
#[derive(Clone)]
pub struct Session {
    token: String,
    user_id: Snowflake,
    session_id: Option<String>,
}

impl Session {
    /// Create a session for an authenticated account
    pub fn new(token: impl Into<String>, user_id: Snowflake) -> Self {
        Self {
            token: token.into(),
            user_id,
            session_id: None,
        }
    }

    /// Bot credential
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Id of the authenticated account
    pub fn user_id(&self) -> Snowflake {
        self.user_id
    }

    /// Session id assigned by READY
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub(crate) fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
    }

    pub(crate) fn clear_session_id(&mut self) {
        self.session_id = None;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("session_id", &self.session_id)
            .finish()
    }
}
