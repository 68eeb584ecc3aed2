//! User entity - an account on the remote service

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// User account as reported by the gateway and the REST API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Create a new User with required fields
    pub fn new(id: Snowflake, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            discriminator: "0000".to_string(),
            avatar: None,
            bot: false,
        }
    }

    /// Get the full tag (username#discriminator)
    pub fn tag(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }
}
