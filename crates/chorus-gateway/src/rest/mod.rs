//! REST collaborator
//!
//! The gateway needs two REST calls before connecting: the gateway URL and
//! the authenticated user.

mod http;

pub use http::HttpRestClient;

use async_trait::async_trait;
use chorus_core::User;

/// REST errors
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// The credential was rejected
    #[error("unauthorized")]
    Unauthorized,

    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

/// REST operations the gateway depends on
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Raw gateway URL as the API returns it
    async fn gateway_url(&self) -> Result<String, RestError>;

    /// The account the credential belongs to
    async fn current_user(&self) -> Result<User, RestError>;
}
