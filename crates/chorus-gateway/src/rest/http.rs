//! reqwest backed REST client

use super::{RestClient, RestError};
use async_trait::async_trait;
use chorus_core::User;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    url: String,
}

/// HTTP implementation of [`RestClient`]
#[derive(Clone)]
pub struct HttpRestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpRestClient {
    /// Create a client for `base_url` (e.g. `https://discord.com/api/v6`)
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RestError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chorus (", env!("CARGO_PKG_VERSION"), ")"))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, RestError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "REST request");

        let resp = self
            .http
            .get(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;

        match resp.status() {
            StatusCode::UNAUTHORIZED => Err(RestError::Unauthorized),
            status if !status.is_success() => Err(RestError::Status(status.as_u16())),
            _ => Ok(resp.json().await?),
        }
    }
}

impl std::fmt::Debug for HttpRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn gateway_url(&self) -> Result<String, RestError> {
        let body: GatewayResponse = self.get("/gateway").await?;
        Ok(body.url)
    }

    async fn current_user(&self) -> Result<User, RestError> {
        self.get("/users/@me").await
    }
}
