//! Gateway client
//!
//! Startup sequence for one connection: check the credential, resolve the
//! account and gateway URL over REST, open the transport and spawn the
//! connection task.

use crate::connection::{
    ClientError, Collaborators, Connection, ConnectionConfig, ConnectionExit, ConnectionState,
    GatewayHandle, Session,
};
use crate::handlers::EventHandler;
use crate::protocol::IdentifyPayload;
use crate::rest::{RestClient, RestError};
use crate::transport::Transport;
use crate::voice::{VoiceConnectOptions, VoiceConnector};
use chorus_common::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default wait between READY and the initial voice join
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(2000);

/// Default upper bound for a voice negotiation
pub const DEFAULT_VOICE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Connection options
#[derive(Clone)]
pub struct GatewayOptions {
    pub token: String,
    pub version: u8,
    pub encoding: String,
    pub large_threshold: u32,
    pub settle_delay: Duration,
    pub voice_timeout: Duration,
    pub initial_voice: Option<VoiceConnectOptions>,
}

impl GatewayOptions {
    /// Options with protocol defaults
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            version: 6,
            encoding: "json".to_string(),
            large_threshold: IdentifyPayload::DEFAULT_LARGE_THRESHOLD,
            settle_delay: DEFAULT_SETTLE_DELAY,
            voice_timeout: DEFAULT_VOICE_TIMEOUT,
            initial_voice: None,
        }
    }

    #[must_use]
    pub fn with_initial_voice(mut self, options: VoiceConnectOptions) -> Self {
        self.initial_voice = Some(options);
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub fn with_voice_timeout(mut self, timeout: Duration) -> Self {
        self.voice_timeout = timeout;
        self
    }

    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            large_threshold: self.large_threshold,
            settle_delay: self.settle_delay,
            voice_timeout: self.voice_timeout,
            initial_voice: self.initial_voice,
        }
    }
}

impl From<&AppConfig> for GatewayOptions {
    fn from(config: &AppConfig) -> Self {
        let voice = &config.voice;
        let initial_voice = voice.initial.as_ref().map(|initial| {
            VoiceConnectOptions::new(initial.guild_id, initial.channel_id)
                .self_mute(voice.self_mute)
                .self_deaf(voice.self_deaf)
        });

        Self {
            token: config.gateway.token.clone(),
            version: config.gateway.version,
            encoding: config.gateway.encoding.clone(),
            large_threshold: config.gateway.large_threshold,
            settle_delay: Duration::from_millis(voice.settle_delay_ms),
            voice_timeout: Duration::from_millis(voice.negotiation_timeout_ms),
            initial_voice,
        }
    }
}

impl std::fmt::Debug for GatewayOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayOptions")
            .field("token", &"<redacted>")
            .field("version", &self.version)
            .field("encoding", &self.encoding)
            .field("large_threshold", &self.large_threshold)
            .field("settle_delay", &self.settle_delay)
            .field("voice_timeout", &self.voice_timeout)
            .field("initial_voice", &self.initial_voice)
            .finish()
    }
}

/// Gateway URL built from the REST answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayUrl {
    host: String,
    query: String,
}

impl GatewayUrl {
    /// Strip the scheme and trailing slash, then add version and encoding
    pub fn from_rest(raw: &str, version: u8, encoding: &str) -> Self {
        let host = raw
            .trim()
            .trim_start_matches("wss://")
            .trim_end_matches('/')
            .to_string();

        Self {
            host,
            query: format!("/?v={version}&encoding={encoding}"),
        }
    }

    /// Host and path without scheme
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Path and query appended to the host
    pub fn query(&self) -> &str {
        &self.query
    }
}

impl std::fmt::Display for GatewayUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wss://{}{}", self.host, self.query)
    }
}

fn startup_error(err: RestError) -> AppError {
    match err {
        RestError::Unauthorized => AppError::Unauthorized,
        other => AppError::Rest(other.to_string()),
    }
}

/// Starts gateway connections
pub struct GatewayClient {
    options: GatewayOptions,
    rest: Arc<dyn RestClient>,
    transport: Arc<dyn Transport>,
    handler: Option<Arc<dyn EventHandler>>,
    connector: Option<Arc<dyn VoiceConnector>>,
}

impl GatewayClient {
    pub fn new(
        options: GatewayOptions,
        rest: Arc<dyn RestClient>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            options,
            rest,
            transport,
            handler: None,
            connector: None,
        }
    }

    /// Forward dispatch events to `handler`
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Hand negotiated voice sessions to `connector`
    #[must_use]
    pub fn with_voice_connector(mut self, connector: Arc<dyn VoiceConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Open one connection
    ///
    /// Fails before touching the transport when the credential is missing or
    /// rejected.
    pub async fn start(&self) -> AppResult<RunningGateway> {
        if self.options.token.trim().is_empty() {
            return Err(AppError::MissingCredential);
        }

        let user = self.rest.current_user().await.map_err(startup_error)?;
        let raw_url = self.rest.gateway_url().await.map_err(startup_error)?;
        let url = GatewayUrl::from_rest(&raw_url, self.options.version, &self.options.encoding);

        tracing::info!(user_id = %user.id, user = %user.tag(), url = %url, "Connecting to gateway");

        let channels = self
            .transport
            .connect(&url.to_string())
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        let spawned = Connection::spawn(
            self.options.connection_config(),
            Session::new(self.options.token.clone(), user.id),
            channels,
            Collaborators {
                handler: self.handler.clone(),
                connector: self.connector.clone(),
                rest: Some(Arc::clone(&self.rest)),
            },
        );

        Ok(RunningGateway {
            handle: spawned.handle,
            state: spawned.state,
            task: spawned.task,
        })
    }
}

/// A live connection
#[derive(Debug)]
pub struct RunningGateway {
    handle: GatewayHandle,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<ConnectionExit>,
}

impl RunningGateway {
    pub fn handle(&self) -> &GatewayHandle {
        &self.handle
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Ask the connection to close normally
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        self.handle.shutdown().await
    }

    /// Wait for the connection to end
    pub async fn wait(self) -> AppResult<ConnectionExit> {
        self.task.await.map_err(AppError::internal)
    }
}
