//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use chorus_core::Snowflake;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub voice: VoiceConfig,
    pub supervisor: SupervisorConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Gateway connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Bot credential presented in Identify and on REST calls
    pub token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_gateway_version")]
    pub version: u8,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
    #[serde(default = "default_rest_timeout_secs")]
    pub rest_timeout_secs: u64,
}

/// Voice negotiation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    /// Wait between READY and the initial voice connect
    #[serde(default = "default_voice_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_voice_timeout_ms")]
    pub negotiation_timeout_ms: u64,
    /// Voice channel to join as soon as the session is ready
    #[serde(default)]
    pub initial: Option<InitialVoiceConfig>,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default = "default_self_deaf")]
    pub self_deaf: bool,
}

/// Voice channel joined right after READY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct InitialVoiceConfig {
    pub guild_id: Snowflake,
    pub channel_id: Snowflake,
}

/// Restart policy for the connection supervisor
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

// Default value functions
fn default_app_name() -> String {
    "chorus".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v6".to_string()
}

fn default_gateway_version() -> u8 {
    6
}

fn default_encoding() -> String {
    "json".to_string()
}

fn default_large_threshold() -> u32 {
    250
}

fn default_rest_timeout_secs() -> u64 {
    10
}

fn default_voice_settle_delay_ms() -> u64 {
    2_000
}

fn default_voice_timeout_ms() -> u64 {
    10_000
}

fn default_self_deaf() -> bool {
    true
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let initial = match (
            vars.parsed::<Snowflake>("CHORUS_VOICE_GUILD_ID")?,
            vars.parsed::<Snowflake>("CHORUS_VOICE_CHANNEL_ID")?,
        ) {
            (Some(guild_id), Some(channel_id)) => Some(InitialVoiceConfig {
                guild_id,
                channel_id,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingVar("CHORUS_VOICE_CHANNEL_ID")),
            (None, Some(_)) => return Err(ConfigError::MissingVar("CHORUS_VOICE_GUILD_ID")),
        };

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            gateway: GatewayConfig {
                token: lookup("CHORUS_TOKEN").ok_or(ConfigError::MissingVar("CHORUS_TOKEN"))?,
                api_base_url: lookup("CHORUS_API_BASE_URL").unwrap_or_else(default_api_base_url),
                version: vars
                    .parsed("CHORUS_GATEWAY_VERSION")?
                    .unwrap_or_else(default_gateway_version),
                encoding: lookup("CHORUS_GATEWAY_ENCODING").unwrap_or_else(default_encoding),
                large_threshold: vars
                    .parsed("CHORUS_LARGE_THRESHOLD")?
                    .unwrap_or_else(default_large_threshold),
                rest_timeout_secs: vars
                    .parsed("CHORUS_REST_TIMEOUT_SECS")?
                    .unwrap_or_else(default_rest_timeout_secs),
            },
            voice: VoiceConfig {
                settle_delay_ms: vars
                    .parsed("CHORUS_VOICE_SETTLE_DELAY_MS")?
                    .unwrap_or_else(default_voice_settle_delay_ms),
                negotiation_timeout_ms: vars
                    .parsed("CHORUS_VOICE_TIMEOUT_MS")?
                    .unwrap_or_else(default_voice_timeout_ms),
                initial,
                self_mute: vars.parsed("CHORUS_VOICE_SELF_MUTE")?.unwrap_or(false),
                self_deaf: vars
                    .parsed("CHORUS_VOICE_SELF_DEAF")?
                    .unwrap_or_else(default_self_deaf),
            },
            supervisor: SupervisorConfig {
                max_retries: vars
                    .parsed("CHORUS_RESTART_MAX_RETRIES")?
                    .unwrap_or_else(default_max_retries),
                base_backoff_ms: vars
                    .parsed("CHORUS_RESTART_BASE_BACKOFF_MS")?
                    .unwrap_or_else(default_base_backoff_ms),
                max_backoff_ms: vars
                    .parsed("CHORUS_RESTART_MAX_BACKOFF_MS")?
                    .unwrap_or_else(default_max_backoff_ms),
            },
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn parsed<T: FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        match (self.0)(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue(key, raw)),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
