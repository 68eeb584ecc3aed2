//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, ConfigError, Environment, GatewayConfig, InitialVoiceConfig,
    SupervisorConfig, VoiceConfig,
};
