//! Chorus gateway client entry point
//!
//! Run with:
//! ```bash
//! CHORUS_TOKEN=... cargo run -p chorus-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use chorus_common::{try_init_tracing_with_config, AppConfig, AppError, AppResult, TracingConfig};
use chorus_gateway::{
    CloseReason, GatewayClient, GatewayOptions, HttpRestClient, LoggingEventHandler, Supervisor,
    SupervisorPolicy, WsTransport,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Exit status when the credential is rejected
const EXIT_UNAUTHORIZED: i32 = 2;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(reason) => info!(reason = %reason, "Gateway stopped"),
        Err(AppError::Unauthorized) => {
            error!("The configured token was rejected; check CHORUS_TOKEN");
            eprintln!("error: unauthorized credential, refusing to connect");
            std::process::exit(EXIT_UNAUTHORIZED);
        }
        Err(e) => {
            error!(error = %e, code = e.error_code(), "Gateway failed");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run() -> AppResult<CloseReason> {
    let config = AppConfig::from_env()?;

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        app = %config.app.name,
        env = ?config.app.env,
        api = %config.gateway.api_base_url,
        "Starting gateway client"
    );

    let rest = HttpRestClient::new(
        config.gateway.api_base_url.clone(),
        config.gateway.token.clone(),
        Duration::from_secs(config.gateway.rest_timeout_secs),
    )
    .map_err(|e| AppError::Rest(e.to_string()))?;

    let client = GatewayClient::new(
        GatewayOptions::from(&config),
        Arc::new(rest),
        Arc::new(WsTransport::new()),
    )
    .with_handler(Arc::new(LoggingEventHandler));

    let supervisor = Supervisor::new(client, SupervisorPolicy::from(&config.supervisor));

    supervisor.run(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received");
}
