//! Connection supervisor
//!
//! A connection never reconnects by itself. The supervisor starts a fresh
//! one after each restartable close, with exponential backoff and a bound on
//! consecutive failures.

use crate::client::GatewayClient;
use crate::protocol::CloseReason;
use chorus_common::{AppError, AppResult, SupervisorConfig};
use std::future::Future;
use std::time::Duration;

/// Restart policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorPolicy {
    /// Consecutive restarts before giving up
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(60_000),
        }
    }
}

impl From<&SupervisorConfig> for SupervisorPolicy {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl SupervisorPolicy {
    /// Delay before restart number `attempt` (1-based): `base * 2^(attempt-1)`, capped
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Restarts gateway connections according to a [`SupervisorPolicy`]
pub struct Supervisor {
    client: GatewayClient,
    policy: SupervisorPolicy,
}

impl Supervisor {
    pub fn new(client: GatewayClient, policy: SupervisorPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &SupervisorPolicy {
        &self.policy
    }

    /// Keep a connection up until `shutdown` resolves or restarting is pointless
    ///
    /// Returns the final close reason, or the error that stopped supervision:
    /// a fatal startup error or [`AppError::RestartsExhausted`].
    pub async fn run<F>(&self, shutdown: F) -> AppResult<CloseReason>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut failures = 0u32;

        loop {
            let started = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested before connecting");
                    return Ok(CloseReason::Shutdown);
                }
                started = self.client.start() => started,
            };

            let last = match started {
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, code = e.error_code(), "Fatal startup error");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, code = e.error_code(), "Gateway startup failed");
                    e.to_string()
                }
                Ok(running) => {
                    let handle = running.handle().clone();
                    let wait = running.wait();
                    tokio::pin!(wait);

                    let exit = tokio::select! {
                        exit = &mut wait => exit?,
                        _ = &mut shutdown => {
                            tracing::info!("Shutdown requested");
                            let _ = handle.shutdown().await;
                            return wait.await.map(|exit| exit.reason);
                        }
                    };

                    if exit.reached_ready {
                        failures = 0;
                    }
                    if !exit.reason.should_restart() {
                        tracing::info!(reason = %exit.reason, "Connection closed for good");
                        return Ok(exit.reason);
                    }
                    tracing::info!(reason = %exit.reason, "Connection closed");
                    exit.reason.to_string()
                }
            };

            failures += 1;
            if failures > self.policy.max_retries {
                tracing::error!(attempts = self.policy.max_retries, last = %last, "Giving up on gateway");
                return Err(AppError::RestartsExhausted {
                    attempts: self.policy.max_retries,
                    last,
                });
            }

            let delay = self.policy.backoff(failures);
            tracing::info!(
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                "Restarting gateway connection"
            );

            tokio::select! {
                _ = &mut shutdown => return Ok(CloseReason::Shutdown),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
