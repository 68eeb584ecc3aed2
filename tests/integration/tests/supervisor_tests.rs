//! Supervisor scenarios
//!
//! Run with: cargo test -p integration-tests --test supervisor_tests

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chorus_common::{AppError, AppResult};
use chorus_gateway::{
    CloseReason, GatewayClient, GatewayMessage, OpCode, Supervisor, SupervisorPolicy,
    TransportEvent, TransportPeer,
};
use integration_tests::*;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

fn fast_policy(max_retries: u32) -> SupervisorPolicy {
    SupervisorPolicy {
        max_retries,
        base_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
    }
}

/// Run a supervisor in the background, stopped by the returned sender
fn spawn_supervisor(
    client: GatewayClient,
    policy: SupervisorPolicy,
) -> (oneshot::Sender<()>, JoinHandle<AppResult<CloseReason>>) {
    let (stop, stopped) = oneshot::channel::<()>();
    let supervisor = Supervisor::new(client, policy);
    let task = tokio::spawn(async move {
        supervisor
            .run(async {
                let _ = stopped.await;
            })
            .await
    });
    (stop, task)
}

async fn next_peer(peers: &mut mpsc::UnboundedReceiver<TransportPeer>) -> Result<TransportPeer> {
    let mut peer = tokio::time::timeout(Duration::from_secs(10), peers.recv())
        .await?
        .ok_or_else(|| anyhow!("supervisor stopped connecting"))?;

    let identify = peer
        .next_frame()
        .await
        .ok_or_else(|| anyhow!("connection closed before identify"))?;
    assert_eq!(identify.op, OpCode::Identify);
    Ok(peer)
}

#[tokio::test]
async fn test_restarts_after_server_reconnect() -> Result<()> {
    let rest = Arc::new(MockRest::ok());
    let (transport, mut peers) = MemoryTransport::new();
    let client = GatewayClient::new(test_options(), rest.clone(), transport.clone());
    let (stop, task) = spawn_supervisor(client, fast_policy(3));

    let first = next_peer(&mut peers).await?;
    first.deliver(ready_frame(1)).await;
    first.deliver(GatewayMessage::reconnect()).await;

    // A fresh connection with a fresh identify
    let _second = next_peer(&mut peers).await?;
    assert_eq!(transport.connects(), 2);
    assert_eq!(rest.user_calls(), 2);

    stop.send(()).map_err(|_| anyhow!("supervisor already stopped"))?;
    let reason = task.await??;
    assert_eq!(reason, CloseReason::Shutdown);
    Ok(())
}

#[tokio::test]
async fn test_unauthorized_stops_supervision() -> Result<()> {
    let rest = Arc::new(MockRest::unauthorized());
    let (transport, _peers) = MemoryTransport::new();
    let client = GatewayClient::new(test_options(), rest, transport.clone());
    let (_stop, task) = spawn_supervisor(client, fast_policy(3));

    let err = task.await?.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
    assert_eq!(transport.connects(), 0);
    Ok(())
}

#[tokio::test]
async fn test_gives_up_after_max_retries() -> Result<()> {
    let transport = MemoryTransport::refusing();
    let client = GatewayClient::new(test_options(), Arc::new(MockRest::ok()), transport.clone());
    let (_stop, task) = spawn_supervisor(client, fast_policy(2));

    let err = task.await?.unwrap_err();
    match err {
        AppError::RestartsExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(last.contains("connection refused"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.connects(), 3);
    Ok(())
}

#[tokio::test]
async fn test_authentication_close_is_final() -> Result<()> {
    let (transport, mut peers) = MemoryTransport::new();
    let client = GatewayClient::new(test_options(), Arc::new(MockRest::ok()), transport.clone());
    let (_stop, task) = spawn_supervisor(client, fast_policy(3));

    let peer = next_peer(&mut peers).await?;
    peer.events
        .send(TransportEvent::Closed {
            code: Some(4004),
            reason: "Authentication failed".to_string(),
        })
        .await?;

    let reason = task.await??;
    assert!(matches!(reason, CloseReason::Remote { code: Some(4004), .. }));
    assert_eq!(transport.connects(), 1);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_closes_live_connection() -> Result<()> {
    let (transport, mut peers) = MemoryTransport::new();
    let client = GatewayClient::new(test_options(), Arc::new(MockRest::ok()), transport.clone());
    let (stop, task) = spawn_supervisor(client, fast_policy(3));

    let mut peer = next_peer(&mut peers).await?;
    stop.send(()).map_err(|_| anyhow!("supervisor already stopped"))?;

    let reason = task.await??;
    assert_eq!(reason, CloseReason::Shutdown);
    // Only the close frame follows identify
    assert!(peer.next_frame().await.is_none());
    Ok(())
}
