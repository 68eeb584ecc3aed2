//! Gateway connection scenarios
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chorus_common::AppError;
use chorus_core::{Guild, Snowflake};
use chorus_gateway::{
    ClientError, CloseReason, ConnectionState, EventContext, EventHandler, GatewayClient,
    GatewayEventType, GatewayMessage, GatewayOptions, HandlerResult, OpCode, Outbound, StateKey,
    StatePatch, StatusUpdate, TransportEvent, VoiceStateOptions,
};
use integration_tests::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn test_unauthorized_credential_is_fatal_and_never_connects() {
    let rest = Arc::new(MockRest::unauthorized());
    let (transport, _peers) = MemoryTransport::new();
    let client = GatewayClient::new(test_options(), rest.clone(), transport.clone());

    let err = client.start().await.unwrap_err();

    assert!(matches!(err, AppError::Unauthorized));
    assert!(err.is_fatal());
    assert_eq!(transport.connects(), 0);
    assert_eq!(rest.gateway_calls(), 0);
}

#[tokio::test]
async fn test_missing_credential_is_fatal() {
    let rest = Arc::new(MockRest::ok());
    let (transport, _peers) = MemoryTransport::new();
    let client = GatewayClient::new(GatewayOptions::new("  "), rest.clone(), transport.clone());

    let err = client.start().await.unwrap_err();

    assert!(matches!(err, AppError::MissingCredential));
    assert_eq!(rest.user_calls(), 0);
    assert_eq!(transport.connects(), 0);
}

#[tokio::test]
async fn test_connects_to_versioned_gateway_url() -> Result<()> {
    let gw = TestGateway::start().await?;

    assert_eq!(
        gw.transport.urls(),
        vec!["wss://gateway.test/?v=6&encoding=json".to_string()]
    );
    assert_eq!(gw.rest.user_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_identify_is_first_frame() -> Result<()> {
    let mut gw = TestGateway::start().await?;

    let identify = gw.recv().await?;
    assert_eq!(identify.op, OpCode::Identify);

    let d = identify.d.unwrap_or(Value::Null);
    assert_eq!(d["token"], TEST_TOKEN);
    assert_eq!(d["compress"], false);
    assert_eq!(d["large_threshold"], 250);
    assert!(d["properties"]["$os"].is_string());

    assert_eq!(gw.state(StateKey::State).await?, json!("awaiting_hello"));
    Ok(())
}

// ============================================================================
// Heartbeat
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_heartbeat_ack_prevents_stale_then_missing_ack_closes_once() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.recv_op(OpCode::Identify).await?;

    let start = Instant::now();
    gw.send(GatewayMessage::hello(500)).await?;

    // Armed at 500ms
    let beat = gw.recv().await?;
    assert_eq!(beat.op, OpCode::Heartbeat);
    assert_eq!(start.elapsed(), Duration::from_millis(500));

    // Acked, so the check at 1000ms beats again instead of closing
    gw.send(GatewayMessage::heartbeat_ack()).await?;
    let beat = gw.recv().await?;
    assert_eq!(beat.op, OpCode::Heartbeat);
    assert_eq!(start.elapsed(), Duration::from_millis(1000));

    // No ack this time
    let close = gw.recv_outbound().await?;
    assert_eq!(
        close,
        Outbound::Close {
            code: 4000,
            reason: "heartbeat stale".to_string()
        }
    );
    assert_eq!(start.elapsed(), Duration::from_millis(1500));

    // Exactly one close, then the transport is released
    assert!(gw.peer.sent.recv().await.is_none());

    let exit = gw.running.wait().await?;
    assert_eq!(exit.reason, CloseReason::HeartbeatStale);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_carries_last_sequence() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.recv_op(OpCode::Identify).await?;

    gw.send(GatewayMessage::hello(1000)).await?;
    gw.send(ready_frame(1)).await?;
    gw.send(GatewayMessage::dispatch("TYPING_START", 7, json!({})))
        .await?;

    let beat = gw.recv_op(OpCode::Heartbeat).await?;
    assert_eq!(beat.d, Some(json!(7)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_server_heartbeat_request_beats_immediately() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.recv_op(OpCode::Identify).await?;
    gw.send(GatewayMessage::hello(45_000)).await?;

    let start = Instant::now();
    gw.send(GatewayMessage::heartbeat(None)).await?;

    let beat = gw.recv().await?;
    assert_eq!(beat.op, OpCode::Heartbeat);
    assert!(start.elapsed() < Duration::from_secs(1));
    Ok(())
}

// ============================================================================
// Sequence tracking and routing
// ============================================================================

#[tokio::test]
async fn test_sequence_equals_last_dispatch() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.ready().await?;

    let sequences = [2u64, 3, 5, 8, 13, 21, 34];
    for s in sequences {
        gw.send(GatewayMessage::dispatch("MESSAGE_CREATE", s, json!({"id": s.to_string()})))
            .await?;
    }

    assert_eq!(gw.state(StateKey::Sequence).await?, json!(34));

    // The handler never sees a tracker older than the frame it handles
    for event in gw.handler.wait_for(sequences.len()).await? {
        assert!(event.tracker_sequence >= event.frame_sequence);
    }
    Ok(())
}

#[tokio::test]
async fn test_ready_is_internal_guild_create_reaches_handler() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.ready().await?;
    gw.send(guild_create_frame(2, GUILD_ID)).await?;
    gw.send(GatewayMessage::dispatch("WEBHOOKS_UPDATE", 3, json!({})))
        .await?;

    assert_eq!(gw.state(StateKey::SessionId).await?, json!("session-1"));
    assert_eq!(gw.state(StateKey::State).await?, json!("steady_state"));
    assert_eq!(gw.running.state(), ConnectionState::SteadyState);
    assert_eq!(gw.handler.names(2).await?, vec!["guild_create", "webhooks_update"]);

    let guilds: Vec<Guild> = serde_json::from_value(gw.state(StateKey::Guilds).await?)?;
    assert_eq!(guilds.len(), 1);
    assert_eq!(guilds[0].id, Snowflake::new(GUILD_ID));
    assert_eq!(guilds[0].channels.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_voice_state_replacement_is_idempotent_per_user() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.ready().await?;
    gw.send(guild_create_frame(2, GUILD_ID)).await?;
    gw.send(guild_create_frame(3, 1)).await?;

    gw.send(voice_state_frame(4, 10, Some(VOICE_CHANNEL_ID), "a"))
        .await?;
    gw.send(voice_state_frame(5, 10, Some(VOICE_CHANNEL_ID), "a"))
        .await?;
    gw.send(voice_state_frame(6, 11, Some(VOICE_CHANNEL_ID), "b"))
        .await?;
    gw.send(voice_state_frame(7, 10, None, "a")).await?;
    gw.send(GatewayMessage::dispatch("WEBHOOKS_UPDATE", 8, json!({})))
        .await?;

    let guilds: Vec<Guild> = serde_json::from_value(gw.state(StateKey::Guilds).await?)?;
    let guild = guilds
        .iter()
        .find(|g| g.id == Snowflake::new(GUILD_ID))
        .unwrap();

    assert_eq!(guild.voice_states.len(), 2);
    let user_10 = guild.voice_state(Snowflake::new(10)).unwrap();
    assert_eq!(user_10.channel_id, None);
    // Replaced entries move to the end
    assert_eq!(guild.voice_states[1].user_id, Snowflake::new(10));

    let other = guilds.iter().find(|g| g.id == Snowflake::new(1)).unwrap();
    assert!(other.voice_states.is_empty());

    // VOICE_STATE_UPDATE stays internal; handler order is frame order
    assert_eq!(
        gw.handler.names(3).await?,
        vec!["guild_create", "guild_create", "webhooks_update"]
    );
    Ok(())
}

#[tokio::test]
async fn test_invalid_frames_are_dropped() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.ready().await?;

    gw.send(GatewayMessage {
        op: OpCode::Hello,
        d: None,
        s: Some(99),
        t: Some("READY".to_string()),
    })
    .await?;

    assert_eq!(gw.state(StateKey::Sequence).await?, json!(1));
    assert_eq!(gw.running.state(), ConnectionState::SteadyState);
    Ok(())
}

// ============================================================================
// Handlers calling back into the connection
// ============================================================================

/// Moves the bot out of voice on every message, waiting for the ack
struct LeaveVoiceOnMessage {
    acks: mpsc::UnboundedSender<Result<(), ClientError>>,
}

#[async_trait]
impl EventHandler for LeaveVoiceOnMessage {
    async fn handle_event(
        &self,
        event: &GatewayEventType,
        _frame: &GatewayMessage,
        ctx: &EventContext,
    ) -> HandlerResult<()> {
        if *event != GatewayEventType::MessageCreate {
            return Ok(());
        }
        let result = ctx
            .handle()
            .voice_state_update(
                Snowflake::new(GUILD_ID),
                None,
                ctx.user_id(),
                VoiceStateOptions::default(),
            )
            .await;
        let _ = self.acks.send(result);
        Ok(())
    }
}

#[tokio::test]
async fn test_handler_using_handle_keeps_connection_responsive() -> Result<()> {
    let (transport, mut peers) = MemoryTransport::new();
    let (acks_tx, mut acks) = mpsc::unbounded_channel();
    let client = GatewayClient::new(test_options(), Arc::new(MockRest::ok()), transport)
        .with_handler(Arc::new(LeaveVoiceOnMessage { acks: acks_tx }));
    let running = client.start().await?;
    let mut peer = peers.recv().await.ok_or_else(|| anyhow!("not connected"))?;

    assert_eq!(peer.next_frame().await.map(|f| f.op), Some(OpCode::Identify));
    peer.deliver(ready_frame(1)).await;
    peer.deliver(GatewayMessage::dispatch("MESSAGE_CREATE", 2, json!({"id": "5"})))
        .await;

    // The mailbox keeps draining while the handler waits on it
    let sequence = timeout(Duration::from_secs(3), running.handle().get_state(StateKey::Sequence))
        .await??;
    assert_eq!(sequence, json!(2));

    let ack = timeout(Duration::from_secs(3), acks.recv()).await?;
    assert_eq!(ack, Some(Ok(())));
    let frame = peer.next_frame().await.ok_or_else(|| anyhow!("no voice state frame"))?;
    assert_eq!(frame.op, OpCode::VoiceStateUpdate);
    assert_eq!(frame.d.unwrap_or(Value::Null)["channel_id"], Value::Null);

    // Still closes normally
    running.shutdown().await?;
    assert_eq!(running.wait().await?.reason, CloseReason::Shutdown);
    Ok(())
}

// ============================================================================
// Control messages
// ============================================================================

#[tokio::test]
async fn test_status_update_sends_nulls() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.ready().await?;

    gw.handle().status_update(StatusUpdate::default()).await?;
    let frame = gw.recv().await?;
    assert_eq!(frame.op, OpCode::StatusUpdate);
    assert_eq!(frame.d, Some(json!({"idle_since": null, "game": null})));

    gw.handle()
        .status_update(StatusUpdate::idle_now().with_game("chess"))
        .await?;
    let d = gw.recv().await?.d.unwrap_or(Value::Null);
    assert!(d["idle_since"].is_i64());
    assert_eq!(d["game"]["name"], "chess");
    Ok(())
}

#[tokio::test]
async fn test_voice_state_update_is_acknowledged_locally() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.ready().await?;

    gw.handle()
        .voice_state_update(
            Snowflake::new(GUILD_ID),
            None,
            Snowflake::new(BOT_ID),
            VoiceStateOptions::default(),
        )
        .await?;

    let frame = gw.recv().await?;
    assert_eq!(frame.op, OpCode::VoiceStateUpdate);
    assert_eq!(
        frame.d,
        Some(json!({
            "guild_id": GUILD_ID.to_string(),
            "channel_id": null,
            "self_mute": false,
            "self_deaf": true
        }))
    );
    Ok(())
}

#[tokio::test]
async fn test_request_guild_members_frame() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.ready().await?;

    gw.handle()
        .request_guild_members(Snowflake::new(GUILD_ID), "", 0)
        .await?;

    let frame = gw.recv().await?;
    assert_eq!(frame.op, OpCode::RequestGuildMembers);
    assert_eq!(frame.d.unwrap_or(Value::Null)["limit"], 0);
    Ok(())
}

#[tokio::test]
async fn test_update_and_clear_state() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.ready().await?;

    gw.handle()
        .update_state(StatePatch::default().endpoint("voice.test").voice_token("tok"))
        .await?;
    assert_eq!(gw.state(StateKey::Endpoint).await?, json!("voice.test"));

    gw.handle()
        .clear_state([StateKey::Endpoint, StateKey::SessionId])
        .await?;
    assert_eq!(gw.state(StateKey::Endpoint).await?, Value::Null);
    assert_eq!(gw.state(StateKey::SessionId).await?, Value::Null);
    assert_eq!(gw.state(StateKey::VoiceToken).await?, json!("tok"));
    assert_eq!(gw.state(StateKey::UserId).await?, json!(BOT_ID.to_string()));
    Ok(())
}

// ============================================================================
// Closing
// ============================================================================

#[tokio::test]
async fn test_server_reconnect_closes_for_supervision() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.ready().await?;

    gw.send(GatewayMessage::reconnect()).await?;

    assert_eq!(
        gw.recv_outbound().await?,
        Outbound::Close {
            code: 4000,
            reason: "server requested reconnect".to_string()
        }
    );
    let exit = gw.running.wait().await?;
    assert_eq!(exit.reason, CloseReason::Reconnect);
    assert!(exit.reached_ready);
    assert!(exit.reason.should_restart());
    Ok(())
}

#[tokio::test]
async fn test_invalid_session_closes() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.recv_op(OpCode::Identify).await?;

    gw.send(GatewayMessage::invalid_session(false)).await?;

    let exit = gw.running.wait().await?;
    assert_eq!(exit.reason, CloseReason::InvalidSession);
    assert!(!exit.reached_ready);
    Ok(())
}

#[tokio::test]
async fn test_remote_close_propagates_reason() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.recv_op(OpCode::Identify).await?;

    gw.peer
        .events
        .send(TransportEvent::Closed {
            code: Some(4004),
            reason: "Authentication failed".to_string(),
        })
        .await?;

    let exit = gw.running.wait().await?;
    assert_eq!(
        exit.reason,
        CloseReason::Remote {
            code: Some(4004),
            reason: "Authentication failed".to_string()
        }
    );
    assert!(!exit.reason.should_restart());
    Ok(())
}

#[tokio::test]
async fn test_shutdown_tears_down_once() -> Result<()> {
    let mut gw = TestGateway::start().await?;
    gw.ready().await?;
    let handle = gw.handle().clone();
    let mut states = gw.running.subscribe();

    handle.shutdown().await?;

    assert_eq!(
        gw.recv_outbound().await?,
        Outbound::Close {
            code: 1000,
            reason: "shutdown".to_string()
        }
    );
    let exit = gw.running.wait().await?;
    assert_eq!(exit.reason, CloseReason::Shutdown);

    states.wait_for(|s| *s == ConnectionState::Terminated).await?;
    assert!(handle.is_closed());
    assert!(handle.get_state(StateKey::State).await.is_err());
    assert!(handle.shutdown().await.is_err());
    Ok(())
}
