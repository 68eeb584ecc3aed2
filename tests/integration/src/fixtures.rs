//! Test fixtures
//!
//! Server frames and options shared by the scenario tests.

use chorus_core::{Snowflake, User};
use chorus_gateway::{GatewayMessage, GatewayOptions};
use serde_json::json;
use std::time::Duration;

/// Id of the bot account the mock REST client reports
pub const BOT_ID: u64 = 80_351_110_224_678_912;

/// Guild used by the voice scenarios
pub const GUILD_ID: u64 = 41_771_983_423_143_937;

/// Voice channel used by the voice scenarios
pub const VOICE_CHANNEL_ID: u64 = 155_101_607_195_836_416;

pub const TEST_TOKEN: &str = "test-token";

pub fn bot_user() -> User {
    let mut user = User::new(Snowflake::new(BOT_ID), "chorus");
    user.bot = true;
    user
}

/// Options with short timers for tests
pub fn test_options() -> GatewayOptions {
    GatewayOptions::new(TEST_TOKEN)
        .with_settle_delay(Duration::from_millis(50))
        .with_voice_timeout(Duration::from_secs(1))
}

pub fn ready_frame(sequence: u64) -> GatewayMessage {
    GatewayMessage::dispatch(
        "READY",
        sequence,
        json!({
            "v": 6,
            "user": {"id": BOT_ID.to_string(), "username": "chorus", "bot": true},
            "guilds": [{"id": GUILD_ID.to_string(), "unavailable": true}],
            "session_id": "session-1"
        }),
    )
}

pub fn guild_create_frame(sequence: u64, guild_id: u64) -> GatewayMessage {
    GatewayMessage::dispatch(
        "GUILD_CREATE",
        sequence,
        json!({
            "id": guild_id.to_string(),
            "name": "Test Guild",
            "members": [{"user": {"id": BOT_ID.to_string(), "username": "chorus"}, "roles": []}],
            "channels": [{"id": VOICE_CHANNEL_ID.to_string(), "name": "General", "type": 2}],
            "voice_states": []
        }),
    )
}

pub fn voice_state_frame(
    sequence: u64,
    user_id: u64,
    channel_id: Option<u64>,
    session_id: &str,
) -> GatewayMessage {
    GatewayMessage::dispatch(
        "VOICE_STATE_UPDATE",
        sequence,
        json!({
            "guild_id": GUILD_ID.to_string(),
            "channel_id": channel_id.map(|c| c.to_string()),
            "user_id": user_id.to_string(),
            "session_id": session_id,
            "deaf": false,
            "mute": false,
            "self_deaf": true,
            "self_mute": false,
            "suppress": false
        }),
    )
}

pub fn voice_server_frame(sequence: u64, token: &str, endpoint: Option<&str>) -> GatewayMessage {
    GatewayMessage::dispatch(
        "VOICE_SERVER_UPDATE",
        sequence,
        json!({
            "token": token,
            "guild_id": GUILD_ID.to_string(),
            "endpoint": endpoint
        }),
    )
}
