//! OneBot v11 HTTP gateway
//!
//! Talks to a OneBot-compatible HTTP API (`set_group_ban`, `set_group_kick`,
//! `send_group_msg`). Mentions are rendered as `[CQ:at,qq=<id>]` segments.

use super::traits::*;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request timeout for a single API call.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Gateway backed by a OneBot v11 HTTP endpoint
#[derive(Debug, Clone)]
pub struct OneBotGateway {
    api_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

/// Standard OneBot response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    retcode: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    wording: Option<String>,
}

#[derive(Debug, Serialize)]
struct SetGroupBan {
    group_id: u64,
    user_id: u64,
    duration: u64,
}

#[derive(Debug, Serialize)]
struct SetGroupKick {
    group_id: u64,
    user_id: u64,
    reject_add_request: bool,
}

#[derive(Debug, Serialize)]
struct SendGroupMsg {
    group_id: u64,
    message: String,
}

impl OneBotGateway {
    /// Create a gateway for the API rooted at `api_url`
    pub fn new(api_url: impl Into<String>, access_token: Option<String>) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            access_token,
            client,
        })
    }

    async fn call<B: Serialize + Sync>(&self, action: &str, body: &B) -> GatewayResult<()> {
        let url = format!("{}/{}", self.api_url, action);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(format!("{}: {}", action, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Rejected(format!(
                "{} returned HTTP {}",
                action, status
            )));
        }

        let envelope: ApiResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Network(format!("{}: invalid response: {}", action, e)))?;

        check_envelope(action, envelope)
    }
}

fn check_envelope(action: &str, envelope: ApiResponse) -> GatewayResult<()> {
    if envelope.retcode == 0 || envelope.status == "async" {
        return Ok(());
    }

    let message = envelope
        .wording
        .or(envelope.message)
        .unwrap_or_else(|| format!("{} failed with status '{}'", action, envelope.status));
    Err(GatewayError::Api {
        retcode: envelope.retcode,
        message,
    })
}

/// Render an optional mention followed by the message text.
pub fn render_message(mention: Option<MemberId>, text: &str) -> String {
    match mention {
        Some(member) => format!("[CQ:at,qq={}]{}", member, text),
        None => text.to_string(),
    }
}

/// Mute length in whole seconds, rounded up.
///
/// Zero lifts a mute, so only an explicit zero duration may map to it.
pub fn mute_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

#[async_trait]
impl MuteGateway for OneBotGateway {
    async fn mute(
        &self,
        group: GroupId,
        member: MemberId,
        duration: Duration,
    ) -> GatewayResult<()> {
        self.call(
            "set_group_ban",
            &SetGroupBan {
                group_id: group.0,
                user_id: member.0,
                duration: mute_seconds(duration),
            },
        )
        .await
    }

    async fn remove_member(&self, group: GroupId, member: MemberId) -> GatewayResult<()> {
        self.call(
            "set_group_kick",
            &SetGroupKick {
                group_id: group.0,
                user_id: member.0,
                reject_add_request: false,
            },
        )
        .await
    }
}

#[async_trait]
impl NotificationSink for OneBotGateway {
    async fn send(
        &self,
        group: GroupId,
        mention: Option<MemberId>,
        text: &str,
    ) -> GatewayResult<()> {
        self.call(
            "send_group_msg",
            &SendGroupMsg {
                group_id: group.0,
                message: render_message(mention, text),
            },
        )
        .await
    }
}
