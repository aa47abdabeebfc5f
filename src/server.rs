//! HTTP surface
//!
//! - `GET /unban?qq=<id>`: self-unlock link (only when HTTP unlock is enabled)
//! - `POST /onebot`: OneBot v11 event webhook (joins and group messages)
//! - `GET /healthz`: liveness
//!
//! Handlers only translate requests into `BotEvent`s; all verification work
//! happens on the bot's event loop.
//!
//! Webhook posts must carry OneBot's `X-Signature: sha1=<hex>` HMAC of the
//! raw body under the shared secret. Without a configured secret the webhook
//! is not served at all, since its `user_id` decides operator authority.

use crate::bot::{BotEvent, BotHandle, COMMAND_PREFIX};
use crate::gatekeeper::unlock::parse_claimed_id;
use crate::gatekeeper::UnlockSource;
use crate::gateway::{GroupId, MemberId};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use ring::hmac;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Header OneBot implementations put the body signature in
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Clone)]
struct AppState {
    bot: BotHandle,
    webhook_key: Option<Arc<hmac::Key>>,
}

#[derive(Debug, Deserialize)]
struct UnlockQuery {
    qq: Option<String>,
}

/// Subset of OneBot v11 event posts the bot reacts to.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "post_type", rename_all = "snake_case")]
pub enum OneBotEvent {
    Notice {
        notice_type: String,
        #[serde(default)]
        group_id: Option<u64>,
        #[serde(default)]
        user_id: Option<u64>,
        #[serde(default)]
        self_id: Option<u64>,
    },
    Message {
        message_type: String,
        #[serde(default)]
        group_id: Option<u64>,
        user_id: u64,
        #[serde(default)]
        raw_message: String,
    },
    #[serde(other)]
    Other,
}

impl OneBotEvent {
    /// Translate into a bot event, if the bot cares about it.
    pub fn into_bot_event(self) -> Option<BotEvent> {
        match self {
            OneBotEvent::Notice {
                notice_type,
                group_id: Some(group),
                user_id: Some(member),
                self_id,
            } if notice_type == "group_increase" && self_id != Some(member) => {
                Some(BotEvent::MemberJoined {
                    member: MemberId(member),
                    group: GroupId(group),
                })
            }
            OneBotEvent::Message {
                message_type,
                group_id: Some(group),
                user_id,
                raw_message,
            } if message_type == "group" && raw_message.trim_start().starts_with(COMMAND_PREFIX) => {
                Some(BotEvent::Command {
                    sender: MemberId(user_id),
                    group: GroupId(group),
                    text: raw_message,
                })
            }
            _ => None,
        }
    }
}

/// HMAC key for webhook signatures.
pub fn webhook_key(secret: &str) -> hmac::Key {
    hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret.as_bytes())
}

/// Check an `X-Signature` value (`sha1=<hex>`) against `body`.
pub fn verify_signature(key: &hmac::Key, header: Option<&str>, body: &[u8]) -> bool {
    let Some(signature) = header.and_then(|h| h.trim().strip_prefix("sha1=")) else {
        return false;
    };
    let Ok(tag) = hex::decode(signature) else {
        return false;
    };
    hmac::verify(key, body, &tag).is_ok()
}

/// Build the router.
///
/// `/unban` exists only when `allow_http` is set, `/onebot` only when a
/// webhook secret is configured.
pub fn router(bot: BotHandle, allow_http: bool, webhook_secret: Option<&str>) -> Router {
    let webhook_key = webhook_secret.map(|secret| Arc::new(webhook_key(secret)));

    let mut app = Router::new().route("/healthz", get(healthz));

    if allow_http {
        app = app.route("/unban", get(self_unlock));
    }
    if webhook_key.is_some() {
        app = app.route("/onebot", post(onebot_event));
    }

    app.with_state(AppState { bot, webhook_key })
}

/// Bind `addr` and serve until the listener fails.
pub async fn serve(addr: SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);
    axum::serve(listener, app).await
}

async fn healthz() -> &'static str {
    "ok"
}

/// Always answers 200 with an empty body, whatever the id.
async fn self_unlock(State(state): State<AppState>, Query(query): Query<UnlockQuery>) -> StatusCode {
    let raw = query.qq.unwrap_or_default();
    info!(qq = %raw, "self-unlock link opened");

    match parse_claimed_id(&raw) {
        Ok(claimed) => {
            if let Err(e) = state.bot.self_unlock(UnlockSource::Http, claimed).await {
                warn!("self-unlock not queued: {}", e);
            }
        }
        Err(e) => info!("self-unlock rejected: {}", e),
    }

    StatusCode::OK
}

async fn onebot_event(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let Some(key) = &state.webhook_key else {
        return StatusCode::NOT_FOUND;
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if !verify_signature(key, signature, &body) {
        warn!("rejected OneBot post with missing or bad signature");
        return StatusCode::UNAUTHORIZED;
    }

    let event: OneBotEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            debug!("unreadable OneBot post: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    match event.into_bot_event() {
        Some(bot_event) => {
            if let Err(e) = state.bot.send(bot_event).await {
                warn!("event dropped: {}", e);
                return StatusCode::SERVICE_UNAVAILABLE;
            }
        }
        None => debug!("ignored OneBot event"),
    }

    StatusCode::NO_CONTENT
}
