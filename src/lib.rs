//! Quarantine - new-member verification bot for OneBot group chats
//!
//! New members are muted on join until they confirm they have read the
//! group rules through a self-unlock link. Operators can mute and unmute by
//! hand, and remove members who never unlocked after a grace period.
//!
//! Layout:
//! - `store`: verification records keyed by (member, group)
//! - `gateway`: platform actions (mute, kick, notices) and the OneBot client
//! - `gatekeeper`: admission, overrides, self-unlock and cleanup sweeps
//! - `bot`: event loop and `/verify` command handling
//! - `server`: HTTP unlock endpoint and OneBot event webhook
//! - `config`: TOML configuration

pub mod bot;
pub mod config;
pub mod gatekeeper;
pub mod gateway;
pub mod server;
pub mod store;
