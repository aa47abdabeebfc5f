//! Chat Platform Gateway Module
//!
//! Narrow interfaces the verification core uses to reach the chat platform:
//! - `MuteGateway`: mute, unmute and remove members
//! - `NotificationSink`: templated group notices
//!
//! `OneBotGateway` is the production adapter; `MockGateway` backs the tests.

pub mod mock;
pub mod onebot;
pub mod traits;

pub use mock::MockGateway;
pub use onebot::OneBotGateway;
pub use traits::{
    GatewayError, GatewayResult, GroupId, MemberId, MuteGateway, NotificationSink,
};
