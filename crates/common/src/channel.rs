use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Push,
    Email,
    Sms,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Push => "push",
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
        }
    }
}

/// What a channel worker sends: the rendered notification plus enough of
/// the recipient's contact info for the provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEnvelope {
    pub notification_id: uuid::Uuid,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub recipient_address: String,
    pub metadata: serde_json::Value,
}

/// The uniform contract every provider-specific `Channel` impl reports
/// back: delivered, or failed in a way that is or isn't worth retrying.
#[derive(Debug, Clone)]
pub enum ChannelSendResult {
    Delivered,
    RetryableFailure(String),
    PermanentFailure(String),
}

#[async_trait]
pub trait Channel: Send + Sync {
    fn kind(&self) -> ChannelKind;
    async fn send(&self, envelope: &ChannelEnvelope) -> ChannelSendResult;
}
