use crate::provider::HttpChannelProvider;
use common::{Channel, ChannelEnvelope, ChannelKind, ChannelSendResult};
use serde::Serialize;

#[derive(Serialize)]
struct PushPayload<'a> {
    device_token: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a serde_json::Value,
}

pub struct PushChannel {
    provider: HttpChannelProvider,
}

impl PushChannel {
    pub fn new(provider: HttpChannelProvider) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl Channel for PushChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    async fn send(&self, envelope: &ChannelEnvelope) -> ChannelSendResult {
        let payload = PushPayload {
            device_token: &envelope.recipient_address,
            title: &envelope.title,
            body: &envelope.message,
            data: &envelope.metadata,
        };

        match self.provider.send_with_retry(&payload).await {
            Ok(()) => ChannelSendResult::Delivered,
            Err(e) if e.is_retryable() => ChannelSendResult::RetryableFailure(e.to_string()),
            Err(e) => ChannelSendResult::PermanentFailure(e.to_string()),
        }
    }
}
