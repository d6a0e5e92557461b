use crate::provider::HttpChannelProvider;
use common::{Channel, ChannelEnvelope, ChannelKind, ChannelSendResult};
use serde::Serialize;

#[derive(Serialize)]
struct SmsPayload<'a> {
    to: &'a str,
    body: &'a str,
}

pub struct SmsChannel {
    provider: HttpChannelProvider,
}

impl SmsChannel {
    pub fn new(provider: HttpChannelProvider) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl Channel for SmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(&self, envelope: &ChannelEnvelope) -> ChannelSendResult {
        let payload = SmsPayload {
            to: &envelope.recipient_address,
            body: &format!("{}: {}", envelope.title, envelope.message),
        };

        match self.provider.send_with_retry(&payload).await {
            Ok(()) => ChannelSendResult::Delivered,
            Err(e) if e.is_retryable() => ChannelSendResult::RetryableFailure(e.to_string()),
            Err(e) => ChannelSendResult::PermanentFailure(e.to_string()),
        }
    }
}
