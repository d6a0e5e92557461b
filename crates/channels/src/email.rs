use crate::provider::HttpChannelProvider;
use common::{Channel, ChannelEnvelope, ChannelKind, ChannelSendResult};
use serde::Serialize;

#[derive(Serialize)]
struct EmailPayload<'a> {
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
}

pub struct EmailChannel {
    provider: HttpChannelProvider,
}

impl EmailChannel {
    pub fn new(provider: HttpChannelProvider) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl Channel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, envelope: &ChannelEnvelope) -> ChannelSendResult {
        let payload = EmailPayload {
            to: &envelope.recipient_address,
            subject: &envelope.title,
            html_body: &envelope.message,
        };

        match self.provider.send_with_retry(&payload).await {
            Ok(()) => ChannelSendResult::Delivered,
            Err(e) if e.is_retryable() => ChannelSendResult::RetryableFailure(e.to_string()),
            Err(e) => ChannelSendResult::PermanentFailure(e.to_string()),
        }
    }
}
