use crate::config::WorkerPoolConfig;
use common::{Channel, ChannelEnvelope, ChannelSendResult};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, warn};

struct Job {
    envelope: ChannelEnvelope,
    reply: oneshot::Sender<ChannelSendResult>,
}

/// Bounded worker pool fronting a single [`Channel`]. Backpressure comes
/// from the bounded `mpsc` queue: once it's full, `dispatch` returns a
/// retryable failure instead of growing memory unboundedly under load.
pub struct ChannelWorkerPool {
    tx: mpsc::Sender<Job>,
}

impl ChannelWorkerPool {
    pub fn spawn(channel: Arc<dyn Channel>, config: WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        for worker_id in 0..config.workers {
            let channel = channel.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(Job { envelope, reply }) = job else {
                        break;
                    };
                    let result = channel.send(&envelope).await;
                    if reply.send(result).is_err() {
                        warn!("worker {} could not deliver result: receiver dropped", worker_id);
                    }
                }
            });
        }

        Self { tx }
    }

    pub async fn dispatch(&self, envelope: ChannelEnvelope) -> ChannelSendResult {
        let (reply_tx, reply_rx) = oneshot::channel();
        match self.tx.try_send(Job { envelope, reply: reply_tx }) {
            Ok(()) => reply_rx.await.unwrap_or_else(|_| ChannelSendResult::RetryableFailure("worker dropped before replying".to_string())),
            Err(mpsc::error::TrySendError::Full(_)) => {
                error!("channel worker pool queue full, rejecting send");
                ChannelSendResult::RetryableFailure("worker pool queue full".to_string())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => ChannelSendResult::PermanentFailure("worker pool closed".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ChannelKind;

    struct AlwaysDelivers;

    #[async_trait::async_trait]
    impl Channel for AlwaysDelivers {
        fn kind(&self) -> ChannelKind {
            ChannelKind::Push
        }
        async fn send(&self, _envelope: &ChannelEnvelope) -> ChannelSendResult {
            ChannelSendResult::Delivered
        }
    }

    fn sample_envelope() -> ChannelEnvelope {
        ChannelEnvelope {
            notification_id: uuid::Uuid::new_v4(),
            user_id: "user-1".to_string(),
            title: "Title".to_string(),
            message: "Message".to_string(),
            recipient_address: "device-token".to_string(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn dispatch_round_trips_through_pool() {
        let pool = ChannelWorkerPool::spawn(Arc::new(AlwaysDelivers), WorkerPoolConfig { workers: 2, queue_capacity: 8 });
        let result = pool.dispatch(sample_envelope()).await;
        assert!(matches!(result, ChannelSendResult::Delivered));
    }

    #[tokio::test]
    async fn full_queue_rejects_instead_of_blocking() {
        let pool = ChannelWorkerPool::spawn(Arc::new(AlwaysDelivers), WorkerPoolConfig { workers: 0, queue_capacity: 1 });
        let _first = pool.tx.try_send(Job { envelope: sample_envelope(), reply: oneshot::channel().0 });
        let result = pool.dispatch(sample_envelope()).await;
        assert!(matches!(result, ChannelSendResult::RetryableFailure(_)));
    }
}
