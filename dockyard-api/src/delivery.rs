use async_trait::async_trait;
use dockyard_store::Webhook;
use serde::Serialize;

/// Result of a single webhook delivery attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub status: String,
    pub status_code: u16,
    pub duration_ms: u64,
}

#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send_test(&self, webhook: &Webhook) -> anyhow::Result<DeliveryOutcome>;
}

/// Reports a successful delivery without any network I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSender;

#[async_trait]
impl WebhookSender for NoopSender {
    async fn send_test(&self, webhook: &Webhook) -> anyhow::Result<DeliveryOutcome> {
        tracing::debug!(webhook_id = %webhook.id, url = %webhook.url, "Simulated test delivery");
        Ok(DeliveryOutcome {
            status: "success".to_string(),
            status_code: 200,
            duration_ms: 0,
        })
    }
}
