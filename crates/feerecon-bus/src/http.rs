//! No CloudEvents precedent exists anywhere in this workspace's reference
//! pack; the envelope shape (specversion/type/source/id/time/data) is
//! synthesized directly from the CloudEvents spec rather than copied from
//! a sibling crate. The HTTP transport itself follows the same
//! `reqwest`-with-bearer-header shape as the CFS facade.

use async_trait::async_trait;
use std::time::Duration;

use feerecon_core::ports::{BusEvent, EventBus};
use feerecon_core::ReconcileError;

#[derive(Debug, Clone)]
pub struct HttpEventBusConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

pub struct HttpEventBus {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEventBus {
    pub fn new(config: HttpEventBusConfig) -> Result<Self, ReconcileError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReconcileError::Bus(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EventBus for HttpEventBus {
    async fn publish(&self, topic: &str, event: BusEvent) -> Result<(), ReconcileError> {
        let url = format!("{}/{}", self.base_url, topic.trim_start_matches('/'));
        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/cloudevents+json")
            .json(&event)
            .send()
            .await
            .map_err(|e| ReconcileError::Bus(format!("publish to {topic}: {e}")))?;

        if !resp.status().is_success() {
            return Err(ReconcileError::Bus(format!(
                "publish to {topic} returned HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
