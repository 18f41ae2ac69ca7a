use async_trait::async_trait;
use parking_lot::Mutex;

use feerecon_core::ports::{BusEvent, EventBus};
use feerecon_core::ReconcileError;

#[derive(Default)]
pub struct MockEventBus {
    published: Mutex<Vec<(String, BusEvent)>>,
}

impl MockEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, BusEvent)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl EventBus for MockEventBus {
    async fn publish(&self, topic: &str, event: BusEvent) -> Result<(), ReconcileError> {
        self.published.lock().push((topic.to_string(), event));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn publish_records_topic_and_event() {
        let bus = MockEventBus::new();
        let event = BusEvent::new("account.locked", "feerecon", "evt-1", Utc::now(), serde_json::json!({}));
        bus.publish("account-mailer", event).await.unwrap();
        assert_eq!(bus.published().len(), 1);
        assert_eq!(bus.published()[0].0, "account-mailer");
    }
}
