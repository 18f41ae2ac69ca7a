use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use feerecon_core::ports::ObjectStore;
use feerecon_core::ReconcileError;

#[derive(Default)]
pub struct MockObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, bytes: Vec<u8>) {
        self.objects.lock().insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ReconcileError> {
        self.objects
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| ReconcileError::ObjectStore(format!("no such object: {key}")))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ReconcileError> {
        self.objects.lock().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ReconcileError> {
        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MockObjectStore::new();
        store.put("cas/20240101.csv", b"data".to_vec()).await.unwrap();
        assert_eq!(store.get("cas/20240101.csv").await.unwrap(), b"data".to_vec());
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let store = MockObjectStore::new();
        store.seed("cas/a.csv", vec![]);
        store.seed("tdi17/b.txt", vec![]);
        let keys = store.list("cas/").await.unwrap();
        assert_eq!(keys, vec!["cas/a.csv".to_string()]);
    }
}
