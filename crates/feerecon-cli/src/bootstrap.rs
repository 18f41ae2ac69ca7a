//! Builds the `TaskContext` every subcommand runs against. Mirrors
//! `mez-api/db/mod.rs`'s optional-Postgres `init_pool` call plus the
//! teacher's pattern of constructing each HTTP adapter once at process
//! start and handing out `Arc`s.

use std::sync::Arc;

use feerecon_bus::HttpEventBusConfig;
use feerecon_cfs_client::CfsHttpConfig;
use feerecon_core::config::Settings;
use feerecon_core::{Clock, ReconcileError, SystemClock, TaskContext};
use feerecon_objectstore::S3ObjectStoreConfig;
use feerecon_storage::Store;

/// `bucket_override` lets `reconcile-*` subcommands target a bucket other
/// than `Settings::object_store_bucket` without a second `Settings`
/// construction; every other subcommand passes `None`.
pub async fn build_context(
    settings: Arc<Settings>,
    bucket_override: Option<&str>,
) -> Result<TaskContext<Store>, ReconcileError> {
    let store = feerecon_storage::init_pool(settings.database_url.as_deref())
        .await
        .map_err(|e| ReconcileError::Storage(e.to_string()))?;

    let cfs_client = feerecon_cfs_client::HttpCfsClient::new(CfsHttpConfig {
        base_url: settings.cfs_base_url.clone(),
        client_id: settings.cfs_client_id.clone(),
        client_secret: settings.cfs_client_secret.clone(),
        timeout_secs: 30,
    })?;

    let bus = feerecon_bus::HttpEventBus::new(HttpEventBusConfig {
        base_url: settings.bus_base_url.clone(),
        timeout_secs: 15,
    })?;

    let object_store = feerecon_objectstore::S3ObjectStore::new(S3ObjectStoreConfig {
        endpoint: settings.object_store_endpoint.clone(),
        bucket: bucket_override.unwrap_or(&settings.object_store_bucket).to_string(),
        region: "us-east-1".to_string(),
    })
    .await;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    Ok(TaskContext::new(
        settings,
        clock,
        Arc::new(cfs_client),
        Arc::new(bus),
        Arc::new(object_store),
        store,
    ))
}
