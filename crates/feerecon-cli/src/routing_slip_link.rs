use std::sync::Arc;

use anyhow::Result;
use feerecon_core::config::Settings;

use crate::bootstrap::build_context;

pub async fn run(settings: Arc<Settings>) -> Result<u8> {
    let ctx = build_context(settings, None).await?;
    let linked = feerecon_tasks::link_routing_slips(&ctx).await?;
    tracing::info!(linked, "routing slip link pass complete");
    Ok(0)
}
