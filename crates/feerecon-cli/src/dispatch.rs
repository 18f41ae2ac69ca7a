use std::sync::Arc;

use anyhow::Result;
use feerecon_core::config::Settings;

use crate::bootstrap::build_context;

pub async fn run(settings: Arc<Settings>) -> Result<u8> {
    let ctx = build_context(settings, None).await?;
    let report = feerecon_tasks::run_invoice_dispatch(&ctx).await?;
    tracing::info!(?report, "invoice dispatch complete");
    Ok(0)
}
