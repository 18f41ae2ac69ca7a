use std::sync::Arc;

use anyhow::Result;
use feerecon_core::config::Settings;

use crate::bootstrap::build_context;

pub async fn run_link(settings: Arc<Settings>) -> Result<u8> {
    let ctx = build_context(settings, None).await?;
    let linked = feerecon_tasks::link_electronic_funds_transfers_cfs(&ctx).await?;
    tracing::info!(linked, "EFT credit link pass complete");
    Ok(0)
}

pub async fn run_reverse(settings: Arc<Settings>) -> Result<u8> {
    let ctx = build_context(settings, None).await?;
    let reversed = feerecon_tasks::reverse_electronic_funds_transfers_cfs(&ctx).await?;
    tracing::info!(reversed, "EFT credit reversal pass complete");
    Ok(0)
}
