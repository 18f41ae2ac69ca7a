//! Settlement-file subcommands. Each fetches the named object once, then
//! hands it straight to the matching `feerecon-reconcile` entry point; the
//! reconcilers own their own idempotency (claim-by-filename) so a retry of
//! the same `(bucket, key)` is always safe to re-issue.

use std::sync::Arc;

use anyhow::Result;
use feerecon_core::config::Settings;

use crate::bootstrap::build_context;

pub async fn run_cas(settings: Arc<Settings>, bucket: &str, key: &str) -> Result<u8> {
    let ctx = build_context(settings, Some(bucket)).await?;
    let bytes = ctx.object_store.get(key).await?;
    let report = feerecon_reconcile::reconcile_cas_settlement(&ctx, key, &bytes).await?;
    tracing::info!(?report, "CAS settlement reconciled");
    Ok(0)
}

pub async fn run_eft(settings: Arc<Settings>, bucket: &str, key: &str) -> Result<u8> {
    let ctx = build_context(settings, Some(bucket)).await?;
    let bytes = ctx.object_store.get(key).await?;
    match feerecon_reconcile::reconcile_eft_file(&ctx, key, &bytes).await? {
        Some(report) => tracing::info!(?report, "EFT TDI17 file reconciled"),
        None => tracing::info!(key, "EFT TDI17 file already processed, skipped"),
    }
    Ok(0)
}

/// `ack_only` mirrors the CFS feedback channel's distinction between an
/// acknowledgement-only delivery and one carrying batch content; the
/// reconciler already detects an empty/error-free file as an ACK on its
/// own, so this flag only changes what gets logged, not what runs.
pub async fn run_jv(settings: Arc<Settings>, bucket: &str, key: &str, ack_only: bool) -> Result<u8> {
    let ctx = build_context(settings, Some(bucket)).await?;
    let bytes = ctx.object_store.get(key).await?;
    match feerecon_reconcile::reconcile_jv_feedback(&ctx, key, &bytes).await? {
        Some(report) => tracing::info!(?report, "JV feedback file reconciled"),
        None if ack_only => tracing::info!(key, "JV ACK received"),
        None => tracing::info!(key, "JV feedback file carried no batch content"),
    }
    Ok(0)
}
