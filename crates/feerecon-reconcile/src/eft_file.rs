//! §4.7: TDI17 EFT deposit reconciliation. Three phases, each a distinct
//! commit boundary: A claims the filename and validates the whole file
//! before any effect lands, B turns deposits into `EftCredit` rows, C
//! queues pending credit-to-invoice links for the follow-up §4.8 task to
//! carry to CFS.
//!
//! No `ShortNameHistory`/"funds received" ledger is modeled in this
//! workspace (consistent with `feerecon-tasks::eft_credit_link`, whose
//! own `complete_links` carries the same simplification); a deposit's
//! running balance lives entirely in `EftCredit.remaining_amount`.

use std::collections::HashSet;

use feerecon_core::ids::{
    EftCreditId, EftCreditInvoiceLinkId, EftFileId, EftShortNameId, InvoiceId,
};
use feerecon_core::model::{
    EftCredit, EftCreditInvoiceLink, EftCreditInvoiceLinkStatus, EftShortName, EftShortNameLink,
    EftFile, PaymentMethod, SettlementFileStatus,
};
use feerecon_core::{derive_id, Money, ReconcileError, TaskContext};
use feerecon_core::config::WireConstants;
use feerecon_parsers::tdi17::{classify_short_name_type, parse_tdi17, Tdi17Detail, Tdi17Record};
use feerecon_storage::Store;

#[derive(Debug, Default)]
pub struct EftFileReport {
    pub details_processed: usize,
    pub credits_created: usize,
    pub links_queued: usize,
}

/// Returns `Ok(None)` when the file was already IN_PROGRESS or COMPLETED
/// (idempotent re-delivery). `Err` on a parse failure; the file is left
/// FAILED for an operator to requeue.
pub async fn reconcile_eft_file(
    ctx: &TaskContext<Store>,
    file_name: &str,
    bytes: &[u8],
) -> Result<Option<EftFileReport>, ReconcileError> {
    if let Some(existing) = ctx.store.get_eft_file_by_filename(file_name).await? {
        if matches!(
            existing.status,
            SettlementFileStatus::InProgress | SettlementFileStatus::Completed
        ) {
            return Ok(None);
        }
    }

    let now = ctx.now();
    let file_id = EftFileId::new(derive_id(&format!("eft-file:{file_name}")));
    ctx.store
        .save_eft_file(&EftFile {
            id: file_id,
            file_name: file_name.to_string(),
            status: SettlementFileStatus::InProgress,
            received_on: now,
        })
        .await?;

    let text = String::from_utf8_lossy(bytes);
    let outcome = parse_tdi17(&text);
    if outcome.has_errors() {
        for err in &outcome.errors {
            tracing::warn!(file_name, line = err.line, reason = %err.reason, "TDI17 parse error");
        }
        ctx.store
            .save_eft_file(&EftFile {
                id: file_id,
                file_name: file_name.to_string(),
                status: SettlementFileStatus::Failed,
                received_on: now,
            })
            .await?;
        return Err(ReconcileError::validation(format!(
            "TDI17 file {file_name} has {} field error(s), no credits issued",
            outcome.errors.len()
        )));
    }

    let mut report = EftFileReport::default();
    let mut touched = Vec::new();

    for record in &outcome.records {
        let Tdi17Record::Detail(detail) = record else {
            continue;
        };
        if detail.deposit_amount_cad_cents <= 0 {
            continue;
        }
        report.details_processed += 1;

        let short_name = resolve_short_name(ctx, detail, &ctx.settings.wire).await?;
        if !touched.contains(&short_name.id) {
            touched.push(short_name.id);
        }

        let credit_id = EftCreditId::new(derive_id(&format!(
            "eft-credit:{file_name}:{}:{}",
            short_name.id.get(),
            detail.transaction_sequence
        )));
        if ctx.store.get_eft_credit(credit_id).await?.is_some() {
            continue;
        }
        let deposit = Money::new(detail.deposit_amount_cad_cents, 2);
        let deposit_date = detail
            .deposit_date
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|ndt| ndt.and_utc())
            .unwrap_or(now);
        ctx.store
            .save_eft_credit(&EftCredit {
                id: credit_id,
                short_name_id: short_name.id,
                amount: deposit,
                remaining_amount: deposit,
                deposit_date,
            })
            .await?;
        report.credits_created += 1;
    }

    ctx.store
        .save_eft_file(&EftFile {
            id: file_id,
            file_name: file_name.to_string(),
            status: SettlementFileStatus::Completed,
            received_on: now,
        })
        .await?;

    for short_name_id in touched {
        match apply_pending_credits(ctx, short_name_id).await {
            Ok(n) => report.links_queued += n,
            Err(e) => tracing::error!(short_name_id = short_name_id.get(), error = %e, "error applying EFT credits"),
        }
    }

    Ok(Some(report))
}

/// A TDI17 detail's transaction description carries a pattern prefix
/// (EFT/WIRE/PAD/federal-payment); the short name is normally the
/// remainder of the description, except federal-payment rows have no
/// remainder to read, so the batch number stands in for it instead.
async fn resolve_short_name(
    ctx: &TaskContext<Store>,
    detail: &Tdi17Detail,
    wire: &WireConstants,
) -> Result<EftShortName, ReconcileError> {
    let matched = classify_short_name_type(
        &detail.transaction_description,
        &wire.eft_tdi17_pattern,
        &wire.wire_tdi17_pattern,
        &wire.pad_tdi17_pattern,
        &wire.federal_payment_tdi17_pattern,
    );
    let short_name_text = match matched {
        Some(pattern) if pattern == wire.federal_payment_tdi17_pattern => {
            format!("{pattern}-{}", detail.batch_number)
        }
        Some(pattern) => detail
            .transaction_description
            .trim_start_matches(pattern)
            .trim()
            .to_string(),
        None => detail.transaction_description.trim().to_string(),
    };

    if let Some(existing) = ctx.store.get_short_name_by_name(&short_name_text).await? {
        return Ok(existing);
    }
    let short_name = EftShortName {
        id: EftShortNameId::new(derive_id(&format!("short-name:{short_name_text}"))),
        short_name: short_name_text,
        linked_account_id: None,
    };
    ctx.store.save_short_name(&short_name).await?;
    Ok(short_name)
}

/// §4.7 phase C: for every active link on this short name, queue a
/// PENDING `EftCreditInvoiceLink` against the oldest credit with enough
/// remaining balance to cover one EFT invoice's amount owing. Queued
/// links are picked up by `feerecon_tasks::link_electronic_funds_transfers_cfs`
/// on its own schedule; this phase never talks to CFS directly.
async fn apply_pending_credits(
    ctx: &TaskContext<Store>,
    short_name_id: EftShortNameId,
) -> Result<usize, ReconcileError> {
    let links: Vec<EftShortNameLink> = ctx.store.list_links_by_short_name(short_name_id).await?;
    if links.is_empty() {
        return Ok(0);
    }
    let mut credits = ctx.store.list_eft_credits_by_short_name(short_name_id).await?;
    credits.sort_by_key(|c| c.deposit_date);

    let pending_rollups = ctx
        .store
        .list_link_rollups_by_status(EftCreditInvoiceLinkStatus::Pending)
        .await?;
    let already_pending: HashSet<InvoiceId> = pending_rollups.iter().map(|r| r.invoice_id).collect();

    let mut queued = 0;
    for link in &links {
        let invoices = ctx.store.list_approved_invoices_by_method(PaymentMethod::Eft).await?;
        for invoice in invoices.into_iter().filter(|i| i.payment_account_id == link.payment_account_id) {
            if already_pending.contains(&invoice.id) {
                continue;
            }
            let owing = invoice.total - invoice.paid;
            if owing <= Money::ZERO {
                continue;
            }
            let Some(credit) = credits.iter_mut().find(|c| c.remaining_amount >= owing) else {
                continue;
            };
            credit.remaining_amount -= owing;
            ctx.store.save_eft_credit(credit).await?;
            ctx.store
                .save_link(&EftCreditInvoiceLink {
                    id: EftCreditInvoiceLinkId::new(derive_id(&format!(
                        "eft-link:{}:{}",
                        credit.id.get(),
                        invoice.id.get()
                    ))),
                    eft_credit_id: credit.id,
                    invoice_id: invoice.id,
                    amount: owing,
                    status: EftCreditInvoiceLinkStatus::Pending,
                    link_group_id: None,
                })
                .await?;
            queued += 1;
        }
    }
    Ok(queued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use feerecon_bus::MockEventBus;
    use feerecon_cfs_client::MockCfsClient;
    use feerecon_core::clock::FixedClock;
    use feerecon_core::config::Settings;
    use feerecon_core::ids::{CfsAccountId, EftShortNameLinkId, InvoiceId, PaymentAccountId};
    use feerecon_core::model::{
        CfsAccount, CfsAccountStatus, EftShortNameLinkStatus, Invoice, InvoiceStatus, PaymentAccount,
    };
    use feerecon_objectstore::MockObjectStore;
    use std::sync::Arc;

    fn ctx(store: Store) -> TaskContext<Store> {
        TaskContext::new(
            Arc::new(Settings::from_env()),
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())),
            Arc::new(MockCfsClient::new()),
            Arc::new(MockEventBus::new()),
            Arc::new(MockObjectStore::new()),
            store,
        )
    }

    fn pad_field(value: &str, width: usize) -> String {
        format!("{:<width$}", value, width = width)
    }

    fn detail_line(description: &str, amount_cents: i64, sequence: &str) -> String {
        let mut line = String::new();
        line.push_str("AA");
        line.push_str("2 ");
        line.push_str(&pad_field("MIN", 3));
        line.push_str(&pad_field("PRG", 3));
        line.push_str(&pad_field("20240115", 8));
        line.push_str(&pad_field("0900", 6));
        line.push_str(&pad_field("LOC1", 4));
        line.push_str(&pad_field(sequence, 10));
        line.push_str(&pad_field(description, 40));
        line.push_str(&format!("{:0>15}", amount_cents));
        line.push_str(&pad_field("CAD", 3));
        line.push_str(&pad_field("", 10));
        line.push_str(&format!("{:0>10}", amount_cents));
        line.push_str(&pad_field("0001", 4));
        line.push_str(&pad_field("BATCH1", 10));
        line.push_str(&pad_field("JV", 2));
        line.push_str(&pad_field("JVNUM", 10));
        line.push_str("20240116");
        line
    }

    async fn seed_linked_account(store: &Store) {
        store
            .save_payment_account(&PaymentAccount {
                id: PaymentAccountId(1),
                auth_account_id: "A1".into(),
                name: "Acme".into(),
                pad_credit: Money::ZERO,
                ob_credit: Money::ZERO,
                eft_credit: Money::ZERO,
                has_nsf_invoices: None,
                has_overdue_invoices: None,
                pad_activation_date: None,
            })
            .await
            .unwrap();
        store
            .save_cfs_account(&CfsAccount {
                id: CfsAccountId(1),
                payment_account_id: PaymentAccountId(1),
                cfs_party: "P1".into(),
                cfs_site: "S1".into(),
                cfs_account: "AC1".into(),
                status: CfsAccountStatus::Active,
            })
            .await
            .unwrap();
        store
            .save_invoice(&Invoice {
                id: InvoiceId(100),
                payment_account_id: PaymentAccountId(1),
                cfs_account_id: Some(CfsAccountId(1)),
                total: Money::new(10000, 2),
                paid: Money::ZERO,
                refund: Money::ZERO,
                service_fees: Money::ZERO,
                corp_type_code: "BC".into(),
                business_identifier: None,
                payment_method_code: PaymentMethod::Eft,
                status: InvoiceStatus::Approved,
                disbursement_status_code: None,
                payment_date: None,
                refund_date: None,
                disbursement_date: None,
                disbursement_reversal_date: None,
                routing_slip: None,
                details: None,
                created_on: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        let short_name = EftShortName {
            id: EftShortNameId::new(derive_id("short-name:ABC123")),
            short_name: "ABC123".into(),
            linked_account_id: Some(PaymentAccountId(1)),
        };
        store.save_short_name(&short_name).await.unwrap();
        store
            .save_short_name_link(&EftShortNameLink {
                id: EftShortNameLinkId::new(derive_id("sn-link:ABC123:1")),
                short_name_id: short_name.id,
                payment_account_id: PaymentAccountId(1),
                status: EftShortNameLinkStatus::Linked,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_deposit_creates_short_name_and_credit_without_a_link() {
        let store = Store::new_in_memory();
        let ctx = ctx(store.clone());
        let text = detail_line("EFT ABC123", 10000, "SEQ0000001");

        let report = reconcile_eft_file(&ctx, "file1.txt", text.as_bytes())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.credits_created, 1);
        assert_eq!(report.links_queued, 0);

        let short_name = store.get_short_name_by_name("ABC123").await.unwrap().unwrap();
        let credits = store.list_eft_credits_by_short_name(short_name.id).await.unwrap();
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].remaining_amount, Money::new(10000, 2));
    }

    #[tokio::test]
    async fn re_running_same_file_does_not_duplicate_credits() {
        let store = Store::new_in_memory();
        let ctx = ctx(store.clone());
        let text = detail_line("EFT ABC123", 10000, "SEQ0000001");

        reconcile_eft_file(&ctx, "file1.txt", text.as_bytes()).await.unwrap();
        let second = reconcile_eft_file(&ctx, "file1.txt", text.as_bytes()).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn a_deposit_covering_an_owed_invoice_queues_a_pending_link() {
        let store = Store::new_in_memory();
        seed_linked_account(&store).await;

        let ctx = ctx(store.clone());
        let text = detail_line("EFT ABC123", 10000, "SEQ0000002");
        let report = reconcile_eft_file(&ctx, "file2.txt", text.as_bytes())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.links_queued, 1);

        let rollups = store
            .list_link_rollups_by_status(EftCreditInvoiceLinkStatus::Pending)
            .await
            .unwrap();
        assert!(rollups.iter().any(|r| r.invoice_id == InvoiceId(100)));
    }
}
