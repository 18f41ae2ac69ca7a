//! §4.6: the non-sufficient-funds workflow. Triggered by a PAD settlement
//! row reporting failure (§4.4's NOT_PAID/PADR/PAYR branch), but exposed
//! standalone so a caller with just an invoice_number can run it directly.

use chrono::Utc;
use serde_json::json;

use feerecon_core::ids::{DistributionCodeId, InvoiceId, InvoiceReferenceId, NonSufficientFundsId, PaymentLineItemId};
use feerecon_core::model::{
    CfsAccountStatus, Invoice, InvoiceReference, InvoiceReferenceStatus, InvoiceStatus, NonSufficientFunds,
    PaymentLineItem, PaymentMethod,
};
use feerecon_core::ports::BusEvent;
use feerecon_core::{derive_id, Money, ReconcileError, TaskContext};
use feerecon_storage::Store;

/// A fee-schedule lookup by (corp_type, filing_type) is not modeled; the
/// NSF fee invoice's line item is booked against a fixed sentinel
/// distribution code rather than one resolved from a schedule table.
const NSF_DISTRIBUTION_CODE: DistributionCodeId = DistributionCodeId(0);

/// Returns `true` if the flow ran, `false` if a precondition made it a
/// no-op (already processed, or the account is already frozen).
pub async fn process_nsf(ctx: &TaskContext<Store>, invoice_number: &str) -> Result<bool, ReconcileError> {
    let reference = match ctx.store.get_active_reference_by_number(invoice_number).await? {
        Some(r) => r,
        None => {
            tracing::warn!(invoice_number, "NSF row for unknown invoice_number, skipping");
            return Ok(false);
        }
    };
    let invoice = ctx
        .store
        .get_invoice(reference.invoice_id)
        .await?
        .ok_or_else(|| ReconcileError::validation(format!("invoice {} not found for NSF", reference.invoice_id)))?;
    let cfs_account = ctx
        .store
        .get_effective_cfs_account(invoice.payment_account_id, PaymentMethod::Pad)
        .await?
        .ok_or_else(|| ReconcileError::validation(format!("no effective PAD CFS account for {}", invoice.payment_account_id)))?;

    if ctx.store.has_failed_payment_for_invoice_number(invoice_number).await? {
        return Ok(false);
    }
    if ctx.store.has_nsf_event_for_invoice(invoice.id).await? {
        return Ok(false);
    }
    if cfs_account.status == CfsAccountStatus::Freeze {
        return Ok(false);
    }

    let mut frozen_account = cfs_account.clone();
    frozen_account.status = CfsAccountStatus::Freeze;
    ctx.store.save_cfs_account(&frozen_account).await?;

    let payment_account = ctx
        .store
        .get_payment_account(invoice.payment_account_id)
        .await?
        .ok_or_else(|| ReconcileError::validation(format!("payment account {} not found", invoice.payment_account_id)))?;
    let mut locked_account = payment_account.clone();
    locked_account.has_nsf_invoices = Some(ctx.now());
    ctx.store.save_payment_account(&locked_account).await?;

    ctx.cfs_client.stop_pad(frozen_account.id).await?;

    for completed in ctx.store.list_completed_references_by_number(invoice_number).await? {
        let reverted = InvoiceReference {
            status: InvoiceReferenceStatus::Active,
            ..completed.clone()
        };
        ctx.store.save_reference(&reverted).await?;
        ctx.store.delete_receipts_by_invoice(completed.invoice_id).await?;
        if let Some(settled) = ctx.store.get_invoice(completed.invoice_id).await? {
            ctx.store.save_invoice(&settled.revert_for_nsf()).await?;
        }
    }

    let now = ctx.now();
    let nsf_fee = ctx.settings.nsf_fee;
    let nsf_invoice_id = InvoiceId::new(derive_id(&format!("nsf-invoice:{invoice_number}")));
    let nsf_invoice = Invoice {
        id: nsf_invoice_id,
        payment_account_id: invoice.payment_account_id,
        cfs_account_id: Some(frozen_account.id),
        total: nsf_fee,
        paid: Money::ZERO,
        refund: Money::ZERO,
        service_fees: Money::ZERO,
        corp_type_code: "BCR".into(),
        business_identifier: invoice.business_identifier.clone(),
        payment_method_code: PaymentMethod::CreditCard,
        status: InvoiceStatus::Approved,
        disbursement_status_code: None,
        payment_date: None,
        refund_date: None,
        disbursement_date: None,
        disbursement_reversal_date: None,
        routing_slip: None,
        details: Some(json!({ "filing_type": "NSF" })),
        created_on: now,
    };
    ctx.store.save_invoice(&nsf_invoice).await?;
    ctx.store
        .save_payment_line_item(&PaymentLineItem {
            id: PaymentLineItemId::new(derive_id(&format!("nsf-line:{invoice_number}"))),
            invoice_id: nsf_invoice_id,
            distribution_code_id: NSF_DISTRIBUTION_CODE,
            description: "NSF Fee".into(),
            filing_fees: Money::ZERO,
            gst: Money::ZERO,
            priority_fees: Money::ZERO,
            future_effective_fees: Money::ZERO,
            service_fees: nsf_fee,
            total: nsf_fee,
        })
        .await?;
    ctx.store
        .insert_nsf_event(&NonSufficientFunds {
            id: NonSufficientFundsId::new(derive_id(&format!("nsf-event:{invoice_number}"))),
            invoice_id: invoice.id,
            payment_account_id: invoice.payment_account_id,
            nsf_fee,
            created_on: now,
        })
        .await?;

    let carried_reference_number = ctx
        .store
        .get_active_reference_by_number(invoice_number)
        .await?
        .and_then(|r| r.reference_number);
    ctx.store
        .save_reference(&InvoiceReference {
            id: InvoiceReferenceId::new(derive_id(&format!("nsf-reference:{invoice_number}"))),
            invoice_id: nsf_invoice_id,
            invoice_number: invoice_number.to_string(),
            reference_number: carried_reference_number,
            status: InvoiceReferenceStatus::Active,
        })
        .await?;

    ctx.cfs_client.add_nsf_adjustment(frozen_account.id, invoice_number, nsf_fee).await?;

    ctx.bus
        .publish(
            "auth.lock-account",
            BusEvent::new(
                "account.nsf-locked",
                "feerecon-reconcile",
                uuid::Uuid::new_v4().to_string(),
                now,
                json!({
                    "payment_account_id": invoice.payment_account_id.get(),
                    "reason": "PAD_NSF",
                    "outstanding": invoice.total,
                    "original": invoice.total,
                    "applied": invoice.paid,
                }),
            ),
        )
        .await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use feerecon_bus::MockEventBus;
    use feerecon_cfs_client::MockCfsClient;
    use feerecon_core::clock::FixedClock;
    use feerecon_core::config::Settings;
    use feerecon_core::ids::{CfsAccountId, PaymentAccountId};
    use feerecon_core::model::{CfsAccount, PaymentAccount};
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

    async fn seed(store: &Store) -> (Invoice, CfsAccountId) {
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
                cfs_site: "PAD1".into(),
                cfs_account: "AC1".into(),
                status: CfsAccountStatus::Active,
            })
            .await
            .unwrap();
        let invoice = Invoice {
            id: InvoiceId(100),
            payment_account_id: PaymentAccountId(1),
            cfs_account_id: Some(CfsAccountId(1)),
            total: Money::new(10000, 2),
            paid: Money::new(10000, 2),
            refund: Money::ZERO,
            service_fees: Money::ZERO,
            corp_type_code: "BC".into(),
            business_identifier: None,
            payment_method_code: PaymentMethod::Pad,
            status: InvoiceStatus::Paid,
            disbursement_status_code: None,
            payment_date: Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()),
            refund_date: None,
            disbursement_date: None,
            disbursement_reversal_date: None,
            routing_slip: None,
            details: None,
            created_on: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        store.save_invoice(&invoice).await.unwrap();
        store
            .save_reference(&InvoiceReference {
                id: InvoiceReferenceId(100),
                invoice_id: InvoiceId(100),
                invoice_number: "REGT00000100".into(),
                reference_number: Some("REF100".into()),
                status: InvoiceReferenceStatus::Completed,
            })
            .await
            .unwrap();
        (invoice, CfsAccountId(1))
    }

    #[tokio::test]
    async fn freezes_account_and_reverts_invoice() {
        let store = Store::new_in_memory();
        seed(&store).await;
        let ctx = ctx(store.clone());

        let acted = process_nsf(&ctx, "REGT00000100").await.unwrap();
        assert!(acted);

        let account = store.get_cfs_account_by_number("AC1").await.unwrap().unwrap();
        assert_eq!(account.status, CfsAccountStatus::Freeze);

        let payment_account = store.get_payment_account(PaymentAccountId(1)).await.unwrap().unwrap();
        assert!(payment_account.has_nsf_invoices.is_some());

        let original = store.get_invoice(InvoiceId(100)).await.unwrap().unwrap();
        assert_eq!(original.status, InvoiceStatus::SettlementScheduled);
        assert_eq!(original.paid, Money::ZERO);
    }

    #[tokio::test]
    async fn second_nsf_on_same_invoice_is_a_no_op() {
        let store = Store::new_in_memory();
        seed(&store).await;
        let ctx = ctx(store.clone());
        assert!(process_nsf(&ctx, "REGT00000100").await.unwrap());
        assert!(!process_nsf(&ctx, "REGT00000100").await.unwrap());
    }
}
