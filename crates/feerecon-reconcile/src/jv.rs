//! §4.9: journal-voucher (JV) feedback reconciliation. One physical
//! feedback file can carry several batches (BG...BT groups), each
//! referring back to an `EjvFile` dispatched earlier by batch_number; this
//! module walks the records in file order and keeps the "current batch"
//! as mutable state rather than pre-splitting the file, since BG/BT are
//! just sentinels in an otherwise flat record stream.
//!
//! Two kinds of file arrive over the same inbound channel: ACKs (filename
//! only, no batch records, no effect on any invoice) and feedback files
//! proper. No separate signal distinguishes them on the wire in this
//! workspace, so a file that parses to zero records and zero errors is
//! treated as an ACK and short-circuited before any claim is attempted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::json;

use feerecon_core::ids::{
    EjvHeaderId, EjvLinkId, InvoiceId, InvoiceReferenceId, PaymentAccountId, PaymentId, ReceiptId,
};
use feerecon_core::model::{
    DisbursementStatus, EjvFileKind, EjvFileStatus, EjvHeader, EjvLink, Invoice, InvoiceReference,
    Payment, PaymentMethod, PaymentStatus, RoutingSlipStatus,
};
use feerecon_core::ports::BusEvent;
use feerecon_core::{derive_id, Money, ReconcileError, TaskContext};
use feerecon_parsers::jv_feedback::{parse_jv_feedback, ApHeader, JvDetail, JvHeader, JvRecord};
use feerecon_storage::{new_receipt, Store};

/// No real payer account backs a JH line's ministry-to-ministry
/// settlement `Payment` row; it is recorded against this sentinel the
/// same way `feerecon-reconcile::nsf` books its fee line item against a
/// sentinel `DistributionCodeId` rather than inventing an owning account.
const MINISTRY_PAYMENT_ACCOUNT: PaymentAccountId = PaymentAccountId(0);

const SUCCESS_CODE: &str = "0000";

#[derive(Debug, Default)]
pub struct JvFeedbackReport {
    pub batches_claimed: usize,
    pub headers_processed: usize,
    pub details_processed: usize,
    pub ap_headers_processed: usize,
    pub errors_observed: usize,
}

/// Returns `Ok(None)` when the file is an ACK (no batch content).
pub async fn reconcile_jv_feedback(
    ctx: &TaskContext<Store>,
    feedback_file_ref: &str,
    bytes: &[u8],
) -> Result<Option<JvFeedbackReport>, ReconcileError> {
    let text = String::from_utf8_lossy(bytes);
    let outcome = parse_jv_feedback(&text);

    if outcome.records.is_empty() && !outcome.has_errors() {
        tracing::info!(feedback_file_ref, "JV feedback file carries no batches, treating as ACK");
        return Ok(None);
    }

    for err in &outcome.errors {
        tracing::warn!(feedback_file_ref, line = err.line, reason = %err.reason, "JV feedback parse error");
    }

    let now = ctx.now();
    let mut report = JvFeedbackReport::default();
    let mut any_error = !outcome.errors.is_empty();

    let mut current_file: Option<feerecon_core::model::EjvFile> = None;
    let mut skip_batch = false;
    let mut receipt_numbers: HashMap<EjvHeaderId, String> = HashMap::new();

    for record in &outcome.records {
        match record {
            JvRecord::BatchGroup(bg) => {
                skip_batch = false;
                current_file = None;
                let Some(file) = ctx.store.get_ejv_file_by_batch_number(&bg.batch_number).await? else {
                    tracing::warn!(batch_number = %bg.batch_number, "JV feedback for unknown batch");
                    skip_batch = true;
                    any_error = true;
                    continue;
                };
                if !ctx.store.claim_ejv_feedback(file.id, feedback_file_ref).await? {
                    skip_batch = true;
                    continue;
                }
                report.batches_claimed += 1;
                current_file = Some(file);
            }
            JvRecord::BatchTrailer => {
                skip_batch = false;
                current_file = None;
            }
            JvRecord::BatchHeader(bh) => {
                if skip_batch {
                    continue;
                }
                let Some(mut file) = current_file.clone() else {
                    continue;
                };
                let succeeded = bh.return_code.trim() == SUCCESS_CODE;
                if !succeeded {
                    any_error = true;
                    tracing::warn!(batch_number = %file.file_name, message = %bh.message, "JV batch errored");
                }
                file.status = if succeeded { EjvFileStatus::Completed } else { EjvFileStatus::Failed };
                ctx.store.save_ejv_file(&file).await?;
                current_file = Some(file);
            }
            JvRecord::JvHeader(jh) => {
                if skip_batch {
                    continue;
                }
                report.headers_processed += 1;
                let file_type = current_file.as_ref().map(|f| f.file_type);
                let handled = process_jv_header(ctx, jh, file_type, now, &mut receipt_numbers).await?;
                if !handled {
                    any_error = true;
                }
            }
            JvRecord::JvDetail(jd) => {
                if skip_batch {
                    continue;
                }
                report.details_processed += 1;
                let file_type = current_file.as_ref().map(|f| f.file_type);
                let ok = process_jv_detail(ctx, jd, file_type, &receipt_numbers).await?;
                if !ok {
                    any_error = true;
                }
            }
            JvRecord::ApHeader(ap) => {
                if skip_batch {
                    continue;
                }
                report.ap_headers_processed += 1;
                let file_type = current_file.as_ref().map(|f| f.file_type);
                let ok = process_ap_header(ctx, ap, file_type, now).await?;
                if !ok {
                    any_error = true;
                }
            }
        }
    }

    if any_error {
        report.errors_observed += 1;
    }

    if any_error && !ctx.settings.flags.disable_ejv_error_email {
        ctx.bus
            .publish(
                "account_mailer",
                BusEvent::new(
                    "EJV_FAILED",
                    "feerecon-reconcile",
                    uuid::Uuid::new_v4().to_string(),
                    now,
                    json!({ "file_name": feedback_file_ref }),
                ),
            )
            .await?;
    }

    Ok(Some(report))
}

/// JH: set the header's own feedback status, and on a PAYMENT file's
/// success, book the ministry-to-ministry settlement as a completed
/// `Payment` row (system=CGI, method=EJV per §4.9).
async fn process_jv_header(
    ctx: &TaskContext<Store>,
    jh: &JvHeader,
    file_type: Option<EjvFileKind>,
    now: DateTime<Utc>,
    receipt_numbers: &mut HashMap<EjvHeaderId, String>,
) -> Result<bool, ReconcileError> {
    let Some(ejv_header_id) = jh.ejv_header_id.map(EjvHeaderId::new) else {
        tracing::warn!("JH line with unparseable ejv_header_id, skipping");
        return Ok(false);
    };
    receipt_numbers.insert(ejv_header_id, jh.receipt_number.clone());

    let Some(mut header) = ctx.store.get_ejv_header(ejv_header_id).await? else {
        tracing::warn!(ejv_header_id = ejv_header_id.get(), "JH feedback for unknown EjvHeader");
        return Ok(false);
    };
    let succeeded = jh.return_code.trim() == SUCCESS_CODE;
    header.disbursement_status_code = Some(if succeeded { "COMPLETED".to_string() } else { "ERRORED".to_string() });
    ctx.store.save_ejv_header(&header).await?;

    if succeeded && file_type == Some(EjvFileKind::Payment) {
        ctx.store
            .save_payment(&Payment {
                id: PaymentId::new(derive_id(&format!("jv-payment:{}:{}", ejv_header_id.get(), jh.receipt_number))),
                payment_account_id: MINISTRY_PAYMENT_ACCOUNT,
                invoice_id: None,
                payment_method_code: PaymentMethod::Ejv,
                invoice_number: jh.receipt_number.clone(),
                amount: Money::new(jh.settlement_amount_cents, 2),
                status: PaymentStatus::Completed,
                payment_date: Some(now),
            })
            .await?;
    }

    Ok(succeeded)
}

/// JD: a Credit line only matters in a DISBURSEMENT file, a Debit line
/// only in a PAYMENT file; the other combination is a line this file
/// doesn't govern and is ignored.
async fn process_jv_detail(
    ctx: &TaskContext<Store>,
    jd: &JvDetail,
    file_type: Option<EjvFileKind>,
    receipt_numbers: &HashMap<EjvHeaderId, String>,
) -> Result<bool, ReconcileError> {
    let Some(ejv_header_id) = jd.ejv_header_id.map(EjvHeaderId::new) else {
        tracing::warn!("JD line with unparseable ejv_header_id, skipping");
        return Ok(false);
    };
    let invoice_id_raw = jd.flowthrough.split('-').next().unwrap_or("").trim();
    let Ok(invoice_id) = invoice_id_raw.parse::<i64>().map(InvoiceId::new) else {
        tracing::warn!(flowthrough = %jd.flowthrough, "JD line with unparseable flowthrough invoice id");
        return Ok(false);
    };
    let Some(invoice) = ctx.store.get_invoice(invoice_id).await? else {
        tracing::warn!(invoice_id = invoice_id.get(), "JD feedback for unknown invoice");
        return Ok(false);
    };

    let link = ctx.store.find_ejv_link(ejv_header_id, invoice_id).await?;
    let succeeded = jd.return_code.trim() == SUCCESS_CODE;

    let handled = match (file_type, jd.credit_or_debit) {
        (Some(EjvFileKind::Disbursement), 'C') => {
            credit_in_disbursement(ctx, &invoice, jd, succeeded).await?;
            true
        }
        (Some(EjvFileKind::Payment), 'D') => {
            debit_in_payment(ctx, &invoice, jd, succeeded, receipt_numbers.get(&ejv_header_id)).await?;
            true
        }
        _ => false,
    };

    if handled {
        if let Some(mut link) = link {
            link.disbursement_status_code = Some(if succeeded { "COMPLETED".to_string() } else { "ERRORED".to_string() });
            ctx.store.save_ejv_link(&link).await?;
        }
    }

    Ok(!handled || succeeded)
}

async fn credit_in_disbursement(
    ctx: &TaskContext<Store>,
    invoice: &Invoice,
    jd: &JvDetail,
    succeeded: bool,
) -> Result<(), ReconcileError> {
    let partner = ctx.store.get_partner_disbursement_by_invoice(invoice.id).await?;

    if !succeeded {
        if let Some(mut d) = partner {
            d.status_code = "ERRORED".to_string();
            ctx.store.save_partner_disbursement(&d).await?;
        }
        ctx.store.save_invoice(&invoice.mark_disbursement(DisbursementStatus::Errored, ctx.now())).await?;
        for item in ctx.store.list_line_items_by_invoice(invoice.id).await? {
            ctx.store.stop_ejv_for_distribution_code(item.distribution_code_id).await?;
        }
        return Ok(());
    }

    let effective_date = jd
        .effective_date
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
        .unwrap_or_else(|| ctx.now());
    let is_reversal = jd.object_code.trim() == "112";
    let status = if is_reversal { DisbursementStatus::Reversed } else { DisbursementStatus::Completed };

    if let Some(mut d) = partner {
        d.status_code = if is_reversal { "REVERSED".to_string() } else { "COMPLETED".to_string() };
        d.is_reversal = is_reversal;
        ctx.store.save_partner_disbursement(&d).await?;
    }
    ctx.store.save_invoice(&invoice.mark_disbursement(status, effective_date)).await?;
    Ok(())
}

async fn debit_in_payment(
    ctx: &TaskContext<Store>,
    invoice: &Invoice,
    jd: &JvDetail,
    succeeded: bool,
    receipt_number: Option<&String>,
) -> Result<(), ReconcileError> {
    let active_reference = ctx.store.get_active_reference(invoice.id).await?;

    if !succeeded {
        if let Some(reference) = active_reference {
            ctx.store.save_reference(&reference.cancel()).await?;
        }
        // No account-level "active DistributionCode" is modeled; reuse
        // the invoice's own line items, same resolution as the
        // credit-in-disbursement failure case above.
        for item in ctx.store.list_line_items_by_invoice(invoice.id).await? {
            ctx.store.stop_ejv_for_distribution_code(item.distribution_code_id).await?;
        }
        return Ok(());
    }

    let effective_date = jd
        .effective_date
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
        .unwrap_or_else(|| ctx.now());

    let settled = invoice.mark_jv_settled(effective_date);
    let is_reversal = settled.status == feerecon_core::model::InvoiceStatus::Refunded;
    ctx.store.save_invoice(&settled).await?;

    if let Some(reference) = active_reference {
        ctx.store.save_reference(&reference.complete()?).await?;
    }

    if !is_reversal {
        let amount = Money::new(jd.settlement_amount_cents, 2);
        let receipt_number = receipt_number.cloned().unwrap_or_else(|| format!("JV-{}", invoice.id));
        match ctx.store.get_receipt_by_invoice_and_number(invoice.id, &receipt_number).await? {
            Some(mut receipt) => {
                receipt.receipt_amount += amount;
                ctx.store.save_receipt(&receipt).await?;
            }
            None => {
                let receipt = new_receipt(
                    ReceiptId::new(derive_id(&format!("jv-receipt:{}:{receipt_number}", invoice.id))),
                    invoice.id,
                    receipt_number,
                    amount,
                    effective_date,
                );
                ctx.store.save_receipt(&receipt).await?;
            }
        }
    }

    Ok(())
}

/// AP/IH header: routed by the enclosing file's kind, since the parser
/// does not know what `target_id` names. REFUND keys off a routing slip
/// number; EFT_REFUND and the non-government disbursement kind both key
/// off an invoice id and only differ in which `DisbursementStatus`
/// transition applies to a plain invoice vs. the "no Refund entity"
/// routing-slip path REFUND uses instead.
async fn process_ap_header(
    ctx: &TaskContext<Store>,
    ap: &ApHeader,
    file_type: Option<EjvFileKind>,
    now: DateTime<Utc>,
) -> Result<bool, ReconcileError> {
    let succeeded = ap.return_code.trim() == SUCCESS_CODE;
    let target_id = ap.target_id.trim();

    match file_type {
        Some(EjvFileKind::Refund) => {
            let Some(mut slip) = ctx.store.get_routing_slip_by_number(target_id).await? else {
                tracing::warn!(routing_slip_number = target_id, "AP REFUND feedback for unknown routing slip");
                return Ok(false);
            };
            if succeeded {
                slip.gl_posted = Some(now);
            } else {
                slip.status = RoutingSlipStatus::Rejected;
            }
            ctx.store.save_routing_slip(&slip).await?;
        }
        Some(EjvFileKind::EftRefund) | Some(EjvFileKind::OtherDisbursement) => {
            let Ok(invoice_id) = target_id.parse::<i64>().map(InvoiceId::new) else {
                tracing::warn!(target_id, "AP header with unparseable invoice id target");
                return Ok(false);
            };
            let Some(invoice) = ctx.store.get_invoice(invoice_id).await? else {
                tracing::warn!(invoice_id = invoice_id.get(), "AP feedback for unknown invoice");
                return Ok(false);
            };
            let status = if succeeded { DisbursementStatus::Completed } else { DisbursementStatus::Errored };
            ctx.store.save_invoice(&invoice.mark_disbursement(status, now)).await?;
        }
        _ => return Ok(false),
    }

    Ok(succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use feerecon_bus::MockEventBus;
    use feerecon_cfs_client::MockCfsClient;
    use feerecon_core::clock::FixedClock;
    use feerecon_core::config::Settings;
    use feerecon_core::ids::{CfsAccountId, EjvFileId, InvoiceReferenceId};
    use feerecon_core::model::{
        CfsAccount, CfsAccountStatus, EjvFile, EjvHeaderKind, InvoiceReferenceStatus, InvoiceStatus,
        PaymentAccount, RoutingSlip,
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

    fn field(value: &str, width: usize) -> String {
        format!("{:<width$}", value, width = width)
    }

    fn bg_line(batch_number: &str) -> String {
        let mut line = "GABG".to_string();
        line.push_str(&" ".repeat(11));
        line.push_str(&field(batch_number, 9));
        line
    }

    fn bh_line(return_code: &str) -> String {
        let mut line = "AABH".to_string();
        line.push_str(&" ".repeat(3));
        line.push_str(&field(return_code, 4));
        line.push_str(&field("ok", 150));
        line
    }

    fn jh_line(ejv_header_id: i64, amount_cents: i64, return_code: &str) -> String {
        let mut line = String::new();
        line.push_str("AAJH"); // [0,4)
        line.push_str(&" ".repeat(3)); // pad to 7
        line.push_str("BC"); // ministry code, part of journal_name [7,9)
        line.push_str(&format!("{:0>8}", ejv_header_id)); // rest of journal_name [9,17)
        line.push_str(&" ".repeat(25)); // pad to 42
        line.push_str(&format!("{:0>15}", amount_cents)); // amount [42,57)
        line.push_str(&" ".repeat(214)); // pad to 271
        line.push_str(&field(return_code, 4)); // [271,275)
        line.push_str(&field("msg", 150)); // [275,425)
        line
    }

    fn jd_line(
        ejv_header_id: i64,
        flowthrough: &str,
        amount_cents: i64,
        credit_or_debit: char,
        effective_date: &str,
        object_code: &str,
        return_code: &str,
    ) -> String {
        let mut line = String::new();
        line.push_str("AAJD"); // [0,4)
        line.push_str(&" ".repeat(3)); // pad to 7
        line.push_str("BC"); // journal_name prefix [7,9)
        line.push_str(&format!("{:0>8}", ejv_header_id)); // [9,17)
        line.push_str(&" ".repeat(5)); // pad to 22
        line.push_str(&field(effective_date, 8)); // [22,30)
        line.push_str(&field(object_code, 3)); // [30,33)
        line.push_str(&" ".repeat(56)); // pad to 89
        line.push_str(&format!("{:0>15}", amount_cents)); // [89,104)
        line.push(credit_or_debit); // [104,105)
        line.push_str(&" ".repeat(100)); // pad to 205
        line.push_str(&field(flowthrough, 110)); // [205,315)
        line.push_str(&field(return_code, 4)); // [315,319)
        line.push_str(&field("msg", 150)); // [319,469)
        line
    }

    async fn seed_disbursement_file(store: &Store, header_id: i64, invoice_id: i64) {
        store
            .save_ejv_file(&EjvFile {
                id: EjvFileId::new(derive_id("ejv-file:BATCH001")),
                file_name: "BATCH001".into(),
                file_type: EjvFileKind::Disbursement,
                status: EjvFileStatus::Uploaded,
                feedback_file_ref: None,
                created_on: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        store
            .save_ejv_header(&EjvHeader {
                id: EjvHeaderId::new(header_id),
                ejv_file_id: EjvFileId::new(derive_id("ejv-file:BATCH001")),
                kind: EjvHeaderKind::Payment,
                sequence: 1,
                disbursement_status_code: None,
            })
            .await
            .unwrap();
        store
            .save_payment_account(&PaymentAccount {
                id: PaymentAccountId(1),
                auth_account_id: "A1".into(),
                name: "Ministry".into(),
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
            .save_invoice(&Invoice {
                id: InvoiceId::new(invoice_id),
                payment_account_id: PaymentAccountId(1),
                cfs_account_id: None,
                total: Money::new(5000, 2),
                paid: Money::new(5000, 2),
                refund: Money::ZERO,
                service_fees: Money::ZERO,
                corp_type_code: "BC".into(),
                business_identifier: None,
                payment_method_code: PaymentMethod::Ejv,
                status: InvoiceStatus::Paid,
                disbursement_status_code: Some(DisbursementStatus::WaitingForJob),
                payment_date: Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()),
                refund_date: None,
                disbursement_date: None,
                disbursement_reversal_date: None,
                routing_slip: None,
                details: None,
                created_on: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        store
            .save_ejv_link(&EjvLink {
                id: EjvLinkId::new(derive_id(&format!("ejv-link:{header_id}:{invoice_id}"))),
                ejv_header_id: EjvHeaderId::new(header_id),
                invoice_id: InvoiceId::new(invoice_id),
                sequence: 1,
                disbursement_status_code: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_batch_number_is_logged_and_skipped() {
        let store = Store::new_in_memory();
        let ctx = ctx(store.clone());
        let text = bg_line("NOSUCH");

        let report = reconcile_jv_feedback(&ctx, "feedback1.txt", text.as_bytes())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.batches_claimed, 0);
        assert_eq!(report.errors_observed, 1);
    }

    #[tokio::test]
    async fn bh_success_completes_the_ejv_file() {
        let store = Store::new_in_memory();
        store
            .save_ejv_file(&EjvFile {
                id: EjvFileId::new(derive_id("ejv-file:BATCH002")),
                file_name: "BATCH002".into(),
                file_type: EjvFileKind::Payment,
                status: EjvFileStatus::Uploaded,
                feedback_file_ref: None,
                created_on: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        let ctx = ctx(store.clone());

        let mut text = bg_line("BATCH002");
        text.push('\n');
        text.push_str(&bh_line("0000"));

        let report = reconcile_jv_feedback(&ctx, "feedback2.txt", text.as_bytes())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.batches_claimed, 1);
        assert_eq!(report.errors_observed, 0);

        let file = store.get_ejv_file_by_batch_number("BATCH002").await.unwrap().unwrap();
        assert_eq!(file.status, EjvFileStatus::Completed);
    }

    #[tokio::test]
    async fn jh_success_on_payment_file_books_a_ministry_payment() {
        let store = Store::new_in_memory();
        store
            .save_ejv_file(&EjvFile {
                id: EjvFileId::new(derive_id("ejv-file:BATCH003")),
                file_name: "BATCH003".into(),
                file_type: EjvFileKind::Payment,
                status: EjvFileStatus::Uploaded,
                feedback_file_ref: None,
                created_on: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        store
            .save_ejv_header(&EjvHeader {
                id: EjvHeaderId::new(77),
                ejv_file_id: EjvFileId::new(derive_id("ejv-file:BATCH003")),
                kind: EjvHeaderKind::Payment,
                sequence: 1,
                disbursement_status_code: None,
            })
            .await
            .unwrap();
        let ctx = ctx(store.clone());

        let jh = jh_line(77, 12345, "0000");
        let receipt_number = jh[0..42].trim().to_string();
        let mut text = bg_line("BATCH003");
        text.push('\n');
        text.push_str(&jh);

        let report = reconcile_jv_feedback(&ctx, "feedback3.txt", text.as_bytes())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.headers_processed, 1);
        assert_eq!(report.errors_observed, 0);

        let header = store.get_ejv_header(EjvHeaderId::new(77)).await.unwrap().unwrap();
        assert_eq!(header.disbursement_status_code.as_deref(), Some("COMPLETED"));

        let payment = store.get_payment_by_invoice_number(&receipt_number).await.unwrap().unwrap();
        assert_eq!(payment.payment_method_code, PaymentMethod::Ejv);
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.amount, Money::new(12345, 2));
    }

    #[tokio::test]
    async fn jd_credit_success_in_disbursement_file_completes_the_invoice_disbursement() {
        let store = Store::new_in_memory();
        store
            .save_ejv_file(&EjvFile {
                id: EjvFileId::new(derive_id("ejv-file:BATCH001")),
                file_name: "BATCH001".into(),
                file_type: EjvFileKind::Disbursement,
                status: EjvFileStatus::Uploaded,
                feedback_file_ref: None,
                created_on: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        seed_disbursement_file(&store, 99, 500).await;
        let ctx = ctx(store.clone());

        let mut text = bg_line("BATCH001");
        text.push('\n');
        text.push_str(&jd_line(99, "500", 5000, 'C', "20240601", "000", "0000"));

        let report = reconcile_jv_feedback(&ctx, "feedback4.txt", text.as_bytes())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.details_processed, 1);
        assert_eq!(report.errors_observed, 0);

        let invoice = store.get_invoice(InvoiceId::new(500)).await.unwrap().unwrap();
        assert_eq!(invoice.disbursement_status_code, Some(DisbursementStatus::Completed));
        assert!(invoice.disbursement_date.is_some());
    }

    #[tokio::test]
    async fn jd_credit_failure_in_disbursement_file_errors_the_invoice() {
        let store = Store::new_in_memory();
        store
            .save_ejv_file(&EjvFile {
                id: EjvFileId::new(derive_id("ejv-file:BATCH001")),
                file_name: "BATCH001".into(),
                file_type: EjvFileKind::Disbursement,
                status: EjvFileStatus::Uploaded,
                feedback_file_ref: None,
                created_on: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        seed_disbursement_file(&store, 98, 501).await;
        let ctx = ctx(store.clone());

        let mut text = bg_line("BATCH001");
        text.push('\n');
        text.push_str(&jd_line(98, "501", 5000, 'C', "20240601", "000", "9999"));

        let report = reconcile_jv_feedback(&ctx, "feedback5.txt", text.as_bytes())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.errors_observed, 1);

        let invoice = store.get_invoice(InvoiceId::new(501)).await.unwrap().unwrap();
        assert_eq!(invoice.disbursement_status_code, Some(DisbursementStatus::Errored));
    }

    #[tokio::test]
    async fn jd_debit_success_in_payment_file_settles_the_invoice_and_completes_reference() {
        let store = Store::new_in_memory();
        store
            .save_ejv_file(&EjvFile {
                id: EjvFileId::new(derive_id("ejv-file:BATCHPAY")),
                file_name: "BATCHPAY".into(),
                file_type: EjvFileKind::Payment,
                status: EjvFileStatus::Uploaded,
                feedback_file_ref: None,
                created_on: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        store
            .save_invoice(&Invoice {
                id: InvoiceId::new(700),
                payment_account_id: PaymentAccountId(2),
                cfs_account_id: None,
                total: Money::new(5000, 2),
                paid: Money::ZERO,
                refund: Money::ZERO,
                service_fees: Money::ZERO,
                corp_type_code: "BC".into(),
                business_identifier: None,
                payment_method_code: PaymentMethod::Ejv,
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
        store
            .save_reference(&InvoiceReference {
                id: InvoiceReferenceId::new(700),
                invoice_id: InvoiceId::new(700),
                invoice_number: "REGT00000700".into(),
                reference_number: Some("REF700".into()),
                status: InvoiceReferenceStatus::Active,
            })
            .await
            .unwrap();
        let ctx = ctx(store.clone());

        let jh = jh_line(55, 5000, "0000");
        let receipt_number = jh[0..42].trim().to_string();
        let mut text = bg_line("BATCHPAY");
        text.push('\n');
        text.push_str(&jh);
        text.push('\n');
        text.push_str(&jd_line(55, "700", 5000, 'D', "20240601", "000", "0000"));

        let report = reconcile_jv_feedback(&ctx, "feedback6.txt", text.as_bytes())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.errors_observed, 0);

        let invoice = store.get_invoice(InvoiceId::new(700)).await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.paid, invoice.total);

        let reference = store.get_latest_reference(InvoiceId::new(700)).await.unwrap().unwrap();
        assert_eq!(reference.status, InvoiceReferenceStatus::Completed);

        let receipt = store
            .get_receipt_by_invoice_and_number(InvoiceId::new(700), &receipt_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(receipt.receipt_amount, Money::new(5000, 2));
    }

    #[tokio::test]
    async fn ap_refund_success_marks_gl_posted_and_failure_rejects_the_slip() {
        let store = Store::new_in_memory();
        store
            .save_ejv_file(&EjvFile {
                id: EjvFileId::new(derive_id("ejv-file:BATCHRF1")),
                file_name: "BATCHRF1".into(),
                file_type: EjvFileKind::Refund,
                status: EjvFileStatus::Uploaded,
                feedback_file_ref: None,
                created_on: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            })
            .await
            .unwrap();
        store
            .save_routing_slip(&RoutingSlip {
                id: feerecon_core::ids::RoutingSlipId::new(1),
                number: "RS0000001".into(),
                payment_account_id: PaymentAccountId(3),
                parent_number: None,
                total: Money::new(10000, 2),
                remaining_amount: Money::ZERO,
                status: RoutingSlipStatus::Active,
                routing_slip_date: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
                gl_posted: None,
            })
            .await
            .unwrap();
        let ctx = ctx(store.clone());

        let mut text = bg_line("BATCHRF1");
        text.push('\n');
        let mut ap = "AAIH".to_string();
        ap.push_str(&" ".repeat(15));
        ap.push_str(&field("RS0000001", 50));
        ap.push_str(&" ".repeat(345));
        ap.push_str(&field("0000", 4));
        ap.push_str(&field("ok", 150));
        text.push_str(&ap);

        let report = reconcile_jv_feedback(&ctx, "feedback7.txt", text.as_bytes())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.ap_headers_processed, 1);
        assert_eq!(report.errors_observed, 0);

        let slip = store.get_routing_slip_by_number("RS0000001").await.unwrap().unwrap();
        assert!(slip.gl_posted.is_some());
    }
}
