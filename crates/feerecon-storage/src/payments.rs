//! CFS-originated payment rows (§4.4 EFTP pre-created payments, §4.6's
//! duplicate-NSF-event guard, §4.9's ministry EJV payments).

use feerecon_core::ids::{InvoiceId, PaymentId};
use feerecon_core::model::{Payment, PaymentStatus};
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

impl Store {
    pub async fn get_payment_by_invoice_number(
        &self,
        invoice_number: &str,
    ) -> Result<Option<Payment>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .payments
                .iter()
                .find(|p| p.invoice_number == invoice_number)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, PaymentRow>(
                "SELECT id, payment_account_id, invoice_id, payment_method_code, invoice_number, \
                 amount, status, payment_date FROM payments WHERE invoice_number = $1",
            )
            .bind(invoice_number)
            .fetch_optional(pool)
            .await
            .map(|row| row.map(PaymentRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.6 precondition 1: a FAILED payment already recorded for this
    /// invoice_number means the NSF event was already processed.
    pub async fn has_failed_payment_for_invoice_number(
        &self,
        invoice_number: &str,
    ) -> Result<bool, ReconcileError> {
        Ok(self
            .get_payment_by_invoice_number(invoice_number)
            .await?
            .is_some_and(|p| p.status == PaymentStatus::Failed))
    }

    pub async fn save_payment(&self, payment: &Payment) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.payments.iter_mut().find(|p| p.id == payment.id) {
                    *slot = payment.clone();
                } else {
                    tables.payments.push(payment.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO payments (id, payment_account_id, invoice_id, payment_method_code, \
                     invoice_number, amount, status, payment_date) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                     ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, payment_date = EXCLUDED.payment_date",
                )
                .bind(payment.id.get())
                .bind(payment.payment_account_id.get())
                .bind(payment.invoice_id.map(|id| id.get()))
                .bind(payment.payment_method_code.as_code())
                .bind(&payment.invoice_number)
                .bind(payment.amount)
                .bind(payment.status.as_code())
                .bind(payment.payment_date)
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    payment_account_id: i64,
    invoice_id: Option<i64>,
    payment_method_code: String,
    invoice_number: String,
    amount: rust_decimal::Decimal,
    status: String,
    payment_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl PaymentRow {
    fn into_domain(self) -> Payment {
        Payment {
            id: PaymentId::new(self.id),
            payment_account_id: feerecon_core::ids::PaymentAccountId::new(self.payment_account_id),
            invoice_id: self.invoice_id.map(InvoiceId::new),
            payment_method_code: match self.payment_method_code.as_str() {
                "PAD" => feerecon_core::model::PaymentMethod::Pad,
                "EFT" => feerecon_core::model::PaymentMethod::Eft,
                "ONLINE_BANKING" => feerecon_core::model::PaymentMethod::OnlineBanking,
                "INTERNAL" => feerecon_core::model::PaymentMethod::Internal,
                "DRAWDOWN" => feerecon_core::model::PaymentMethod::Drawdown,
                "EJV" => feerecon_core::model::PaymentMethod::Ejv,
                _ => feerecon_core::model::PaymentMethod::CreditCard,
            },
            invoice_number: self.invoice_number,
            amount: self.amount,
            status: match self.status.as_str() {
                "COMPLETED" => PaymentStatus::Completed,
                "FAILED" => PaymentStatus::Failed,
                _ => PaymentStatus::Created,
            },
            payment_date: self.payment_date,
        }
    }
}
