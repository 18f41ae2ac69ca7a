//! CFS deposit receipts (§4.4, §4.6, §4.9). A receipt records the CFS-side
//! `receipt_number` an invoice was paid under; NSF reversal (§4.6 step 3)
//! deletes the receipt that went with the reference it is reverting.

use chrono::{DateTime, Utc};

use feerecon_core::ids::{InvoiceId, ReceiptId};
use feerecon_core::model::Receipt;
use feerecon_core::money::Money;
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

impl Store {
    pub async fn get_receipt_by_invoice_and_number(
        &self,
        invoice_id: InvoiceId,
        receipt_number: &str,
    ) -> Result<Option<Receipt>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .receipts
                .iter()
                .find(|r| r.invoice_id == invoice_id && r.receipt_number == receipt_number)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, ReceiptRow>(
                "SELECT id, invoice_id, receipt_number, receipt_amount, receipt_date \
                 FROM receipts WHERE invoice_id = $1 AND receipt_number = $2",
            )
            .bind(invoice_id.get())
            .bind(receipt_number)
            .fetch_optional(pool)
            .await
            .map(|row| row.map(ReceiptRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_receipt(&self, receipt: &Receipt) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.receipts.iter_mut().find(|r| r.id == receipt.id) {
                    *slot = receipt.clone();
                } else {
                    tables.receipts.push(receipt.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO receipts (id, invoice_id, receipt_number, receipt_amount, receipt_date) \
                     VALUES ($1, $2, $3, $4, $5) \
                     ON CONFLICT (id) DO UPDATE SET receipt_amount = EXCLUDED.receipt_amount",
                )
                .bind(receipt.id.get())
                .bind(receipt.invoice_id.get())
                .bind(&receipt.receipt_number)
                .bind(receipt.receipt_amount)
                .bind(receipt.receipt_date)
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// §4.6 step 3: drop the receipts tied to an invoice's completed
    /// reference(s) when an NSF reverts the invoice back to unsettled.
    pub async fn delete_receipts_by_invoice(&self, invoice_id: InvoiceId) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                tables.lock().receipts.retain(|r| r.invoice_id != invoice_id);
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query("DELETE FROM receipts WHERE invoice_id = $1")
                    .bind(invoice_id.get())
                    .execute(pool)
                    .await
                    .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }
}

pub fn new_receipt(
    id: ReceiptId,
    invoice_id: InvoiceId,
    receipt_number: String,
    receipt_amount: Money,
    receipt_date: DateTime<Utc>,
) -> Receipt {
    Receipt {
        id,
        invoice_id,
        receipt_number,
        receipt_amount,
        receipt_date,
    }
}

#[derive(sqlx::FromRow)]
struct ReceiptRow {
    id: i64,
    invoice_id: i64,
    receipt_number: String,
    receipt_amount: rust_decimal::Decimal,
    receipt_date: DateTime<Utc>,
}

impl ReceiptRow {
    fn into_domain(self) -> Receipt {
        Receipt {
            id: ReceiptId::new(self.id),
            invoice_id: InvoiceId::new(self.invoice_id),
            receipt_number: self.receipt_number,
            receipt_amount: self.receipt_amount,
            receipt_date: self.receipt_date,
        }
    }
}
