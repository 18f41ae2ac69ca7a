//! Supplemented aggregate (SPEC_FULL §3): `PaymentLineItem`/`DistributionCode`
//! rows, needed to build a CFS line-item request and to honor a
//! `stop_ejv` flag during disbursement feedback (§4.9).

use feerecon_core::ids::{DistributionCodeId, InvoiceId};
use feerecon_core::model::{DistributionCode, PaymentLineItem};
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

impl Store {
    pub async fn list_line_items_by_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<PaymentLineItem>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .payment_line_items
                .iter()
                .filter(|li| li.invoice_id == invoice_id)
                .cloned()
                .collect()),
            Backend::Postgres(pool) => sqlx::query_as::<_, LineItemRow>(
                "SELECT id, invoice_id, distribution_code_id, description, filing_fees, gst, \
                 priority_fees, future_effective_fees, service_fees, total \
                 FROM payment_line_items WHERE invoice_id = $1",
            )
            .bind(invoice_id.get())
            .fetch_all(pool)
            .await
            .map(|rows| rows.into_iter().map(LineItemRow::into_domain).collect())
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.6 step 4: the NSF fee invoice's own line item.
    pub async fn save_payment_line_item(&self, item: &PaymentLineItem) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                tables.lock().payment_line_items.push(item.clone());
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO payment_line_items (id, invoice_id, distribution_code_id, description, \
                     filing_fees, gst, priority_fees, future_effective_fees, service_fees, total) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) ON CONFLICT (id) DO NOTHING",
                )
                .bind(item.id.get())
                .bind(item.invoice_id.get())
                .bind(item.distribution_code_id.get())
                .bind(&item.description)
                .bind(item.filing_fees)
                .bind(item.gst)
                .bind(item.priority_fees)
                .bind(item.future_effective_fees)
                .bind(item.service_fees)
                .bind(item.total)
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    pub async fn get_distribution_code(
        &self,
        id: DistributionCodeId,
    ) -> Result<Option<DistributionCode>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                Ok(tables.lock().distribution_codes.iter().find(|d| d.id == id).cloned())
            }
            Backend::Postgres(pool) => sqlx::query_as::<_, DistributionCodeRow>(
                "SELECT id, name, client, responsibility_centre, service_line, stob, \
                 project_code, stop_ejv FROM distribution_codes WHERE id = $1",
            )
            .bind(id.get())
            .fetch_optional(pool)
            .await
            .map(|row| row.map(DistributionCodeRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.9 disbursement-feedback error path: stop a distribution code
    /// from ever being picked up by a future EJV disbursement run.
    pub async fn stop_ejv_for_distribution_code(&self, id: DistributionCodeId) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(code) = tables.distribution_codes.iter_mut().find(|d| d.id == id) {
                    code.stop_ejv = true;
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query("UPDATE distribution_codes SET stop_ejv = true WHERE id = $1")
                    .bind(id.get())
                    .execute(pool)
                    .await
                    .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct LineItemRow {
    id: i64,
    invoice_id: i64,
    distribution_code_id: i64,
    description: String,
    filing_fees: rust_decimal::Decimal,
    gst: rust_decimal::Decimal,
    priority_fees: rust_decimal::Decimal,
    future_effective_fees: rust_decimal::Decimal,
    service_fees: rust_decimal::Decimal,
    total: rust_decimal::Decimal,
}

impl LineItemRow {
    fn into_domain(self) -> PaymentLineItem {
        PaymentLineItem {
            id: feerecon_core::ids::PaymentLineItemId::new(self.id),
            invoice_id: InvoiceId::new(self.invoice_id),
            distribution_code_id: DistributionCodeId::new(self.distribution_code_id),
            description: self.description,
            filing_fees: self.filing_fees,
            gst: self.gst,
            priority_fees: self.priority_fees,
            future_effective_fees: self.future_effective_fees,
            service_fees: self.service_fees,
            total: self.total,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DistributionCodeRow {
    id: i64,
    name: String,
    client: String,
    responsibility_centre: String,
    service_line: String,
    stob: String,
    project_code: String,
    stop_ejv: bool,
}

impl DistributionCodeRow {
    fn into_domain(self) -> DistributionCode {
        DistributionCode {
            id: DistributionCodeId::new(self.id),
            name: self.name,
            client: self.client,
            responsibility_centre: self.responsibility_centre,
            service_line: self.service_line,
            stob: self.stob,
            project_code: self.project_code,
            stop_ejv: self.stop_ejv,
        }
    }
}
