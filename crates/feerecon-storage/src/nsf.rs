use feerecon_core::model::NonSufficientFunds;
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

impl Store {
    /// §4.6 idempotency trip: a duplicate NSF row for an already-frozen
    /// account is a no-op.
    pub async fn has_nsf_event_for_invoice(
        &self,
        invoice_id: feerecon_core::ids::InvoiceId,
    ) -> Result<bool, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables.lock().nsf_events.iter().any(|n| n.invoice_id == invoice_id)),
            Backend::Postgres(pool) => sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM non_sufficient_funds WHERE invoice_id = $1",
            )
            .bind(invoice_id.get())
            .fetch_one(pool)
            .await
            .map(|n| n > 0)
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn insert_nsf_event(&self, event: &NonSufficientFunds) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                tables.lock().nsf_events.push(event.clone());
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO non_sufficient_funds (id, invoice_id, payment_account_id, nsf_fee, created_on) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(event.id.get())
                .bind(event.invoice_id.get())
                .bind(event.payment_account_id.get())
                .bind(event.nsf_fee)
                .bind(event.created_on)
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }
}
