use feerecon_core::ids::{InvoiceId, InvoiceReferenceId};
use feerecon_core::model::{InvoiceReference, InvoiceReferenceStatus};
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

impl Store {
    /// §3 invariant: at most one ACTIVE reference per invoice.
    pub async fn get_active_reference(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Option<InvoiceReference>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .invoice_references
                .iter()
                .find(|r| r.invoice_id == invoice_id && r.status == InvoiceReferenceStatus::Active)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, ReferenceRow>(
                "SELECT id, invoice_id, invoice_number, reference_number, status \
                 FROM invoice_references WHERE invoice_id = $1 AND status = 'ACTIVE'",
            )
            .bind(invoice_id.get())
            .fetch_optional(pool)
            .await
            .map(|row| row.map(ReferenceRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// The most recently saved reference for this invoice regardless of
    /// status; used where the caller already knows the invoice has moved
    /// past ACTIVE (e.g. reversing a COMPLETED reference).
    pub async fn get_latest_reference(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Option<InvoiceReference>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .invoice_references
                .iter()
                .filter(|r| r.invoice_id == invoice_id)
                .last()
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, ReferenceRow>(
                "SELECT id, invoice_id, invoice_number, reference_number, status \
                 FROM invoice_references WHERE invoice_id = $1 ORDER BY id DESC LIMIT 1",
            )
            .bind(invoice_id.get())
            .fetch_optional(pool)
            .await
            .map(|row| row.map(ReferenceRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.4: CAS rows key off the CFS invoice_number, not our InvoiceId;
    /// resolve the ACTIVE reference for a number to find the invoice.
    pub async fn get_active_reference_by_number(
        &self,
        invoice_number: &str,
    ) -> Result<Option<InvoiceReference>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .invoice_references
                .iter()
                .find(|r| r.invoice_number == invoice_number && r.status == InvoiceReferenceStatus::Active)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, ReferenceRow>(
                "SELECT id, invoice_id, invoice_number, reference_number, status \
                 FROM invoice_references WHERE invoice_number = $1 AND status = 'ACTIVE'",
            )
            .bind(invoice_number)
            .fetch_optional(pool)
            .await
            .map(|row| row.map(ReferenceRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.6 step 3: every COMPLETED reference for this invoice_number, to
    /// be reverted to ACTIVE as part of the NSF flow.
    pub async fn list_completed_references_by_number(
        &self,
        invoice_number: &str,
    ) -> Result<Vec<InvoiceReference>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .invoice_references
                .iter()
                .filter(|r| r.invoice_number == invoice_number && r.status == InvoiceReferenceStatus::Completed)
                .cloned()
                .collect()),
            Backend::Postgres(pool) => sqlx::query_as::<_, ReferenceRow>(
                "SELECT id, invoice_id, invoice_number, reference_number, status \
                 FROM invoice_references WHERE invoice_number = $1 AND status = 'COMPLETED'",
            )
            .bind(invoice_number)
            .fetch_all(pool)
            .await
            .map(|rows| rows.into_iter().map(ReferenceRow::into_domain).collect())
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_reference(&self, reference: &InvoiceReference) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables
                    .invoice_references
                    .iter_mut()
                    .find(|r| r.id == reference.id)
                {
                    *slot = reference.clone();
                } else {
                    tables.invoice_references.push(reference.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                // §4.1/§5: reference status flips are the first named hotspot;
                // lock the parent invoice row for the duration of the flip so
                // two concurrent task runs can't both observe the same ACTIVE
                // reference and race each other to COMPLETED.
                let mut tx = pool.begin().await.map_err(|e| ReconcileError::Storage(e.to_string()))?;
                sqlx::query("SELECT id FROM invoices WHERE id = $1 FOR UPDATE")
                    .bind(reference.invoice_id.get())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                sqlx::query(
                    "INSERT INTO invoice_references (id, invoice_id, invoice_number, reference_number, status) \
                     VALUES ($1, $2, $3, $4, $5) \
                     ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, reference_number = EXCLUDED.reference_number",
                )
                .bind(reference.id.get())
                .bind(reference.invoice_id.get())
                .bind(&reference.invoice_number)
                .bind(&reference.reference_number)
                .bind(reference.status.as_code())
                .execute(&mut *tx)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                tx.commit().await.map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReferenceRow {
    id: i64,
    invoice_id: i64,
    invoice_number: String,
    reference_number: Option<String>,
    status: String,
}

impl ReferenceRow {
    fn into_domain(self) -> InvoiceReference {
        InvoiceReference {
            id: InvoiceReferenceId::new(self.id),
            invoice_id: InvoiceId::new(self.invoice_id),
            invoice_number: self.invoice_number,
            reference_number: self.reference_number,
            status: match self.status.as_str() {
                "COMPLETED" => InvoiceReferenceStatus::Completed,
                "CANCELLED" => InvoiceReferenceStatus::Cancelled,
                _ => InvoiceReferenceStatus::Active,
            },
        }
    }
}
