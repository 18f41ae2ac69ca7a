//! EJV file/header/link persistence is append-mostly (§4.9): headers and
//! links are created once per dispatch batch and then updated in place as
//! feedback files post back a `disbursement_status_code`.

use feerecon_core::ids::{EjvFileId, EjvHeaderId, EjvLinkId, InvoiceId, PartnerDisbursementId};
use feerecon_core::model::{EjvFile, EjvFileKind, EjvFileStatus, EjvHeader, EjvLink, PartnerDisbursement};
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

impl Store {
    pub async fn save_ejv_link(&self, link: &EjvLink) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.ejv_links.iter_mut().find(|l| l.id == link.id) {
                    *slot = link.clone();
                } else {
                    tables.ejv_links.push(link.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "UPDATE ejv_link_transactions SET disbursement_status_code = $1 WHERE id = $2",
                )
                .bind(&link.disbursement_status_code)
                .bind(link.id.get())
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    pub async fn get_ejv_link(&self, id: EjvLinkId) -> Result<Option<EjvLink>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables.lock().ejv_links.iter().find(|l| l.id == id).cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, EjvLinkRow>(
                "SELECT id, ejv_header_id, invoice_id, sequence, disbursement_status_code \
                 FROM ejv_link_transactions WHERE id = $1",
            )
            .bind(id.get())
            .fetch_optional(pool)
            .await
            .map(|row| row.map(EjvLinkRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.9 JD line: resolve a flowthrough's invoice_id against one header
    /// to find the EjvLink it was created against.
    pub async fn find_ejv_link(
        &self,
        ejv_header_id: EjvHeaderId,
        invoice_id: InvoiceId,
    ) -> Result<Option<EjvLink>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .ejv_links
                .iter()
                .find(|l| l.ejv_header_id == ejv_header_id && l.invoice_id == invoice_id)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, EjvLinkRow>(
                "SELECT id, ejv_header_id, invoice_id, sequence, disbursement_status_code \
                 FROM ejv_link_transactions WHERE ejv_header_id = $1 AND invoice_id = $2",
            )
            .bind(ejv_header_id.get())
            .bind(invoice_id.get())
            .fetch_optional(pool)
            .await
            .map(|row| row.map(EjvLinkRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.9 BG line: a batch_number doubles as the EjvFile's filename for
    /// lookup purposes in this workspace (the source keys this off a
    /// numeric file id carried separately in the feedback channel; that
    /// channel metadata is out of scope here, so the batch_number recorded
    /// at dispatch time is reused as the join key).
    pub async fn get_ejv_file_by_batch_number(
        &self,
        batch_number: &str,
    ) -> Result<Option<EjvFile>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .ejv_files
                .iter()
                .find(|f| f.file_name == batch_number)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, EjvFileRow>(
                "SELECT id, file_name, file_type, status, feedback_file_ref, created_on \
                 FROM ejv_files WHERE file_name = $1",
            )
            .bind(batch_number)
            .fetch_optional(pool)
            .await
            .map(|row| row.map(EjvFileRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_ejv_file(&self, file: &EjvFile) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.ejv_files.iter_mut().find(|f| f.id == file.id) {
                    *slot = file.clone();
                } else {
                    tables.ejv_files.push(file.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO ejv_files (id, file_name, file_type, status, feedback_file_ref, created_on) \
                     VALUES ($1, $2, $3, $4, $5, $6) \
                     ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, feedback_file_ref = EXCLUDED.feedback_file_ref",
                )
                .bind(file.id.get())
                .bind(&file.file_name)
                .bind(file_type_code(file.file_type))
                .bind(status_code(file.status))
                .bind(&file.feedback_file_ref)
                .bind(file.created_on)
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// §4.9 BG line: claim the file for this feedback delivery and report
    /// whether it was already claimed, as one atomic step. Returns `true`
    /// if this call performed the claim (the batch should be processed),
    /// `false` if another delivery already claimed it (skip, idempotent).
    pub async fn claim_ejv_feedback(
        &self,
        ejv_file_id: EjvFileId,
        feedback_file_ref: &str,
    ) -> Result<bool, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                let Some(file) = tables.ejv_files.iter_mut().find(|f| f.id == ejv_file_id) else {
                    return Err(ReconcileError::validation(format!("no ejv_file {ejv_file_id}")));
                };
                if file.feedback_file_ref.is_some() {
                    return Ok(false);
                }
                file.feedback_file_ref = Some(feedback_file_ref.to_string());
                Ok(true)
            }
            Backend::Postgres(pool) => {
                let claimed = sqlx::query(
                    "UPDATE ejv_files SET feedback_file_ref = $1 \
                     WHERE id = $2 AND feedback_file_ref IS NULL",
                )
                .bind(feedback_file_ref)
                .bind(ejv_file_id.get())
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(claimed.rows_affected() > 0)
            }
        }
    }

    pub async fn get_ejv_header(&self, id: EjvHeaderId) -> Result<Option<EjvHeader>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables.lock().ejv_headers.iter().find(|h| h.id == id).cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, EjvHeaderRow>(
                "SELECT id, ejv_file_id, kind, sequence, disbursement_status_code FROM ejv_headers WHERE id = $1",
            )
            .bind(id.get())
            .fetch_optional(pool)
            .await
            .map(|row| row.map(EjvHeaderRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_ejv_header(&self, header: &EjvHeader) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.ejv_headers.iter_mut().find(|h| h.id == header.id) {
                    *slot = header.clone();
                } else {
                    tables.ejv_headers.push(header.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query("UPDATE ejv_headers SET disbursement_status_code = $1 WHERE id = $2")
                    .bind(&header.disbursement_status_code)
                    .bind(header.id.get())
                    .execute(pool)
                    .await
                    .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    pub async fn get_partner_disbursement_by_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Option<PartnerDisbursement>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .partner_disbursements
                .iter()
                .find(|d| d.invoice_id == invoice_id)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, PartnerDisbursementRow>(
                "SELECT id, invoice_id, target_type, is_reversal, status_code \
                 FROM partner_disbursements WHERE invoice_id = $1",
            )
            .bind(invoice_id.get())
            .fetch_optional(pool)
            .await
            .map(|row| row.map(PartnerDisbursementRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_partner_disbursement(&self, d: &PartnerDisbursement) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.partner_disbursements.iter_mut().find(|x| x.id == d.id) {
                    *slot = d.clone();
                } else {
                    tables.partner_disbursements.push(d.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query("UPDATE partner_disbursements SET status_code = $1 WHERE id = $2")
                    .bind(&d.status_code)
                    .bind(d.id.get())
                    .execute(pool)
                    .await
                    .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }
}

fn status_code(status: EjvFileStatus) -> &'static str {
    match status {
        EjvFileStatus::InProgress => "IN_PROGRESS",
        EjvFileStatus::Uploaded => "UPLOADED",
        EjvFileStatus::Completed => "COMPLETED",
        EjvFileStatus::Failed => "FAILED",
    }
}

fn status_from_code(code: &str) -> EjvFileStatus {
    match code {
        "UPLOADED" => EjvFileStatus::Uploaded,
        "COMPLETED" => EjvFileStatus::Completed,
        "FAILED" => EjvFileStatus::Failed,
        _ => EjvFileStatus::InProgress,
    }
}

fn file_type_code(kind: EjvFileKind) -> &'static str {
    match kind {
        EjvFileKind::Payment => "PAYMENT",
        EjvFileKind::Disbursement => "DISBURSEMENT",
        EjvFileKind::Refund => "REFUND",
        EjvFileKind::EftRefund => "EFT_REFUND",
        EjvFileKind::OtherDisbursement => "NON_GOVT_DISBURSEMENT",
    }
}

fn file_type_from_code(code: &str) -> EjvFileKind {
    match code {
        "DISBURSEMENT" => EjvFileKind::Disbursement,
        "REFUND" => EjvFileKind::Refund,
        "EFT_REFUND" => EjvFileKind::EftRefund,
        "NON_GOVT_DISBURSEMENT" => EjvFileKind::OtherDisbursement,
        _ => EjvFileKind::Payment,
    }
}

#[derive(sqlx::FromRow)]
struct EjvLinkRow {
    id: i64,
    ejv_header_id: i64,
    invoice_id: i64,
    sequence: i64,
    disbursement_status_code: Option<String>,
}

impl EjvLinkRow {
    fn into_domain(self) -> EjvLink {
        EjvLink {
            id: EjvLinkId::new(self.id),
            ejv_header_id: EjvHeaderId::new(self.ejv_header_id),
            invoice_id: InvoiceId::new(self.invoice_id),
            sequence: self.sequence,
            disbursement_status_code: self.disbursement_status_code,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EjvFileRow {
    id: i64,
    file_name: String,
    file_type: String,
    status: String,
    feedback_file_ref: Option<String>,
    created_on: chrono::DateTime<chrono::Utc>,
}

impl EjvFileRow {
    fn into_domain(self) -> EjvFile {
        EjvFile {
            id: EjvFileId::new(self.id),
            file_name: self.file_name,
            file_type: file_type_from_code(&self.file_type),
            status: status_from_code(&self.status),
            feedback_file_ref: self.feedback_file_ref,
            created_on: self.created_on,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EjvHeaderRow {
    id: i64,
    ejv_file_id: i64,
    kind: String,
    sequence: i64,
    disbursement_status_code: Option<String>,
}

impl EjvHeaderRow {
    fn into_domain(self) -> EjvHeader {
        EjvHeader {
            id: EjvHeaderId::new(self.id),
            ejv_file_id: EjvFileId::new(self.ejv_file_id),
            kind: match self.kind.as_str() {
                "REFUND" => feerecon_core::model::EjvHeaderKind::Refund,
                _ => feerecon_core::model::EjvHeaderKind::Payment,
            },
            sequence: self.sequence,
            disbursement_status_code: self.disbursement_status_code,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PartnerDisbursementRow {
    id: i64,
    invoice_id: i64,
    target_type: String,
    is_reversal: bool,
    status_code: String,
}

impl PartnerDisbursementRow {
    fn into_domain(self) -> PartnerDisbursement {
        PartnerDisbursement {
            id: PartnerDisbursementId::new(self.id),
            invoice_id: InvoiceId::new(self.invoice_id),
            target_type: match self.target_type.as_str() {
                "PARTIAL_REFUND" => feerecon_core::model::PartnerDisbursementTargetType::PartialRefund,
                _ => feerecon_core::model::PartnerDisbursementTargetType::Invoice,
            },
            is_reversal: self.is_reversal,
            status_code: self.status_code,
        }
    }
}
