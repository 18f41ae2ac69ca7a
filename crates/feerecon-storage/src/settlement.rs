//! Settlement-file idempotency rows (§4.4, §4.7, §5). A filename is the
//! unique key: a file already marked COMPLETED (or, for TDI17, already
//! IN_PROGRESS) on re-delivery is a no-op for the reconciler that owns it.

use feerecon_core::ids::{CasSettlementId, EftFileId};
use feerecon_core::model::{CasSettlement, EftFile, SettlementFileStatus};
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

fn status_from_code(code: &str) -> SettlementFileStatus {
    match code {
        "COMPLETED" => SettlementFileStatus::Completed,
        "FAILED" => SettlementFileStatus::Failed,
        _ => SettlementFileStatus::InProgress,
    }
}

fn status_code(status: SettlementFileStatus) -> &'static str {
    match status {
        SettlementFileStatus::InProgress => "IN_PROGRESS",
        SettlementFileStatus::Completed => "COMPLETED",
        SettlementFileStatus::Failed => "FAILED",
    }
}

impl Store {
    pub async fn get_cas_settlement_by_filename(
        &self,
        file_name: &str,
    ) -> Result<Option<CasSettlement>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .cas_settlements
                .iter()
                .find(|f| f.file_name == file_name)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, CasSettlementRow>(
                "SELECT id, file_name, status, received_on FROM cas_settlements WHERE file_name = $1",
            )
            .bind(file_name)
            .fetch_optional(pool)
            .await
            .map(|row| row.map(CasSettlementRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_cas_settlement(&self, settlement: &CasSettlement) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.cas_settlements.iter_mut().find(|f| f.id == settlement.id) {
                    *slot = settlement.clone();
                } else {
                    tables.cas_settlements.push(settlement.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO cas_settlements (id, file_name, status, received_on) VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status",
                )
                .bind(settlement.id.get())
                .bind(&settlement.file_name)
                .bind(status_code(settlement.status))
                .bind(settlement.received_on)
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    pub async fn get_eft_file_by_filename(&self, file_name: &str) -> Result<Option<EftFile>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .eft_files
                .iter()
                .find(|f| f.file_name == file_name)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, EftFileRow>(
                "SELECT id, file_name, status, received_on FROM eft_files WHERE file_name = $1",
            )
            .bind(file_name)
            .fetch_optional(pool)
            .await
            .map(|row| row.map(EftFileRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_eft_file(&self, file: &EftFile) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.eft_files.iter_mut().find(|f| f.id == file.id) {
                    *slot = file.clone();
                } else {
                    tables.eft_files.push(file.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO eft_files (id, file_name, status, received_on) VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status",
                )
                .bind(file.id.get())
                .bind(&file.file_name)
                .bind(status_code(file.status))
                .bind(file.received_on)
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct CasSettlementRow {
    id: i64,
    file_name: String,
    status: String,
    received_on: chrono::DateTime<chrono::Utc>,
}

impl CasSettlementRow {
    fn into_domain(self) -> CasSettlement {
        CasSettlement {
            id: CasSettlementId::new(self.id),
            file_name: self.file_name,
            status: status_from_code(&self.status),
            received_on: self.received_on,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EftFileRow {
    id: i64,
    file_name: String,
    status: String,
    received_on: chrono::DateTime<chrono::Utc>,
}

impl EftFileRow {
    fn into_domain(self) -> EftFile {
        EftFile {
            id: EftFileId::new(self.id),
            file_name: self.file_name,
            status: status_from_code(&self.status),
            received_on: self.received_on,
        }
    }
}
