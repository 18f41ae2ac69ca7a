use feerecon_core::ids::{CfsAccountId, PaymentAccountId};
use feerecon_core::model::{CfsAccount, CfsAccountStatus, PaymentMethod};
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

impl Store {
    /// §3 invariant: at most one effective (ACTIVE ∪ FREEZE) row per
    /// (account, payment method).
    pub async fn get_effective_cfs_account(
        &self,
        payment_account_id: PaymentAccountId,
        _method: PaymentMethod,
    ) -> Result<Option<CfsAccount>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .cfs_accounts
                .iter()
                .find(|a| a.payment_account_id == payment_account_id && a.status.is_effective())
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, CfsAccountRow>(
                "SELECT id, payment_account_id, cfs_party, cfs_site, cfs_account, status \
                 FROM cfs_accounts WHERE payment_account_id = $1 AND status IN ('ACTIVE', 'FREEZE')",
            )
            .bind(payment_account_id.get())
            .fetch_optional(pool)
            .await
            .map(|row| row.map(CfsAccountRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.4 step 1: a CAS row identifies its account by the CFS customer
    /// account number, not by `payment_account_id`.
    pub async fn get_cfs_account_by_number(
        &self,
        cfs_account: &str,
    ) -> Result<Option<CfsAccount>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .cfs_accounts
                .iter()
                .find(|a| a.cfs_account == cfs_account)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, CfsAccountRow>(
                "SELECT id, payment_account_id, cfs_party, cfs_site, cfs_account, status \
                 FROM cfs_accounts WHERE cfs_account = $1",
            )
            .bind(cfs_account)
            .fetch_optional(pool)
            .await
            .map(|row| row.map(CfsAccountRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_cfs_account(&self, account: &CfsAccount) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.cfs_accounts.iter_mut().find(|a| a.id == account.id) {
                    *slot = account.clone();
                } else {
                    tables.cfs_accounts.push(account.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query("UPDATE cfs_accounts SET status = $1 WHERE id = $2")
                    .bind(account.status.as_code())
                    .bind(account.id.get())
                    .execute(pool)
                    .await
                    .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    pub async fn freeze_cfs_account(&self, id: CfsAccountId) -> Result<(), ReconcileError> {
        let mut account = match self.backend.as_ref() {
            Backend::Memory(tables) => tables
                .lock()
                .cfs_accounts
                .iter()
                .find(|a| a.id == id)
                .cloned()
                .ok_or_else(|| ReconcileError::validation(format!("no cfs_account {id}")))?,
            Backend::Postgres(pool) => sqlx::query_as::<_, CfsAccountRow>(
                "SELECT id, payment_account_id, cfs_party, cfs_site, cfs_account, status FROM cfs_accounts WHERE id = $1",
            )
            .bind(id.get())
            .fetch_one(pool)
            .await
            .map(CfsAccountRow::into_domain)
            .map_err(|e| ReconcileError::Storage(e.to_string()))?,
        };
        account.status = CfsAccountStatus::Freeze;
        self.save_cfs_account(&account).await
    }
}

#[derive(sqlx::FromRow)]
struct CfsAccountRow {
    id: i64,
    payment_account_id: i64,
    cfs_party: String,
    cfs_site: String,
    cfs_account: String,
    status: String,
}

impl CfsAccountRow {
    fn into_domain(self) -> CfsAccount {
        CfsAccount {
            id: CfsAccountId::new(self.id),
            payment_account_id: PaymentAccountId::new(self.payment_account_id),
            cfs_party: self.cfs_party,
            cfs_site: self.cfs_site,
            cfs_account: self.cfs_account,
            status: match self.status.as_str() {
                "ACTIVE" => CfsAccountStatus::Active,
                "INACTIVE" => CfsAccountStatus::Inactive,
                "FREEZE" => CfsAccountStatus::Freeze,
                _ => CfsAccountStatus::Pending,
            },
        }
    }
}
