use feerecon_core::ids::PaymentAccountId;
use feerecon_core::model::PaymentAccount;
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

impl Store {
    pub async fn get_payment_account(
        &self,
        id: PaymentAccountId,
    ) -> Result<Option<PaymentAccount>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                Ok(tables.lock().payment_accounts.iter().find(|a| a.id == id).cloned())
            }
            Backend::Postgres(pool) => sqlx::query_as::<_, PaymentAccountRow>(
                "SELECT id, auth_account_id, name, pad_credit, ob_credit, eft_credit, \
                 has_nsf_invoices, has_overdue_invoices, pad_activation_date \
                 FROM payment_accounts WHERE id = $1",
            )
            .bind(id.get())
            .fetch_optional(pool)
            .await
            .map(|row| row.map(PaymentAccountRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_payment_account(&self, account: &PaymentAccount) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.payment_accounts.iter_mut().find(|a| a.id == account.id) {
                    *slot = account.clone();
                } else {
                    tables.payment_accounts.push(account.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                // §4.1/§5: credit rollups are the second named hotspot;
                // lock the account row for the read-modify-write so two
                // concurrent settlement files crediting the same account
                // can't both read the pre-update balance.
                let mut tx = pool.begin().await.map_err(|e| ReconcileError::Storage(e.to_string()))?;
                sqlx::query("SELECT id FROM payment_accounts WHERE id = $1 FOR UPDATE")
                    .bind(account.id.get())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                sqlx::query(
                    "UPDATE payment_accounts SET pad_credit = $1, ob_credit = $2, eft_credit = $3, \
                     has_nsf_invoices = $4, has_overdue_invoices = $5, pad_activation_date = $6 \
                     WHERE id = $7",
                )
                .bind(account.pad_credit)
                .bind(account.ob_credit)
                .bind(account.eft_credit)
                .bind(account.has_nsf_invoices)
                .bind(account.has_overdue_invoices)
                .bind(account.pad_activation_date)
                .bind(account.id.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                tx.commit().await.map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// §4.8 `unlock_overdue_accounts`: accounts flagged overdue pending a
    /// `has_overdue_invoices` re-check after an EFT credit link clears them.
    pub async fn list_overdue_flagged_accounts(&self) -> Result<Vec<PaymentAccount>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .payment_accounts
                .iter()
                .filter(|a| a.has_overdue_invoices.is_some())
                .cloned()
                .collect()),
            Backend::Postgres(pool) => sqlx::query_as::<_, PaymentAccountRow>(
                "SELECT id, auth_account_id, name, pad_credit, ob_credit, eft_credit, \
                 has_nsf_invoices, has_overdue_invoices, pad_activation_date \
                 FROM payment_accounts WHERE has_overdue_invoices IS NOT NULL",
            )
            .fetch_all(pool)
            .await
            .map(|rows| rows.into_iter().map(PaymentAccountRow::into_domain).collect())
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentAccountRow {
    id: i64,
    auth_account_id: String,
    name: String,
    pad_credit: rust_decimal::Decimal,
    ob_credit: rust_decimal::Decimal,
    eft_credit: rust_decimal::Decimal,
    has_nsf_invoices: Option<chrono::DateTime<chrono::Utc>>,
    has_overdue_invoices: Option<chrono::DateTime<chrono::Utc>>,
    pad_activation_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl PaymentAccountRow {
    fn into_domain(self) -> PaymentAccount {
        PaymentAccount {
            id: PaymentAccountId::new(self.id),
            auth_account_id: self.auth_account_id,
            name: self.name,
            pad_credit: self.pad_credit,
            ob_credit: self.ob_credit,
            eft_credit: self.eft_credit,
            has_nsf_invoices: self.has_nsf_invoices,
            has_overdue_invoices: self.has_overdue_invoices,
            pad_activation_date: self.pad_activation_date,
        }
    }
}
