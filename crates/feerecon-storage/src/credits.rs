use feerecon_core::ids::{CfsCreditInvoiceId, CreditId, PaymentAccountId};
use feerecon_core::model::{CfsCreditInvoice, Credit};
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

impl Store {
    /// §4.4 second pass: a Credit is created at most once per
    /// `receipt_number`/credit-memo identifier; `cfs_identifier` carries
    /// that number.
    pub async fn get_credit_by_cfs_identifier(
        &self,
        cfs_identifier: &str,
    ) -> Result<Option<Credit>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .credits
                .iter()
                .find(|c| c.cfs_identifier == cfs_identifier)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, CreditRow>(
                "SELECT id, payment_account_id, cfs_identifier, amount, remaining_amount, \
                 is_credit_memo, created_on FROM credits WHERE cfs_identifier = $1",
            )
            .bind(cfs_identifier)
            .fetch_optional(pool)
            .await
            .map(|row| row.map(CreditRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.4 second pass, CMAP rows: idempotent by `application_id`, here
    /// the `CfsCreditInvoice`'s own id (assigned by the caller from the
    /// CAS row's source_txn_no).
    pub async fn has_cfs_credit_invoice(&self, id: CfsCreditInvoiceId) -> Result<bool, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables.lock().cfs_credit_invoices.iter().any(|c| c.id == id)),
            Backend::Postgres(pool) => sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM cfs_credit_invoices WHERE id = $1",
            )
            .bind(id.get())
            .fetch_one(pool)
            .await
            .map(|n| n > 0)
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.4 third pass: amount already applied against a credit, to net
    /// against its CFS-reported receipt amount.
    pub async fn list_cfs_credit_invoices_by_credit(
        &self,
        credit_id: CreditId,
    ) -> Result<Vec<CfsCreditInvoice>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .cfs_credit_invoices
                .iter()
                .filter(|c| c.credit_id == credit_id)
                .cloned()
                .collect()),
            Backend::Postgres(pool) => sqlx::query_as::<_, CfsCreditInvoiceRow>(
                "SELECT id, credit_id, invoice_id, amount_applied FROM cfs_credit_invoices WHERE credit_id = $1",
            )
            .bind(credit_id.get())
            .fetch_all(pool)
            .await
            .map(|rows| rows.into_iter().map(CfsCreditInvoiceRow::into_domain).collect())
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_cfs_credit_invoice(&self, link: &CfsCreditInvoice) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                tables.lock().cfs_credit_invoices.push(link.clone());
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO cfs_credit_invoices (id, credit_id, invoice_id, amount_applied) \
                     VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING",
                )
                .bind(link.id.get())
                .bind(link.credit_id.get())
                .bind(link.invoice_id.get())
                .bind(link.amount_applied)
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// §4.4 third pass: every credit with a positive remaining balance,
    /// due for a CFS re-sync this run.
    pub async fn list_credits_with_remaining(&self) -> Result<Vec<Credit>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .credits
                .iter()
                .filter(|c| c.remaining_amount > rust_decimal::Decimal::ZERO)
                .cloned()
                .collect()),
            Backend::Postgres(pool) => sqlx::query_as::<_, CreditRow>(
                "SELECT id, payment_account_id, cfs_identifier, amount, remaining_amount, \
                 is_credit_memo, created_on FROM credits WHERE remaining_amount > 0",
            )
            .fetch_all(pool)
            .await
            .map(|rows| rows.into_iter().map(CreditRow::into_domain).collect())
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_credit(&self, credit: &Credit) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.credits.iter_mut().find(|c| c.id == credit.id) {
                    *slot = credit.clone();
                } else {
                    tables.credits.push(credit.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO credits (id, payment_account_id, cfs_identifier, amount, remaining_amount, is_credit_memo, created_on) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7) \
                     ON CONFLICT (id) DO UPDATE SET remaining_amount = EXCLUDED.remaining_amount",
                )
                .bind(credit.id.get())
                .bind(credit.payment_account_id.get())
                .bind(&credit.cfs_identifier)
                .bind(credit.amount)
                .bind(credit.remaining_amount)
                .bind(credit.is_credit_memo)
                .bind(credit.created_on)
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// §4.4: roll remaining credit up per account, split by which CFS site
    /// (PAD vs OB) it was discovered on.
    pub async fn rollup_account_credit(
        &self,
        payment_account_id: PaymentAccountId,
        pad_site_credits: &[CreditId],
    ) -> Result<(rust_decimal::Decimal, rust_decimal::Decimal), ReconcileError> {
        let credits = self.list_credits_with_remaining().await?;
        let mut pad = rust_decimal::Decimal::ZERO;
        let mut ob = rust_decimal::Decimal::ZERO;
        for credit in credits.iter().filter(|c| c.payment_account_id == payment_account_id) {
            if pad_site_credits.contains(&credit.id) {
                pad += credit.remaining_amount;
            } else {
                ob += credit.remaining_amount;
            }
        }
        Ok((pad, ob))
    }
}

#[derive(sqlx::FromRow)]
struct CfsCreditInvoiceRow {
    id: i64,
    credit_id: i64,
    invoice_id: i64,
    amount_applied: rust_decimal::Decimal,
}

impl CfsCreditInvoiceRow {
    fn into_domain(self) -> CfsCreditInvoice {
        CfsCreditInvoice {
            id: CfsCreditInvoiceId::new(self.id),
            credit_id: CreditId::new(self.credit_id),
            invoice_id: feerecon_core::ids::InvoiceId::new(self.invoice_id),
            amount_applied: self.amount_applied,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CreditRow {
    id: i64,
    payment_account_id: i64,
    cfs_identifier: String,
    amount: rust_decimal::Decimal,
    remaining_amount: rust_decimal::Decimal,
    is_credit_memo: bool,
    created_on: chrono::DateTime<chrono::Utc>,
}

impl CreditRow {
    fn into_domain(self) -> Credit {
        Credit {
            id: CreditId::new(self.id),
            payment_account_id: PaymentAccountId::new(self.payment_account_id),
            cfs_identifier: self.cfs_identifier,
            amount: self.amount,
            remaining_amount: self.remaining_amount,
            is_credit_memo: self.is_credit_memo,
            created_on: self.created_on,
        }
    }
}
