use std::collections::HashMap;

use feerecon_core::ids::{EftCreditId, EftCreditInvoiceLinkId, EftShortNameId, EftShortNameLinkId, InvoiceId};
use feerecon_core::model::{
    EftCredit, EftCreditInvoiceLink, EftCreditInvoiceLinkRollup, EftCreditInvoiceLinkStatus,
    EftShortName, EftShortNameLink, EftShortNameLinkStatus,
};
use feerecon_core::ReconcileError;

use crate::backend::Backend;
use crate::Store;

impl Store {
    pub async fn get_short_name(&self, id: EftShortNameId) -> Result<Option<EftShortName>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                Ok(tables.lock().eft_short_names.iter().find(|s| s.id == id).cloned())
            }
            Backend::Postgres(pool) => sqlx::query_as::<_, ShortNameRow>(
                "SELECT id, short_name, linked_account_id FROM eft_short_names WHERE id = $1",
            )
            .bind(id.get())
            .fetch_optional(pool)
            .await
            .map(|row| row.map(ShortNameRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.7 phase B: a TDI17 detail's short name field is the sole key;
    /// first deposit from a given name creates the row.
    pub async fn get_short_name_by_name(&self, short_name: &str) -> Result<Option<EftShortName>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .eft_short_names
                .iter()
                .find(|s| s.short_name == short_name)
                .cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, ShortNameRow>(
                "SELECT id, short_name, linked_account_id FROM eft_short_names WHERE short_name = $1",
            )
            .bind(short_name)
            .fetch_optional(pool)
            .await
            .map(|row| row.map(ShortNameRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_short_name(&self, short_name: &EftShortName) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.eft_short_names.iter_mut().find(|s| s.id == short_name.id) {
                    *slot = short_name.clone();
                } else {
                    tables.eft_short_names.push(short_name.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO eft_short_names (id, short_name, linked_account_id) VALUES ($1, $2, $3) \
                     ON CONFLICT (id) DO UPDATE SET linked_account_id = EXCLUDED.linked_account_id",
                )
                .bind(short_name.id.get())
                .bind(&short_name.short_name)
                .bind(short_name.linked_account_id.map(|a| a.get()))
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// Active link rows for a short name, used by §4.7 phase C to find the
    /// payment accounts a deposit's credit should be applied against.
    pub async fn list_links_by_short_name(
        &self,
        short_name_id: EftShortNameId,
    ) -> Result<Vec<EftShortNameLink>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .eft_short_name_links
                .iter()
                .filter(|l| l.short_name_id == short_name_id && l.status == EftShortNameLinkStatus::Linked)
                .cloned()
                .collect()),
            Backend::Postgres(pool) => sqlx::query_as::<_, ShortNameLinkRow>(
                "SELECT id, short_name_id, payment_account_id, status \
                 FROM eft_short_name_links WHERE short_name_id = $1 AND status = 'LINKED'",
            )
            .bind(short_name_id.get())
            .fetch_all(pool)
            .await
            .map(|rows| rows.into_iter().map(ShortNameLinkRow::into_domain).collect())
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.7 phase B: one EFTCredit per (short name, TDI17 transaction) —
    /// looking it up before inserting makes re-processing the same file a
    /// no-op rather than a duplicate deposit.
    pub async fn get_eft_credit(&self, id: EftCreditId) -> Result<Option<EftCredit>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables.lock().eft_credits.iter().find(|c| c.id == id).cloned()),
            Backend::Postgres(pool) => sqlx::query_as::<_, EftCreditRow>(
                "SELECT id, short_name_id, amount, remaining_amount, deposit_date FROM eft_credits WHERE id = $1",
            )
            .bind(id.get())
            .fetch_optional(pool)
            .await
            .map(|row| row.map(EftCreditRow::into_domain))
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    pub async fn save_eft_credit(&self, credit: &EftCredit) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.eft_credits.iter_mut().find(|c| c.id == credit.id) {
                    *slot = credit.clone();
                } else {
                    tables.eft_credits.push(credit.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO eft_credits (id, short_name_id, amount, remaining_amount, deposit_date) \
                     VALUES ($1, $2, $3, $4, $5) \
                     ON CONFLICT (id) DO UPDATE SET remaining_amount = EXCLUDED.remaining_amount",
                )
                .bind(credit.id.get())
                .bind(credit.short_name_id.get())
                .bind(credit.amount)
                .bind(credit.remaining_amount)
                .bind(credit.deposit_date)
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// Short-name-to-account linking itself (the workflow that turns a
    /// PENDING link into LINKED after manual review) lives outside §4.7;
    /// this is the row-level write it eventually calls.
    pub async fn save_short_name_link(&self, link: &EftShortNameLink) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.eft_short_name_links.iter_mut().find(|l| l.id == link.id) {
                    *slot = link.clone();
                } else {
                    tables.eft_short_name_links.push(link.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    "INSERT INTO eft_short_name_links (id, short_name_id, payment_account_id, status) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status",
                )
                .bind(link.id.get())
                .bind(link.short_name_id.get())
                .bind(link.payment_account_id.get())
                .bind(match link.status {
                    EftShortNameLinkStatus::Pending => "PENDING",
                    EftShortNameLinkStatus::Linked => "LINKED",
                    EftShortNameLinkStatus::Inactive => "INACTIVE",
                })
                .execute(pool)
                .await
                .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// §4.7 phase C: every credit on deposit for a short name, to compute
    /// its total available balance and pick one to back a new pending
    /// link.
    pub async fn list_eft_credits_by_short_name(
        &self,
        short_name_id: EftShortNameId,
    ) -> Result<Vec<EftCredit>, ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .eft_credits
                .iter()
                .filter(|c| c.short_name_id == short_name_id)
                .cloned()
                .collect()),
            Backend::Postgres(pool) => sqlx::query_as::<_, EftCreditRow>(
                "SELECT id, short_name_id, amount, remaining_amount, deposit_date \
                 FROM eft_credits WHERE short_name_id = $1",
            )
            .bind(short_name_id.get())
            .fetch_all(pool)
            .await
            .map(|rows| rows.into_iter().map(EftCreditRow::into_domain).collect())
            .map_err(|e| ReconcileError::Storage(e.to_string())),
        }
    }

    /// §4.8 `get_eft_credit_invoice_links_by_status`: group links by
    /// `(invoice_id, status, receipt_number)`, summing amount and
    /// collecting member link ids; mirrors the source's `EFTCILRollup`.
    pub async fn list_link_rollups_by_status(
        &self,
        status: EftCreditInvoiceLinkStatus,
    ) -> Result<Vec<EftCreditInvoiceLinkRollup>, ReconcileError> {
        let links: Vec<EftCreditInvoiceLink> = match self.backend.as_ref() {
            Backend::Memory(tables) => tables
                .lock()
                .eft_credit_invoice_links
                .iter()
                .filter(|l| l.status as u8 == status as u8)
                .cloned()
                .collect(),
            Backend::Postgres(pool) => sqlx::query_as::<_, LinkRow>(
                "SELECT id, eft_credit_id, invoice_id, amount, status, link_group_id \
                 FROM eft_credit_invoice_links WHERE status = $1",
            )
            .bind(status.as_code())
            .fetch_all(pool)
            .await
            .map(|rows| rows.into_iter().map(LinkRow::into_domain).collect())
            .map_err(|e| ReconcileError::Storage(e.to_string()))?,
        };

        let mut grouped: HashMap<InvoiceId, (rust_decimal::Decimal, Vec<EftCreditInvoiceLinkId>)> = HashMap::new();
        for link in &links {
            let entry = grouped.entry(link.invoice_id).or_default();
            entry.0 += link.amount;
            entry.1.push(link.id);
        }

        Ok(grouped
            .into_iter()
            .map(|(invoice_id, (total_amount, link_ids))| EftCreditInvoiceLinkRollup {
                invoice_id,
                status,
                receipt_number: format!("EFT{}", invoice_id.get()),
                total_amount,
                link_ids,
            })
            .collect())
    }

    pub async fn save_link(&self, link: &EftCreditInvoiceLink) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(slot) = tables.eft_credit_invoice_links.iter_mut().find(|l| l.id == link.id) {
                    *slot = link.clone();
                } else {
                    tables.eft_credit_invoice_links.push(link.clone());
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query("UPDATE eft_credit_invoice_links SET status = $1 WHERE id = $2")
                    .bind(link.status.as_code())
                    .bind(link.id.get())
                    .execute(pool)
                    .await
                    .map_err(|e| ReconcileError::Storage(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// §4.8: resolve a rollup's member link ids back to full rows so each
    /// can be transitioned to COMPLETED/REFUNDED after the receipt side
    /// of the rollup clears in CFS.
    pub async fn list_links_by_ids(
        &self,
        ids: &[EftCreditInvoiceLinkId],
    ) -> Result<Vec<EftCreditInvoiceLink>, ReconcileError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        match self.backend.as_ref() {
            Backend::Memory(tables) => Ok(tables
                .lock()
                .eft_credit_invoice_links
                .iter()
                .filter(|l| ids.contains(&l.id))
                .cloned()
                .collect()),
            Backend::Postgres(pool) => {
                let raw_ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
                sqlx::query_as::<_, LinkRow>(
                    "SELECT id, eft_credit_id, invoice_id, amount, status, link_group_id \
                     FROM eft_credit_invoice_links WHERE id = ANY($1)",
                )
                .bind(&raw_ids)
                .fetch_all(pool)
                .await
                .map(|rows| rows.into_iter().map(LinkRow::into_domain).collect())
                .map_err(|e| ReconcileError::Storage(e.to_string()))
            }
        }
    }

    pub async fn debit_eft_credit(&self, id: EftCreditId, amount: rust_decimal::Decimal) -> Result<(), ReconcileError> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => {
                let mut tables = tables.lock();
                if let Some(credit) = tables.eft_credits.iter_mut().find(|c| c.id == id) {
                    credit.remaining_amount = (credit.remaining_amount - amount).max(rust_decimal::Decimal::ZERO);
                }
                Ok(())
            }
            Backend::Postgres(pool) => {
                sqlx::query("UPDATE eft_credits SET remaining_amount = remaining_amount - $1 WHERE id = $2")
                    .bind(amount)
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
struct ShortNameRow {
    id: i64,
    short_name: String,
    linked_account_id: Option<i64>,
}

impl ShortNameRow {
    fn into_domain(self) -> EftShortName {
        EftShortName {
            id: EftShortNameId::new(self.id),
            short_name: self.short_name,
            linked_account_id: self.linked_account_id.map(feerecon_core::ids::PaymentAccountId::new),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ShortNameLinkRow {
    id: i64,
    short_name_id: i64,
    payment_account_id: i64,
    status: String,
}

impl ShortNameLinkRow {
    fn into_domain(self) -> EftShortNameLink {
        EftShortNameLink {
            id: EftShortNameLinkId::new(self.id),
            short_name_id: EftShortNameId::new(self.short_name_id),
            payment_account_id: feerecon_core::ids::PaymentAccountId::new(self.payment_account_id),
            status: match self.status.as_str() {
                "LINKED" => EftShortNameLinkStatus::Linked,
                "INACTIVE" => EftShortNameLinkStatus::Inactive,
                _ => EftShortNameLinkStatus::Pending,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct EftCreditRow {
    id: i64,
    short_name_id: i64,
    amount: rust_decimal::Decimal,
    remaining_amount: rust_decimal::Decimal,
    deposit_date: chrono::DateTime<chrono::Utc>,
}

impl EftCreditRow {
    fn into_domain(self) -> EftCredit {
        EftCredit {
            id: EftCreditId::new(self.id),
            short_name_id: EftShortNameId::new(self.short_name_id),
            amount: self.amount,
            remaining_amount: self.remaining_amount,
            deposit_date: self.deposit_date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: i64,
    eft_credit_id: i64,
    invoice_id: i64,
    amount: rust_decimal::Decimal,
    status: String,
    link_group_id: Option<i64>,
}

impl LinkRow {
    fn into_domain(self) -> EftCreditInvoiceLink {
        EftCreditInvoiceLink {
            id: EftCreditInvoiceLinkId::new(self.id),
            eft_credit_id: EftCreditId::new(self.eft_credit_id),
            invoice_id: InvoiceId::new(self.invoice_id),
            amount: self.amount,
            status: match self.status.as_str() {
                "COMPLETED" => EftCreditInvoiceLinkStatus::Completed,
                "PENDING_REFUND" => EftCreditInvoiceLinkStatus::PendingRefund,
                "REFUNDED" => EftCreditInvoiceLinkStatus::Refunded,
                "CANCELLED" => EftCreditInvoiceLinkStatus::Cancelled,
                _ => EftCreditInvoiceLinkStatus::Pending,
            },
            link_group_id: self.link_group_id,
        }
    }
}
