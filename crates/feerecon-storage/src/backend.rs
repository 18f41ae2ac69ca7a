//! Connection management. Mirrors `mez-api/db/mod.rs`'s optional-Postgres
//! pattern: when `DATABASE_URL` is unset the engine runs against an
//! in-memory store, which is how local development and most of this
//! workspace's tests run.

use std::sync::Arc;

use parking_lot::Mutex;
use sqlx::postgres::{PgPool, PgPoolOptions};

use feerecon_core::model::{
    CasSettlement, CfsAccount, CfsCreditInvoice, Credit, DistributionCode, EftCredit,
    EftCreditInvoiceLink, EftFile, EftShortName, EftShortNameLink, EjvFile, EjvHeader, EjvLink,
    Invoice, InvoiceReference, NonSufficientFunds, PartnerDisbursement, Payment, PaymentAccount,
    PaymentLineItem, Receipt, RoutingSlip,
};

/// In-memory tables, one `Vec` per entity. Lookups are linear scans; this
/// workspace's volumes (daily settlement batches, not live traffic) never
/// make that the bottleneck.
#[derive(Default)]
pub(crate) struct MemoryTables {
    pub payment_accounts: Vec<PaymentAccount>,
    pub cfs_accounts: Vec<CfsAccount>,
    pub invoices: Vec<Invoice>,
    pub invoice_references: Vec<InvoiceReference>,
    pub payments: Vec<Payment>,
    pub receipts: Vec<Receipt>,
    pub credits: Vec<Credit>,
    pub routing_slips: Vec<RoutingSlip>,
    pub eft_short_names: Vec<EftShortName>,
    pub eft_short_name_links: Vec<EftShortNameLink>,
    pub eft_credits: Vec<EftCredit>,
    pub eft_credit_invoice_links: Vec<EftCreditInvoiceLink>,
    pub nsf_events: Vec<NonSufficientFunds>,
    pub cas_settlements: Vec<CasSettlement>,
    pub processed_files: Vec<String>,
    pub payment_line_items: Vec<PaymentLineItem>,
    pub distribution_codes: Vec<DistributionCode>,
    pub eft_files: Vec<EftFile>,
    pub cfs_credit_invoices: Vec<CfsCreditInvoice>,
    pub ejv_files: Vec<EjvFile>,
    pub ejv_headers: Vec<EjvHeader>,
    pub ejv_links: Vec<EjvLink>,
    pub partner_disbursements: Vec<PartnerDisbursement>,
}

pub(crate) enum Backend {
    Postgres(PgPool),
    Memory(Arc<Mutex<MemoryTables>>),
}

#[derive(Clone)]
pub struct Store {
    pub(crate) backend: Arc<Backend>,
}

impl Store {
    pub fn new_in_memory() -> Self {
        Self {
            backend: Arc::new(Backend::Memory(Arc::new(Mutex::new(MemoryTables::default())))),
        }
    }

    pub fn new_postgres(pool: PgPool) -> Self {
        Self {
            backend: Arc::new(Backend::Postgres(pool)),
        }
    }

    pub(crate) fn pg(&self) -> Option<&PgPool> {
        match self.backend.as_ref() {
            Backend::Postgres(pool) => Some(pool),
            Backend::Memory(_) => None,
        }
    }

    /// Readiness probe backing (`feerecon-cli`'s `/health/readiness`),
    /// grounded on `mez-api::lib::readiness`'s `SELECT 1` check. The
    /// in-memory backend is always reachable by construction.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        match self.backend.as_ref() {
            Backend::Postgres(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            Backend::Memory(_) => Ok(()),
        }
    }

    pub(crate) fn mem(&self) -> Option<&Mutex<MemoryTables>> {
        match self.backend.as_ref() {
            Backend::Memory(tables) => Some(tables),
            Backend::Postgres(_) => None,
        }
    }
}

/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
pub async fn init_pool(database_url: Option<&str>) -> Result<Store, sqlx::Error> {
    let Some(url) = database_url else {
        tracing::warn!("DATABASE_URL not set; running in-memory only mode");
        return Ok(Store::new_in_memory());
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("connected to PostgreSQL, migrations applied");

    Ok(Store::new_postgres(pool))
}
