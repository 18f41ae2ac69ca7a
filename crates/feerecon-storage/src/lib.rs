//! Persistence gateway. Unlike the adapter ports in `feerecon-core`
//! (CFS/bus/object-store), storage is not behind a trait: it is internal
//! infrastructure rather than a swappable external integration, so
//! `Store` is used directly, mirroring `mez-api`'s `db` module exposing
//! plain async functions against a `PgPool`.

mod backend;
pub mod cfs_accounts;
pub mod credits;
pub mod distribution;
pub mod eft;
pub mod ejv;
pub mod invoice_references;
pub mod invoices;
pub mod nsf;
pub mod payment_accounts;
pub mod payments;
pub mod receipts;
pub mod routing_slips;
pub mod settlement;

pub use backend::{init_pool, Store};
pub use receipts::new_receipt;
