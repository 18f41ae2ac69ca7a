//! Scheduled dispatch tasks (SPEC_FULL §4.3, §4.5, §4.7, §4.8): these run
//! on a timer against live `APPROVED`/`CREATED` invoices and routing
//! slips, as opposed to `feerecon-reconcile`'s settlement-file-driven
//! flows. Grounded on `examples/original_source/jobs/payment-jobs/tasks/`.

mod dispatch;
mod eft_credit_link;
mod routing_slip_link;

pub use dispatch::{run_invoice_dispatch, DispatchReport};
pub use eft_credit_link::{link_electronic_funds_transfers_cfs, reverse_electronic_funds_transfers_cfs};
pub use routing_slip_link::link_routing_slips;
