mod cas;
mod eft_file;
mod jv;
mod nsf;

pub use cas::{reconcile_cas_settlement, CasReport};
pub use eft_file::{reconcile_eft_file, EftFileReport};
pub use jv::{reconcile_jv_feedback, JvFeedbackReport};
pub use nsf::process_nsf;
