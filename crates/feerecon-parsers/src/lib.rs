pub mod cas_csv;
pub mod jv_feedback;
pub mod tdi17;

pub use cas_csv::{parse_cas_csv, CasRow};
pub use jv_feedback::{parse_jv_feedback, JvRecord};
pub use tdi17::{parse_tdi17, Tdi17Record};
