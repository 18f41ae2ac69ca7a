//! §4.9: journal voucher feedback. `PartnerDisbursement` links an EJV
//! line back to either a full invoice disbursement or a partial refund.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EjvFileId, EjvHeaderId, EjvLinkId, InvoiceId, PartnerDisbursementId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EjvFileStatus {
    InProgress,
    Uploaded,
    Completed,
    Failed,
}

/// §4.9: which JD/IH sub-flow a feedback file's batches are interpreted
/// under. A JD Credit line only has an effect in `Disbursement`, a Debit
/// line only in `Payment`; an AP (IH) header is routed by `Refund` /
/// `EftRefund` / `OtherDisbursement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EjvFileKind {
    Payment,
    Disbursement,
    Refund,
    EftRefund,
    OtherDisbursement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EjvFile {
    pub id: EjvFileId,
    pub file_name: String,
    pub file_type: EjvFileKind,
    pub status: EjvFileStatus,
    /// Set the first time a BG line claims this file; §4.9 step 1 treats
    /// setting this and checking it as one atomic idempotency step.
    pub feedback_file_ref: Option<String>,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EjvHeaderKind {
    Payment,
    Refund,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EjvHeader {
    pub id: EjvHeaderId,
    pub ejv_file_id: EjvFileId,
    pub kind: EjvHeaderKind,
    pub sequence: i64,
    pub disbursement_status_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EjvLink {
    pub id: EjvLinkId,
    pub ejv_header_id: EjvHeaderId,
    pub invoice_id: InvoiceId,
    pub sequence: i64,
    pub disbursement_status_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartnerDisbursementTargetType {
    Invoice,
    PartialRefund,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerDisbursement {
    pub id: PartnerDisbursementId,
    pub invoice_id: InvoiceId,
    pub target_type: PartnerDisbursementTargetType,
    pub is_reversal: bool,
    pub status_code: String,
}
