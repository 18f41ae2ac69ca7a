//! Supplemented entities (SPEC_FULL §3): the source's `DistributionCodeModel`
//! and `PaymentLineItemModel`, needed for the disbursement/GL-account
//! detail the EJV flow (§4.9) references but spec.md's distillation elided.

use serde::{Deserialize, Serialize};

use crate::ids::{DistributionCodeId, InvoiceId, PaymentLineItemId};
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionCode {
    pub id: DistributionCodeId,
    pub name: String,
    pub client: String,
    pub responsibility_centre: String,
    pub service_line: String,
    pub stob: String,
    pub project_code: String,
    /// When set, invoices on this code are excluded from EJV disbursement
    /// entirely (§4.9).
    pub stop_ejv: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLineItem {
    pub id: PaymentLineItemId,
    pub invoice_id: InvoiceId,
    pub distribution_code_id: DistributionCodeId,
    pub description: String,
    pub filing_fees: Money,
    pub gst: Money,
    pub priority_fees: Money,
    pub future_effective_fees: Money,
    pub service_fees: Money,
    pub total: Money,
}
