//! §4.7/§4.8: EFT short-name matching and the credit-to-invoice link
//! rollup. `EftCreditInvoiceLink` rows are deliberately granular; per
//! the original source's own caveat (carried into §9 Open Question #1),
//! "eft_credit_invoice_links table should reflect exactly what's in CAS"
//! rather than collapsing to one row per EFT.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EftCreditId, EftCreditInvoiceLinkId, EftShortNameId, EftShortNameLinkId, InvoiceId, PaymentAccountId};
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EftShortNameLinkStatus {
    Pending,
    Linked,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EftShortName {
    pub id: EftShortNameId,
    pub short_name: String,
    pub linked_account_id: Option<PaymentAccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EftShortNameLink {
    pub id: EftShortNameLinkId,
    pub short_name_id: EftShortNameId,
    pub payment_account_id: PaymentAccountId,
    pub status: EftShortNameLinkStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EftCredit {
    pub id: EftCreditId,
    pub short_name_id: EftShortNameId,
    pub amount: Money,
    pub remaining_amount: Money,
    pub deposit_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EftCreditInvoiceLinkStatus {
    Pending,
    Completed,
    PendingRefund,
    Refunded,
    Cancelled,
}

impl EftCreditInvoiceLinkStatus {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::PendingRefund => "PENDING_REFUND",
            Self::Refunded => "REFUNDED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EftCreditInvoiceLink {
    pub id: EftCreditInvoiceLinkId,
    pub eft_credit_id: EftCreditId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
    pub status: EftCreditInvoiceLinkStatus,
    /// Groups sibling links created by the same short-name-history event,
    /// so `_finalize_shortname_history`-style bookkeeping only needs to run
    /// once per group rather than once per link (§4.8).
    pub link_group_id: Option<i64>,
}

/// Grouped view over pending/pending-refund links, one row per
/// `(invoice_id, status, receipt_number)` with the link ids that rolled
/// into it; mirrors the source's `EFTCILRollup` query.
#[derive(Debug, Clone)]
pub struct EftCreditInvoiceLinkRollup {
    pub invoice_id: InvoiceId,
    pub status: EftCreditInvoiceLinkStatus,
    pub receipt_number: String,
    pub total_amount: Money,
    pub link_ids: Vec<EftCreditInvoiceLinkId>,
}
