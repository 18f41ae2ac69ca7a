use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{PaymentAccountId, RoutingSlipId};
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingSlipStatus {
    Active,
    LinkedExported,
    Linked,
    Complete,
    NsfWarning,
    Corrected,
    WriteOffRequested,
    WriteOffAuthorized,
    WriteOffCompleted,
    Void,
    /// §4.9 AP REFUND sub-flow failure: CFS rejected the GL posting for
    /// this routing slip's refund.
    Rejected,
}

impl RoutingSlipStatus {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::LinkedExported => "LINKED_EXPORTED",
            Self::Linked => "LINKED",
            Self::Complete => "COMPLETE",
            Self::NsfWarning => "NSF_WARNING",
            Self::Corrected => "CORRECTED",
            Self::WriteOffRequested => "WRITE_OFF_REQUESTED",
            Self::WriteOffAuthorized => "WRITE_OFF_AUTHORIZED",
            Self::WriteOffCompleted => "WRITE_OFF_COMPLETED",
            Self::Void => "VOID",
            Self::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSlip {
    pub id: RoutingSlipId,
    pub number: String,
    pub payment_account_id: PaymentAccountId,
    pub parent_number: Option<String>,
    pub total: Money,
    pub remaining_amount: Money,
    pub status: RoutingSlipStatus,
    pub routing_slip_date: DateTime<Utc>,
    /// §4.9 AP REFUND sub-flow: when CFS confirmed this routing slip's
    /// refund posted to the GL. No separate `Refund` entity is modeled
    /// in this workspace, so the field lives directly on the slip.
    pub gl_posted: Option<DateTime<Utc>>,
}

impl RoutingSlip {
    pub fn is_child(&self) -> bool {
        self.parent_number.is_some()
    }

    /// §4.5: the suffixed receipt number used when a child routing slip's
    /// balance is folded into its parent; `{child.number}L`.
    pub fn linked_receipt_number(&self) -> String {
        format!("{}L", self.number)
    }
}
