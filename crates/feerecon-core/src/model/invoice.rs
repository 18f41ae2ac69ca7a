//! The central billable entity. SPEC_FULL §3, §4.3 (state table).
//!
//! Per SPEC_FULL §9's redesign note, status transitions are explicit
//! methods with asserted preconditions rather than bare attribute
//! assignment; a precondition failure is a kind-4 integrity violation,
//! never silently ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ReconcileError;
use crate::ids::{CfsAccountId, InvoiceId, PaymentAccountId};
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Created,
    Approved,
    SettlementScheduled,
    Partial,
    Paid,
    Overdue,
    RefundRequested,
    Refunded,
    Cancelled,
    Credited,
    PartiallyRefunded,
    PartiallyCredited,
    Chargeback,
}

impl InvoiceStatus {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Approved => "APPROVED",
            Self::SettlementScheduled => "SETTLEMENT_SCHEDULED",
            Self::Partial => "PARTIAL",
            Self::Paid => "PAID",
            Self::Overdue => "OVERDUE",
            Self::RefundRequested => "REFUND_REQUESTED",
            Self::Refunded => "REFUNDED",
            Self::Cancelled => "CANCELLED",
            Self::Credited => "CREDITED",
            Self::PartiallyRefunded => "PARTIALLY_REFUNDED",
            Self::PartiallyCredited => "PARTIALLY_CREDITED",
            Self::Chargeback => "CHARGEBACK",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "CREATED" => Self::Created,
            "APPROVED" => Self::Approved,
            "SETTLEMENT_SCHEDULED" => Self::SettlementScheduled,
            "PARTIAL" => Self::Partial,
            "PAID" => Self::Paid,
            "OVERDUE" => Self::Overdue,
            "REFUND_REQUESTED" => Self::RefundRequested,
            "REFUNDED" => Self::Refunded,
            "CANCELLED" => Self::Cancelled,
            "CREDITED" => Self::Credited,
            "PARTIALLY_REFUNDED" => Self::PartiallyRefunded,
            "PARTIALLY_CREDITED" => Self::PartiallyCredited,
            "CHARGEBACK" => Self::Chargeback,
            _ => return None,
        })
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisbursementStatus {
    WaitingForJob,
    Uploaded,
    Acknowledged,
    Completed,
    Reversed,
    Errored,
}

impl DisbursementStatus {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::WaitingForJob => "WAITING_FOR_JOB",
            Self::Uploaded => "UPLOADED",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Completed => "COMPLETED",
            Self::Reversed => "REVERSED",
            Self::Errored => "ERRORED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "WAITING_FOR_JOB" => Self::WaitingForJob,
            "UPLOADED" => Self::Uploaded,
            "ACKNOWLEDGED" => Self::Acknowledged,
            "COMPLETED" => Self::Completed,
            "REVERSED" => Self::Reversed,
            "ERRORED" => Self::Errored,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Pad,
    Eft,
    OnlineBanking,
    Internal,
    CreditCard,
    Drawdown,
    /// JV feedback's ministry-to-ministry settlement (§4.9 JH COMPLETED
    /// on a PAYMENT file); never chosen by a payer, only ever assigned
    /// to the `Payment` row a JH line creates.
    Ejv,
}

impl PaymentMethod {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Pad => "PAD",
            Self::Eft => "EFT",
            Self::OnlineBanking => "ONLINE_BANKING",
            Self::Internal => "INTERNAL",
            Self::CreditCard => "CC",
            Self::Drawdown => "DRAWDOWN",
            Self::Ejv => "EJV",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub payment_account_id: PaymentAccountId,
    pub cfs_account_id: Option<CfsAccountId>,
    pub total: Money,
    pub paid: Money,
    pub refund: Money,
    pub service_fees: Money,
    pub corp_type_code: String,
    pub business_identifier: Option<String>,
    pub payment_method_code: PaymentMethod,
    pub status: InvoiceStatus,
    pub disbursement_status_code: Option<DisbursementStatus>,
    pub payment_date: Option<DateTime<Utc>>,
    pub refund_date: Option<DateTime<Utc>>,
    pub disbursement_date: Option<DateTime<Utc>>,
    pub disbursement_reversal_date: Option<DateTime<Utc>>,
    pub routing_slip: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_on: DateTime<Utc>,
}

impl Invoice {
    /// Invariant check per §8: 0 ≤ paid ≤ total, refund ≤ total.
    pub fn check_invariants(&self) -> Result<(), ReconcileError> {
        if self.paid < Money::ZERO || self.paid > self.total {
            return Err(ReconcileError::integrity(format!(
                "invoice {}: paid {} out of range [0, {}]",
                self.id, self.paid, self.total
            )));
        }
        if self.refund > self.total {
            return Err(ReconcileError::integrity(format!(
                "invoice {}: refund {} exceeds total {}",
                self.id, self.refund, self.total
            )));
        }
        Ok(())
    }

    fn assert_from(&self, expected: InvoiceStatus, to: InvoiceStatus) -> Result<(), ReconcileError> {
        if self.status != expected {
            return Err(ReconcileError::InvalidTransition {
                entity: "Invoice",
                id: self.id.to_string(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// APPROVED (PAD/EFT) --CFS invoice created--> APPROVED, ref ACTIVE.
    /// The status code does not change for PAD/EFT; only the side effect
    /// (an ACTIVE InvoiceReference) marks progress, so this is a no-op
    /// guard rather than a real transition; kept for symmetry with the
    /// other dispatch outcomes and to reject a call against the wrong
    /// status.
    pub fn mark_pad_or_eft_dispatched(&self, cfs_account_id: CfsAccountId) -> Result<Invoice, ReconcileError> {
        self.assert_from(InvoiceStatus::Approved, InvoiceStatus::Approved)?;
        let mut next = self.clone();
        next.cfs_account_id = Some(cfs_account_id);
        Ok(next)
    }

    /// CREATED (OB) --CFS invoice created--> SETTLEMENT_SCHEDULED.
    pub fn mark_online_banking_scheduled(&self, cfs_account_id: CfsAccountId) -> Result<Invoice, ReconcileError> {
        self.assert_from(InvoiceStatus::Created, InvoiceStatus::SettlementScheduled)?;
        let mut next = self.clone();
        next.status = InvoiceStatus::SettlementScheduled;
        next.cfs_account_id = Some(cfs_account_id);
        Ok(next)
    }

    /// APPROVED (INTERNAL) --CFS invoice created + receipt applied--> PAID.
    pub fn mark_internal_paid(&self, now: DateTime<Utc>) -> Result<Invoice, ReconcileError> {
        self.assert_from(InvoiceStatus::Approved, InvoiceStatus::Paid)?;
        let mut next = self.clone();
        next.status = InvoiceStatus::Paid;
        next.paid = next.total;
        next.payment_date = Some(now);
        Ok(next)
    }

    /// REFUND_REQUESTED (INTERNAL) --unapplied + reversed--> REFUNDED.
    pub fn mark_internal_refunded(&self, now: DateTime<Utc>) -> Result<Invoice, ReconcileError> {
        self.assert_from(InvoiceStatus::RefundRequested, InvoiceStatus::Refunded)?;
        let mut next = self.clone();
        next.status = InvoiceStatus::Refunded;
        next.refund_date = Some(now);
        Ok(next)
    }

    /// CAS PAD/BOLP/CMAP paid row: mark this invoice PAID by settlement.
    pub fn mark_settlement_paid(&self, now: DateTime<Utc>) -> Invoice {
        let mut next = self.clone();
        next.status = InvoiceStatus::Paid;
        next.paid = next.total;
        next.payment_date = Some(now);
        next
    }

    /// CAS BOLP partial row.
    pub fn mark_partial(&self, paid: Money) -> Invoice {
        let mut next = self.clone();
        next.status = InvoiceStatus::Partial;
        next.paid = paid;
        next
    }

    /// NSF flow step 3: revert a settled invoice back to
    /// SETTLEMENT_SCHEDULED with paid reset to zero.
    pub fn revert_for_nsf(&self) -> Invoice {
        let mut next = self.clone();
        next.status = InvoiceStatus::SettlementScheduled;
        next.paid = Money::ZERO;
        next
    }

    /// JV feedback Debit-in-PAYMENT success: PAID or REFUNDED depending on
    /// whether this invoice was already mid-refund.
    pub fn mark_jv_settled(&self, effective_date: DateTime<Utc>) -> Invoice {
        let mut next = self.clone();
        if matches!(
            self.status,
            InvoiceStatus::Refunded | InvoiceStatus::RefundRequested
        ) {
            next.status = InvoiceStatus::Refunded;
            next.refund_date = Some(effective_date);
        } else {
            next.status = InvoiceStatus::Paid;
            next.payment_date = Some(effective_date);
            next.paid = next.total;
        }
        next
    }

    pub fn mark_disbursement(&self, status: DisbursementStatus, when: DateTime<Utc>) -> Invoice {
        let mut next = self.clone();
        next.disbursement_status_code = Some(status);
        match status {
            DisbursementStatus::Reversed => next.disbursement_reversal_date = Some(when),
            DisbursementStatus::Completed => next.disbursement_date = Some(when),
            _ => {}
        }
        next
    }
}
