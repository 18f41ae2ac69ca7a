//! §3: at most one ACTIVE InvoiceReference per invoice at any time. The
//! dispatch/probe-and-adopt flows in §4.3 depend on this invariant to
//! decide whether an invoice has already been sent to CFS.

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::ids::{InvoiceId, InvoiceReferenceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceReferenceStatus {
    Active,
    Completed,
    Cancelled,
}

impl InvoiceReferenceStatus {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceReference {
    pub id: InvoiceReferenceId,
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub reference_number: Option<String>,
    pub status: InvoiceReferenceStatus,
}

impl InvoiceReference {
    pub fn complete(&self) -> Result<InvoiceReference, ReconcileError> {
        if self.status != InvoiceReferenceStatus::Active {
            return Err(ReconcileError::InvalidTransition {
                entity: "InvoiceReference",
                id: self.id.to_string(),
                from: self.status.as_code().to_string(),
                to: InvoiceReferenceStatus::Completed.as_code().to_string(),
            });
        }
        let mut next = self.clone();
        next.status = InvoiceReferenceStatus::Completed;
        Ok(next)
    }

    pub fn cancel(&self) -> InvoiceReference {
        let mut next = self.clone();
        next.status = InvoiceReferenceStatus::Cancelled;
        next
    }
}
