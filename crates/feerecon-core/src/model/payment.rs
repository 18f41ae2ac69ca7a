use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{InvoiceId, PaymentAccountId, PaymentId};
use crate::model::invoice::PaymentMethod;
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Created,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub payment_account_id: PaymentAccountId,
    pub invoice_id: Option<InvoiceId>,
    pub payment_method_code: PaymentMethod,
    pub invoice_number: String,
    pub amount: Money,
    pub status: PaymentStatus,
    pub payment_date: Option<DateTime<Utc>>,
}
