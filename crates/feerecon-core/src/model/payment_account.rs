use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::PaymentAccountId;
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAccount {
    pub id: PaymentAccountId,
    pub auth_account_id: String,
    pub name: String,
    pub pad_credit: Money,
    pub ob_credit: Money,
    pub eft_credit: Money,
    pub has_nsf_invoices: Option<DateTime<Utc>>,
    pub has_overdue_invoices: Option<DateTime<Utc>>,
    pub pad_activation_date: Option<DateTime<Utc>>,
}

impl PaymentAccount {
    pub fn credit_for(&self, method: super::invoice::PaymentMethod) -> Money {
        use super::invoice::PaymentMethod::*;
        match method {
            Pad => self.pad_credit,
            OnlineBanking => self.ob_credit,
            Eft => self.eft_credit,
            _ => Money::ZERO,
        }
    }
}
