//! §9 Open Question #2 (resolved): `amount` and `remaining_amount` are
//! both written on initial discovery (CAS credit-memo pass 2); later
//! application (pass 3) updates only `remaining_amount`, leaving `amount`
//! as the credit's original face value for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CfsCreditInvoiceId, CreditId, InvoiceId, PaymentAccountId};
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credit {
    pub id: CreditId,
    pub payment_account_id: PaymentAccountId,
    pub cfs_identifier: String,
    pub amount: Money,
    pub remaining_amount: Money,
    pub is_credit_memo: bool,
    pub created_on: DateTime<Utc>,
}

impl Credit {
    pub fn discover(
        id: CreditId,
        payment_account_id: PaymentAccountId,
        cfs_identifier: String,
        amount: Money,
        is_credit_memo: bool,
        now: DateTime<Utc>,
    ) -> Credit {
        Credit {
            id,
            payment_account_id,
            cfs_identifier,
            amount,
            remaining_amount: amount,
            is_credit_memo,
            created_on: now,
        }
    }

    pub fn apply(&self, used: Money) -> Credit {
        let mut next = self.clone();
        next.remaining_amount = (self.remaining_amount - used).max(Money::ZERO);
        next
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfsCreditInvoice {
    pub id: CfsCreditInvoiceId,
    pub credit_id: CreditId,
    pub invoice_id: InvoiceId,
    pub amount_applied: Money,
}
