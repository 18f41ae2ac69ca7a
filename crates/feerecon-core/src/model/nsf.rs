use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{InvoiceId, NonSufficientFundsId, PaymentAccountId};
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonSufficientFunds {
    pub id: NonSufficientFundsId,
    pub invoice_id: InvoiceId,
    pub payment_account_id: PaymentAccountId,
    pub nsf_fee: Money,
    pub created_on: DateTime<Utc>,
}
