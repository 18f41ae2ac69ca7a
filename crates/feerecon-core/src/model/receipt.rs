use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{InvoiceId, ReceiptId};
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub invoice_id: InvoiceId,
    pub receipt_number: String,
    pub receipt_amount: Money,
    pub receipt_date: DateTime<Utc>,
}
