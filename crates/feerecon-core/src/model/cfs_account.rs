use serde::{Deserialize, Serialize};

use crate::ids::{CfsAccountId, PaymentAccountId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfsAccountStatus {
    Pending,
    Active,
    Inactive,
    Freeze,
}

impl CfsAccountStatus {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Freeze => "FREEZE",
        }
    }

    /// §3: "effective" means usable for invoicing; ACTIVE or FREEZE both
    /// count, since a frozen account still has a live CFS party/site/account
    /// triple, it just can't take new PAD debits.
    pub fn is_effective(self) -> bool {
        matches!(self, Self::Active | Self::Freeze)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfsAccount {
    pub id: CfsAccountId,
    pub payment_account_id: PaymentAccountId,
    pub cfs_party: String,
    pub cfs_site: String,
    pub cfs_account: String,
    pub status: CfsAccountStatus,
}
