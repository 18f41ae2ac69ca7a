//! # Identity Newtypes
//!
//! The source system keys every entity with a database-assigned integer
//! id. Each gets a distinct newtype here so a `PaymentAccountId` can never
//! be passed where an `InvoiceId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

id_newtype!(PaymentAccountId);
id_newtype!(CfsAccountId);
id_newtype!(InvoiceId);
id_newtype!(InvoiceReferenceId);
id_newtype!(PaymentId);
id_newtype!(ReceiptId);
id_newtype!(CreditId);
id_newtype!(CfsCreditInvoiceId);
id_newtype!(RoutingSlipId);
id_newtype!(EftShortNameId);
id_newtype!(EftShortNameLinkId);
id_newtype!(EftCreditId);
id_newtype!(EftCreditInvoiceLinkId);
id_newtype!(EftFileId);
id_newtype!(EjvFileId);
id_newtype!(EjvHeaderId);
id_newtype!(EjvLinkId);
id_newtype!(PartnerDisbursementId);
id_newtype!(NonSufficientFundsId);
id_newtype!(CasSettlementId);
id_newtype!(DistributionCodeId);
id_newtype!(PaymentLineItemId);

/// Generalizes the dispatch task's "derive a new id from a related
/// existing id" idiom (e.g. `InvoiceReferenceId::new(invoice.id.get())`)
/// to the settlement reconcilers, where a newly-discovered row (a Credit,
/// an NSF invoice, an EFTCredit) has no single source id to borrow but
/// does have a natural key (receipt_number, cfs_identifier, short
/// name + transaction id) that must mint the same id every time the same
/// file is re-processed, so re-delivery is a no-op rather than a
/// duplicate row.
pub fn derive_id(natural_key: &str) -> i64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    natural_key.hash(&mut hasher);
    (hasher.finish() & 0x7fff_ffff_ffff_ffff) as i64
}
