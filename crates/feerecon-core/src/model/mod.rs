pub mod cfs_account;
pub mod credit;
pub mod distribution;
pub mod eft;
pub mod ejv;
pub mod invoice;
pub mod invoice_reference;
pub mod nsf;
pub mod payment;
pub mod payment_account;
pub mod receipt;
pub mod routing_slip;
pub mod settlement_file;

pub use cfs_account::{CfsAccount, CfsAccountStatus};
pub use credit::{CfsCreditInvoice, Credit};
pub use distribution::{DistributionCode, PaymentLineItem};
pub use eft::{
    EftCredit, EftCreditInvoiceLink, EftCreditInvoiceLinkRollup, EftCreditInvoiceLinkStatus,
    EftShortName, EftShortNameLink, EftShortNameLinkStatus,
};
pub use ejv::{
    EjvFile, EjvFileKind, EjvFileStatus, EjvHeader, EjvHeaderKind, EjvLink, PartnerDisbursement,
    PartnerDisbursementTargetType,
};
pub use invoice::{DisbursementStatus, Invoice, InvoiceStatus, PaymentMethod};
pub use invoice_reference::{InvoiceReference, InvoiceReferenceStatus};
pub use nsf::NonSufficientFunds;
pub use payment::{Payment, PaymentStatus};
pub use payment_account::PaymentAccount;
pub use receipt::Receipt;
pub use routing_slip::{RoutingSlip, RoutingSlipStatus};
pub use settlement_file::{CasSettlement, EftFile, SettlementFileStatus};
