//! Adapter ports. `feerecon-core` owns these trait definitions so the
//! concrete HTTP/object-store/bus crates can depend on core without core
//! ever depending back on them (SPEC_FULL §2a).
//!
//! CFS methods are async because every call crosses an HTTP boundary;
//! unlike the teacher's `AcraAdapter` (sync, chosen for cheap runtime
//! adapter swapping over a non-IO-bound lookup) these calls are genuinely
//! latency-bound, so `async-trait` is used instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::ids::CfsAccountId;
use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfsLineItem {
    pub description: String,
    pub filing_fees: Money,
    pub gst: Money,
    pub priority_fees: Money,
    pub future_effective_fees: Money,
    pub service_fees: Money,
    pub distribution_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    pub cfs_account_id: CfsAccountId,
    pub invoice_number: String,
    pub total: Money,
    pub line_items: Vec<CfsLineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfsInvoiceResponse {
    pub invoice_number: String,
    pub reference_number: String,
    pub total: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfsReceiptResponse {
    pub receipt_number: String,
    pub receipt_amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfsCreditMemoResponse {
    pub cfs_identifier: String,
    pub amount_due: Money,
}

/// Outcome of a dispatch-task call that may have partially succeeded
/// against CFS before a timeout (SPEC_FULL §4.3, §9's redesign note):
/// dispatch tasks must distinguish "created fresh," "already existed and
/// we adopted it by probing," and "unknown, do nothing" rather than
/// retrying blindly.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Created(CfsInvoiceResponse),
    AdoptedOnProbe(CfsInvoiceResponse),
    SkipUnknown,
}

#[async_trait]
pub trait CfsClient: Send + Sync {
    async fn create_account_invoice(
        &self,
        req: CreateInvoiceRequest,
    ) -> Result<CfsInvoiceResponse, ReconcileError>;

    async fn get_invoice(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
    ) -> Result<CfsInvoiceResponse, ReconcileError>;

    async fn reverse_invoice(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
    ) -> Result<(), ReconcileError>;

    async fn adjust_invoice(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
        amount: Money,
    ) -> Result<(), ReconcileError>;

    async fn apply_receipt(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
        receipt_number: &str,
    ) -> Result<CfsReceiptResponse, ReconcileError>;

    async fn unapply_receipt(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
        receipt_number: &str,
    ) -> Result<(), ReconcileError>;

    async fn get_receipt(
        &self,
        cfs_account_id: CfsAccountId,
        receipt_number: &str,
    ) -> Result<CfsReceiptResponse, ReconcileError>;

    async fn get_cms(
        &self,
        cfs_account_id: CfsAccountId,
        cfs_identifier: &str,
    ) -> Result<CfsCreditMemoResponse, ReconcileError>;

    async fn stop_pad(&self, cfs_account_id: CfsAccountId) -> Result<(), ReconcileError>;

    async fn add_nsf_adjustment(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
        nsf_fee: Money,
    ) -> Result<(), ReconcileError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub specversion: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub id: String,
    pub time: chrono::DateTime<chrono::Utc>,
    pub data: serde_json::Value,
}

impl BusEvent {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, id: impl Into<String>, time: chrono::DateTime<chrono::Utc>, data: serde_json::Value) -> Self {
        Self {
            specversion: "1.0".to_string(),
            event_type: event_type.into(),
            source: source.into(),
            id: id.into(),
            time,
            data,
        }
    }
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, event: BusEvent) -> Result<(), ReconcileError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, ReconcileError>;
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ReconcileError>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ReconcileError>;
}
