//! Deterministic in-memory CFS stand-in for tests, mirroring the pattern
//! of `MockAcraAdapter` elsewhere in this stack: returns canned responses
//! keyed off the invoice number rather than hitting a network.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use feerecon_core::ids::CfsAccountId;
use feerecon_core::ports::{
    CfsClient, CfsCreditMemoResponse, CfsInvoiceResponse, CfsReceiptResponse, CreateInvoiceRequest,
};
use feerecon_core::ReconcileError;

#[derive(Default)]
pub struct MockCfsClient {
    invoices: Mutex<Vec<CfsInvoiceResponse>>,
    sequence: AtomicU64,
    pub fail_create: Mutex<bool>,
}

impl MockCfsClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_invoice(&self, invoice_number: &str, total: Decimal) {
        self.invoices.lock().push(CfsInvoiceResponse {
            invoice_number: invoice_number.to_string(),
            reference_number: format!("REF{}", self.sequence.fetch_add(1, Ordering::SeqCst)),
            total,
        });
    }
}

#[async_trait]
impl CfsClient for MockCfsClient {
    async fn create_account_invoice(
        &self,
        req: CreateInvoiceRequest,
    ) -> Result<CfsInvoiceResponse, ReconcileError> {
        if *self.fail_create.lock() {
            return Err(ReconcileError::CfsClient("mock create failure".into()));
        }
        let response = CfsInvoiceResponse {
            invoice_number: req.invoice_number,
            reference_number: format!("REF{}", self.sequence.fetch_add(1, Ordering::SeqCst)),
            total: req.total,
        };
        self.invoices.lock().push(response.clone());
        Ok(response)
    }

    async fn get_invoice(
        &self,
        _cfs_account_id: CfsAccountId,
        invoice_number: &str,
    ) -> Result<CfsInvoiceResponse, ReconcileError> {
        self.invoices
            .lock()
            .iter()
            .find(|inv| inv.invoice_number == invoice_number)
            .cloned()
            .ok_or_else(|| ReconcileError::Validation(format!("no such CFS invoice: {invoice_number}")))
    }

    async fn reverse_invoice(&self, _cfs_account_id: CfsAccountId, _invoice_number: &str) -> Result<(), ReconcileError> {
        Ok(())
    }

    async fn adjust_invoice(
        &self,
        _cfs_account_id: CfsAccountId,
        _invoice_number: &str,
        _amount: Decimal,
    ) -> Result<(), ReconcileError> {
        Ok(())
    }

    async fn apply_receipt(
        &self,
        _cfs_account_id: CfsAccountId,
        _invoice_number: &str,
        receipt_number: &str,
    ) -> Result<CfsReceiptResponse, ReconcileError> {
        Ok(CfsReceiptResponse {
            receipt_number: receipt_number.to_string(),
            receipt_amount: Decimal::ZERO,
        })
    }

    async fn unapply_receipt(
        &self,
        _cfs_account_id: CfsAccountId,
        _invoice_number: &str,
        _receipt_number: &str,
    ) -> Result<(), ReconcileError> {
        Ok(())
    }

    async fn get_receipt(
        &self,
        _cfs_account_id: CfsAccountId,
        receipt_number: &str,
    ) -> Result<CfsReceiptResponse, ReconcileError> {
        Ok(CfsReceiptResponse {
            receipt_number: receipt_number.to_string(),
            receipt_amount: Decimal::ZERO,
        })
    }

    async fn get_cms(
        &self,
        _cfs_account_id: CfsAccountId,
        cfs_identifier: &str,
    ) -> Result<CfsCreditMemoResponse, ReconcileError> {
        Ok(CfsCreditMemoResponse {
            cfs_identifier: cfs_identifier.to_string(),
            amount_due: Decimal::ZERO,
        })
    }

    async fn stop_pad(&self, _cfs_account_id: CfsAccountId) -> Result<(), ReconcileError> {
        Ok(())
    }

    async fn add_nsf_adjustment(
        &self,
        _cfs_account_id: CfsAccountId,
        _invoice_number: &str,
        _nsf_fee: Decimal,
    ) -> Result<(), ReconcileError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let mock = MockCfsClient::new();
        let req = CreateInvoiceRequest {
            cfs_account_id: CfsAccountId::new(1),
            invoice_number: "REGT00000001".to_string(),
            total: Decimal::new(10000, 2),
            line_items: vec![],
        };
        let created = mock.create_account_invoice(req).await.unwrap();
        let fetched = mock.get_invoice(CfsAccountId::new(1), &created.invoice_number).await.unwrap();
        assert_eq!(fetched.invoice_number, "REGT00000001");
    }

    #[tokio::test]
    async fn create_failure_is_surfaced() {
        let mock = MockCfsClient::new();
        *mock.fail_create.lock() = true;
        let req = CreateInvoiceRequest {
            cfs_account_id: CfsAccountId::new(1),
            invoice_number: "REGT00000002".to_string(),
            total: Decimal::ZERO,
            line_items: vec![],
        };
        assert!(mock.create_account_invoice(req).await.is_err());
    }
}
