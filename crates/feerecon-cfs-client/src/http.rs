use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use feerecon_core::ids::CfsAccountId;
use feerecon_core::ports::{
    CfsClient, CfsCreditMemoResponse, CfsInvoiceResponse, CfsReceiptResponse, CreateInvoiceRequest,
};
use feerecon_core::ReconcileError;

use crate::auth::TokenCache;
use crate::retry::retry_send;

#[derive(Debug, Clone)]
pub struct CfsHttpConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout_secs: u64,
}

pub struct HttpCfsClient {
    client: reqwest::Client,
    base_url: String,
    auth: TokenCache,
}

impl HttpCfsClient {
    pub fn new(config: CfsHttpConfig) -> Result<Self, ReconcileError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReconcileError::CfsClient(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let auth = TokenCache::new(client.clone(), base_url.clone(), config.client_id, config.client_secret);

        Ok(Self { client, base_url, auth })
    }

    async fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, ReconcileError> {
        let token = self.auth.token().await?;
        Ok(builder.bearer_auth(token))
    }

    fn map_transport_err(operation: &str, e: reqwest::Error) -> ReconcileError {
        if e.is_timeout() {
            ReconcileError::CfsClient(format!("{operation} timed out"))
        } else {
            ReconcileError::CfsClient(format!("{operation}: {e}"))
        }
    }

    async fn check_status(operation: &str, resp: reqwest::Response) -> Result<reqwest::Response, ReconcileError> {
        if resp.status().is_client_error() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ReconcileError::Validation(format!(
                "{operation}: CFS rejected the request (HTTP {status}): {body}"
            )));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ReconcileError::CfsClient(format!(
                "{operation}: HTTP {status}: {body}"
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl CfsClient for HttpCfsClient {
    async fn create_account_invoice(
        &self,
        req: CreateInvoiceRequest,
    ) -> Result<CfsInvoiceResponse, ReconcileError> {
        let url = format!(
            "{}/cfs/parties/{}/accs/invoices",
            self.base_url,
            req.cfs_account_id.get()
        );
        let builder = self.authed(self.client.post(&url).json(&req)).await?;
        let resp = builder
            .send()
            .await
            .map_err(|e| Self::map_transport_err("create_account_invoice", e))?;
        let resp = Self::check_status("create_account_invoice", resp).await?;
        resp.json()
            .await
            .map_err(|e| ReconcileError::CfsClient(format!("decode create_account_invoice response: {e}")))
    }

    async fn get_invoice(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
    ) -> Result<CfsInvoiceResponse, ReconcileError> {
        let url = format!(
            "{}/cfs/parties/{}/accs/invoices/{}",
            self.base_url,
            cfs_account_id.get(),
            invoice_number
        );
        let client = &self.client;
        let auth = &self.auth;
        let resp = retry_send(|| async {
            let token = auth.token().await.unwrap_or_default();
            client.get(&url).bearer_auth(token).send().await
        })
        .await
        .map_err(|e| Self::map_transport_err("get_invoice", e))?;
        let resp = Self::check_status("get_invoice", resp).await?;
        resp.json()
            .await
            .map_err(|e| ReconcileError::CfsClient(format!("decode get_invoice response: {e}")))
    }

    async fn reverse_invoice(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
    ) -> Result<(), ReconcileError> {
        let url = format!(
            "{}/cfs/parties/{}/accs/invoices/{}/reverse",
            self.base_url,
            cfs_account_id.get(),
            invoice_number
        );
        let builder = self.authed(self.client.post(&url)).await?;
        let resp = builder
            .send()
            .await
            .map_err(|e| Self::map_transport_err("reverse_invoice", e))?;
        Self::check_status("reverse_invoice", resp).await?;
        Ok(())
    }

    async fn adjust_invoice(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
        amount: Decimal,
    ) -> Result<(), ReconcileError> {
        let url = format!(
            "{}/cfs/parties/{}/accs/invoices/{}/adjustment",
            self.base_url,
            cfs_account_id.get(),
            invoice_number
        );
        let builder = self
            .authed(self.client.post(&url).json(&serde_json::json!({ "amount": amount })))
            .await?;
        let resp = builder
            .send()
            .await
            .map_err(|e| Self::map_transport_err("adjust_invoice", e))?;
        Self::check_status("adjust_invoice", resp).await?;
        Ok(())
    }

    async fn apply_receipt(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
        receipt_number: &str,
    ) -> Result<CfsReceiptResponse, ReconcileError> {
        let url = format!(
            "{}/cfs/parties/{}/accs/invoices/{}/receipts",
            self.base_url,
            cfs_account_id.get(),
            invoice_number
        );
        let builder = self
            .authed(self.client.post(&url).json(&serde_json::json!({ "receipt_number": receipt_number })))
            .await?;
        let resp = builder
            .send()
            .await
            .map_err(|e| Self::map_transport_err("apply_receipt", e))?;
        let resp = Self::check_status("apply_receipt", resp).await?;
        resp.json()
            .await
            .map_err(|e| ReconcileError::CfsClient(format!("decode apply_receipt response: {e}")))
    }

    async fn unapply_receipt(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
        receipt_number: &str,
    ) -> Result<(), ReconcileError> {
        let url = format!(
            "{}/cfs/parties/{}/accs/invoices/{}/receipts/{}",
            self.base_url,
            cfs_account_id.get(),
            invoice_number,
            receipt_number
        );
        let builder = self.authed(self.client.delete(&url)).await?;
        let resp = builder
            .send()
            .await
            .map_err(|e| Self::map_transport_err("unapply_receipt", e))?;
        Self::check_status("unapply_receipt", resp).await?;
        Ok(())
    }

    async fn get_receipt(
        &self,
        cfs_account_id: CfsAccountId,
        receipt_number: &str,
    ) -> Result<CfsReceiptResponse, ReconcileError> {
        let url = format!(
            "{}/cfs/parties/{}/accs/receipts/{}",
            self.base_url,
            cfs_account_id.get(),
            receipt_number
        );
        let client = &self.client;
        let auth = &self.auth;
        let resp = retry_send(|| async {
            let token = auth.token().await.unwrap_or_default();
            client.get(&url).bearer_auth(token).send().await
        })
        .await
        .map_err(|e| Self::map_transport_err("get_receipt", e))?;
        let resp = Self::check_status("get_receipt", resp).await?;
        resp.json()
            .await
            .map_err(|e| ReconcileError::CfsClient(format!("decode get_receipt response: {e}")))
    }

    async fn get_cms(
        &self,
        cfs_account_id: CfsAccountId,
        cfs_identifier: &str,
    ) -> Result<CfsCreditMemoResponse, ReconcileError> {
        let url = format!(
            "{}/cfs/parties/{}/accs/cms/{}",
            self.base_url,
            cfs_account_id.get(),
            cfs_identifier
        );
        let client = &self.client;
        let auth = &self.auth;
        let resp = retry_send(|| async {
            let token = auth.token().await.unwrap_or_default();
            client.get(&url).bearer_auth(token).send().await
        })
        .await
        .map_err(|e| Self::map_transport_err("get_cms", e))?;
        let resp = Self::check_status("get_cms", resp).await?;
        resp.json()
            .await
            .map_err(|e| ReconcileError::CfsClient(format!("decode get_cms response: {e}")))
    }

    async fn stop_pad(&self, cfs_account_id: CfsAccountId) -> Result<(), ReconcileError> {
        let url = format!("{}/cfs/parties/{}/accs/stop-pad", self.base_url, cfs_account_id.get());
        let builder = self.authed(self.client.post(&url)).await?;
        let resp = builder
            .send()
            .await
            .map_err(|e| Self::map_transport_err("stop_pad", e))?;
        Self::check_status("stop_pad", resp).await?;
        Ok(())
    }

    async fn add_nsf_adjustment(
        &self,
        cfs_account_id: CfsAccountId,
        invoice_number: &str,
        nsf_fee: Decimal,
    ) -> Result<(), ReconcileError> {
        let url = format!(
            "{}/cfs/parties/{}/accs/invoices/{}/nsf-adjustment",
            self.base_url,
            cfs_account_id.get(),
            invoice_number
        );
        let builder = self
            .authed(self.client.post(&url).json(&serde_json::json!({ "amount": nsf_fee })))
            .await?;
        let resp = builder
            .send()
            .await
            .map_err(|e| Self::map_transport_err("add_nsf_adjustment", e))?;
        Self::check_status("add_nsf_adjustment", resp).await?;
        Ok(())
    }
}
