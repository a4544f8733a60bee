use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SignerConfig;
use crate::error::{DefierError, Result};
use crate::interfaces::signer::{TransactionReceipt, TransactionRequest, WalletSigner};

/// EIP-1193 user rejection.
const USER_REJECTED_CODE: i64 = 4001;

/// Wallet signer reached over Ethereum JSON-RPC (a local signing node or a
/// browser-wallet relay).
#[derive(Clone)]
pub struct JsonRpcSigner {
    endpoint: String,
    http: reqwest::Client,
    receipt_poll_attempts: u32,
    receipt_poll_interval: Duration,
}

impl JsonRpcSigner {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DefierError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
            receipt_poll_attempts: 30,
            receipt_poll_interval: Duration::from_secs(2),
        })
    }

    pub fn from_config(config: &SignerConfig, timeout: Duration) -> Result<Self> {
        let url = config.rpc_url.trim();
        if url.is_empty() {
            return Err(DefierError::Config("signer rpc_url is empty".to_string()));
        }
        let mut signer = Self::new(url, timeout)?;
        signer.receipt_poll_attempts = config.receipt_poll_attempts.max(1);
        signer.receipt_poll_interval = Duration::from_millis(config.receipt_poll_interval_ms);
        Ok(signer)
    }

    pub async fn rpc_call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DefierError::Http(format!("signer rpc transport failure: {e}")))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| DefierError::Serialization(format!("signer rpc decode failure: {e}")))?;

        if !status.is_success() && body.get("error").is_none() {
            return Err(DefierError::Provider(format!(
                "signer rpc http {status}: {body}"
            )));
        }

        normalize_rpc_result(body, method)
    }
}

fn normalize_rpc_result(body: Value, method: &str) -> Result<Value> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(|c| c.as_i64());
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        if code == Some(USER_REJECTED_CODE) {
            return Err(DefierError::SignerRejected(message));
        }
        return Err(DefierError::Provider(format!(
            "signer rpc {method} error: {message}"
        )));
    }

    body.get("result")
        .cloned()
        .ok_or_else(|| DefierError::Provider(format!("signer rpc {method} missing result")))
}

fn expect_string(value: Value, method: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DefierError::Provider(format!("signer rpc {method} returned {value}")))
}

#[async_trait]
impl WalletSigner for JsonRpcSigner {
    async fn accounts(&self) -> Result<Vec<String>> {
        let result = self.rpc_call("eth_accounts", json!([])).await?;
        Ok(result
            .as_array()
            .map(|accounts| {
                accounts
                    .iter()
                    .filter_map(|account| account.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        self.rpc_call(
            "wallet_switchEthereumChain",
            json!([{"chainId": format!("0x{chain_id:x}")}]),
        )
        .await?;
        Ok(())
    }

    async fn call(&self, request: &TransactionRequest) -> Result<String> {
        let result = self
            .rpc_call("eth_call", json!([request, "latest"]))
            .await?;
        expect_string(result, "eth_call")
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<String> {
        let result = self
            .rpc_call("eth_sendTransaction", json!([request]))
            .await?;
        expect_string(result, "eth_sendTransaction")
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt> {
        for attempt in 0..self.receipt_poll_attempts {
            let result = self
                .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if !result.is_null() {
                let success = result.get("status").and_then(|s| s.as_str()) == Some("0x1");
                debug!(tx_hash = %tx_hash, success, attempt, "Receipt available");
                return Ok(TransactionReceipt {
                    transaction_hash: tx_hash.to_string(),
                    success,
                });
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
        warn!(tx_hash = %tx_hash, "Receipt polling gave up");
        Err(DefierError::Provider(format!(
            "no receipt for {tx_hash} after {} attempts",
            self.receipt_poll_attempts
        )))
    }
}
