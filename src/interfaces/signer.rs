use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    /// 0x-prefixed calldata.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub success: bool,
}

/// EIP-1193 style wallet. Implementations map a user rejection to
/// [`crate::error::DefierError::SignerRejected`].
#[async_trait]
pub trait WalletSigner: Send + Sync {
    async fn accounts(&self) -> Result<Vec<String>>;

    async fn switch_chain(&self, chain_id: u64) -> Result<()>;

    /// Read-only call; returns the 0x-prefixed return data.
    async fn call(&self, request: &TransactionRequest) -> Result<String>;

    /// Returns the transaction hash.
    async fn send_transaction(&self, request: &TransactionRequest) -> Result<String>;

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt>;
}
