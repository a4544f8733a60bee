use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::balance::AssetEntry;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub token: String,
    pub amount: String,
    pub chain_id: u64,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    pub token: String,
    pub amount: String,
    pub source_chain_id: u64,
    pub destination_chain_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeAndExecuteRequest {
    pub token: String,
    pub amount: String,
    pub destination_chain_id: u64,
    pub recipient: String,
    /// Absent lets the provider pick the source from its own balance view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// Cross-chain balance and bridging gateway. Results are returned in the
/// provider's own shape; `drivers` normalizes them.
#[async_trait]
pub trait BridgeProvider: Send + Sync {
    async fn unified_balances(
        &self,
        wallet: &str,
        include_breakdown: bool,
    ) -> Result<Vec<AssetEntry>>;

    async fn transfer(&self, request: &TransferRequest) -> Result<Value>;

    async fn bridge(&self, request: &BridgeRequest) -> Result<Value>;

    async fn bridge_and_execute(&self, request: &BridgeAndExecuteRequest) -> Result<Value>;
}
