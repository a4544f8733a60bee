use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::chains::{CanonicalChain, CanonicalToken};
use crate::error::DefierError;
use crate::interfaces::bridge::{
    BridgeAndExecuteRequest, BridgeProvider, BridgeRequest, TransferRequest,
};
use crate::interfaces::signer::WalletSigner;
use crate::split::SplitContract;

const HASH_FIELDS: [&str; 4] = [
    "transactionHash",
    "txHash",
    "bridgeTransactionHash",
    "executeTransactionHash",
];

/// Outcome of one driver call. Never carries both a hash and an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Success {
        tx_hash: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        explorer_url: Option<String>,
    },
    Failure {
        error: String,
    },
    /// The user rejected the wallet prompt.
    Declined {
        reason: String,
    },
}

impl ExecutionResult {
    pub fn success(chain: CanonicalChain, tx_hash: String) -> Self {
        Self::Success {
            explorer_url: Some(chain.explorer_tx_url(&tx_hash)),
            tx_hash,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeExecuteOutcome {
    Hash(String),
    NoHash,
    Failed { reason: Option<String> },
    Declined { reason: String },
}

/// Canonical reading of a provider result object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    Hash(String),
    NoHash,
    Failed(Option<String>),
}

fn hash_in(value: &Value) -> Option<String> {
    HASH_FIELDS.iter().find_map(|field| {
        value
            .get(*field)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|hash| !hash.is_empty())
            .map(str::to_string)
    })
}

fn error_text(value: &Value) -> Option<String> {
    let error = value.get("error").or_else(|| value.get("message"))?;
    match error {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        Value::Null => None,
        other => Some(other.to_string()),
    }
    .filter(|text| !text.trim().is_empty())
}

pub fn normalize_provider_result(value: &Value) -> ProviderOutcome {
    if value.get("success").and_then(|v| v.as_bool()) == Some(false) {
        return ProviderOutcome::Failed(error_text(value));
    }
    match hash_in(value).or_else(|| value.get("result").and_then(hash_in)) {
        Some(hash) => ProviderOutcome::Hash(hash),
        None => ProviderOutcome::NoHash,
    }
}

fn is_user_rejection(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("user rejected") || lowered.contains("user denied")
}

fn declined_reason(err: &DefierError) -> Option<String> {
    match err {
        DefierError::SignerRejected(reason) => Some(reason.clone()),
        other => {
            let message = other.to_string();
            is_user_rejection(&message).then_some(message)
        }
    }
}

fn result_from_error(err: DefierError) -> ExecutionResult {
    match declined_reason(&err) {
        Some(reason) => ExecutionResult::Declined { reason },
        None => ExecutionResult::failure(err.to_string()),
    }
}

fn result_from_provider(value: &Value, chain: CanonicalChain, operation: &str) -> ExecutionResult {
    match normalize_provider_result(value) {
        ProviderOutcome::Hash(hash) => ExecutionResult::success(chain, hash),
        ProviderOutcome::NoHash => {
            ExecutionResult::failure(format!("{operation} returned no transaction hash"))
        }
        ProviderOutcome::Failed(reason) => {
            let reason = reason.unwrap_or_else(|| format!("{operation} failed"));
            if is_user_rejection(&reason) {
                ExecutionResult::Declined { reason }
            } else {
                ExecutionResult::failure(reason)
            }
        }
    }
}

/// Thin adapters over the bridge provider, the signer and the split contract.
#[derive(Clone)]
pub struct ExecutionDrivers {
    bridge: Arc<dyn BridgeProvider>,
    signer: Arc<dyn WalletSigner>,
    split: SplitContract,
}

impl ExecutionDrivers {
    pub fn new(
        bridge: Arc<dyn BridgeProvider>,
        signer: Arc<dyn WalletSigner>,
        split: SplitContract,
    ) -> Self {
        Self {
            bridge,
            signer,
            split,
        }
    }

    pub async fn transfer(
        &self,
        chain: CanonicalChain,
        token: CanonicalToken,
        amount: &str,
        recipient: &str,
        sender: Option<&str>,
    ) -> ExecutionResult {
        let request = TransferRequest {
            token: token.symbol().to_string(),
            amount: amount.to_string(),
            chain_id: chain.id(),
            recipient: recipient.to_string(),
            sender: sender.map(str::to_string),
        };
        info!(chain = %chain, token = %token, amount = %amount, "Direct transfer");
        match self.bridge.transfer(&request).await {
            Ok(value) => result_from_provider(&value, chain, "transfer"),
            Err(err) => {
                warn!(error = %err, "Transfer call failed");
                result_from_error(err)
            }
        }
    }

    pub async fn bridge(
        &self,
        from: CanonicalChain,
        to: CanonicalChain,
        token: CanonicalToken,
        amount: &str,
        recipient: Option<&str>,
        sender: Option<&str>,
    ) -> ExecutionResult {
        let request = BridgeRequest {
            token: token.symbol().to_string(),
            amount: amount.to_string(),
            source_chain_id: from.id(),
            destination_chain_id: to.id(),
            recipient: recipient.map(str::to_string),
            sender: sender.map(str::to_string),
        };
        info!(from = %from, to = %to, token = %token, amount = %amount, "Bridge");
        match self.bridge.bridge(&request).await {
            Ok(value) => result_from_provider(&value, from, "bridge"),
            Err(err) => {
                warn!(error = %err, "Bridge call failed");
                result_from_error(err)
            }
        }
    }

    /// Switches the signer to `source` first. A failed switch is ignored;
    /// the provider prompts again when it needs a different chain.
    pub async fn bridge_and_execute(
        &self,
        token: CanonicalToken,
        amount: &str,
        to: CanonicalChain,
        recipient: &str,
        source: Option<CanonicalChain>,
        sender: Option<&str>,
    ) -> BridgeExecuteOutcome {
        if let Some(source) = source {
            if let Err(err) = self.signer.switch_chain(source.id()).await {
                debug!(chain = %source, error = %err, "Chain switch before bridge failed");
            }
        }
        let request = BridgeAndExecuteRequest {
            token: token.symbol().to_string(),
            amount: amount.to_string(),
            destination_chain_id: to.id(),
            recipient: recipient.to_string(),
            source_chain_id: source.map(CanonicalChain::id),
            sender: sender.map(str::to_string),
        };
        info!(to = %to, source = ?source, token = %token, amount = %amount, "Bridge and execute");
        match self.bridge.bridge_and_execute(&request).await {
            Ok(value) => match normalize_provider_result(&value) {
                ProviderOutcome::Hash(hash) => BridgeExecuteOutcome::Hash(hash),
                ProviderOutcome::NoHash => BridgeExecuteOutcome::NoHash,
                ProviderOutcome::Failed(Some(reason)) if is_user_rejection(&reason) => {
                    BridgeExecuteOutcome::Declined { reason }
                }
                ProviderOutcome::Failed(reason) => BridgeExecuteOutcome::Failed { reason },
            },
            Err(err) => {
                warn!(error = %err, "Bridge-and-execute call failed");
                match declined_reason(&err) {
                    Some(reason) => BridgeExecuteOutcome::Declined { reason },
                    None => BridgeExecuteOutcome::Failed {
                        reason: Some(err.to_string()),
                    },
                }
            }
        }
    }

    pub async fn split_transfer(
        &self,
        recipients: &[String],
        amounts: &[String],
        sender: Option<&str>,
    ) -> ExecutionResult {
        let chain = self.split.chain();
        if let Err(err) = self.signer.switch_chain(chain.id()).await {
            debug!(chain = %chain, error = %err, "Chain switch before split failed");
        }
        match self.split.split_transfer(recipients, amounts, sender).await {
            Ok(hash) => ExecutionResult::success(chain, hash),
            Err(err) => {
                warn!(error = %err, "Split transfer failed");
                result_from_error(err)
            }
        }
    }
}
