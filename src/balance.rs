use std::sync::Arc;

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::chains::{normalize_token, try_normalize_chain, CanonicalChain};
use crate::interfaces::bridge::BridgeProvider;
use crate::units::parse_units;

/// Fixed scale used when comparing balance strings.
const COMPARE_DECIMALS: u8 = 18;

fn decimal_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        _ => "0".to_string(),
    })
}

fn chain_id<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_u64().unwrap_or_default(),
        Some(Value::String(text)) => text.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

fn zero() -> String {
    "0".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRef {
    #[serde(default, deserialize_with = "chain_id")]
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

impl ChainRef {
    pub fn canonical(&self) -> Option<CanonicalChain> {
        CanonicalChain::from_id(self.id).or_else(|| try_normalize_chain(&self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBalance {
    #[serde(default)]
    pub chain: ChainRef,
    #[serde(default = "zero", deserialize_with = "decimal_string")]
    pub balance: String,
    #[serde(default = "zero", deserialize_with = "decimal_string")]
    pub balance_in_fiat: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    pub symbol: String,
    #[serde(default = "zero", deserialize_with = "decimal_string")]
    pub balance: String,
    #[serde(default = "zero", deserialize_with = "decimal_string")]
    pub balance_in_fiat: String,
    #[serde(default)]
    pub breakdown: Vec<ChainBalance>,
}

impl AssetEntry {
    fn holds(&self, token: &str) -> bool {
        self.symbol.trim().eq_ignore_ascii_case(normalize_token(token).symbol())
    }
}

/// Point-in-time snapshot across chains. Empty means "unknown", not "zero".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedBalance {
    pub assets: Vec<AssetEntry>,
}

fn scaled(amount: &str) -> U256 {
    parse_units(amount, COMPARE_DECIMALS).unwrap_or_default()
}

impl UnifiedBalance {
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    fn entries_for<'a>(&'a self, token: &'a str) -> impl Iterator<Item = &'a ChainBalance> + 'a {
        self.assets
            .iter()
            .filter(move |asset| asset.holds(token))
            .flat_map(|asset| asset.breakdown.iter())
    }

    /// Sum over every breakdown entry for `token` on `chain`, scaled to 18
    /// decimals. Duplicate entries are additive.
    pub fn amount_on_chain(&self, token: &str, chain: CanonicalChain) -> U256 {
        self.entries_for(token)
            .filter(|entry| entry.chain.canonical() == Some(chain))
            .fold(U256::ZERO, |total, entry| {
                total.saturating_add(scaled(&entry.balance))
            })
    }

    pub fn has_at_least(&self, token: &str, chain: CanonicalChain, amount: &str) -> bool {
        match parse_units(amount, COMPARE_DECIMALS) {
            Some(required) => self.amount_on_chain(token, chain) >= required,
            None => false,
        }
    }

    /// First chain in provider order holding a positive balance of `token`.
    pub fn first_funded_chain(
        &self,
        token: &str,
        excluding: CanonicalChain,
    ) -> Option<CanonicalChain> {
        self.entries_for(token)
            .filter(|entry| !scaled(&entry.balance).is_zero())
            .filter_map(|entry| entry.chain.canonical())
            .find(|chain| *chain != excluding)
    }
}

/// Reads the cross-chain balance view for a wallet.
#[derive(Clone)]
pub struct BalanceResolver {
    bridge: Arc<dyn BridgeProvider>,
}

impl BalanceResolver {
    pub fn new(bridge: Arc<dyn BridgeProvider>) -> Self {
        Self { bridge }
    }

    /// Never fails; provider errors degrade to an empty snapshot.
    pub async fn get_unified_balance(&self, wallet: &str) -> UnifiedBalance {
        match self.bridge.unified_balances(wallet, true).await {
            Ok(assets) => {
                debug!(wallet = %wallet, assets = assets.len(), "Fetched unified balance");
                UnifiedBalance { assets }
            }
            Err(err) => {
                warn!(wallet = %wallet, error = %err, "Unified balance lookup failed");
                UnifiedBalance::default()
            }
        }
    }
}
