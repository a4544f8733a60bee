use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::chains::CanonicalChain;
use crate::error::{DefierError, Result};

pub const COINGECKO_MCP_URL: &str = "https://mcp.api.coingecko.com/mcp";
pub const BLOCKSCOUT_MCP_URL: &str = "https://mcp.blockscout.com/mcp";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct McpServerConfig {
    /// Either `coingecko` or `blockscout`; used to route tool calls.
    pub provider: String,
    pub url: String,
    #[serde(default)]
    pub headers: Option<std::collections::HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct McpConfig {
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:3001";
pub const DEFAULT_SIGNER_URL: &str = "http://127.0.0.1:8545";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Base URL of the balance/bridge gateway.
    #[serde(default = "default_bridge_url")]
    pub base_url: String,
}

fn default_bridge_url() -> String {
    DEFAULT_BRIDGE_URL.to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_bridge_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignerConfig {
    /// JSON-RPC endpoint of the wallet signer.
    #[serde(default = "default_signer_url")]
    pub rpc_url: String,
    #[serde(default = "default_receipt_attempts")]
    pub receipt_poll_attempts: u32,
    #[serde(default = "default_receipt_interval_ms")]
    pub receipt_poll_interval_ms: u64,
}

fn default_signer_url() -> String {
    DEFAULT_SIGNER_URL.to_string()
}

fn default_receipt_attempts() -> u32 {
    30
}

fn default_receipt_interval_ms() -> u64 {
    2_000
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_signer_url(),
            receipt_poll_attempts: default_receipt_attempts(),
            receipt_poll_interval_ms: default_receipt_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SplitConfig {
    pub chain: CanonicalChain,
    pub contract_address: String,
    pub token_address: String,
    /// Symbol users type for the split stablecoin.
    pub token_symbol: String,
    #[serde(default = "default_split_precision")]
    pub precision: u8,
}

fn default_split_precision() -> u8 {
    6
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chain: CanonicalChain::Sepolia,
            contract_address: "0xE896c58D65A78ca74D9473791eA6555908DF3760".to_string(),
            token_address: "0xCaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9".to_string(),
            token_symbol: "PYUSD".to_string(),
            precision: default_split_precision(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tool_rounds() -> usize {
    5
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub openai: Option<OpenAiConfig>,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub signer: SignerConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    pub fn convention_defaults() -> Self {
        Self {
            openai: Some(OpenAiConfig {
                api_key: None,
                model: Some("gpt-4o-mini".to_string()),
                base_url: Some("https://api.openai.com/v1".to_string()),
            }),
            mcp: McpConfig {
                servers: vec![
                    McpServerConfig {
                        provider: "coingecko".to_string(),
                        url: COINGECKO_MCP_URL.to_string(),
                        headers: None,
                    },
                    McpServerConfig {
                        provider: "blockscout".to_string(),
                        url: BLOCKSCOUT_MCP_URL.to_string(),
                        headers: None,
                    },
                ],
            },
            bridge: BridgeConfig::default(),
            signer: SignerConfig::default(),
            split: SplitConfig::default(),
            chat: ChatConfig::default(),
            http: HttpConfig::default(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            DefierError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| DefierError::Config(e.to_string()))
    }

    /// Reads `path` when given, otherwise starts from the defaults. Environment
    /// overrides are applied in both cases.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::convention_defaults(),
        };
        Ok(config.resolve_env())
    }

    pub fn resolve_env(mut self) -> Self {
        let env_key = ["DEFIER_OPENAI_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .filter(|value| !value.trim().is_empty());
        if let Some(key) = env_key {
            let openai = self.openai.get_or_insert(OpenAiConfig {
                api_key: None,
                model: None,
                base_url: None,
            });
            if openai.api_key.is_none() {
                openai.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("DEFIER_BRIDGE_URL") {
            if !url.trim().is_empty() {
                self.bridge.base_url = url;
            }
        }
        if let Ok(url) = std::env::var("DEFIER_SIGNER_URL") {
            if !url.trim().is_empty() {
                self.signer.rpc_url = url;
            }
        }
        self
    }
}
