use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolProvider {
    Coingecko,
    Blockscout,
}

impl ToolProvider {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "coingecko" => Some(Self::Coingecko),
            "blockscout" => Some(Self::Blockscout),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coingecko => "coingecko",
            Self::Blockscout => "blockscout",
        }
    }
}

impl fmt::Display for ToolProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub provider: ToolProvider,
}

/// Remote tool servers reachable by name.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Idempotent; concurrent callers share one initialization.
    async fn initialize(&self) -> Result<()>;

    async fn tools(&self) -> Result<Vec<ToolDescriptor>>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value>;

    async fn shutdown(&self) -> Result<()>;
}
