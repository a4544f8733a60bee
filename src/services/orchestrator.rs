use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::balance::BalanceResolver;
use crate::config::Config;
use crate::drivers::{ExecutionDrivers, ExecutionResult};
use crate::error::{DefierError, Result};
use crate::intent::{Intent, SELF_RECIPIENT};
use crate::interfaces::bridge::BridgeProvider;
use crate::interfaces::providers::{LlmProvider, Role};
use crate::interfaces::signer::WalletSigner;
use crate::interfaces::tools::ToolCatalog;
use crate::providers::bridge_http::HttpBridgeProvider;
use crate::providers::openai::OpenAiProvider;
use crate::providers::signer_rpc::JsonRpcSigner;
use crate::services::chat::{ChatService, ChatTurn};
use crate::services::execution::{ExecutionReport, ExecutionRequest, ExecutionService};
use crate::services::intent::IntentService;
use crate::split::SplitContract;
use crate::strategy::{is_address, BridgePreview, SplitPolicy};
use crate::tools::mcp::McpToolCatalog;

pub const ENS_TOOL: &str = "get_address_by_ens_name";

static ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0x[a-fA-F0-9]{40}").expect("address regex"));
static DOMAIN_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9][a-z0-9-]*(?:\.[a-z0-9-]+)+\b").expect("domain name regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReply {
    pub reply: String,
    pub intent: Option<Intent>,
    /// Dry-run plan for the intent, present when a wallet was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ExecutionReport>,
}

/// First hex address found in a name-service tool result.
pub fn scrape_address(result: &Value) -> Option<String> {
    let candidates = [
        result.get("address"),
        result.pointer("/data/address"),
        result.pointer("/result/address"),
        result.pointer("/structuredContent/address"),
        result.pointer("/content/0/text"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(|value| value.as_str())
        .find_map(|text| ADDRESS.find(text).map(|m| m.as_str().to_string()))
        .or_else(|| {
            ADDRESS
                .find(&result.to_string())
                .map(|m| m.as_str().to_string())
        })
}

/// Wires chat, intent extraction and execution around shared providers.
pub struct Orchestrator {
    chat: ChatService,
    intents: IntentService,
    execution: ExecutionService,
    tools: Arc<dyn ToolCatalog>,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Arc<dyn ToolCatalog>,
        bridge: Arc<dyn BridgeProvider>,
        signer: Arc<dyn WalletSigner>,
        config: &Config,
    ) -> Self {
        let split = SplitContract::new(signer.clone(), &config.split);
        let drivers = ExecutionDrivers::new(bridge.clone(), signer, split);
        let execution = ExecutionService::new(
            drivers,
            BalanceResolver::new(bridge),
            SplitPolicy::from(&config.split),
        );
        Self {
            chat: ChatService::new(llm.clone(), tools.clone(), config.chat.max_tool_rounds),
            intents: IntentService::new(llm),
            execution,
            tools,
        }
    }

    /// Builds the HTTP-backed providers described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.http.timeout();
        let llm = OpenAiProvider::from_config(config.openai.as_ref(), timeout)?
            .with_temperature(config.chat.temperature);
        let tools = McpToolCatalog::new(&config.mcp.servers, timeout)?;
        let bridge = HttpBridgeProvider::new(config.bridge.base_url.clone(), timeout)?;
        let signer = JsonRpcSigner::from_config(&config.signer, timeout)?;
        Ok(Self::new(
            Arc::new(llm),
            Arc::new(tools),
            Arc::new(bridge),
            Arc::new(signer),
            config,
        ))
    }

    /// Connects tool servers. Servers that fail are skipped, so this only
    /// fails on configuration problems.
    pub async fn initialize(&self) -> Result<()> {
        self.tools.initialize().await?;
        info!("Orchestrator initialized");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.tools.shutdown().await
    }

    /// Chat reply and intent for the latest user turn, computed concurrently.
    /// With a wallet, an actionable intent is also planned against its
    /// balances without sending anything.
    pub async fn handle_message(
        &self,
        history: &[ChatTurn],
        wallet: Option<&str>,
    ) -> Result<MessageReply> {
        let latest = history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .map(|turn| turn.content.as_str())
            .unwrap_or_default();
        let (reply, intent) = tokio::join!(self.chat.respond(history), self.intents.extract(latest));
        let (reply, intent) = (reply?, intent?);

        let wallet = wallet.map(str::trim).filter(|wallet| !wallet.is_empty());
        let plan = match (&intent, wallet) {
            (Some(intent), Some(wallet)) => Some(
                self.execute(ExecutionRequest {
                    intent: Some(intent.clone()),
                    message: latest.to_string(),
                    wallet: Some(wallet.to_string()),
                    source_hint: None,
                    dry_run: true,
                })
                .await,
            ),
            _ => None,
        };
        Ok(MessageReply {
            reply: reply.text,
            intent,
            plan,
        })
    }

    pub async fn extract_intent(&self, text: &str) -> Result<Option<Intent>> {
        self.intents.extract(text).await
    }

    /// `Ok(None)` when the name does not resolve or the lookup fails.
    pub async fn resolve_ens(&self, name: &str) -> Result<Option<String>> {
        let name = name.trim();
        if name.is_empty() || !name.contains('.') {
            return Err(DefierError::Validation(format!("invalid name: {name}")));
        }
        match self.tools.call_tool(ENS_TOOL, json!({"name": name})).await {
            Ok(result) => Ok(scrape_address(&result)),
            Err(err) if err.is_config() => Err(err),
            Err(err) => {
                warn!(name = %name, error = %err, "Name lookup failed");
                Ok(None)
            }
        }
    }

    /// Replaces every name in the recipient field with its address.
    async fn resolve_recipients(&self, recipient: &str) -> std::result::Result<String, String> {
        let mut resolved = recipient.to_string();
        let names: Vec<String> = DOMAIN_NAME
            .find_iter(recipient)
            .map(|m| m.as_str().to_string())
            .collect();
        for name in names {
            match self.resolve_ens(&name).await {
                Ok(Some(address)) => {
                    info!(name = %name, address = %address, "Resolved recipient");
                    resolved = resolved.replace(&name, &address);
                }
                Ok(None) | Err(_) => {
                    return Err(format!(
                        "Could not resolve {name} to an address. Use a 0x address instead."
                    ))
                }
            }
        }
        Ok(resolved)
    }

    pub async fn execute(&self, mut request: ExecutionRequest) -> ExecutionReport {
        if let Some(intent) = request.intent.as_mut() {
            let recipient = intent.fields().recipient.clone();
            let needs_lookup = !recipient.eq_ignore_ascii_case(SELF_RECIPIENT)
                && !is_address(&recipient)
                && DOMAIN_NAME.is_match(&recipient);
            if needs_lookup {
                match self.resolve_recipients(&recipient).await {
                    Ok(resolved) => intent.set_recipient(resolved),
                    Err(reason) => return ExecutionReport::Rejected { reason },
                }
            }
        }
        self.execution.execute(&request).await
    }

    pub async fn confirm_bridge(&self, preview: &BridgePreview, wallet: Option<&str>) -> ExecutionResult {
        self.execution.confirm_bridge(preview, wallet).await
    }
}
