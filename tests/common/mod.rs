#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Barrier;

use defier::balance::AssetEntry;
use defier::config::Config;
use defier::error::{DefierError, Result};
use defier::interfaces::bridge::{
    BridgeAndExecuteRequest, BridgeProvider, BridgeRequest, TransferRequest,
};
use defier::interfaces::providers::{ChatMessage, LlmProvider, LlmResponse, ToolCall};
use defier::interfaces::signer::{TransactionReceipt, TransactionRequest, WalletSigner};
use defier::interfaces::tools::{ToolCatalog, ToolDescriptor, ToolProvider};
use defier::services::orchestrator::Orchestrator;

pub const WALLET: &str = "0x9999999999999999999999999999999999999999";
pub const ALICE: &str = "0x1111111111111111111111111111111111111111";
pub const BOB: &str = "0x2222222222222222222222222222222222222222";

pub fn text(reply: &str) -> Result<LlmResponse> {
    Ok(LlmResponse {
        text: reply.to_string(),
        tool_calls: Vec::new(),
    })
}

pub fn calls(names: &[&str]) -> Result<LlmResponse> {
    Ok(LlmResponse {
        text: String::new(),
        tool_calls: names
            .iter()
            .map(|name| ToolCall {
                name: name.to_string(),
                arguments: json!({"chain_id": "1"}),
            })
            .collect(),
    })
}

/// Replays queued chat responses and records what each call received.
#[derive(Default)]
pub struct QueueLlmProvider {
    chat_responses: Mutex<VecDeque<Result<LlmResponse>>>,
    text_responses: Mutex<VecDeque<Result<String>>>,
    /// `(message count, tools attached)` per chat call.
    pub chat_calls: Mutex<Vec<(usize, bool)>>,
    pub last_messages: Mutex<Vec<ChatMessage>>,
    /// Returned once both queues are drained.
    pub fallback: Option<LlmResponse>,
    /// Every chat and text call waits here before answering.
    pub gate: Option<Arc<Barrier>>,
}

impl QueueLlmProvider {
    pub fn new(chat: Vec<Result<LlmResponse>>) -> Self {
        Self {
            chat_responses: Mutex::new(chat.into()),
            ..Self::default()
        }
    }

    pub fn repeating(response: LlmResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::default()
        }
    }

    pub fn with_text(self, texts: Vec<Result<String>>) -> Self {
        *self.text_responses.lock().unwrap() = texts.into();
        self
    }

    pub fn with_gate(mut self, gate: Arc<Barrier>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn chat_call_count(&self) -> usize {
        self.chat_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for QueueLlmProvider {
    async fn generate_text(&self, _prompt: &str, _system_prompt: &str) -> Result<String> {
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        self.text_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Intent: null".to_string()))
    }

    async fn chat(
        &self,
        _system_prompt: &str,
        messages: &[ChatMessage],
        tools: Option<Vec<Value>>,
    ) -> Result<LlmResponse> {
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        self.chat_calls
            .lock()
            .unwrap()
            .push((messages.len(), tools.is_some()));
        *self.last_messages.lock().unwrap() = messages.to_vec();
        let next = self.chat_responses.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| DefierError::Provider("queue exhausted".to_string())),
        }
    }
}

pub fn descriptor(name: &str, provider: ToolProvider) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: format!("{name} tool"),
        input_schema: json!({"type": "object", "properties": {"chain_id": {"type": "string"}}}),
        provider,
    }
}

/// Fixed descriptors with canned results per tool name.
#[derive(Default)]
pub struct StaticToolCatalog {
    pub descriptors: Vec<ToolDescriptor>,
    pub results: HashMap<String, Value>,
    pub calls: Mutex<Vec<(String, Value)>>,
    pub initialized: Mutex<usize>,
    /// Every tool call waits here before answering.
    pub gate: Option<Arc<Barrier>>,
}

impl StaticToolCatalog {
    pub fn new(descriptors: Vec<ToolDescriptor>) -> Self {
        Self {
            descriptors,
            ..Self::default()
        }
    }

    pub fn with_result(mut self, name: &str, result: Value) -> Self {
        self.results.insert(name.to_string(), result);
        self
    }

    pub fn with_gate(mut self, gate: Arc<Barrier>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl ToolCatalog for StaticToolCatalog {
    async fn initialize(&self) -> Result<()> {
        *self.initialized.lock().unwrap() += 1;
        Ok(())
    }

    async fn tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(self.descriptors.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        self.results
            .get(name)
            .cloned()
            .ok_or_else(|| DefierError::Provider(format!("no result for {name}")))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Bridge gateway that records every request and answers from queues.
#[derive(Default)]
pub struct RecordingBridgeProvider {
    pub balances: Vec<AssetEntry>,
    pub transfer_results: Mutex<VecDeque<Value>>,
    pub bridge_results: Mutex<VecDeque<Value>>,
    pub bridge_execute_results: Mutex<VecDeque<Value>>,
    pub transfers: Mutex<Vec<TransferRequest>>,
    pub bridges: Mutex<Vec<BridgeRequest>>,
    pub bridge_executes: Mutex<Vec<BridgeAndExecuteRequest>>,
}

impl RecordingBridgeProvider {
    pub fn with_balances(balances: Value) -> Self {
        Self {
            balances: serde_json::from_value(balances).unwrap(),
            ..Self::default()
        }
    }

    pub fn push_transfer(self, result: Value) -> Self {
        self.transfer_results.lock().unwrap().push_back(result);
        self
    }

    pub fn push_bridge(self, result: Value) -> Self {
        self.bridge_results.lock().unwrap().push_back(result);
        self
    }

    pub fn push_bridge_execute(self, result: Value) -> Self {
        self.bridge_execute_results.lock().unwrap().push_back(result);
        self
    }
}

fn next_or_hash(queue: &Mutex<VecDeque<Value>>, default_hash: &str) -> Value {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| json!({"success": true, "transactionHash": default_hash}))
}

#[async_trait]
impl BridgeProvider for RecordingBridgeProvider {
    async fn unified_balances(
        &self,
        _wallet: &str,
        _include_breakdown: bool,
    ) -> Result<Vec<AssetEntry>> {
        Ok(self.balances.clone())
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<Value> {
        self.transfers.lock().unwrap().push(request.clone());
        Ok(next_or_hash(&self.transfer_results, "0xtransfer"))
    }

    async fn bridge(&self, request: &BridgeRequest) -> Result<Value> {
        self.bridges.lock().unwrap().push(request.clone());
        Ok(next_or_hash(&self.bridge_results, "0xbridge"))
    }

    async fn bridge_and_execute(&self, request: &BridgeAndExecuteRequest) -> Result<Value> {
        self.bridge_executes.lock().unwrap().push(request.clone());
        Ok(next_or_hash(&self.bridge_execute_results, "0xbridgeexecute"))
    }
}

/// Wallet with a fixed account. `eth_call` answers decimals and allowance
/// reads; sends return sequential hashes.
pub struct RecordingSigner {
    pub decimals: u128,
    pub allowance: u128,
    pub reject_sends: bool,
    pub switched: Mutex<Vec<u64>>,
    pub sent: Mutex<Vec<TransactionRequest>>,
}

impl Default for RecordingSigner {
    fn default() -> Self {
        Self {
            decimals: 6,
            allowance: 0,
            reject_sends: false,
            switched: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }
}

fn word(value: u128) -> String {
    format!("0x{value:064x}")
}

#[async_trait]
impl WalletSigner for RecordingSigner {
    async fn accounts(&self) -> Result<Vec<String>> {
        Ok(vec![WALLET.to_string()])
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        self.switched.lock().unwrap().push(chain_id);
        Ok(())
    }

    async fn call(&self, request: &TransactionRequest) -> Result<String> {
        if request.data.starts_with("0x313ce567") {
            Ok(word(self.decimals))
        } else if request.data.starts_with("0xdd62ed3e") {
            Ok(word(self.allowance))
        } else {
            Err(DefierError::Provider(format!("unexpected call {}", request.data)))
        }
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<String> {
        if self.reject_sends {
            return Err(DefierError::SignerRejected(
                "User rejected the request.".to_string(),
            ));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(request.clone());
        Ok(format!("0xsent{}", sent.len()))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt> {
        Ok(TransactionReceipt {
            transaction_hash: tx_hash.to_string(),
            success: true,
        })
    }
}

pub struct Harness {
    pub llm: Arc<QueueLlmProvider>,
    pub tools: Arc<StaticToolCatalog>,
    pub bridge: Arc<RecordingBridgeProvider>,
    pub signer: Arc<RecordingSigner>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new(
        llm: QueueLlmProvider,
        tools: StaticToolCatalog,
        bridge: RecordingBridgeProvider,
        signer: RecordingSigner,
    ) -> Self {
        let llm = Arc::new(llm);
        let tools = Arc::new(tools);
        let bridge = Arc::new(bridge);
        let signer = Arc::new(signer);
        let orchestrator = Orchestrator::new(
            llm.clone(),
            tools.clone(),
            bridge.clone(),
            signer.clone(),
            &Config::convention_defaults(),
        );
        Self {
            llm,
            tools,
            bridge,
            signer,
            orchestrator,
        }
    }

    pub fn with_bridge(bridge: RecordingBridgeProvider) -> Self {
        Self::new(
            QueueLlmProvider::default(),
            StaticToolCatalog::default(),
            bridge,
            RecordingSigner::default(),
        )
    }
}

pub fn usdc_balances(entries: &[(u64, &str)]) -> Value {
    json!([{
        "symbol": "USDC",
        "balance": "0",
        "balanceInFiat": "0",
        "breakdown": entries
            .iter()
            .map(|(id, balance)| json!({"chain": {"id": id, "name": ""}, "balance": balance}))
            .collect::<Vec<_>>()
    }])
}
