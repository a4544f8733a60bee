use std::sync::Arc;

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{DefierError, Result};
use crate::interfaces::providers::{
    ChatMessage, LlmProvider, LlmResponse, MessagePart, Role, ToolCall,
};
use crate::interfaces::tools::ToolCatalog;
use crate::prompts::{BLOCKCHAIN_SYSTEM_PROMPT, CHAT_APOLOGY};
use crate::tool_selector::declarations_for_prompt;

static ACTION_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(transfer|bridge|swap|send|split)\b").expect("action verb regex")
});

/// Requests that will be executed rather than answered get no tool
/// declarations.
pub fn is_actionable_request(text: &str) -> bool {
    ACTION_VERB.is_match(text)
}

/// One entry of the conversation as clients send it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
    /// Model calls made for this reply.
    pub rounds: usize,
}

pub struct ChatService {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolCatalog>,
    max_tool_rounds: usize,
}

impl ChatService {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<dyn ToolCatalog>, max_tool_rounds: usize) -> Self {
        Self {
            llm,
            tools,
            max_tool_rounds: max_tool_rounds.max(1),
        }
    }

    async fn declarations(&self, prompt: &str) -> Result<Option<Vec<Value>>> {
        if is_actionable_request(prompt) {
            return Ok(None);
        }
        let tools = match self.tools.tools().await {
            Ok(tools) => tools,
            Err(err) if err.is_config() => return Err(err),
            Err(err) => {
                warn!(error = %err, "Tool catalog unavailable, chatting without tools");
                Vec::new()
            }
        };
        let declarations = declarations_for_prompt(&tools, prompt);
        debug!(available = tools.len(), selected = declarations.len(), "Tool declarations");
        Ok((!declarations.is_empty()).then_some(declarations))
    }

    async fn run_tool(&self, call: &ToolCall) -> MessagePart {
        let response = match self.tools.call_tool(&call.name, call.arguments.clone()).await {
            Ok(value) => value,
            Err(err) => {
                warn!(tool = %call.name, error = %err, "Tool call failed");
                json!({"error": err.to_string()})
            }
        };
        MessagePart::FunctionResponse {
            name: call.name.clone(),
            response,
        }
    }

    /// First model call: one retry without declarations, then the scripted
    /// apology. `None` means the apology should be returned.
    async fn first_call(
        &self,
        messages: &[ChatMessage],
        declarations: Option<Vec<Value>>,
    ) -> Result<Option<LlmResponse>> {
        let with_tools = declarations.is_some();
        match self.llm.chat(BLOCKCHAIN_SYSTEM_PROMPT, messages, declarations).await {
            Ok(response) => return Ok(Some(response)),
            Err(err) if err.is_config() => return Err(err),
            Err(err) => warn!(error = %err, with_tools, "First chat call failed, retrying without tools"),
        }
        match self.llm.chat(BLOCKCHAIN_SYSTEM_PROMPT, messages, None).await {
            Ok(response) => Ok(Some(response)),
            Err(err) if err.is_config() => Err(err),
            Err(err) => {
                warn!(error = %err, "Chat retry failed");
                Ok(None)
            }
        }
    }

    pub async fn respond(&self, history: &[ChatTurn]) -> Result<ChatReply> {
        let prompt = history
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .map(|turn| turn.content.clone())
            .unwrap_or_default();
        let declarations = self.declarations(&prompt).await?;

        let mut messages: Vec<ChatMessage> = history
            .iter()
            .map(|turn| ChatMessage {
                role: turn.role,
                parts: vec![MessagePart::Text(turn.content.clone())],
            })
            .collect();
        let mut last_text = String::new();

        for round in 0..self.max_tool_rounds {
            let response = if round == 0 {
                match self.first_call(&messages, declarations.clone()).await? {
                    Some(response) => response,
                    None => {
                        return Ok(ChatReply {
                            text: CHAT_APOLOGY.to_string(),
                            rounds: 1,
                        })
                    }
                }
            } else {
                self.llm
                    .chat(BLOCKCHAIN_SYSTEM_PROMPT, &messages, declarations.clone())
                    .await
                    .map_err(|err| match err {
                        DefierError::Config(message) => DefierError::Config(message),
                        other => DefierError::Provider(format!(
                            "chat round {} failed: {other}",
                            round + 1
                        )),
                    })?
            };

            if response.tool_calls.is_empty() {
                return Ok(ChatReply {
                    text: response.text,
                    rounds: round + 1,
                });
            }

            info!(round = round + 1, calls = response.tool_calls.len(), "Executing tool calls");
            let mut call_parts = Vec::new();
            if !response.text.trim().is_empty() {
                last_text = response.text.clone();
                call_parts.push(MessagePart::Text(response.text.clone()));
            }
            call_parts.extend(
                response
                    .tool_calls
                    .iter()
                    .cloned()
                    .map(MessagePart::FunctionCall),
            );
            messages.push(ChatMessage {
                role: Role::Assistant,
                parts: call_parts,
            });

            let results = join_all(response.tool_calls.iter().map(|call| self.run_tool(call))).await;
            messages.push(ChatMessage {
                role: Role::User,
                parts: results,
            });
        }

        // Whatever text the model produced alongside its calls, possibly empty.
        warn!(max_rounds = self.max_tool_rounds, "Tool round limit reached");
        Ok(ChatReply {
            text: last_text,
            rounds: self.max_tool_rounds,
        })
    }
}
