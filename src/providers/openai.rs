use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionTool, ChatCompletionTools, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse, FunctionCall,
        FunctionObject,
    },
    Client,
};

use crate::config::OpenAiConfig;
use crate::error::{DefierError, Result};
use crate::interfaces::providers::{
    ChatMessage, LlmProvider, LlmResponse, MessagePart, Role, ToolCall,
};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

enum ChatCreateResult {
    Parsed(CreateChatCompletionResponse),
    Raw(Value),
}

fn is_truncated_json_error(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("unexpected end of json input")
        || lower.contains("unexpected end of json")
        || lower.contains("unexpected end of input")
        || lower.contains("unexpected eof")
}

/// OpenAI-compatible chat completions with function tools.
///
/// A missing API key is not fatal at construction; every request reports it
/// as a configuration error instead.
#[derive(Clone)]
pub struct OpenAiProvider {
    model: String,
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    temperature: Option<f32>,
}

impl OpenAiProvider {
    fn is_openai_function_name(name: &str) -> bool {
        let trimmed = name.trim();
        !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    }

    pub fn new(
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = api_key.filter(|key| !key.trim().is_empty());
        let config = OpenAIConfig::new()
            .with_api_key(api_key.clone().unwrap_or_default())
            .with_api_base(base_url.clone());
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DefierError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            model,
            client: Client::with_config(config),
            http,
            api_key,
            base_url,
            temperature: None,
        })
    }

    pub fn from_config(config: Option<&OpenAiConfig>, timeout: Duration) -> Result<Self> {
        let (api_key, model, base_url) = match config {
            Some(config) => (
                config.api_key.clone(),
                config.model.clone(),
                config.base_url.clone(),
            ),
            None => (None, None, None),
        };
        Self::new(api_key, model, base_url, timeout)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| DefierError::Config("missing OpenAI API key".to_string()))
    }

    async fn raw_chat_completion(&self, request: &CreateChatCompletionRequest) -> Result<Value> {
        let api_key = self.require_api_key()?;
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        for attempt in 0..3 {
            let response = self
                .http
                .post(url.clone())
                .bearer_auth(api_key)
                .json(request)
                .send()
                .await
                .map_err(|e| DefierError::Http(format!("Chat completion transport failed: {e}")))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| DefierError::Http(format!("Chat completion read failed: {e}")))?;

            if status == StatusCode::OK {
                return serde_json::from_str(&body).map_err(|e| {
                    DefierError::Serialization(format!("Chat completion decode failed: {e}"))
                });
            }

            if status.is_server_error() && is_truncated_json_error(&body) && attempt < 2 {
                tokio::time::sleep(Duration::from_millis(150 * (attempt + 1) as u64)).await;
                continue;
            }

            return Err(DefierError::Provider(format!(
                "Chat completion failed ({status}): {body}"
            )));
        }

        Err(DefierError::Provider(
            "Chat completion failed after retries".to_string(),
        ))
    }

    async fn chat_create_with_fallback(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<ChatCreateResult> {
        match self.raw_chat_completion(&request).await {
            Ok(raw) => return Ok(ChatCreateResult::Raw(raw)),
            Err(DefierError::Config(message)) => return Err(DefierError::Config(message)),
            Err(DefierError::Provider(message)) if !is_truncated_json_error(&message) => {
                return Err(DefierError::Provider(message));
            }
            Err(err) => debug!(error = %err, "Raw chat completion failed, retrying via client"),
        }

        match self.client.chat().create(request).await {
            Ok(response) => Ok(ChatCreateResult::Parsed(response)),
            Err(err) => Err(DefierError::Provider(err.to_string())),
        }
    }

    fn extract_text_from_value(response: &Value) -> Option<String> {
        response
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(|text| text.to_string())
    }

    fn parse_arguments(arguments: Option<&Value>) -> Value {
        match arguments {
            Some(Value::String(text)) => {
                serde_json::from_str(text).unwrap_or(Value::String(text.clone()))
            }
            Some(value) => value.clone(),
            None => Value::Null,
        }
    }

    fn extract_tool_calls_from_value(response: &Value) -> Vec<ToolCall> {
        let message = response
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|choice| choice.get("message"))
            .cloned()
            .unwrap_or(Value::Null);

        let Some(calls) = message.get("tool_calls").and_then(|calls| calls.as_array()) else {
            if let Some(function_call) = message.get("function_call") {
                if let Some(name) = function_call.get("name").and_then(|value| value.as_str()) {
                    return vec![ToolCall {
                        name: name.to_string(),
                        arguments: Self::parse_arguments(function_call.get("arguments")),
                    }];
                }
            }
            return Vec::new();
        };

        calls
            .iter()
            .filter_map(|call| {
                let function = call.get("function")?;
                let name = function.get("name")?.as_str()?.to_string();
                Some(ToolCall {
                    name,
                    arguments: Self::parse_arguments(function.get("arguments")),
                })
            })
            .collect()
    }

    fn extract_text_from_response(response: &CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .first()
            .ok_or_else(|| DefierError::Provider("No choices returned".to_string()))?
            .message
            .content
            .clone()
            .unwrap_or_default();
        Ok(message)
    }

    fn extract_tool_calls_from_response(response: &CreateChatCompletionResponse) -> Vec<ToolCall> {
        let mut calls = Vec::new();
        let Some(choice) = response.choices.first() else {
            return calls;
        };
        let message = &choice.message;
        if let Some(tool_calls) = &message.tool_calls {
            for call in tool_calls {
                match call {
                    ChatCompletionMessageToolCalls::Function(function_call) => {
                        let name = function_call.function.name.clone();
                        let args = function_call.function.arguments.clone();
                        let arguments = serde_json::from_str(&args).unwrap_or(Value::String(args));
                        calls.push(ToolCall { name, arguments });
                    }
                    ChatCompletionMessageToolCalls::Custom(custom_call) => {
                        let name = custom_call.custom_tool.name.clone();
                        let args = custom_call.custom_tool.input.clone();
                        let arguments = serde_json::from_str(&args).unwrap_or(Value::String(args));
                        calls.push(ToolCall { name, arguments });
                    }
                }
            }
        }

        if calls.is_empty() {
            #[allow(deprecated)]
            if let Some(FunctionCall { name, arguments }) = &message.function_call {
                let parsed =
                    serde_json::from_str(arguments).unwrap_or(Value::String(arguments.clone()));
                calls.push(ToolCall {
                    name: name.clone(),
                    arguments: parsed,
                });
            }
        }

        calls
    }

    fn build_system_message(system_prompt: &str) -> Result<Option<ChatCompletionRequestMessage>> {
        if system_prompt.is_empty() {
            return Ok(None);
        }
        let message = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| DefierError::Runtime(e.to_string()))?;
        Ok(Some(ChatCompletionRequestMessage::System(message)))
    }

    fn build_user_text_message(prompt: &str) -> Result<ChatCompletionRequestMessage> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Text(
                prompt.to_string(),
            ))
            .build()
            .map_err(|e| DefierError::Runtime(e.to_string()))?;
        Ok(ChatCompletionRequestMessage::User(message))
    }

    fn build_assistant_text_message(text: &str) -> Result<ChatCompletionRequestMessage> {
        let message = ChatCompletionRequestAssistantMessageArgs::default()
            .content(text.to_string())
            .build()
            .map_err(|e| DefierError::Runtime(e.to_string()))?;
        Ok(ChatCompletionRequestMessage::Assistant(message))
    }

    /// Tool calls and their results travel as plain text turns: the call
    /// request is rendered into the assistant turn and the results into a
    /// following user turn headed `FUNCTION RESULTS:`.
    fn render_message(message: &ChatMessage) -> Result<Option<ChatCompletionRequestMessage>> {
        let mut lines = Vec::new();
        let mut results = Vec::new();
        for part in &message.parts {
            match part {
                MessagePart::Text(text) if !text.trim().is_empty() => lines.push(text.clone()),
                MessagePart::Text(_) => {}
                MessagePart::FunctionCall(call) => {
                    lines.push(format!("CALL {} {}", call.name, call.arguments));
                }
                MessagePart::FunctionResponse { name, response } => {
                    results.push(format!("- {name}: {response}"));
                }
            }
        }
        if !results.is_empty() {
            lines.push(format!("FUNCTION RESULTS:\n{}", results.join("\n")));
        }
        if lines.is_empty() {
            return Ok(None);
        }
        let content = lines.join("\n");
        let rendered = match message.role {
            Role::User => Self::build_user_text_message(&content)?,
            Role::Assistant => Self::build_assistant_text_message(&content)?,
        };
        Ok(Some(rendered))
    }

    pub(crate) fn convert_tools(tools: Vec<Value>) -> Vec<ChatCompletionTools> {
        tools
            .into_iter()
            .filter_map(|tool| {
                let tool_type = tool
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("function");
                if tool_type != "function" {
                    return None;
                }
                let function_obj = tool.get("function").cloned().unwrap_or(tool);
                let name = function_obj.get("name")?.as_str()?.trim().to_string();
                if !Self::is_openai_function_name(&name) {
                    warn!(tool_name = %name, "Skipping invalid OpenAI function tool name");
                    return None;
                }
                let description = function_obj
                    .get("description")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string());
                let parameters = function_obj
                    .get("parameters")
                    .cloned()
                    .filter(|value| value.is_object())
                    .or_else(|| {
                        Some(serde_json::json!({
                            "type": "object",
                            "properties": {}
                        }))
                    });
                let function = FunctionObject {
                    name,
                    description,
                    parameters,
                    strict: Some(false),
                };
                Some(ChatCompletionTools::Function(ChatCompletionTool {
                    function,
                }))
            })
            .collect()
    }

    fn build_request(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Option<Vec<Value>>,
    ) -> Result<CreateChatCompletionRequest> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone());
        builder.messages(messages);
        if let Some(temperature) = self.temperature {
            builder.temperature(temperature);
        }
        if let Some(tools) = tools {
            let tools = Self::convert_tools(tools);
            if !tools.is_empty() {
                builder.tools(tools);
            }
        }
        builder
            .build()
            .map_err(|e| DefierError::Runtime(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> Result<String> {
        self.require_api_key()?;
        let mut messages = Vec::new();
        if let Some(system) = Self::build_system_message(system_prompt)? {
            messages.push(system);
        }
        messages.push(Self::build_user_text_message(prompt)?);

        let request = self.build_request(messages, None)?;
        match self.chat_create_with_fallback(request).await? {
            ChatCreateResult::Parsed(parsed) => Self::extract_text_from_response(&parsed),
            ChatCreateResult::Raw(raw) => Self::extract_text_from_value(&raw)
                .ok_or_else(|| DefierError::Provider("Empty chat response".to_string())),
        }
    }

    async fn chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        tools: Option<Vec<Value>>,
    ) -> Result<LlmResponse> {
        self.require_api_key()?;
        let mut request_messages = Vec::new();
        if let Some(system) = Self::build_system_message(system_prompt)? {
            request_messages.push(system);
        }
        for message in messages {
            if let Some(rendered) = Self::render_message(message)? {
                request_messages.push(rendered);
            }
        }

        let request = self.build_request(request_messages, tools)?;
        let (text, tool_calls) = match self.chat_create_with_fallback(request).await? {
            ChatCreateResult::Parsed(parsed) => (
                Self::extract_text_from_response(&parsed).unwrap_or_default(),
                Self::extract_tool_calls_from_response(&parsed),
            ),
            ChatCreateResult::Raw(raw) => (
                Self::extract_text_from_value(&raw).unwrap_or_default(),
                Self::extract_tool_calls_from_value(&raw),
            ),
        };

        Ok(LlmResponse { text, tool_calls })
    }
}
