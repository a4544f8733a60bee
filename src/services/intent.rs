use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::intent::{extract_intent, Intent};
use crate::interfaces::providers::LlmProvider;
use crate::prompts::INTENT_SYSTEM_PROMPT;

/// LLM-first intent extraction with the regex heuristic as fallback.
#[derive(Clone)]
pub struct IntentService {
    llm: Arc<dyn LlmProvider>,
}

impl IntentService {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// `Ok(None)` means the message is informational. Only configuration
    /// errors surface; a failing model degrades to the heuristic.
    pub async fn extract(&self, user_text: &str) -> Result<Option<Intent>> {
        if user_text.trim().is_empty() {
            return Ok(None);
        }
        let llm_text = match self.llm.generate_text(user_text, INTENT_SYSTEM_PROMPT).await {
            Ok(text) => text,
            Err(err) if err.is_config() => return Err(err),
            Err(err) => {
                warn!(error = %err, "Intent model call failed, using heuristic");
                String::new()
            }
        };
        let intent = extract_intent(user_text, &llm_text);
        debug!(intent = ?intent, "Intent extracted");
        Ok(intent)
    }
}
