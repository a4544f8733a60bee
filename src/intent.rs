use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::chains::{expand_chain_abbreviation, try_normalize_chain};

/// Placeholder recipient for bridges that move funds to the sender's own wallet.
pub const SELF_RECIPIENT: &str = "self";

const REQUIRED_KEYS: [&str; 5] = ["action", "token", "amount", "recipient", "chain"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentFields {
    pub token: String,
    pub amount: String,
    pub recipient: String,
    pub chain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A validated on-chain action requested in chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Intent {
    Transfer(IntentFields),
    Bridge(IntentFields),
    Split(IntentFields),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentAction {
    Transfer,
    Bridge,
    Split,
}

impl IntentAction {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "transfer" | "send" | "pay" => Some(Self::Transfer),
            "bridge" => Some(Self::Bridge),
            "split" => Some(Self::Split),
            _ => None,
        }
    }
}

impl Intent {
    pub fn new(action: IntentAction, fields: IntentFields) -> Self {
        match action {
            IntentAction::Transfer => Self::Transfer(fields),
            IntentAction::Bridge => Self::Bridge(fields),
            IntentAction::Split => Self::Split(fields),
        }
    }

    pub fn action(&self) -> IntentAction {
        match self {
            Self::Transfer(_) => IntentAction::Transfer,
            Self::Bridge(_) => IntentAction::Bridge,
            Self::Split(_) => IntentAction::Split,
        }
    }

    pub fn fields(&self) -> &IntentFields {
        match self {
            Self::Transfer(fields) | Self::Bridge(fields) | Self::Split(fields) => fields,
        }
    }

    fn fields_mut(&mut self) -> &mut IntentFields {
        match self {
            Self::Transfer(fields) | Self::Bridge(fields) | Self::Split(fields) => fields,
        }
    }

    /// Replaces the recipient after name resolution.
    pub fn set_recipient(&mut self, recipient: String) {
        self.fields_mut().recipient = recipient;
    }

    /// Parses an LLM-produced JSON object. All five required keys must be
    /// present with non-empty values.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if !REQUIRED_KEYS.iter().all(|key| object.contains_key(*key)) {
            return None;
        }
        let action = IntentAction::parse(object.get("action")?.as_str()?)?;
        let fields = IntentFields {
            token: scalar_field(object.get("token")?)?,
            amount: scalar_field(object.get("amount")?)?,
            recipient: recipient_field(object.get("recipient")?)?,
            chain: scalar_field(object.get("chain")?)?,
            source: object.get("source").and_then(scalar_field),
        };
        Some(Self::new(action, fields))
    }
}

fn scalar_field(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    if text.is_empty() || text.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(text)
    }
}

fn recipient_field(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(scalar_field)
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        other => scalar_field(other),
    }
}

static INTENT_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bintent\b[*_\s]*:?[*_\s]*\{").expect("intent marker regex")
});
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```[a-z]*").expect("code fence regex"));
static AMOUNT_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*([a-z]{2,10})\b").expect("amount regex")
});
static SINGLE_RECIPIENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bto\s+([^\s,]+)").expect("recipient regex"));
static RECIPIENT_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:to|between|among)\s+(.+?)(?:\s+(?:on|from|via)\b|[.!?]?\s*$)")
        .expect("recipient list regex")
});
static ON_CHAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bon\s+([a-z][a-z0-9-]*)").expect("on-chain regex"));
static FROM_CHAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfrom\s+([a-z][a-z0-9-]*)").expect("from-chain regex"));

const NOT_A_TOKEN: &[&str] = &["to", "on", "from", "and", "of", "for", "in", "at", "each"];

/// Returns the balanced `{...}` object starting at byte `start`, honouring
/// string literals and escapes.
fn balanced_object(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in bytes[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return text.get(start..start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_candidate(candidate: &str) -> Option<Intent> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Intent::from_json(&value),
        Err(err) => {
            debug!(error = %err, "Discarding malformed intent JSON");
            None
        }
    }
}

fn labeled_intent(text: &str) -> Option<Intent> {
    INTENT_MARKER.find_iter(text).find_map(|marker| {
        let start = marker.end() - 1;
        balanced_object(text, start).and_then(parse_candidate)
    })
}

fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").into_owned()
}

fn any_intent_object(text: &str) -> Option<Intent> {
    let starts = text
        .char_indices()
        .filter(|(_, ch)| *ch == '{')
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    starts
        .into_iter()
        .rev()
        .find_map(|start| balanced_object(text, start).and_then(parse_candidate))
}

fn known_chain_phrase(pattern: &Regex, text: &str) -> Option<String> {
    pattern.captures_iter(text).find_map(|caps| {
        let expanded = expand_chain_abbreviation(caps.get(1)?.as_str());
        try_normalize_chain(&expanded).map(|_| expanded)
    })
}

fn heuristic_action(text: &str) -> IntentAction {
    let lowered = text.to_lowercase();
    if lowered.contains("split") {
        IntentAction::Split
    } else if lowered.contains("bridge") {
        IntentAction::Bridge
    } else {
        IntentAction::Transfer
    }
}

fn trim_recipient(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(['.', '!', '?', ','])
        .trim()
        .to_string()
}

/// Regex fallback over the raw user message.
pub fn heuristic_intent(user_text: &str) -> Option<Intent> {
    let (amount, token) = AMOUNT_TOKEN.captures_iter(user_text).find_map(|caps| {
        let token = caps.get(2)?.as_str();
        if NOT_A_TOKEN.contains(&token.to_lowercase().as_str()) {
            return None;
        }
        Some((caps.get(1)?.as_str().to_string(), token.to_uppercase()))
    })?;

    let action = heuristic_action(user_text);
    let on_chain = known_chain_phrase(&ON_CHAIN, user_text);
    let source = known_chain_phrase(&FROM_CHAIN, user_text);

    let (recipient, chain) = match action {
        IntentAction::Split => {
            let recipients = RECIPIENT_LIST
                .captures(user_text)
                .and_then(|caps| caps.get(1))
                .map(|m| trim_recipient(m.as_str()))?;
            (recipients, on_chain?)
        }
        IntentAction::Bridge => {
            let target = SINGLE_RECIPIENT
                .captures(user_text)
                .and_then(|caps| caps.get(1))
                .map(|m| trim_recipient(m.as_str()));
            match (target, on_chain) {
                (Some(target), Some(chain)) => (target, chain),
                (Some(target), None) => {
                    let expanded = expand_chain_abbreviation(&target);
                    try_normalize_chain(&expanded)?;
                    (SELF_RECIPIENT.to_string(), expanded)
                }
                (None, Some(chain)) => (SELF_RECIPIENT.to_string(), chain),
                (None, None) => return None,
            }
        }
        IntentAction::Transfer => {
            let recipient = SINGLE_RECIPIENT
                .captures(user_text)
                .and_then(|caps| caps.get(1))
                .map(|m| trim_recipient(m.as_str()))?;
            (recipient, on_chain?)
        }
    };

    if recipient.is_empty() {
        return None;
    }

    Some(Intent::new(
        action,
        IntentFields {
            token,
            amount,
            recipient,
            chain,
            source,
        },
    ))
}

/// Explicit "from X" / "on Y" phrases in the user's own words beat whatever
/// the model inferred.
fn apply_explicit_chain_phrases(intent: &mut Intent, user_text: &str) {
    let fields = intent.fields_mut();
    if fields.source.is_none() {
        if let Some(source) = known_chain_phrase(&FROM_CHAIN, user_text) {
            fields.source = Some(source);
        }
    }
    if let Some(destination) = known_chain_phrase(&ON_CHAIN, user_text) {
        fields.chain = destination;
    }
}

/// Derives an [`Intent`] from model output, falling back to the user text.
/// `None` means "not an actionable request", never an error.
pub fn extract_intent(user_text: &str, llm_text: &str) -> Option<Intent> {
    let mut intent = labeled_intent(llm_text)
        .or_else(|| {
            let unfenced = strip_code_fences(llm_text);
            labeled_intent(&unfenced).or_else(|| any_intent_object(&unfenced))
        })
        .or_else(|| heuristic_intent(user_text))?;
    apply_explicit_chain_phrases(&mut intent, user_text);
    Some(intent)
}
