//! Pure routing decision for an [`Intent`].
//!
//! Nothing here performs I/O. The caller supplies a balance snapshot when
//! [`requires_balance`] says one is needed and runs the chosen [`Strategy`]
//! through `services::execution`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::balance::UnifiedBalance;
use crate::chains::{normalize_chain, normalize_token, try_normalize_chain, CanonicalChain, CanonicalToken};
use crate::config::SplitConfig;
use crate::intent::{Intent, IntentFields, SELF_RECIPIENT};
use crate::units::{is_positive, split_evenly};

static ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0x[a-fA-F0-9]{40}").expect("address regex"));
static EXACT_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("exact address regex"));
static LIST_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*,\s*|\s+and\s+|\s*;\s*|\s+").expect("separator regex"));

pub fn is_address(raw: &str) -> bool {
    EXACT_ADDRESS.is_match(raw.trim())
}

/// Designated chain and stablecoin for the split contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPolicy {
    pub chain: CanonicalChain,
    pub token_symbol: String,
    pub precision: u8,
}

impl SplitPolicy {
    fn is_split_token(&self, raw: &str) -> bool {
        raw.trim().eq_ignore_ascii_case(&self.token_symbol)
    }
}

impl From<&SplitConfig> for SplitPolicy {
    fn from(config: &SplitConfig) -> Self {
        Self {
            chain: config.chain,
            token_symbol: config.token_symbol.to_uppercase(),
            precision: config.precision,
        }
    }
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self::from(&SplitConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    Hint,
    Balance,
    DestinationFallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgePreview {
    pub token: CanonicalToken,
    pub amount: String,
    pub source: CanonicalChain,
    pub destination: CanonicalChain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    SplitContract {
        recipients: Vec<String>,
        amounts: Vec<String>,
    },
    DirectTransfer {
        chain: CanonicalChain,
        token: CanonicalToken,
        amount: String,
        recipient: String,
    },
    BridgeAndExecute {
        token: CanonicalToken,
        amount: String,
        destination: CanonicalChain,
        recipient: String,
        source: CanonicalChain,
        source_origin: SourceOrigin,
        /// The user named the source chain; disables silent fallbacks.
        explicit_source: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    BridgePreview(BridgePreview),
    Reject {
        reason: String,
    },
}

impl Strategy {
    fn reject(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: reason.into(),
        }
    }

    pub fn warnings(&self) -> Vec<String> {
        match self {
            Self::BridgeAndExecute {
                warning: Some(warning),
                ..
            } => vec![warning.clone()],
            _ => Vec::new(),
        }
    }
}

pub struct StrategyInput<'a> {
    pub intent: &'a Intent,
    /// Original user message, scraped for addresses when a split recipient
    /// list does not parse.
    pub message: &'a str,
    pub balance: &'a UnifiedBalance,
    pub source_hint: Option<&'a str>,
    pub policy: &'a SplitPolicy,
}

fn is_split_shortcut(fields: &IntentFields, policy: &SplitPolicy) -> bool {
    policy.is_split_token(&fields.token) && normalize_chain(&fields.chain) == policy.chain
}

/// Whether [`select_strategy`] will consult the balance snapshot.
pub fn requires_balance(intent: &Intent, policy: &SplitPolicy) -> bool {
    match intent {
        Intent::Transfer(fields) => !is_split_shortcut(fields, policy),
        Intent::Bridge(_) | Intent::Split(_) => false,
    }
}

/// Recipients from a comma / "and" separated list, keeping only hex addresses.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    LIST_SEPARATOR
        .split(raw.trim())
        .map(|part| part.trim().trim_end_matches(['.', '!', '?']))
        .filter(|part| is_address(part))
        .map(str::to_string)
        .collect()
}

fn scrape_addresses(message: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in ADDRESS.find_iter(message) {
        let address = m.as_str().to_string();
        if !found.iter().any(|seen| seen.eq_ignore_ascii_case(&address)) {
            found.push(address);
        }
    }
    found
}

fn invalid_recipient(action: &str, recipient: &str) -> Strategy {
    Strategy::reject(format!(
        "{action} recipient \"{recipient}\" is not a valid address. Use a 0x address or a name such as vitalik.eth."
    ))
}

fn select_split(fields: &IntentFields, message: &str, policy: &SplitPolicy) -> Strategy {
    if try_normalize_chain(&fields.chain) != Some(policy.chain) {
        return Strategy::reject(format!(
            "Split payments are only supported on {}. Try again with \"on {}\".",
            policy.chain.display_name(),
            policy.chain.key()
        ));
    }
    if !policy.is_split_token(&fields.token) {
        return Strategy::reject(format!(
            "Split payments only support {} on {}, not {}.",
            policy.token_symbol,
            policy.chain.display_name(),
            fields.token.trim().to_uppercase()
        ));
    }
    let mut recipients = parse_recipients(&fields.recipient);
    if recipients.is_empty() {
        recipients = scrape_addresses(message);
    }
    if recipients.is_empty() {
        return Strategy::reject(
            "No valid recipient addresses found for the split. List 0x addresses separated by commas.",
        );
    }
    if !is_positive(&fields.amount) {
        return Strategy::reject(format!(
            "Split amount must be a positive number, got \"{}\".",
            fields.amount
        ));
    }
    let Some(share) = split_evenly(&fields.amount, recipients.len(), policy.precision) else {
        return Strategy::reject(format!(
            "Could not divide {} {} across {} recipients.",
            fields.amount,
            policy.token_symbol,
            recipients.len()
        ));
    };
    Strategy::SplitContract {
        amounts: vec![share; recipients.len()],
        recipients,
    }
}

fn select_bridge(fields: &IntentFields, source_hint: Option<&str>) -> Strategy {
    let raw_source = fields.source.as_deref().or(source_hint);
    let Some(source) = raw_source.and_then(try_normalize_chain) else {
        return Strategy::reject(
            "Bridge source chain not specified. Say which chain to bridge from, for example \"from arbitrum\".",
        );
    };
    let Some(destination) = try_normalize_chain(&fields.chain) else {
        return Strategy::reject(
            "Bridge destination chain not specified. Say which chain to bridge to, for example \"to base\".",
        );
    };
    if source == destination {
        return Strategy::reject(format!(
            "Bridge source and destination chain are both {}. Use a transfer instead.",
            destination.display_name()
        ));
    }
    if !is_positive(&fields.amount) {
        return Strategy::reject(format!(
            "Bridge amount must be a positive number, got \"{}\".",
            fields.amount
        ));
    }
    let recipient = fields.recipient.trim();
    let is_own_wallet = recipient.is_empty() || recipient.eq_ignore_ascii_case(SELF_RECIPIENT);
    if !is_own_wallet && !is_address(recipient) {
        return invalid_recipient("Bridge", recipient);
    }
    Strategy::BridgePreview(BridgePreview {
        token: normalize_token(&fields.token),
        amount: fields.amount.clone(),
        source,
        destination,
        recipient: (!is_own_wallet).then(|| recipient.to_string()),
    })
}

fn select_transfer(input: &StrategyInput<'_>, fields: &IntentFields) -> Strategy {
    if !is_positive(&fields.amount) {
        return Strategy::reject(format!(
            "Transfer amount must be a positive number, got \"{}\".",
            fields.amount
        ));
    }

    if is_split_shortcut(fields, input.policy) {
        let recipient = fields.recipient.trim();
        if !is_address(recipient) {
            return Strategy::reject(format!(
                "{} transfers on {} need a 0x recipient address.",
                input.policy.token_symbol,
                input.policy.chain.display_name()
            ));
        }
        return Strategy::SplitContract {
            recipients: vec![recipient.to_string()],
            amounts: vec![fields.amount.clone()],
        };
    }

    let recipient = fields.recipient.trim();
    if !is_address(recipient) {
        return invalid_recipient("Transfer", recipient);
    }

    let destination = normalize_chain(&fields.chain);
    let token = normalize_token(&fields.token);
    let hinted = fields
        .source
        .as_deref()
        .or(input.source_hint)
        .and_then(try_normalize_chain);

    let has_sufficient_on_dest =
        input
            .balance
            .has_at_least(&fields.token, destination, &fields.amount);
    let prefer_direct = hinted == Some(destination);

    if has_sufficient_on_dest || prefer_direct {
        return Strategy::DirectTransfer {
            chain: destination,
            token,
            amount: fields.amount.clone(),
            recipient: recipient.to_string(),
        };
    }

    let (source, source_origin, warning) = match hinted {
        Some(source) => (source, SourceOrigin::Hint, None),
        None => match input.balance.first_funded_chain(&fields.token, destination) {
            Some(source) => (source, SourceOrigin::Balance, None),
            None => (
                destination,
                SourceOrigin::DestinationFallback,
                Some(format!(
                    "No {} balance found on another chain, so the transfer will be attempted from {} directly.",
                    token,
                    destination.display_name()
                )),
            ),
        },
    };

    Strategy::BridgeAndExecute {
        token,
        amount: fields.amount.clone(),
        destination,
        recipient: recipient.to_string(),
        source,
        source_origin,
        explicit_source: source_origin == SourceOrigin::Hint,
        warning,
    }
}

pub fn select_strategy(input: &StrategyInput<'_>) -> Strategy {
    match input.intent {
        Intent::Split(fields) => select_split(fields, input.message, input.policy),
        Intent::Bridge(fields) => select_bridge(fields, input.source_hint),
        Intent::Transfer(fields) => select_transfer(input, fields),
    }
}
