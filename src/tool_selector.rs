//! Narrows the remote tool catalog to the declarations worth sending with one
//! prompt, and reshapes schemas into a form function-calling models accept.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::interfaces::tools::{ToolDescriptor, ToolProvider};

const MAX_SCHEMA_CHARS: usize = 2000;

const PRIORITY_TOOLS: &[&str] = &[
    "get_simple_price",
    "get_coins_markets",
    "get_search",
    "get_id_coins",
    "get_latest_block",
    "get_address_info",
    "get_transactions_by_address",
    "get_token_transfers_by_address",
];

const INCOMPATIBLE_NAMES: &[&str] = &["direct_api_call", "unlock_blockchain_analysis", "read_contract"];

const UNION_KEYWORDS: &[&str] = &["anyOf", "oneOf", "allOf"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolCategory {
    Price,
    CoinInfo,
    Nft,
    Exchange,
    Blockchain,
    Address,
    Contract,
    Transfers,
    Search,
    Onchain,
    Other,
}

struct CategoryRule {
    category: ToolCategory,
    name: &'static [&'static str],
    description: &'static [&'static str],
}

const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: ToolCategory::Price,
        name: &["price", "market", "simple", "ohlc"],
        description: &["price", "market"],
    },
    CategoryRule {
        category: ToolCategory::CoinInfo,
        name: &["coin", "token", "info"],
        description: &["coin", "metadata"],
    },
    CategoryRule {
        category: ToolCategory::Nft,
        name: &["nft"],
        description: &["nft"],
    },
    CategoryRule {
        category: ToolCategory::Exchange,
        name: &["exchange"],
        description: &["exchange"],
    },
    CategoryRule {
        category: ToolCategory::Blockchain,
        name: &["block", "transaction", "tx"],
        description: &["block", "transaction"],
    },
    CategoryRule {
        category: ToolCategory::Address,
        name: &["address", "wallet"],
        description: &["address", "wallet"],
    },
    CategoryRule {
        category: ToolCategory::Contract,
        name: &["contract", "abi"],
        description: &["contract"],
    },
    CategoryRule {
        category: ToolCategory::Transfers,
        name: &["transfer", "holder"],
        description: &["transfer", "holder"],
    },
    CategoryRule {
        category: ToolCategory::Search,
        name: &["trend", "search", "top"],
        description: &["trending", "search"],
    },
    CategoryRule {
        category: ToolCategory::Onchain,
        name: &["onchain", "pool", "dex"],
        description: &["on-chain", "liquidity"],
    },
];

/// A prompt intent fires when every pattern in `all_of` matches.
struct PromptRule {
    category: ToolCategory,
    all_of: Vec<Regex>,
}

fn prompt_rule(category: ToolCategory, patterns: &[&str]) -> PromptRule {
    PromptRule {
        category,
        all_of: patterns
            .iter()
            .map(|pattern| Regex::new(&format!("(?i){pattern}")).expect("prompt rule regex"))
            .collect(),
    }
}

static PROMPT_RULES: Lazy<Vec<PromptRule>> = Lazy::new(|| {
    vec![
        prompt_rule(ToolCategory::Price, &[r"price|cost|worth|value|trading at|how much|\$|usd|dollars"]),
        prompt_rule(
            ToolCategory::CoinInfo,
            &[r"what is|tell me about|information about|details|describe", r"coin|token|crypto"],
        ),
        prompt_rule(ToolCategory::Nft, &[r"nft|non-fungible|collectible|artwork"]),
        prompt_rule(ToolCategory::Exchange, &[r"exchange|cex|dex|trading platform|binance|coinbase"]),
        prompt_rule(
            ToolCategory::Blockchain,
            &[r"block|transaction|tx|hash|confirm|pending|mined|latest|chain|mainnet|testnet|ethereum|eth|optimism|arbitrum|polygon|base|network"],
        ),
        prompt_rule(
            ToolCategory::Address,
            &[r"address|wallet|balance|holdings|portfolio|0x[a-fA-F0-9]{40}"],
        ),
        prompt_rule(ToolCategory::Contract, &[r"contract|abi|function|call|read contract|smart contract"]),
        prompt_rule(ToolCategory::Transfers, &[r"transfer|sent|received|holder|owner|distribution"]),
        prompt_rule(ToolCategory::Search, &[r"trend|popular|top|hot|search|find|look for"]),
        prompt_rule(ToolCategory::Onchain, &[r"pool|liquidity|swap|dex|uniswap|pancakeswap|on-chain"]),
    ]
});

pub fn categorize_tool(tool: &ToolDescriptor) -> BTreeSet<ToolCategory> {
    let name = tool.name.to_lowercase();
    let description = tool.description.to_lowercase();
    let mut categories: BTreeSet<ToolCategory> = CATEGORY_RULES
        .iter()
        .filter(|rule| {
            rule.name.iter().any(|kw| name.contains(kw))
                || rule.description.iter().any(|kw| description.contains(kw))
        })
        .map(|rule| rule.category)
        .collect();
    if categories.is_empty() {
        categories.insert(ToolCategory::Other);
    }
    categories
}

pub fn prompt_intents(prompt: &str) -> BTreeSet<ToolCategory> {
    let mut intents: BTreeSet<ToolCategory> = PROMPT_RULES
        .iter()
        .filter(|rule| rule.all_of.iter().all(|re| re.is_match(prompt)))
        .map(|rule| rule.category)
        .collect();
    if intents.is_empty() {
        intents.insert(ToolCategory::Price);
        intents.insert(ToolCategory::CoinInfo);
    }
    intents
}

/// Priority tools first, then category matches, deduplicated by name.
pub fn select_relevant_tools(tools: &[ToolDescriptor], prompt: &str) -> Vec<ToolDescriptor> {
    let intents = prompt_intents(prompt);
    let mut seen = HashSet::new();
    let priority = tools
        .iter()
        .filter(|tool| PRIORITY_TOOLS.contains(&tool.name.as_str()));
    let matched = tools
        .iter()
        .filter(|tool| !categorize_tool(tool).is_disjoint(&intents));
    let selected: Vec<ToolDescriptor> = priority
        .chain(matched)
        .filter(|tool| seen.insert(tool.name.clone()))
        .cloned()
        .collect();
    debug!(
        total = tools.len(),
        selected = selected.len(),
        intents = ?intents,
        "Selected tools for prompt"
    );
    selected
}

pub fn is_tool_compatible(tool: &ToolDescriptor) -> bool {
    if !tool.input_schema.is_object() {
        return false;
    }
    let schema = tool.input_schema.to_string();
    if schema.len() > MAX_SCHEMA_CHARS {
        debug!(tool = %tool.name, chars = schema.len(), "Skipping tool: schema too large");
        return false;
    }
    if INCOMPATIBLE_NAMES.iter().any(|pattern| tool.name.contains(pattern)) {
        debug!(tool = %tool.name, "Skipping tool: known incompatible");
        return false;
    }
    if tool.provider == ToolProvider::Blockscout
        && UNION_KEYWORDS.iter().any(|kw| schema.contains(kw))
    {
        debug!(tool = %tool.name, "Skipping tool: union schema");
        return false;
    }
    true
}

fn has_union(value: &Value) -> bool {
    UNION_KEYWORDS.iter().any(|kw| value.get(*kw).is_some())
}

/// Declaration in the `{"type":"function","name","description","parameters"}`
/// shape the LLM provider expects.
pub fn to_function_declaration(tool: &ToolDescriptor) -> Value {
    let mut parameters = match &tool.input_schema {
        Value::Object(map) if map.contains_key("type") => map.clone(),
        Value::Object(map) => {
            let mut wrapped = Map::new();
            wrapped.insert("type".to_string(), json!("object"));
            wrapped.insert("properties".to_string(), Value::Object(map.clone()));
            wrapped
        }
        _ => {
            let mut empty = Map::new();
            empty.insert("type".to_string(), json!("object"));
            empty.insert("properties".to_string(), json!({}));
            empty
        }
    };
    for key in ["$schema", "$id", "additionalProperties"] {
        parameters.remove(key);
    }
    if let Some(Value::Object(properties)) = parameters.get_mut("properties") {
        for prop in properties.values_mut() {
            if has_union(prop) {
                let mut flattened = Map::new();
                flattened.insert("type".to_string(), json!("string"));
                if let Some(description) = prop.get("description").cloned() {
                    flattened.insert("description".to_string(), description);
                }
                *prop = Value::Object(flattened);
            }
        }
    }

    let description = if tool.description.trim().is_empty() {
        format!("Tool from {} MCP server", tool.provider)
    } else {
        tool.description.clone()
    };

    json!({
        "type": "function",
        "name": tool.name,
        "description": description,
        "parameters": Value::Object(parameters),
    })
}

/// Compatible, relevant declarations for `prompt`.
pub fn declarations_for_prompt(tools: &[ToolDescriptor], prompt: &str) -> Vec<Value> {
    let compatible: Vec<ToolDescriptor> = tools.iter().filter(|t| is_tool_compatible(t)).cloned().collect();
    select_relevant_tools(&compatible, prompt)
        .iter()
        .map(to_function_declaration)
        .collect()
}
