use std::fmt;

use serde::{Deserialize, Serialize};

/// Testnet chains the bridge provider and the split contract can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanonicalChain {
    Sepolia,
    BaseSepolia,
    ArbitrumSepolia,
    OptimismSepolia,
    PolygonAmoy,
}

impl CanonicalChain {
    pub const ALL: [CanonicalChain; 5] = [
        CanonicalChain::Sepolia,
        CanonicalChain::BaseSepolia,
        CanonicalChain::ArbitrumSepolia,
        CanonicalChain::OptimismSepolia,
        CanonicalChain::PolygonAmoy,
    ];

    pub const DEFAULT: CanonicalChain = CanonicalChain::Sepolia;

    pub fn id(self) -> u64 {
        match self {
            Self::Sepolia => 11_155_111,
            Self::BaseSepolia => 84_532,
            Self::ArbitrumSepolia => 421_614,
            Self::OptimismSepolia => 11_155_420,
            Self::PolygonAmoy => 80_002,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Sepolia => "sepolia",
            Self::BaseSepolia => "base-sepolia",
            Self::ArbitrumSepolia => "arbitrum-sepolia",
            Self::OptimismSepolia => "optimism-sepolia",
            Self::PolygonAmoy => "polygon-amoy",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Sepolia => "Sepolia",
            Self::BaseSepolia => "Base Sepolia",
            Self::ArbitrumSepolia => "Arbitrum Sepolia",
            Self::OptimismSepolia => "Optimism Sepolia",
            Self::PolygonAmoy => "Polygon Amoy",
        }
    }

    fn explorer_base(self) -> &'static str {
        match self {
            Self::Sepolia => "https://eth-sepolia.blockscout.com",
            Self::BaseSepolia => "https://base-sepolia.blockscout.com",
            Self::ArbitrumSepolia => "https://arbitrum-sepolia.blockscout.com",
            Self::OptimismSepolia => "https://optimism-sepolia.blockscout.com",
            Self::PolygonAmoy => "https://amoy.polygonscan.com",
        }
    }

    pub fn explorer_tx_url(self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_base(), tx_hash)
    }

    pub fn from_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|chain| chain.id() == id)
    }
}

impl fmt::Display for CanonicalChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliasMatch {
    Substring,
    Word,
}

struct AliasRule {
    alias: &'static str,
    matcher: AliasMatch,
    chain: CanonicalChain,
}

const fn rule(alias: &'static str, matcher: AliasMatch, chain: CanonicalChain) -> AliasRule {
    AliasRule {
        alias,
        matcher,
        chain,
    }
}

// Ordered: explicit testnet names, then mainnet names, then abbreviations.
// Testnet names that embed "sepolia" must come before the bare "sepolia" rule.
const CHAIN_ALIASES: &[AliasRule] = &[
    rule("base-sepolia", AliasMatch::Substring, CanonicalChain::BaseSepolia),
    rule("base sepolia", AliasMatch::Substring, CanonicalChain::BaseSepolia),
    rule("basesepolia", AliasMatch::Substring, CanonicalChain::BaseSepolia),
    rule("arbitrum-sepolia", AliasMatch::Substring, CanonicalChain::ArbitrumSepolia),
    rule("arbitrum sepolia", AliasMatch::Substring, CanonicalChain::ArbitrumSepolia),
    rule("arb-sepolia", AliasMatch::Substring, CanonicalChain::ArbitrumSepolia),
    rule("optimism-sepolia", AliasMatch::Substring, CanonicalChain::OptimismSepolia),
    rule("optimism sepolia", AliasMatch::Substring, CanonicalChain::OptimismSepolia),
    rule("op-sepolia", AliasMatch::Substring, CanonicalChain::OptimismSepolia),
    rule("polygon-amoy", AliasMatch::Substring, CanonicalChain::PolygonAmoy),
    rule("amoy", AliasMatch::Substring, CanonicalChain::PolygonAmoy),
    rule("sepolia", AliasMatch::Substring, CanonicalChain::Sepolia),
    rule("ethereum", AliasMatch::Substring, CanonicalChain::Sepolia),
    rule("mainnet", AliasMatch::Substring, CanonicalChain::Sepolia),
    rule("arbitrum", AliasMatch::Substring, CanonicalChain::ArbitrumSepolia),
    rule("optimism", AliasMatch::Substring, CanonicalChain::OptimismSepolia),
    rule("polygon", AliasMatch::Substring, CanonicalChain::PolygonAmoy),
    rule("matic", AliasMatch::Substring, CanonicalChain::PolygonAmoy),
    rule("base", AliasMatch::Substring, CanonicalChain::BaseSepolia),
    rule("eth", AliasMatch::Word, CanonicalChain::Sepolia),
    rule("arb", AliasMatch::Word, CanonicalChain::ArbitrumSepolia),
    rule("op", AliasMatch::Word, CanonicalChain::OptimismSepolia),
    rule("pol", AliasMatch::Word, CanonicalChain::PolygonAmoy),
];

fn alias_matches(rule: &AliasRule, lowered: &str) -> bool {
    match rule.matcher {
        AliasMatch::Substring => lowered.contains(rule.alias),
        AliasMatch::Word => lowered
            .split(|ch: char| !ch.is_ascii_alphanumeric())
            .any(|word| word == rule.alias),
    }
}

/// Returns the chain named by `raw`, or `None` when no alias rule matches.
pub fn try_normalize_chain(raw: &str) -> Option<CanonicalChain> {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    CHAIN_ALIASES
        .iter()
        .find(|rule| alias_matches(rule, &lowered))
        .map(|rule| rule.chain)
}

/// Total: unknown names degrade to [`CanonicalChain::DEFAULT`].
pub fn normalize_chain(raw: &str) -> CanonicalChain {
    try_normalize_chain(raw).unwrap_or(CanonicalChain::DEFAULT)
}

/// Expands the short chain names users type after "from"/"on".
pub fn expand_chain_abbreviation(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    match lowered.as_str() {
        "arb" => "arbitrum".to_string(),
        "op" => "optimism".to_string(),
        "eth" => "ethereum".to_string(),
        "matic" | "pol" => "polygon".to_string(),
        _ => lowered,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CanonicalToken {
    Native,
    Usdc,
    Usdt,
}

impl CanonicalToken {
    /// Symbol understood by the bridge provider.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Native => "ETH",
            Self::Usdc => "USDC",
            Self::Usdt => "USDT",
        }
    }

    pub fn is_stablecoin(self) -> bool {
        matches!(self, Self::Usdc | Self::Usdt)
    }
}

impl fmt::Display for CanonicalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

pub fn normalize_token(raw: &str) -> CanonicalToken {
    match raw.trim().to_uppercase().as_str() {
        "USDC" => CanonicalToken::Usdc,
        "USDT" => CanonicalToken::Usdt,
        _ => CanonicalToken::Native,
    }
}
