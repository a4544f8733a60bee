use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::balance::{BalanceResolver, UnifiedBalance};
use crate::chains::{CanonicalChain, CanonicalToken};
use crate::drivers::{BridgeExecuteOutcome, ExecutionDrivers, ExecutionResult};
use crate::intent::Intent;
use crate::strategy::{requires_balance, select_strategy, BridgePreview, SplitPolicy, Strategy, StrategyInput};

/// What happened to an intent handed to [`ExecutionService::execute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionReport {
    Executed {
        strategy: Strategy,
        result: ExecutionResult,
        #[serde(default)]
        warnings: Vec<String>,
    },
    /// Explicit bridges wait for `confirm_bridge`.
    BridgePreview(BridgePreview),
    Rejected {
        reason: String,
    },
    /// Dry run: the strategy that would have been executed.
    Planned {
        strategy: Strategy,
        #[serde(default)]
        warnings: Vec<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    pub intent: Option<Intent>,
    pub message: String,
    pub wallet: Option<String>,
    pub source_hint: Option<String>,
    pub dry_run: bool,
}

pub struct ExecutionService {
    drivers: ExecutionDrivers,
    balances: BalanceResolver,
    policy: SplitPolicy,
}

fn route_unsupported(source: CanonicalChain, destination: CanonicalChain, token: CanonicalToken) -> String {
    format!(
        "Bridging {token} from {} to {} is not supported on testnet. Try a different source chain or bridge first, then transfer.",
        source.display_name(),
        destination.display_name()
    )
}

impl ExecutionService {
    pub fn new(drivers: ExecutionDrivers, balances: BalanceResolver, policy: SplitPolicy) -> Self {
        Self {
            drivers,
            balances,
            policy,
        }
    }

    pub fn policy(&self) -> &SplitPolicy {
        &self.policy
    }

    /// Balance lookup only happens when the strategy needs it and a wallet is
    /// known; otherwise the snapshot is empty.
    pub async fn plan(
        &self,
        intent: &Intent,
        message: &str,
        wallet: Option<&str>,
        source_hint: Option<&str>,
    ) -> Strategy {
        let balance = match wallet {
            Some(wallet) if requires_balance(intent, &self.policy) => {
                self.balances.get_unified_balance(wallet).await
            }
            _ => UnifiedBalance::default(),
        };
        select_strategy(&StrategyInput {
            intent,
            message,
            balance: &balance,
            source_hint,
            policy: &self.policy,
        })
    }

    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionReport {
        let Some(intent) = request.intent.as_ref() else {
            return ExecutionReport::Rejected {
                reason: "No transfer, bridge or split request found in the message.".to_string(),
            };
        };
        let wallet = request.wallet.as_deref();
        let strategy = self
            .plan(intent, &request.message, wallet, request.source_hint.as_deref())
            .await;
        info!(strategy = ?strategy, dry_run = request.dry_run, "Strategy selected");

        match strategy {
            Strategy::Reject { reason } => ExecutionReport::Rejected { reason },
            Strategy::BridgePreview(preview) => ExecutionReport::BridgePreview(preview),
            strategy if request.dry_run => ExecutionReport::Planned {
                warnings: strategy.warnings(),
                strategy,
            },
            strategy => {
                let result = self.run(&strategy, wallet).await;
                ExecutionReport::Executed {
                    warnings: strategy.warnings(),
                    strategy,
                    result,
                }
            }
        }
    }

    async fn run(&self, strategy: &Strategy, wallet: Option<&str>) -> ExecutionResult {
        match strategy {
            Strategy::SplitContract {
                recipients,
                amounts,
            } => self.drivers.split_transfer(recipients, amounts, wallet).await,
            Strategy::DirectTransfer {
                chain,
                token,
                amount,
                recipient,
            } => {
                self.drivers
                    .transfer(*chain, *token, amount, recipient, wallet)
                    .await
            }
            Strategy::BridgeAndExecute {
                token,
                amount,
                destination,
                recipient,
                source,
                explicit_source,
                ..
            } => {
                self.bridge_and_execute(
                    *token,
                    amount,
                    *destination,
                    recipient,
                    *source,
                    *explicit_source,
                    wallet,
                )
                .await
            }
            Strategy::BridgePreview(_) | Strategy::Reject { .. } => {
                ExecutionResult::failure("strategy has nothing to execute")
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn bridge_and_execute(
        &self,
        token: CanonicalToken,
        amount: &str,
        destination: CanonicalChain,
        recipient: &str,
        source: CanonicalChain,
        explicit_source: bool,
        wallet: Option<&str>,
    ) -> ExecutionResult {
        let explicit_other_source = explicit_source && source != destination;
        let outcome = self
            .drivers
            .bridge_and_execute(token, amount, destination, recipient, Some(source), wallet)
            .await;

        match outcome {
            BridgeExecuteOutcome::Hash(hash) => ExecutionResult::success(source, hash),
            BridgeExecuteOutcome::Declined { reason } => ExecutionResult::Declined { reason },
            BridgeExecuteOutcome::NoHash if explicit_source => {
                warn!(source = %source, "Bridge-and-execute returned no hash with explicit source");
                ExecutionResult::failure(format!(
                    "No transaction hash returned for the transfer from {}. Check your wallet before retrying.",
                    source.display_name()
                ))
            }
            BridgeExecuteOutcome::NoHash => {
                info!(chain = %destination, "No hash from bridge-and-execute, sending directly");
                self.drivers
                    .transfer(destination, token, amount, recipient, wallet)
                    .await
            }
            BridgeExecuteOutcome::Failed { reason } if explicit_other_source => {
                warn!(reason = ?reason, "Bridge-and-execute failed, trying bridge only");
                match self
                    .drivers
                    .bridge(source, destination, token, amount, Some(recipient), wallet)
                    .await
                {
                    ExecutionResult::Failure { error } => {
                        debug!(error = %error, "Bridge-only fallback failed");
                        ExecutionResult::failure(
                            reason.unwrap_or_else(|| route_unsupported(source, destination, token)),
                        )
                    }
                    other => other,
                }
            }
            BridgeExecuteOutcome::Failed { reason } => ExecutionResult::failure(
                reason.unwrap_or_else(|| route_unsupported(source, destination, token)),
            ),
        }
    }

    /// Executes a previously returned bridge preview.
    pub async fn confirm_bridge(&self, preview: &BridgePreview, wallet: Option<&str>) -> ExecutionResult {
        if preview.source == preview.destination {
            return ExecutionResult::failure(format!(
                "Bridge source and destination chain are both {}.",
                preview.destination.display_name()
            ));
        }
        self.drivers
            .bridge(
                preview.source,
                preview.destination,
                preview.token,
                &preview.amount,
                preview.recipient.as_deref(),
                wallet,
            )
            .await
    }
}
