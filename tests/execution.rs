mod common;

use serde_json::json;

use defier::chains::CanonicalChain;
use defier::config::SplitConfig;
use defier::drivers::ExecutionResult;
use defier::intent::{Intent, IntentFields};
use defier::services::execution::{ExecutionReport, ExecutionRequest};
use defier::strategy::{SourceOrigin, Strategy};

use common::{
    usdc_balances, Harness, QueueLlmProvider, RecordingBridgeProvider, RecordingSigner,
    StaticToolCatalog, ALICE, BOB, WALLET,
};

const VITALIK: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

fn fields(token: &str, amount: &str, recipient: &str, chain: &str, source: Option<&str>) -> IntentFields {
    IntentFields {
        token: token.to_string(),
        amount: amount.to_string(),
        recipient: recipient.to_string(),
        chain: chain.to_string(),
        source: source.map(str::to_string),
    }
}

fn request(intent: Intent) -> ExecutionRequest {
    ExecutionRequest {
        intent: Some(intent),
        message: String::new(),
        wallet: Some(WALLET.to_string()),
        source_hint: None,
        dry_run: false,
    }
}

fn executed(report: ExecutionReport) -> (Strategy, ExecutionResult, Vec<String>) {
    match report {
        ExecutionReport::Executed {
            strategy,
            result,
            warnings,
        } => (strategy, result, warnings),
        other => panic!("expected an executed report, got {other:?}"),
    }
}

#[tokio::test]
async fn funded_destination_sends_directly() {
    let harness = Harness::with_bridge(RecordingBridgeProvider::with_balances(usdc_balances(&[
        (84532, "50"),
        (421614, "25"),
    ])));
    let intent = Intent::Transfer(fields("usdc", "10", ALICE, "arbitrum", None));
    let (strategy, result, warnings) = executed(harness.orchestrator.execute(request(intent)).await);

    assert!(matches!(strategy, Strategy::DirectTransfer { chain: CanonicalChain::ArbitrumSepolia, .. }));
    assert_eq!(
        result,
        ExecutionResult::Success {
            tx_hash: "0xtransfer".to_string(),
            explorer_url: Some("https://arbitrum-sepolia.blockscout.com/tx/0xtransfer".to_string()),
        }
    );
    assert!(warnings.is_empty());

    let transfers = harness.bridge.transfers.lock().unwrap().clone();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].chain_id, 421614);
    assert_eq!(transfers[0].token, "USDC");
    assert_eq!(transfers[0].sender.as_deref(), Some(WALLET));
}

#[tokio::test]
async fn unfunded_destination_bridges_from_the_funded_chain() {
    let harness = Harness::with_bridge(
        RecordingBridgeProvider::with_balances(usdc_balances(&[(84532, "50")]))
            .push_bridge_execute(json!({"success": true, "result": {"executeTransactionHash": "0xexec"}})),
    );
    let intent = Intent::Transfer(fields("USDC", "10", ALICE, "arbitrum", None));
    let (strategy, result, _) = executed(harness.orchestrator.execute(request(intent)).await);

    assert!(matches!(
        strategy,
        Strategy::BridgeAndExecute {
            source: CanonicalChain::BaseSepolia,
            source_origin: SourceOrigin::Balance,
            ..
        }
    ));
    assert!(matches!(result, ExecutionResult::Success { ref tx_hash, .. } if tx_hash == "0xexec"));
    assert_eq!(harness.signer.switched.lock().unwrap().clone(), vec![84532]);

    let requests = harness.bridge.bridge_executes.lock().unwrap().clone();
    assert_eq!(requests[0].destination_chain_id, 421614);
    assert_eq!(requests[0].source_chain_id, Some(84532));
    assert_eq!(requests[0].recipient, ALICE);
}

#[tokio::test]
async fn failed_bridge_execute_with_explicit_source_falls_back_to_bridge_only() {
    let harness = Harness::with_bridge(
        RecordingBridgeProvider::default().push_bridge_execute(json!({"success": false})),
    );
    let intent = Intent::Transfer(fields("USDC", "10", ALICE, "arbitrum", Some("base")));
    let (_, result, _) = executed(harness.orchestrator.execute(request(intent)).await);

    assert_eq!(
        result,
        ExecutionResult::Success {
            tx_hash: "0xbridge".to_string(),
            explorer_url: Some("https://base-sepolia.blockscout.com/tx/0xbridge".to_string()),
        }
    );
    let bridges = harness.bridge.bridges.lock().unwrap().clone();
    assert_eq!(bridges.len(), 1);
    assert_eq!(bridges[0].source_chain_id, 84532);
    assert_eq!(bridges[0].destination_chain_id, 421614);
}

#[tokio::test]
async fn failed_bridge_execute_without_explicit_source_reports_the_route() {
    let harness = Harness::with_bridge(
        RecordingBridgeProvider::with_balances(usdc_balances(&[(84532, "50")]))
            .push_bridge_execute(json!({"success": false})),
    );
    let intent = Intent::Transfer(fields("USDC", "10", ALICE, "arbitrum", None));
    let (_, result, _) = executed(harness.orchestrator.execute(request(intent)).await);

    assert!(matches!(result, ExecutionResult::Failure { ref error } if error.contains("not supported on testnet")));
    assert!(harness.bridge.bridges.lock().unwrap().is_empty());
}

#[tokio::test]
async fn provider_reasons_are_kept_on_failure() {
    let harness = Harness::with_bridge(
        RecordingBridgeProvider::with_balances(usdc_balances(&[(84532, "50")]))
            .push_bridge_execute(json!({"success": false, "error": "Insufficient allowance"})),
    );
    let intent = Intent::Transfer(fields("USDC", "10", ALICE, "arbitrum", None));
    let (_, result, _) = executed(harness.orchestrator.execute(request(intent)).await);

    assert_eq!(result, ExecutionResult::failure("Insufficient allowance"));
}

#[tokio::test]
async fn missing_hash_without_explicit_source_sends_directly() {
    let harness = Harness::with_bridge(
        RecordingBridgeProvider::with_balances(usdc_balances(&[(84532, "50")]))
            .push_bridge_execute(json!({"success": true})),
    );
    let intent = Intent::Transfer(fields("USDC", "10", ALICE, "arbitrum", None));
    let (_, result, _) = executed(harness.orchestrator.execute(request(intent)).await);

    assert!(matches!(result, ExecutionResult::Success { ref tx_hash, .. } if tx_hash == "0xtransfer"));
    assert_eq!(harness.bridge.transfers.lock().unwrap()[0].chain_id, 421614);
}

#[tokio::test]
async fn missing_hash_with_explicit_source_is_reported() {
    let harness = Harness::with_bridge(
        RecordingBridgeProvider::default().push_bridge_execute(json!({"success": true})),
    );
    let intent = Intent::Transfer(fields("USDC", "10", ALICE, "arbitrum", Some("base")));
    let (_, result, _) = executed(harness.orchestrator.execute(request(intent)).await);

    assert!(matches!(result, ExecutionResult::Failure { ref error } if error.contains("No transaction hash returned")));
    assert!(harness.bridge.transfers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn splits_approve_then_pay_every_recipient() {
    let harness = Harness::with_bridge(RecordingBridgeProvider::default());
    let intent = Intent::Split(fields("PYUSD", "10", &format!("{ALICE}, {BOB}"), "sepolia", None));
    let (strategy, result, _) = executed(harness.orchestrator.execute(request(intent)).await);

    match strategy {
        Strategy::SplitContract { recipients, amounts } => {
            assert_eq!(recipients, vec![ALICE.to_string(), BOB.to_string()]);
            assert_eq!(amounts.len(), 2);
            assert_eq!(amounts[0], amounts[1]);
        }
        other => panic!("expected split, got {other:?}"),
    }
    assert!(matches!(result, ExecutionResult::Success { ref tx_hash, .. } if tx_hash == "0xsent2"));

    let sent = harness.signer.sent.lock().unwrap().clone();
    let config = SplitConfig::default();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].data.starts_with("0x095ea7b3"));
    assert_eq!(sent[0].to, config.token_address);
    assert_eq!(sent[1].to, config.contract_address);
    assert_eq!(sent[1].from.as_deref(), Some(WALLET));
    assert_eq!(harness.signer.switched.lock().unwrap().clone(), vec![11155111]);
}

#[tokio::test]
async fn sufficient_allowance_skips_the_approval() {
    let signer = RecordingSigner {
        allowance: u128::MAX,
        ..RecordingSigner::default()
    };
    let harness = Harness::new(
        QueueLlmProvider::default(),
        StaticToolCatalog::default(),
        RecordingBridgeProvider::default(),
        signer,
    );
    let intent = Intent::Transfer(fields("PYUSD", "3", ALICE, "sepolia", None));
    let (strategy, result, _) = executed(harness.orchestrator.execute(request(intent)).await);

    assert!(matches!(strategy, Strategy::SplitContract { .. }));
    assert!(result.is_success());
    assert_eq!(harness.signer.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn wallet_rejections_are_declined_results() {
    let signer = RecordingSigner {
        reject_sends: true,
        ..RecordingSigner::default()
    };
    let harness = Harness::new(
        QueueLlmProvider::default(),
        StaticToolCatalog::default(),
        RecordingBridgeProvider::default(),
        signer,
    );
    let intent = Intent::Split(fields("PYUSD", "4", ALICE, "sepolia", None));
    let (_, result, _) = executed(harness.orchestrator.execute(request(intent)).await);

    assert!(matches!(result, ExecutionResult::Declined { .. }));
}

#[tokio::test]
async fn bridges_wait_for_confirmation() {
    let harness = Harness::with_bridge(RecordingBridgeProvider::default());
    let intent = Intent::Bridge(fields("USDC", "5", "self", "base", Some("arbitrum")));
    let preview = match harness.orchestrator.execute(request(intent)).await {
        ExecutionReport::BridgePreview(preview) => preview,
        other => panic!("expected preview, got {other:?}"),
    };
    assert!(harness.bridge.bridges.lock().unwrap().is_empty());
    assert_eq!(preview.source, CanonicalChain::ArbitrumSepolia);
    assert_eq!(preview.recipient, None);

    let result = harness
        .orchestrator
        .confirm_bridge(&preview, Some(WALLET))
        .await;
    assert!(result.is_success());
    let bridges = harness.bridge.bridges.lock().unwrap().clone();
    assert_eq!(bridges[0].source_chain_id, 421614);
    assert_eq!(bridges[0].destination_chain_id, 84532);
    assert_eq!(bridges[0].recipient, None);
}

#[tokio::test]
async fn dry_runs_plan_without_executing() {
    let harness = Harness::with_bridge(RecordingBridgeProvider::default());
    let mut req = request(Intent::Transfer(fields("USDC", "10", ALICE, "optimism", None)));
    req.dry_run = true;

    match harness.orchestrator.execute(req).await {
        ExecutionReport::Planned { strategy, warnings } => {
            assert!(matches!(
                strategy,
                Strategy::BridgeAndExecute {
                    source_origin: SourceOrigin::DestinationFallback,
                    ..
                }
            ));
            assert_eq!(warnings.len(), 1);
        }
        other => panic!("expected a plan, got {other:?}"),
    }
    assert!(harness.bridge.bridge_executes.lock().unwrap().is_empty());
    assert!(harness.bridge.transfers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let harness = Harness::with_bridge(RecordingBridgeProvider::default());
    let report = harness
        .orchestrator
        .execute(request(Intent::Split(fields("USDC", "10", ALICE, "sepolia", None))))
        .await;
    assert!(matches!(report, ExecutionReport::Rejected { ref reason } if reason.contains("PYUSD")));

    let report = harness
        .orchestrator
        .execute(ExecutionRequest::default())
        .await;
    assert!(matches!(report, ExecutionReport::Rejected { .. }));
}

#[tokio::test]
async fn names_are_resolved_before_sending() {
    let tools = StaticToolCatalog::default().with_result(
        "get_address_by_ens_name",
        json!({"content": [{"type": "text", "text": format!("Resolved address: {VITALIK}")}]}),
    );
    let harness = Harness::new(
        QueueLlmProvider::default(),
        tools,
        RecordingBridgeProvider::with_balances(usdc_balances(&[(421614, "100")])),
        RecordingSigner::default(),
    );
    let intent = Intent::Transfer(fields("USDC", "1", "vitalik.eth", "arbitrum", None));
    let (_, result, _) = executed(harness.orchestrator.execute(request(intent)).await);

    assert!(result.is_success());
    assert_eq!(harness.bridge.transfers.lock().unwrap()[0].recipient, VITALIK);
    let calls = harness.tools.calls.lock().unwrap().clone();
    assert_eq!(calls[0].1, json!({"name": "vitalik.eth"}));
}

#[tokio::test]
async fn unresolvable_names_are_rejected() {
    let harness = Harness::with_bridge(RecordingBridgeProvider::default());
    let intent = Intent::Transfer(fields("USDC", "1", "nobody.eth", "arbitrum", None));
    let report = harness.orchestrator.execute(request(intent)).await;

    assert!(matches!(report, ExecutionReport::Rejected { ref reason } if reason.contains("nobody.eth")));
    assert!(harness.bridge.transfers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bare_names_are_rejected_without_a_provider_call() {
    let harness = Harness::with_bridge(RecordingBridgeProvider::with_balances(usdc_balances(&[
        (84532, "50"),
    ])));
    let intent = Intent::Transfer(fields("USDC", "10", "bob", "base", Some("base")));
    let report = harness.orchestrator.execute(request(intent)).await;

    assert!(matches!(
        report,
        ExecutionReport::Rejected { ref reason } if reason.contains("\"bob\" is not a valid address")
    ));
    assert!(harness.bridge.transfers.lock().unwrap().is_empty());
    assert!(harness.bridge.bridge_executes.lock().unwrap().is_empty());
    assert!(harness.tools.calls.lock().unwrap().is_empty());
}
