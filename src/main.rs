use clap::Parser;

use defier::config::Config;
use defier::error::{DefierError, Result};
use defier::services::chat::ChatTurn;
use defier::services::execution::{ExecutionReport, ExecutionRequest};
use defier::services::orchestrator::Orchestrator;

#[derive(Parser, Debug)]
#[command(name = "defier")]
#[command(about = "Ask DeFier a question or have it move tokens")]
struct Cli {
    /// What to do, e.g. "send 10 USDC to 0x... on arbitrum".
    message: String,

    /// Wallet address used as sender and for balance lookups.
    #[arg(long, env = "DEFIER_WALLET")]
    wallet: Option<String>,

    #[arg(long, env = "DEFIER_CONFIG")]
    config: Option<String>,

    /// Chain to send from when the message does not say.
    #[arg(long)]
    source: Option<String>,

    /// Print the chosen strategy without executing it.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| DefierError::Serialization(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    defier::logging::init_tracing("defier");
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let orchestrator = Orchestrator::from_config(&config)?;
    orchestrator.initialize().await?;

    let reply = orchestrator
        .handle_message(&[ChatTurn::user(cli.message.clone())], None)
        .await;
    let reply = match reply {
        Ok(reply) => reply,
        Err(err) => {
            orchestrator.shutdown().await?;
            return Err(err);
        }
    };
    println!("{}", reply.reply);

    if let Some(intent) = reply.intent {
        // Without a wallet there is no sender, so only plan.
        let dry_run = cli.dry_run || cli.wallet.is_none();
        let report = orchestrator
            .execute(ExecutionRequest {
                intent: Some(intent),
                message: cli.message,
                wallet: cli.wallet,
                source_hint: cli.source,
                dry_run,
            })
            .await;
        if let ExecutionReport::BridgePreview(preview) = &report {
            println!(
                "Bridge {} {} from {} to {} is ready; confirm it through the daemon's /bridge/confirm.",
                preview.amount,
                preview.token,
                preview.source.display_name(),
                preview.destination.display_name()
            );
        }
        print_json(&report)?;
    }

    orchestrator.shutdown().await
}
