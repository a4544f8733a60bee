use clap::Parser;
use defier::config::Config;
use defier::daemon;
use defier::error::Result;

#[derive(Parser, Debug)]
#[command(name = "defierd")]
#[command(about = "DeFier HTTP daemon")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 7878)]
    port: u16,

    /// JSON config file; defaults target the public testnets.
    #[arg(long, env = "DEFIER_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    defier::logging::init_tracing("defierd");
    let cli = Cli::parse();
    tracing::info!(sha = defier::BUILD_SHA, "Starting defierd");
    let config = Config::load(cli.config.as_deref())?;

    daemon::run_with_shutdown(&cli.host, cli.port, config, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Failed to listen for ctrl-c");
            futures::future::pending::<()>().await;
        }
    })
    .await
}
