use anyhow::Context;
use clap::Parser;
use loadtest::config::{Cli, LoadTestConfig};
use loadtest::scenario::run;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
    let config = LoadTestConfig::try_from(&cli)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let _guard = rt.enter();
    rt.block_on(run_tester(config, cli.fail_on_error))
}

async fn run_tester(config: LoadTestConfig, fail_on_error: bool) -> anyhow::Result<()> {
    tracing::info!(
        "Starting {} users against {} for {:?}",
        config.users,
        config.host,
        config.run_time
    );
    let stats = run(&config).await?;
    println!("\nResults:\n{}", stats.report());

    let failures = stats.total_failures();
    if fail_on_error && failures > 0 {
        anyhow::bail!("{failures} of {} requests failed", stats.total_requests());
    }
    Ok(())
}
