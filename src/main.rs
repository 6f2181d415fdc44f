use anyhow::Result;
use clap::Parser;

use lambda_cost_bench::bench::{BenchmarkRunner, CostReport, MockLambdaServer, RunParams};
use lambda_cost_bench::config::{expand_tilde, CliArgs, Command, RunArgs, TierTable};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();

    // Initialize logging with the configured level
    let log_level = args.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let run_args = args.command.run_args().clone();
    let params = run_args.params();
    // Fail before touching the network
    params.validate()?;
    if let Some(mock_config) = args.command.mock_server() {
        mock_config.validate()?;
    }

    match &args.command {
        Command::Run { config, .. } => {
            let path = expand_tilde(config);
            let tiers = TierTable::load(&path)?;
            run_benchmark(tiers, params, &run_args).await?;
        }

        Command::Standalone { tiers, .. } => {
            let mock_config = args.command.mock_server().unwrap_or_default();
            let mut server = MockLambdaServer::new(mock_config);
            let port = server.start().await?;
            tracing::info!(port = port, "Benchmarking local prime endpoint");

            let table = server.tier_table(tiers)?;
            run_benchmark(table, params, &run_args).await?;

            server.stop();
        }
    }

    Ok(())
}

async fn run_benchmark(tiers: TierTable, params: RunParams, run_args: &RunArgs) -> Result<()> {
    if !run_args.json {
        println!(
            "Triggering {} functions {} times each, at most {} at a time",
            tiers.len(),
            params.num_executions,
            params.max_concurrency
        );
        println!(
            "Each function will loop {} time(s) and in each loop calculate all primes <={}",
            params.num_loops, params.max_prime
        );
        println!("Working...");
    }

    let runner = BenchmarkRunner::new(tiers, params)?;
    let report: CostReport = runner.run().await;

    if run_args.json {
        println!("{}", report.to_json());
    } else {
        report.print_table();
    }

    Ok(())
}
