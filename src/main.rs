//! Hivemind CLI entry point.

use clap::Parser;
use hivemind::cli::commands::{consensus, init, memory, metrics, spawn, status};
use hivemind::cli::{Cli, Commands, HiveContext};
use hivemind::infrastructure::{config::ConfigLoader, logging};

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(err) = run().await {
        // Every caller-visible failure names the component and condition.
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load()?;

    // `init` runs before the databases exist, so it cannot go through a
    // connected context.
    if let Commands::Init { force } = cli.command {
        return init::handle_init(config, force, cli.json).await;
    }

    let ctx = HiveContext::connect(config).await?;
    let result = match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Spawn {
            objective,
            name,
            queen_type,
            max_workers,
            consensus_algorithm,
            workers,
            auto_scale,
            encryption,
        } => {
            spawn::handle_spawn(
                &ctx,
                objective,
                name,
                &queen_type,
                max_workers,
                &consensus_algorithm,
                &workers,
                auto_scale,
                encryption,
                cli.json,
            )
            .await
        }
        Commands::Status { verbose } => status::handle_status(&ctx, verbose, cli.json).await,
        Commands::Consensus {
            decide,
            options,
            algorithm,
            proposal_type,
            queen_type,
            agents,
            limit,
        } => {
            consensus::handle_consensus(
                &ctx,
                decide,
                options,
                &algorithm,
                &proposal_type,
                &queen_type,
                agents,
                limit,
                cli.json,
            )
            .await
        }
        Commands::Memory { command } => memory::handle_memory(&ctx, command, cli.json).await,
        Commands::Metrics => metrics::handle_metrics(&ctx, cli.json).await,
    };

    // Checkpoint the WAL even when the command failed.
    let close_result = ctx.close().await;
    result?;
    close_result
}
