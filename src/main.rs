use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vipsync::cli::{Cli, Command, ServerCommand};
use vipsync::config::Config;
use vipsync::records::CsvVipStore;
use vipsync::registry::{JsonServerRegistry, ServerRegistry, ServerTarget};
use vipsync::sync::{Daemon, RunReport, ServerStatus, SyncRunner};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v/-q.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    cli.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let registry = JsonServerRegistry::new(&config.servers_file);
    let store = CsvVipStore::new(&config.vip_file);
    let runner = SyncRunner::new(config.session_timings(), config.match_mode);

    match &cli.command {
        Command::Export => {
            let export = runner
                .export_pass(&registry, &store)
                .await
                .context("Export failed")?;
            print_report(&export.run);
            if export.saved {
                println!(
                    "{} {} VIPs written to {}",
                    "✓".green(),
                    export.entries.len(),
                    store.path().display()
                );
            } else {
                println!(
                    "{} No VIPs collected, {} left untouched",
                    "!".yellow(),
                    store.path().display()
                );
            }
        }
        Command::Import(args) => {
            let report = runner
                .import_pass(&registry, &store, args.policy())
                .await
                .with_context(|| format!("Cannot import from {}", store.path().display()))?;
            print_report(&report);
        }
        Command::Serve(_) => {
            if !store.exists() {
                tracing::warn!(
                    file = %store.path().display(),
                    "record file missing; passes will fail until it exists"
                );
            }
            let daemon = Daemon::new(runner, &registry, &store, config.interval());
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "cannot listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            let passes = daemon.run(shutdown, print_report).await;
            tracing::info!(passes, "stopped");
        }
        Command::Server(cmd) => run_server_command(&registry, cmd)?,
    }

    Ok(())
}

fn run_server_command(registry: &JsonServerRegistry, cmd: &ServerCommand) -> Result<()> {
    match cmd {
        ServerCommand::Add {
            address,
            port,
            password,
        } => {
            let target = registry
                .add(ServerTarget::new(address.clone(), *port, password.clone()))
                .context("Failed to register server")?;
            println!("{} Added {} ({})", "✓".green(), target, target.id);
        }
        ServerCommand::List => {
            let targets = registry.load_targets()?;
            if targets.is_empty() {
                println!("No servers registered in {}", registry.path().display());
            }
            for target in targets {
                println!("{}  {}", target.id.dimmed(), target.to_string().bold());
            }
        }
        ServerCommand::Remove { id } => {
            let removed = registry.remove(id)?;
            println!("{} Removed {} ({})", "✓".green(), removed, removed.id);
        }
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    for outcome in &report.outcomes {
        let status = outcome.status.to_string();
        let status = match outcome.status {
            ServerStatus::Synced(_) | ServerStatus::Exported { .. } => status.green(),
            ServerStatus::AuthenticationFailed => status.yellow(),
            ServerStatus::Failed(_) => status.red(),
        };
        println!("{:<24} {}", outcome.endpoint, status);
    }

    let summary = format!(
        "{} servers: {} ok, {} skipped in {:.1}s",
        report.outcomes.len(),
        report.succeeded(),
        report.unsuccessful(),
        report.duration.as_secs_f64()
    );
    if report.unsuccessful() == 0 {
        println!("{}", summary.bold());
    } else {
        println!("{}", summary.yellow().bold());
    }
}
