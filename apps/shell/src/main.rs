mod settings;
mod demo;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use herald_event_bus::{DeliveryMode, EventBus, MatchPolicy};
use herald_logger::Logger;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Delivery {
    Sync,
    Async,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Matching {
    Exact,
    Polymorphic,
}

/// Runs the herald order-flow demo against a configured event bus.
#[derive(Debug, Parser)]
#[command(name = "herald", version, about)]
struct Cli {
    /// Configuration file; defaults to `herald.toml` in the working directory when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `bus.delivery`.
    #[arg(long, value_enum)]
    delivery: Option<Delivery>,

    /// Overrides `bus.matching`.
    #[arg(long, value_enum)]
    matching: Option<Matching>,

    /// Overrides `bus.workers`.
    #[arg(long)]
    workers: Option<usize>,

    /// Overrides `demo.orders`.
    #[arg(long)]
    orders: Option<u64>,
}

impl Cli {
    fn apply(&self, config: &mut settings::ShellConfig) {
        if let Some(delivery) = self.delivery {
            config.bus.delivery = match delivery {
                Delivery::Sync => DeliveryMode::Sync,
                Delivery::Async => DeliveryMode::Async,
            };
        }
        if let Some(matching) = self.matching {
            config.bus.matching = match matching {
                Matching::Exact => MatchPolicy::Exact,
                Matching::Polymorphic => MatchPolicy::Polymorphic,
            };
        }
        if let Some(workers) = self.workers {
            config.bus.workers = workers;
        }
        if let Some(orders) = self.orders {
            config.demo.orders = orders;
        }
    }
}

#[herald_runtime::main(memory_efficient)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = settings::load_config(cli.config.as_deref()).context("Critical: Configuration is malformed")?;
    cli.apply(&mut cfg);

    let _logger = Logger::from_settings(&cfg.log)?;

    // Posting and draining block, so the scenario runs off the async workers.
    let report = tokio::task::spawn_blocking(move || {
        let bus = EventBus::from_config(&cfg.bus, demo::hierarchy())?;
        demo::run(&bus, &cfg.demo)
    })
    .await??;

    tracing::info!(?report, "herald shell done");
    Ok(())
}
