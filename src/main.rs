//! tickflow: event-driven market data runtime
//!
//! Replays tick recordings through the processing graph and inspects
//! recording files.

use clap::{Parser, Subcommand};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tickflow::{
    config::Config,
    error::RuntimeError,
    events::{EventKind, Handler, HandlerFn},
    middleware::{compose, Audit, Middleware, Monitor, Performance, Telemetry},
    replay::{ReplayExecutor, TickFile},
    router::Router,
    strategy::{BarAggregator, MovingAverage, PositionBook},
    types::{Bar, Tick},
};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tickflow")]
#[command(about = "Event-driven market data replay runtime")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a tick recording through the processing graph
    Replay {
        /// Tick recording (overrides replay.path from the config)
        #[arg(long)]
        file: Option<String>,
    },
    /// Print the leading records of a tick recording
    Inspect {
        /// Tick recording
        file: String,

        /// Number of records to print
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Replay { file } => run_replay(config, file).await,
        Commands::Inspect { file, limit } => inspect(&file, limit),
    }
}

async fn run_replay(config: Config, file: Option<String>) -> anyhow::Result<()> {
    let path = file
        .or_else(|| config.replay.path.clone())
        .ok_or_else(|| anyhow::anyhow!("no tick recording given (use --file or replay.path)"))?;

    let mut router = Router::new(config.runtime.queue_capacity);
    let handle = router.handle();

    // Middlewares are shared across kinds; statistics print after the run.
    let monitor = Monitor::new(config.monitor.mask()?);
    let telemetry = Telemetry::new();
    let performance = Performance::new();
    let audit = Audit::new();

    // Tick pipeline: middleware around the bar aggregator.
    let aggregator = Arc::new(Mutex::new(BarAggregator::new(
        config.bars.period(),
        handle.clone(),
    )?));
    let agg = Arc::clone(&aggregator);
    let tick_base: Handler<Tick> = Box::new(move |tick| agg.lock().on_tick(&tick));
    let tick_layers: &[&dyn Middleware<Tick>] = &[&monitor, &telemetry, &performance, &audit];
    router.install(
        EventKind::Tick,
        HandlerFn::Tick(compose(EventKind::Tick, tick_layers, tick_base)),
    )?;

    // Bar pipeline: moving average over closes.
    let mut sma = MovingAverage::new(20);
    let bar_base: Handler<Bar> = Box::new(move |bar| {
        let average = sma.update(&bar);
        info!(
            timestamp = %bar.datetime(),
            close = %bar.close,
            volume = %bar.volume,
            sma = ?average,
            "bar"
        );
        Ok(())
    });
    let bar_layers: &[&dyn Middleware<Bar>] = &[&monitor, &telemetry, &performance];
    router.install(
        EventKind::Bar,
        HandlerFn::Bar(compose(EventKind::Bar, bar_layers, bar_base)),
    )?;

    // Position lifecycle and account scalars.
    let book = Arc::new(RwLock::new(PositionBook::new()));
    PositionBook::install(&book, &mut router)?;

    // Ctrl-C drives the cancellation signal.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let recording = TickFile::open(&path)?;
    info!(path = %path, records = recording.len(), "replaying tick recording");

    let mut executor = ReplayExecutor::new(recording, handle.clone());
    if let Some(start) = config.replay.start_nanos() {
        executor = executor.with_start(start);
    }
    if let Some(end) = config.replay.end_nanos() {
        executor = executor.with_end(end);
    }

    let cause = router.run(cancel_rx, executor).await;
    match cause {
        RuntimeError::EndOfStream => info!("replay complete"),
        RuntimeError::Cancelled => info!("replay cancelled"),
        other => return Err(other.into()),
    }

    if let Some(bar) = aggregator.lock().current() {
        info!(timestamp = %bar.datetime(), close = %bar.close, "bar under construction at shutdown");
    }
    telemetry.print_statistics();
    performance.print_statistics();

    let stats = handle.stats();
    println!("\nReplay summary\n");
    println!("{:<22} {:>12}", "posted", stats.posted);
    println!("{:<22} {:>12}", "post failures", stats.post_fails);
    println!("{:<22} {:>12}", "dispatched", stats.dispatched);
    println!("{:<22} {:>12}", "dispatch failures", stats.dispatch_fails);
    println!("{:<22} {:>12}", "idle cycles", stats.loop_cycles);
    println!("{:<22} {:>12?}", "run time", stats.run_time);

    let book = book.read();
    println!("{:<22} {:>12}", "open positions", book.open_count());
    println!("{:<22} {:>12}", "closed positions", book.closed_count());
    println!("{:<22} {:>12}", "realized net", book.realized_net());

    Ok(())
}

fn inspect(path: &str, limit: usize) -> anyhow::Result<()> {
    let recording = TickFile::open(path)?;

    println!("\n{} records in {}\n", recording.len(), path);
    println!(
        "{:<28} {:>12} {:>12} {:>10} {:>10}",
        "timestamp", "bid", "ask", "bid vol", "ask vol"
    );
    println!("{}", "-".repeat(76));

    for index in 0..recording.len().min(limit) {
        let tick = recording.record(index)?;
        println!(
            "{:<28} {:>12} {:>12} {:>10} {:>10}",
            tick.datetime().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            tick.bid,
            tick.ask,
            tick.bid_volume,
            tick.ask_volume
        );
    }

    Ok(())
}
