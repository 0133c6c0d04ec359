//! Router binary: loads configuration, wires the engine to the observer
//! and exit handler, and drives the main poll/route/reconcile loop until
//! SIGINT.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use router_core::{init_json_logging, init_logging, Engine, ReferenceCaches, RouterConfig};
use router_execution::{append_broker_order, InMemoryDataStore};
use router_integration::SignalIdAllocator;
use router_markets::cache::CacheConfig;
use router_observer::{Observer, ObserverEvent, ObserverPaths};
use router_trader::ExitHandler;
use tracing::{error, info, warn};

/// Automated equity order-routing engine.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Deployment environment section to load (defaults to $ENV, then "local").
    #[arg(short, long)]
    env: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let env_flag = args.env.or_else(|| std::env::var("ENV").ok()).unwrap_or_else(|| "local".to_string());

    let config = RouterConfig::load(&args.config, &env_flag)?;
    if config.logging.json {
        init_json_logging();
    } else {
        init_logging();
    }

    info!(env = %env_flag, "router starting");

    // The relational store backing strategies/positions/contracts/orders/
    // trades lives outside this workspace; the in-memory double stands in
    // for local runs and integration tests.
    let data_store = InMemoryDataStore::default();
    let cache_cfg = CacheConfig { tolerance_secs: config.quote_delay_tolerance_secs, debug: config.debug };
    let caches = ReferenceCaches::new(cache_cfg);
    let mut engine = Engine::new(config.clone(), &data_store, &caches);

    let signal_ids = SignalIdAllocator::new();
    let observer_paths = ObserverPaths {
        xq_signals_dir: PathBuf::from(&config.observer.base_path).join(&config.observer.xq_signals_dir),
        order_callback_file: PathBuf::from(&config.observer.base_path)
            .join(&config.observer.order_callback_dir)
            .join(&config.observer.order_callback_file),
        trade_callback_file: PathBuf::from(&config.observer.base_path)
            .join(&config.observer.order_callback_dir)
            .join(&config.observer.trade_callback_file),
        position_callback_file: PathBuf::from(&config.observer.base_path)
            .join(&config.observer.order_callback_dir)
            .join(&config.observer.position_callback_file),
        checkpoints_path: PathBuf::from(&config.checkpoints_dir).join("observer.json"),
    };

    let strategies_cache = &caches.strategies;
    let resolve_strategy_id = move |name: &str| strategies_cache.resolve_name(name);

    let mut observer = Observer::load(observer_paths, &signal_ids, resolve_strategy_id)?;
    let mut exit_handler = ExitHandler::load(PathBuf::from(&config.checkpoints_dir).join("running_signals.json"), config.quote_delay_tolerance_secs)?;

    let broker_order_base = PathBuf::from(&config.observer.base_path).join(&config.observer.sf31_orders_dir);

    let mut shutdown = Box::pin(tokio::signal::ctrl_c());
    let mut tick = tokio::time::interval(Duration::from_millis(10));

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received, exiting");
                break;
            }
            _ = tick.tick() => {
                if let Err(err) = run_once(&mut engine, &mut observer, &mut exit_handler, &signal_ids, &broker_order_base) {
                    error!(%err, "main loop iteration failed");
                }
            }
        }
    }

    Ok(())
}

fn run_once(
    engine: &mut Engine<'_>,
    observer: &mut Observer<'_>,
    exit_handler: &mut ExitHandler,
    signal_ids: &SignalIdAllocator,
    broker_order_base: &std::path::Path,
) -> anyhow::Result<()> {
    let now = chrono::Utc::now();
    let today = now.date_naive();

    if engine.maybe_reset(observer, exit_handler, now)? {
        info!("engine reset fired");
    }

    if engine.is_sync_due(now) {
        engine.sync_reference_data(now, today)?;
    }

    if engine.is_snapshot_due(now) {
        engine.refresh_snapshots(now)?;
    }

    for signal in exit_handler.evaluate_positions(
        &engine.caches.positions,
        &engine.caches.strategies,
        &engine.caches.contracts,
        &engine.caches.snapshots,
        &engine.caches.trading_dates,
        signal_ids,
        now,
        now.time(),
        today,
        false,
    )? {
        dispatch(engine, broker_order_base, now, ObserverEvent::Signal(signal))?;
    }

    for event in observer.poll_once()? {
        dispatch(engine, broker_order_base, now, event)?;
    }

    if engine.system_check(now) {
        let (orders, trades) = engine.drain_retry_queues()?;
        for order in orders {
            info!(order_id = %order.order_id, "order callback correlated");
        }
        for trade in trades {
            info!(order_id = %trade.order_id, "trade callback correlated");
        }
    }

    Ok(())
}

fn dispatch(
    engine: &mut Engine<'_>,
    broker_order_base: &std::path::Path,
    now: chrono::DateTime<chrono::Utc>,
    event: ObserverEvent,
) -> anyhow::Result<()> {
    let today = now.date_naive();
    match engine.handle_observer_event(event, now, today)? {
        router_core::EngineOutcome::BrokerOrders(orders) => {
            for order in orders {
                let Ok(strategy) = engine.caches.strategies.get_by_id(order.strategy_id, now) else {
                    warn!(strategy_id = order.strategy_id, "unknown strategy for broker order, skipping log write");
                    continue;
                };
                append_broker_order(broker_order_base, &strategy.name, &order)?;
                engine.register_sent_order(order)?;
            }
        }
        router_core::EngineOutcome::SignalRejected(reason) => {
            warn!(?reason, "signal rejected by risk manager");
        }
        _ => {}
    }
    Ok(())
}
