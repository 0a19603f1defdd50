mod auction;
mod clock;
mod config;
mod engine;
mod event;
mod event_log;
mod ledger;
mod pricing;
mod service;
mod store;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env()?;
    info!(?config, "starting");

    let clock = clock::SystemClock::new_shared();
    let store = store::InMemoryAuctionStore::new_shared();
    let ledger = ledger::InMemoryBidLedger::new_shared();
    let (event_writer, event_reader) = event_log::new_in_memory_shared();

    let engine = Arc::new(engine::AuctionEngine::new(
        store,
        ledger,
        event_writer,
        config.pricing,
    ));

    let (signal_source, signal_injector) = service::signal_feed::channel_source();
    let payment_executor = service::settlement::LoggingPaymentExecutor::new_shared();

    let svc_ctl = service::ServiceControl::new();

    ctrlc::set_handler({
        let svc_ctl = svc_ctl.clone();
        move || {
            eprintln!("Stopping all services...");
            svc_ctl.stop_all();
        }
    })?;

    for handle in vec![
        svc_ctl.spawn_log_follower(
            service::settlement::SettlementService::new(payment_executor),
            event_reader.clone(),
        ),
        svc_ctl.spawn_loop(service::signal_feed::SignalFeed::new(
            engine.clone(),
            signal_source,
            clock.clone(),
            config.signal_poll_timeout,
        )),
        svc_ctl.spawn_loop(service::sweeper::ExpirySweeper::new(
            engine.clone(),
            clock.clone(),
            config.sweep_interval,
        )),
        svc_ctl.spawn_loop(service::api::ApiService::new(
            config.http_bind,
            engine,
            clock,
            signal_injector,
        )?),
    ] {
        handle.join()?
    }

    Ok(())
}
