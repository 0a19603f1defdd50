//! Condition-signal ingestion: drains an opaque signal source (in the
//! real deployment an MQTT subscription and the AI assessor) into the
//! engine. Signals are advisory, so a signal that can no longer be
//! applied is logged and dropped rather than failing the service.

use crate::{
    auction::EngineError,
    clock::SharedClock,
    engine::AuctionEngine,
    pricing::ConditionSignal,
    service::LoopService,
};
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::{
    mpsc::{self, RecvTimeoutError},
    Arc,
};
use std::time::Duration;
use tracing::debug;

pub trait SignalSource: Send + Sync {
    /// Next signal, waiting up to `timeout` for one to arrive.
    fn poll(&self, timeout: Duration) -> Result<Option<ConditionSignal>>;
}

pub type SharedSignalSource = Arc<dyn SignalSource + 'static>;

/// Producer half handed to the API layer (and tests) for injecting
/// signals into the feed.
#[derive(Clone)]
pub struct SignalInjector(mpsc::Sender<ConditionSignal>);

impl SignalInjector {
    pub fn inject(&self, signal: ConditionSignal) -> Result<()> {
        self.0
            .send(signal)
            .map_err(|_| anyhow::format_err!("signal feed is shut down"))
    }
}

pub struct ChannelSignalSource(Mutex<mpsc::Receiver<ConditionSignal>>);

/// In-process signal channel standing in for the broker subscription.
pub fn channel_source() -> (SharedSignalSource, SignalInjector) {
    let (tx, rx) = mpsc::channel();
    (
        Arc::new(ChannelSignalSource(Mutex::new(rx))),
        SignalInjector(tx),
    )
}

impl SignalSource for ChannelSignalSource {
    fn poll(&self, timeout: Duration) -> Result<Option<ConditionSignal>> {
        match self.0.lock().recv_timeout(timeout) {
            Ok(signal) => Ok(Some(signal)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            // All injectors dropped: nothing will ever arrive again,
            // but the service keeps idling until told to stop.
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }
}

pub struct SignalFeed {
    engine: Arc<AuctionEngine>,
    source: SharedSignalSource,
    clock: SharedClock,
    poll_timeout: Duration,
}

impl SignalFeed {
    pub fn new(
        engine: Arc<AuctionEngine>,
        source: SharedSignalSource,
        clock: SharedClock,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            source,
            clock,
            poll_timeout,
        }
    }
}

impl LoopService for SignalFeed {
    fn name(&self) -> &'static str {
        "signal-feed"
    }

    fn run_iteration(&mut self) -> Result<()> {
        let Some(signal) = self.source.poll(self.poll_timeout)? else {
            return Ok(());
        };

        match self
            .engine
            .apply_condition_signal(&signal, self.clock.now())
        {
            Ok(_snapshot) => Ok(()),
            // Stale or early signal for a known-shaped reason: absorb.
            Err(
                err @ (EngineError::AuctionNotFound(_) | EngineError::AuctionNotActive),
            ) => {
                debug!(auction_id = signal.auction_id, %err, "dropping condition signal");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
