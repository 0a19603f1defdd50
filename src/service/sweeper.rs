//! Expiry sweeper: periodically polls every auction for closing.
//! `close_if_expired` is idempotent, so sweeping is safe to run next
//! to explicit close calls from the API.

use crate::{
    auction::EngineError, clock::SharedClock, engine::AuctionEngine, service::LoopService,
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

pub struct ExpirySweeper {
    engine: Arc<AuctionEngine>,
    clock: SharedClock,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(engine: Arc<AuctionEngine>, clock: SharedClock, interval: Duration) -> Self {
        Self {
            engine,
            clock,
            interval,
        }
    }
}

impl LoopService for ExpirySweeper {
    fn name(&self) -> &'static str {
        "expiry-sweeper"
    }

    fn run_iteration(&mut self) -> Result<()> {
        let now = self.clock.now();
        for auction_id in self.engine.auction_ids() {
            match self.engine.close_if_expired(auction_id, now) {
                Ok(_) => {}
                Err(EngineError::AuctionNotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        std::thread::sleep(self.interval);
        Ok(())
    }
}
