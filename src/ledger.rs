//! Append-only bid audit log. Records are created by the engine and
//! never mutated; rejected submissions are kept too, with the reason.

use crate::auction::{AuctionId, BidRecord, PartyIdRef};
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;

pub trait BidLedger: Send + Sync {
    fn append(&self, record: BidRecord) -> Result<()>;
    fn bids_for_auction(&self, auction_id: AuctionId) -> Result<Vec<BidRecord>>;
    fn bids_for_bidder(&self, bidder_id: PartyIdRef) -> Result<Vec<BidRecord>>;
}

pub type SharedBidLedger = Arc<dyn BidLedger + 'static>;

#[derive(Default)]
pub struct InMemoryBidLedger(Mutex<Vec<BidRecord>>);

impl InMemoryBidLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> SharedBidLedger {
        Arc::new(Self::new())
    }
}

impl BidLedger for InMemoryBidLedger {
    fn append(&self, record: BidRecord) -> Result<()> {
        self.0.lock().push(record);
        Ok(())
    }

    fn bids_for_auction(&self, auction_id: AuctionId) -> Result<Vec<BidRecord>> {
        Ok(self
            .0
            .lock()
            .iter()
            .filter(|r| r.auction_id == auction_id)
            .cloned()
            .collect())
    }

    fn bids_for_bidder(&self, bidder_id: PartyIdRef) -> Result<Vec<BidRecord>> {
        Ok(self
            .0
            .lock()
            .iter()
            .filter(|r| r.bidder_id == bidder_id)
            .cloned()
            .collect())
    }
}
