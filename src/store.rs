//! Authoritative in-memory auction store.
//!
//! One mutex per auction: `with_auction` serializes all transitions
//! for a single auction while distinct auctions proceed in parallel.
//! The outer map lock is held only long enough to look up the entry.
//! Mutator bodies must not do external I/O; in-process appends (audit
//! records, event-log writes) are fine and keep the published order
//! matching the commit order.

use crate::auction::{Auction, AuctionId, EngineError};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

#[derive(Default)]
pub struct InMemoryAuctionStore {
    next_id: AtomicU64,
    auctions: RwLock<BTreeMap<AuctionId, Arc<Mutex<Auction>>>>,
}

pub type SharedAuctionStore = Arc<InMemoryAuctionStore>;

impl InMemoryAuctionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> SharedAuctionStore {
        Arc::new(Self::new())
    }

    /// Insert a new auction under a freshly assigned id.
    ///
    /// `after_insert` runs while the new entry's lock is still held,
    /// so whatever it observes or publishes precedes every transition
    /// of the auction.
    pub fn create<T>(
        &self,
        build: impl FnOnce(AuctionId) -> Result<Auction, EngineError>,
        after_insert: impl FnOnce(&Auction) -> T,
    ) -> Result<T, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let auction = build(id)?;
        let entry = Arc::new(Mutex::new(auction));
        let guard = entry.lock();
        self.auctions.write().insert(id, entry.clone());
        Ok(after_insert(&guard))
    }

    /// Scoped exclusive access to one auction. No other mutation of
    /// the same auction interleaves with `mutate`.
    pub fn with_auction<T>(
        &self,
        id: AuctionId,
        mutate: impl FnOnce(&mut Auction) -> T,
    ) -> Result<T, EngineError> {
        let entry = self
            .auctions
            .read()
            .get(&id)
            .cloned()
            .ok_or(EngineError::AuctionNotFound(id))?;
        let mut auction = entry.lock();
        Ok(mutate(&mut auction))
    }

    pub fn ids(&self) -> Vec<AuctionId> {
        self.auctions.read().keys().copied().collect()
    }
}
