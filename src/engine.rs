//! Auction lifecycle engine.
//!
//! Top-level orchestrator: creates auctions, routes bids and condition
//! signals through the per-auction state machine, evaluates closing,
//! and publishes an event for every committed transition. All auction
//! mutation happens inside `store.with_auction`; ledger appends and
//! event writes happen there too, before the auction's lock is
//! released, so the event log sees transitions in commit order.

use crate::{
    auction::{
        Amount, Auction, AuctionId, AuctionSnapshot, BidOutcome, BidRecord, ClosePoll,
        EngineError, PartyIdRef, Refund, SettlementOutcome, SignalApplied,
    },
    clock::Timestamp,
    config::PricingPolicy,
    event::Event,
    event_log,
    ledger::SharedBidLedger,
    pricing::{self, ConditionSignal},
    store::SharedAuctionStore,
};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct CreateAuction {
    pub product_id: String,
    pub seller_id: String,
    pub start_price: Amount,
    pub start_time: Timestamp,
    pub duration: u64,
}

pub struct AuctionEngine {
    store: SharedAuctionStore,
    ledger: SharedBidLedger,
    event_writer: event_log::SharedWriter,
    pricing: PricingPolicy,
}

impl AuctionEngine {
    pub fn new(
        store: SharedAuctionStore,
        ledger: SharedBidLedger,
        event_writer: event_log::SharedWriter,
        pricing: PricingPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            event_writer,
            pricing,
        }
    }

    pub fn create_auction(&self, params: CreateAuction) -> Result<AuctionSnapshot, EngineError> {
        let floor_fraction = self.pricing.floor_fraction;
        let snapshot = self.store.create(
            |id| {
                Auction::new(
                    id,
                    params.product_id.clone(),
                    params.seller_id.clone(),
                    params.start_price,
                    params.start_time,
                    params.duration,
                    floor_fraction,
                )
            },
            |auction| {
                let snapshot = auction.snapshot();
                self.publish(Event::AuctionCreated {
                    auction: snapshot.clone(),
                });
                snapshot
            },
        )?;

        info!(
            auction_id = snapshot.id,
            product_id = %snapshot.product_id,
            seller_id = %snapshot.seller_id,
            start_price = snapshot.start_price,
            end_time = snapshot.end_time,
            "auction created"
        );
        Ok(snapshot)
    }

    /// Validate and apply one bid. The displaced bidder (if any) comes
    /// back in the outcome for the settlement layer to refund.
    pub fn place_bid(
        &self,
        auction_id: AuctionId,
        bidder_id: PartyIdRef,
        amount: Amount,
        now: Timestamp,
    ) -> Result<BidOutcome, EngineError> {
        let result = self.store.with_auction(auction_id, |auction| {
            let result = auction.place_bid(bidder_id, amount, now);
            // Audit every submission that reached an existing auction,
            // rejections included.
            self.record_bid(auction_id, bidder_id, amount, now, &result);
            if let Ok(outcome) = &result {
                self.publish(Event::BidPlaced {
                    auction_id,
                    bidder: bidder_id.to_owned(),
                    amount,
                    outgoing: outcome.outgoing.clone(),
                });
            }
            result
        })?;

        match result {
            Ok(outcome) => {
                info!(
                    auction_id,
                    bidder = bidder_id,
                    amount,
                    outgoing = ?outcome.outgoing,
                    "bid accepted"
                );
                Ok(outcome)
            }
            Err(err) => {
                debug!(auction_id, bidder = bidder_id, amount, %err, "bid rejected");
                Err(err)
            }
        }
    }

    /// Apply an exogenous condition signal (sensor reading or AI
    /// assessment). Best-effort: once bidding has started the price is
    /// untouched and only the condition fingerprint is recorded.
    pub fn apply_condition_signal(
        &self,
        signal: &ConditionSignal,
        now: Timestamp,
    ) -> Result<AuctionSnapshot, EngineError> {
        let severity = pricing::severity(&self.pricing, signal);
        let digest = pricing::digest(signal);

        let (applied, snapshot) = self
            .store
            .with_auction(signal.auction_id, |auction| {
                let applied = auction.apply_condition_signal(severity, digest.clone(), now);
                let snapshot = auction.snapshot();
                if let Ok(applied) = &applied {
                    let (old_price, new_price) = match applied {
                        SignalApplied::Adjusted {
                            old_price,
                            new_price,
                        } => (*old_price, *new_price),
                        SignalApplied::Recorded => (snapshot.start_price, snapshot.start_price),
                    };
                    self.publish(Event::ConditionUpdated {
                        auction_id: signal.auction_id,
                        condition_hash: digest.clone(),
                        old_price,
                        new_price,
                    });
                }
                (applied, snapshot)
            })?;

        match applied? {
            SignalApplied::Adjusted {
                old_price,
                new_price,
            } => {
                if old_price != new_price {
                    info!(
                        auction_id = signal.auction_id,
                        kind = ?signal.kind,
                        magnitude = signal.magnitude,
                        old_price,
                        new_price,
                        "condition signal adjusted reference price"
                    );
                }
            }
            SignalApplied::Recorded => {
                debug!(
                    auction_id = signal.auction_id,
                    kind = ?signal.kind,
                    "bidding underway, condition signal recorded without price change"
                );
            }
        }
        Ok(snapshot)
    }

    /// Settle the auction if its deadline has passed. Safe to call any
    /// number of times; the `AuctionEnded` event is published only on
    /// the call that performed the transition.
    pub fn close_if_expired(
        &self,
        auction_id: AuctionId,
        now: Timestamp,
    ) -> Result<ClosePoll, EngineError> {
        let poll = self.store.with_auction(auction_id, |auction| {
            let poll = auction.close_if_expired(now);
            if let ClosePoll::Settled {
                outcome,
                newly_closed: true,
            } = &poll
            {
                self.publish(Event::AuctionEnded {
                    outcome: outcome.clone(),
                });
            }
            poll
        })?;

        if let ClosePoll::Settled {
            outcome,
            newly_closed: true,
        } = &poll
        {
            info!(
                auction_id,
                winner = ?outcome.winner,
                amount = outcome.amount,
                "auction ended"
            );
        }
        Ok(poll)
    }

    /// Seller-initiated cancellation; the standing bid (if any) is
    /// reported for refund.
    pub fn cancel(
        &self,
        auction_id: AuctionId,
        requester_id: PartyIdRef,
        now: Timestamp,
    ) -> Result<(SettlementOutcome, Option<Refund>), EngineError> {
        let (outcome, refund) = self.store.with_auction(auction_id, |auction| {
            let result = auction.cancel(requester_id, now);
            if let Ok((outcome, refund)) = &result {
                self.publish(Event::AuctionCancelled {
                    outcome: outcome.clone(),
                    refund: refund.clone(),
                });
            }
            result
        })??;

        info!(auction_id, requester = requester_id, refund = ?refund, "auction cancelled");
        Ok((outcome, refund))
    }

    /// Current state of one auction (runs lazy activation).
    pub fn auction(
        &self,
        auction_id: AuctionId,
        now: Timestamp,
    ) -> Result<AuctionSnapshot, EngineError> {
        self.store.with_auction(auction_id, |auction| {
            auction.activate_if_due(now);
            auction.snapshot()
        })
    }

    pub fn auction_ids(&self) -> Vec<AuctionId> {
        self.store.ids()
    }

    pub fn bids_for_auction(&self, auction_id: AuctionId) -> anyhow::Result<Vec<BidRecord>> {
        self.ledger.bids_for_auction(auction_id)
    }

    pub fn bids_for_bidder(&self, bidder_id: PartyIdRef) -> anyhow::Result<Vec<BidRecord>> {
        self.ledger.bids_for_bidder(bidder_id)
    }

    fn record_bid(
        &self,
        auction_id: AuctionId,
        bidder_id: PartyIdRef,
        amount: Amount,
        now: Timestamp,
        result: &Result<BidOutcome, EngineError>,
    ) {
        let record = BidRecord {
            auction_id,
            bidder_id: bidder_id.to_owned(),
            amount,
            submitted_at: now,
            accepted: result.is_ok(),
            rejection_reason: result.as_ref().err().map(|e| e.to_string()),
        };
        if let Err(err) = self.ledger.append(record) {
            warn!(auction_id, %err, "failed to append bid audit record");
        }
    }

    // The in-memory transition has already committed when we publish;
    // a log failure must not be reported as a failed operation.
    fn publish(&self, event: Event) {
        if let Err(err) = self.event_writer.write(&[event]) {
            warn!(%err, "failed to publish event");
        }
    }
}
