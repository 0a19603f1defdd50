//! Auction data model and per-auction state machine.
//!
//! Everything here is pure: transitions take an explicit `now` and
//! mutate one auction. Locking, audit records and event publication
//! are the engine's job.

use crate::clock::Timestamp;
use serde::Serialize;
use thiserror::Error;

pub type AuctionId = u64;
pub type ProductId = String;
pub type PartyId = String;
pub type PartyIdRef<'s> = &'s str;
pub type Amount = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid auction parameters: {0}")]
    InvalidAuctionParameters(String),
    #[error("unknown auction: {0}")]
    AuctionNotFound(AuctionId),
    #[error("auction is not active")]
    AuctionNotActive,
    #[error("sellers cannot bid on their own auction")]
    InvalidBidder,
    #[error("bid is too low: must exceed {minimum}")]
    BidTooLow { minimum: Amount },
    #[error("only the seller may cancel an auction")]
    NotAuthorized,
    #[error("auction has already ended")]
    AuctionAlreadyEnded,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    Pending,
    Active,
    Ended,
    Cancelled,
}

/// The previous highest bidder displaced by a newer bid (or by a
/// cancellation), reported so the caller can execute the refund
/// exactly once. The engine itself moves no funds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Refund {
    pub bidder: PartyId,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SettlementOutcome {
    pub auction_id: AuctionId,
    pub winner: Option<PartyId>,
    pub amount: Amount,
    pub seller: PartyId,
}

/// Read-only view of one auction, handed out across lock boundaries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuctionSnapshot {
    pub id: AuctionId,
    pub product_id: ProductId,
    pub seller_id: PartyId,
    pub start_price: Amount,
    pub original_start_price: Amount,
    pub floor_price: Amount,
    pub current_bid: Amount,
    pub highest_bidder: Option<PartyId>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub status: AuctionStatus,
    pub condition_hash: Option<String>,
}

/// Result of accepting a bid: the new state, plus the bidder it displaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BidOutcome {
    pub snapshot: AuctionSnapshot,
    pub outgoing: Option<Refund>,
}

/// Result of a close poll. Polling before the deadline is not an
/// error; it reports the still-open state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClosePoll {
    StillOpen(AuctionSnapshot),
    Settled {
        outcome: SettlementOutcome,
        /// Set only on the call that performed the transition;
        /// repeat calls return the same outcome with this unset.
        newly_closed: bool,
    },
}

/// Result of applying a condition signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignalApplied {
    /// Reference price moved (no bid standing yet).
    Adjusted { old_price: Amount, new_price: Amount },
    /// Bidding has started; the signal was recorded but absorbed.
    Recorded,
}

#[derive(Clone, Debug)]
pub struct Auction {
    id: AuctionId,
    product_id: ProductId,
    seller_id: PartyId,
    /// Reference price the next bid must exceed while no bid stands.
    /// May be lowered by condition signals, never below `floor_price`.
    start_price: Amount,
    original_start_price: Amount,
    floor_price: Amount,
    current_bid: Amount,
    highest_bidder: Option<PartyId>,
    start_time: Timestamp,
    end_time: Timestamp,
    status: AuctionStatus,
    condition_hash: Option<String>,
}

impl Auction {
    pub fn new(
        id: AuctionId,
        product_id: ProductId,
        seller_id: PartyId,
        start_price: Amount,
        start_time: Timestamp,
        duration: u64,
        floor_fraction: f64,
    ) -> Result<Self, EngineError> {
        if product_id.is_empty() {
            return Err(EngineError::InvalidAuctionParameters(
                "product id must not be empty".into(),
            ));
        }
        if seller_id.is_empty() {
            return Err(EngineError::InvalidAuctionParameters(
                "seller id must not be empty".into(),
            ));
        }
        if start_price == 0 {
            return Err(EngineError::InvalidAuctionParameters(
                "start price must be positive".into(),
            ));
        }
        if duration == 0 {
            return Err(EngineError::InvalidAuctionParameters(
                "duration must be positive".into(),
            ));
        }

        let floor_price = (start_price as f64 * floor_fraction.clamp(0.0, 1.0)).round() as Amount;
        Ok(Self {
            id,
            product_id,
            seller_id,
            start_price,
            original_start_price: start_price,
            floor_price,
            current_bid: 0,
            highest_bidder: None,
            start_time,
            end_time: start_time + duration,
            status: AuctionStatus::Pending,
            condition_hash: None,
        })
    }

    pub fn has_bid(&self) -> bool {
        self.highest_bidder.is_some()
    }

    /// The amount a new bid must strictly exceed.
    pub fn effective_price(&self) -> Amount {
        if self.has_bid() {
            self.current_bid
        } else {
            self.start_price
        }
    }

    /// Pending auctions activate lazily: every access runs this first.
    pub fn activate_if_due(&mut self, now: Timestamp) {
        if self.status == AuctionStatus::Pending && now >= self.start_time {
            self.status = AuctionStatus::Active;
        }
    }

    fn ensure_active(&self, now: Timestamp) -> Result<(), EngineError> {
        if self.status != AuctionStatus::Active || now < self.start_time || now >= self.end_time {
            return Err(EngineError::AuctionNotActive);
        }
        Ok(())
    }

    /// Validate and apply a single bid.
    ///
    /// On success exactly one mutation happens: the bid becomes the
    /// standing bid and the displaced bidder (if any) is reported for
    /// refund. On failure the auction is untouched.
    pub fn place_bid(
        &mut self,
        bidder_id: PartyIdRef,
        amount: Amount,
        now: Timestamp,
    ) -> Result<BidOutcome, EngineError> {
        self.activate_if_due(now);
        self.ensure_active(now)?;
        if bidder_id == self.seller_id {
            return Err(EngineError::InvalidBidder);
        }
        // Ties are rejected: a new bid must strictly exceed the
        // standing bid, or the reference price if none stands.
        let minimum = self.effective_price();
        if amount <= minimum {
            return Err(EngineError::BidTooLow { minimum });
        }

        let outgoing = self.highest_bidder.take().map(|bidder| Refund {
            bidder,
            amount: self.current_bid,
        });
        self.current_bid = amount;
        self.highest_bidder = Some(bidder_id.to_owned());

        Ok(BidOutcome {
            snapshot: self.snapshot(),
            outgoing,
        })
    }

    /// Apply an already-derived condition severity to the reference
    /// price, clamped to the floor. Once a bid stands the price is
    /// left alone and only the condition fingerprint is recorded.
    pub fn apply_condition_signal(
        &mut self,
        severity: f64,
        digest: String,
        now: Timestamp,
    ) -> Result<SignalApplied, EngineError> {
        self.activate_if_due(now);
        self.ensure_active(now)?;

        self.condition_hash = Some(digest);
        if self.has_bid() {
            return Ok(SignalApplied::Recorded);
        }

        let severity = severity.clamp(0.0, 1.0);
        let old_price = self.start_price;
        let proposed = (self.start_price as f64 * (1.0 - severity)).round() as Amount;
        self.start_price = proposed.clamp(self.floor_price, self.start_price);

        Ok(SignalApplied::Adjusted {
            old_price,
            new_price: self.start_price,
        })
    }

    fn settlement(&self) -> SettlementOutcome {
        SettlementOutcome {
            auction_id: self.id,
            winner: self.highest_bidder.clone(),
            amount: self.effective_price(),
            seller: self.seller_id.clone(),
        }
    }

    /// Outcome for auctions that sold nothing: a cancellation (the
    /// standing bid, if any, was reported for refund at cancel time)
    /// or an expiry with no bids.
    fn unsold_settlement(&self) -> SettlementOutcome {
        SettlementOutcome {
            auction_id: self.id,
            winner: None,
            amount: self.start_price,
            seller: self.seller_id.clone(),
        }
    }

    /// Transition to `Ended` once the deadline has passed. Idempotent:
    /// repeat calls after the transition return the settled outcome,
    /// calls before the deadline report the open state untouched.
    pub fn close_if_expired(&mut self, now: Timestamp) -> ClosePoll {
        self.activate_if_due(now);
        match self.status {
            AuctionStatus::Ended => ClosePoll::Settled {
                outcome: self.settlement(),
                newly_closed: false,
            },
            AuctionStatus::Cancelled => ClosePoll::Settled {
                outcome: self.unsold_settlement(),
                newly_closed: false,
            },
            AuctionStatus::Pending | AuctionStatus::Active => {
                if now < self.end_time {
                    ClosePoll::StillOpen(self.snapshot())
                } else {
                    self.status = AuctionStatus::Ended;
                    ClosePoll::Settled {
                        outcome: self.settlement(),
                        newly_closed: true,
                    }
                }
            }
        }
    }

    /// Seller-initiated cancellation. Reports the standing bid (if
    /// any) so the caller can refund it.
    pub fn cancel(
        &mut self,
        requester_id: PartyIdRef,
        now: Timestamp,
    ) -> Result<(SettlementOutcome, Option<Refund>), EngineError> {
        self.activate_if_due(now);
        if requester_id != self.seller_id {
            return Err(EngineError::NotAuthorized);
        }
        match self.status {
            AuctionStatus::Ended | AuctionStatus::Cancelled => {
                Err(EngineError::AuctionAlreadyEnded)
            }
            // Past the deadline the winner is already decided; the
            // seller cannot cancel out of settling.
            AuctionStatus::Pending | AuctionStatus::Active if now >= self.end_time => {
                Err(EngineError::AuctionAlreadyEnded)
            }
            AuctionStatus::Pending | AuctionStatus::Active => {
                self.status = AuctionStatus::Cancelled;
                let refund = self.highest_bidder.clone().map(|bidder| Refund {
                    bidder,
                    amount: self.current_bid,
                });
                Ok((self.unsold_settlement(), refund))
            }
        }
    }

    pub fn snapshot(&self) -> AuctionSnapshot {
        AuctionSnapshot {
            id: self.id,
            product_id: self.product_id.clone(),
            seller_id: self.seller_id.clone(),
            start_price: self.start_price,
            original_start_price: self.original_start_price,
            floor_price: self.floor_price,
            current_bid: self.current_bid,
            highest_bidder: self.highest_bidder.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            condition_hash: self.condition_hash.clone(),
        }
    }
}

/// Append-only audit record for every bid submission, accepted or not.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BidRecord {
    pub auction_id: AuctionId,
    pub bidder_id: PartyId,
    pub amount: Amount,
    pub submitted_at: Timestamp,
    pub accepted: bool,
    pub rejection_reason: Option<String>,
}
