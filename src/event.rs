//! Domain events published on the log after each committed transition.
//!
//! Followers (settlement, notifications, persistence) consume these
//! instead of reaching into the store, so every side effect is driven
//! from the recorded stream exactly once.

use crate::auction::{Amount, AuctionId, AuctionSnapshot, PartyId, Refund, SettlementOutcome};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Event {
    AuctionCreated {
        auction: AuctionSnapshot,
    },
    BidPlaced {
        auction_id: AuctionId,
        bidder: PartyId,
        amount: Amount,
        /// Displaced previous highest bidder, due a refund.
        outgoing: Option<Refund>,
    },
    ConditionUpdated {
        auction_id: AuctionId,
        condition_hash: String,
        old_price: Amount,
        new_price: Amount,
    },
    AuctionEnded {
        outcome: SettlementOutcome,
    },
    AuctionCancelled {
        outcome: SettlementOutcome,
        refund: Option<Refund>,
    },
    #[cfg(test)]
    Test,
}
