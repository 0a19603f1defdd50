//! Settlement follower: executes the value transfers the engine only
//! reports. Refunds for displaced bidders and seller payouts are
//! driven off the event log so each one runs exactly once per
//! recorded transition. The actual transfer executor is an external
//! collaborator behind [`PaymentExecutor`].

use crate::{
    auction::{Amount, AuctionId, PartyIdRef},
    event::Event,
    event_log::LogEvent,
    service::LogFollowerService,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub trait PaymentExecutor: Send + Sync {
    fn refund(&self, auction_id: AuctionId, bidder: PartyIdRef, amount: Amount) -> Result<()>;
    fn pay_seller(&self, auction_id: AuctionId, seller: PartyIdRef, amount: Amount) -> Result<()>;
}

pub type SharedPaymentExecutor = Arc<dyn PaymentExecutor + 'static>;

/// Stand-in for the on-chain transfer executor: records what would be
/// transferred and succeeds.
#[derive(Clone, Debug, Default)]
pub struct LoggingPaymentExecutor;

impl LoggingPaymentExecutor {
    pub fn new_shared() -> SharedPaymentExecutor {
        Arc::new(Self)
    }
}

impl PaymentExecutor for LoggingPaymentExecutor {
    fn refund(&self, auction_id: AuctionId, bidder: PartyIdRef, amount: Amount) -> Result<()> {
        info!(auction_id, bidder, amount, "refunding displaced bidder");
        Ok(())
    }

    fn pay_seller(&self, auction_id: AuctionId, seller: PartyIdRef, amount: Amount) -> Result<()> {
        info!(auction_id, seller, amount, "paying out seller");
        Ok(())
    }
}

pub struct SettlementService {
    executor: SharedPaymentExecutor,
}

impl SettlementService {
    pub fn new(executor: SharedPaymentExecutor) -> Self {
        Self { executor }
    }
}

impl LogFollowerService for SettlementService {
    fn name(&self) -> &'static str {
        "settlement"
    }

    fn handle_event(&mut self, event: &LogEvent) -> Result<()> {
        match &event.details {
            Event::BidPlaced {
                auction_id,
                outgoing: Some(refund),
                ..
            } => self
                .executor
                .refund(*auction_id, &refund.bidder, refund.amount),
            Event::AuctionCancelled {
                outcome,
                refund: Some(refund),
            } => self
                .executor
                .refund(outcome.auction_id, &refund.bidder, refund.amount),
            Event::AuctionEnded { outcome } => match &outcome.winner {
                Some(_winner) => {
                    self.executor
                        .pay_seller(outcome.auction_id, &outcome.seller, outcome.amount)
                }
                // Unsold: no funds move.
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }
}
