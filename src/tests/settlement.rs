use super::{rig, T0};
use crate::{
    auction::{Amount, AuctionId, PartyIdRef},
    service::{
        settlement::{PaymentExecutor, SettlementService},
        LogFollowerService,
    },
};
use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, PartialEq, Eq)]
enum Transfer {
    Refund {
        auction_id: AuctionId,
        bidder: String,
        amount: Amount,
    },
    Payout {
        auction_id: AuctionId,
        seller: String,
        amount: Amount,
    },
}

#[derive(Default)]
struct RecordingExecutor(Mutex<Vec<Transfer>>);

impl PaymentExecutor for RecordingExecutor {
    fn refund(&self, auction_id: AuctionId, bidder: PartyIdRef, amount: Amount) -> Result<()> {
        self.0.lock().push(Transfer::Refund {
            auction_id,
            bidder: bidder.to_owned(),
            amount,
        });
        Ok(())
    }

    fn pay_seller(&self, auction_id: AuctionId, seller: PartyIdRef, amount: Amount) -> Result<()> {
        self.0.lock().push(Transfer::Payout {
            auction_id,
            seller: seller.to_owned(),
            amount,
        });
        Ok(())
    }
}

/// Feed everything currently on the log through the follower once.
fn follow(rig: &super::TestRig, service: &mut SettlementService) -> Result<()> {
    let batch = rig.events.read(
        rig.events.get_start_offset()?,
        usize::MAX,
        Some(Duration::from_secs(0)),
    )?;
    for event in &batch.data {
        service.handle_event(event)?;
    }
    Ok(())
}

#[test]
fn displaced_bidder_is_refunded_and_seller_paid_once() -> Result<()> {
    let rig = rig();
    let executor = Arc::new(RecordingExecutor::default());
    let mut service = SettlementService::new(executor.clone());

    let auction = rig.standard_auction()?;
    rig.engine
        .place_bid(auction.id, "alice", 150, T0 + 1)
        .expect("accepted");
    rig.engine
        .place_bid(auction.id, "bob", 200, T0 + 2)
        .expect("accepted");
    rig.engine.close_if_expired(auction.id, T0 + 3601)?;
    // Repeat close: idempotent, publishes no second settlement.
    rig.engine.close_if_expired(auction.id, T0 + 4000)?;

    follow(&rig, &mut service)?;

    assert_eq!(
        *executor.0.lock(),
        vec![
            Transfer::Refund {
                auction_id: auction.id,
                bidder: "alice".into(),
                amount: 150,
            },
            Transfer::Payout {
                auction_id: auction.id,
                seller: "seller".into(),
                amount: 200,
            },
        ]
    );
    Ok(())
}

#[test]
fn unsold_settlement_moves_no_funds() -> Result<()> {
    let rig = rig();
    let executor = Arc::new(RecordingExecutor::default());
    let mut service = SettlementService::new(executor.clone());

    let auction = rig.standard_auction()?;
    rig.engine.close_if_expired(auction.id, T0 + 3601)?;

    follow(&rig, &mut service)?;
    assert!(executor.0.lock().is_empty());
    Ok(())
}

#[test]
fn cancellation_refunds_the_standing_bid() -> Result<()> {
    let rig = rig();
    let executor = Arc::new(RecordingExecutor::default());
    let mut service = SettlementService::new(executor.clone());

    let auction = rig.standard_auction()?;
    rig.engine
        .place_bid(auction.id, "alice", 150, T0 + 1)
        .expect("accepted");
    rig.engine.cancel(auction.id, "seller", T0 + 2)?;

    follow(&rig, &mut service)?;
    assert_eq!(
        *executor.0.lock(),
        vec![Transfer::Refund {
            auction_id: auction.id,
            bidder: "alice".into(),
            amount: 150,
        }]
    );
    Ok(())
}
