//! HTTP JSON API over the engine. The axum server runs on its own
//! tokio runtime; the `LoopService` wrapper just watches it for an
//! early exit so the rest of the process can shut down with it.

use crate::{
    auction::{
        Amount, AuctionId, AuctionSnapshot, BidRecord, ClosePoll, EngineError, PartyId, Refund,
        SettlementOutcome,
    },
    clock::{SharedClock, Timestamp},
    engine::{AuctionEngine, CreateAuction},
    pricing::{ConditionSignal, SignalKind},
    service::{signal_feed::SignalInjector, LoopService},
};
use anyhow::{format_err, Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{runtime::Runtime, sync::oneshot};
use tracing::info;

#[derive(Clone)]
struct ApiState {
    engine: Arc<AuctionEngine>,
    clock: SharedClock,
    signals: SignalInjector,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);
type ApiResult<T> = Result<T, ApiError>;

fn engine_error(err: EngineError) -> ApiError {
    let status = match err {
        EngineError::InvalidAuctionParameters(_) => StatusCode::BAD_REQUEST,
        EngineError::AuctionNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::AuctionNotActive | EngineError::AuctionAlreadyEnded => StatusCode::CONFLICT,
        EngineError::InvalidBidder | EngineError::NotAuthorized => StatusCode::FORBIDDEN,
        EngineError::BidTooLow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

fn internal_error(err: anyhow::Error) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

#[derive(Deserialize)]
struct CreateAuctionRequest {
    product_id: String,
    seller_id: PartyId,
    start_price: Amount,
    /// Defaults to now (the auction opens immediately).
    start_time: Option<Timestamp>,
    duration: u64,
}

#[derive(Deserialize)]
struct PlaceBidRequest {
    bidder_id: PartyId,
    amount: Amount,
}

#[derive(Serialize)]
struct PlaceBidResponse {
    auction: AuctionSnapshot,
    outgoing: Option<Refund>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
enum CloseResponse {
    Open { auction: AuctionSnapshot },
    Settled { outcome: SettlementOutcome },
}

#[derive(Deserialize)]
struct CancelRequest {
    requester_id: PartyId,
}

#[derive(Serialize)]
struct CancelResponse {
    outcome: SettlementOutcome,
    refund: Option<Refund>,
}

#[derive(Deserialize)]
struct SignalRequest {
    kind: SignalKind,
    magnitude: f64,
}

async fn create_auction(
    State(state): State<ApiState>,
    Json(req): Json<CreateAuctionRequest>,
) -> ApiResult<(StatusCode, Json<AuctionSnapshot>)> {
    let start_time = req.start_time.unwrap_or_else(|| state.clock.now());
    let snapshot = state
        .engine
        .create_auction(CreateAuction {
            product_id: req.product_id,
            seller_id: req.seller_id,
            start_price: req.start_price,
            start_time,
            duration: req.duration,
        })
        .map_err(engine_error)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn get_auction(
    State(state): State<ApiState>,
    Path(auction_id): Path<AuctionId>,
) -> ApiResult<Json<AuctionSnapshot>> {
    let snapshot = state
        .engine
        .auction(auction_id, state.clock.now())
        .map_err(engine_error)?;
    Ok(Json(snapshot))
}

async fn place_bid(
    State(state): State<ApiState>,
    Path(auction_id): Path<AuctionId>,
    Json(req): Json<PlaceBidRequest>,
) -> ApiResult<Json<PlaceBidResponse>> {
    let outcome = state
        .engine
        .place_bid(auction_id, &req.bidder_id, req.amount, state.clock.now())
        .map_err(engine_error)?;
    Ok(Json(PlaceBidResponse {
        auction: outcome.snapshot,
        outgoing: outcome.outgoing,
    }))
}

async fn list_bids(
    State(state): State<ApiState>,
    Path(auction_id): Path<AuctionId>,
) -> ApiResult<Json<Vec<BidRecord>>> {
    // 404 for auctions that never existed, rather than an empty list.
    state
        .engine
        .auction(auction_id, state.clock.now())
        .map_err(engine_error)?;
    let bids = state
        .engine
        .bids_for_auction(auction_id)
        .map_err(internal_error)?;
    Ok(Json(bids))
}

async fn close_auction(
    State(state): State<ApiState>,
    Path(auction_id): Path<AuctionId>,
) -> ApiResult<Json<CloseResponse>> {
    let poll = state
        .engine
        .close_if_expired(auction_id, state.clock.now())
        .map_err(engine_error)?;
    Ok(Json(match poll {
        ClosePoll::StillOpen(auction) => CloseResponse::Open { auction },
        ClosePoll::Settled { outcome, .. } => CloseResponse::Settled { outcome },
    }))
}

async fn cancel_auction(
    State(state): State<ApiState>,
    Path(auction_id): Path<AuctionId>,
    Json(req): Json<CancelRequest>,
) -> ApiResult<Json<CancelResponse>> {
    let (outcome, refund) = state
        .engine
        .cancel(auction_id, &req.requester_id, state.clock.now())
        .map_err(engine_error)?;
    Ok(Json(CancelResponse { outcome, refund }))
}

async fn inject_signal(
    State(state): State<ApiState>,
    Path(auction_id): Path<AuctionId>,
    Json(req): Json<SignalRequest>,
) -> ApiResult<StatusCode> {
    state
        .signals
        .inject(ConditionSignal {
            auction_id,
            kind: req.kind,
            magnitude: req.magnitude,
        })
        .map_err(internal_error)?;
    Ok(StatusCode::ACCEPTED)
}

fn router(state: ApiState) -> Router {
    Router::new()
        .route("/auctions", post(create_auction))
        .route("/auctions/:id", get(get_auction))
        .route("/auctions/:id/bids", post(place_bid).get(list_bids))
        .route("/auctions/:id/close", post(close_auction))
        .route("/auctions/:id/cancel", post(cancel_auction))
        .route("/auctions/:id/signals", post(inject_signal))
        .with_state(state)
}

async fn run_http_server(bind: SocketAddr, state: ApiState) -> Result<()> {
    info!(%bind, "api listening");
    axum::Server::try_bind(&bind)?
        .serve(router(state).into_make_service())
        .await?;
    Ok(())
}

pub struct ApiService {
    // cancels all server tasks on drop
    _runtime: Runtime,
    server_rx: oneshot::Receiver<Result<()>>,
}

impl ApiService {
    pub fn new(
        bind: SocketAddr,
        engine: Arc<AuctionEngine>,
        clock: SharedClock,
        signals: SignalInjector,
    ) -> Result<Self> {
        let runtime = Runtime::new()?;
        let state = ApiState {
            engine,
            clock,
            signals,
        };

        let (tx, rx) = oneshot::channel();

        runtime.spawn(async move {
            let res = run_http_server(bind, state)
                .await
                .context("failed to run http server");
            // The process may already be shutting down; nothing to do
            // if nobody is listening for the result anymore.
            let _ = tx.send(res);
        });

        Ok(Self {
            _runtime: runtime,
            server_rx: rx,
        })
    }
}

impl LoopService for ApiService {
    fn name(&self) -> &'static str {
        "api"
    }

    fn run_iteration(&mut self) -> Result<()> {
        // don't hog the cpu
        std::thread::sleep(std::time::Duration::from_millis(100));

        match self.server_rx.try_recv() {
            Ok(res) => res,
            Err(oneshot::error::TryRecvError::Empty) => Ok(()),
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(format_err!("http server died without leaving a response?!"))
            }
        }
    }
}
