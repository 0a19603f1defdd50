//! Condition-signal pricing: turns exogenous sensor/AI readings into
//! a severity in `[0, 1]` plus a fingerprint of the signal payload.
//!
//! How much a given reading is worth is deployment policy
//! ([`PricingPolicy`]); the clamping against the floor price lives in
//! [`crate::auction::Auction::apply_condition_signal`].

use crate::auction::AuctionId;
use crate::config::PricingPolicy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Sensor temperature reading, degrees Celsius.
    Temperature,
    /// AI condition assessment score in `[0, 1]`, 1.0 being pristine.
    ConditionScore,
}

/// One externally supplied condition measurement for one auction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionSignal {
    pub auction_id: AuctionId,
    pub kind: SignalKind,
    pub magnitude: f64,
}

/// Severity the signal implies under the given policy.
pub fn severity(policy: &PricingPolicy, signal: &ConditionSignal) -> f64 {
    let severity = match signal.kind {
        SignalKind::Temperature => {
            if signal.magnitude > policy.temperature_threshold {
                policy.temperature_cut
            } else {
                0.0
            }
        }
        SignalKind::ConditionScore => {
            (1.0 - signal.magnitude.clamp(0.0, 1.0)) * policy.condition_score_weight
        }
    };
    severity.clamp(0.0, 1.0)
}

/// SHA-256 fingerprint of the signal payload, recorded on the auction
/// for audit regardless of whether the price moved.
pub fn digest(signal: &ConditionSignal) -> String {
    let payload = serde_json::to_vec(signal).unwrap_or_else(|_| format!("{signal:?}").into_bytes());
    let hash = Sha256::digest(&payload);
    hash.iter().fold(String::with_capacity(64), |mut out, b| {
        use std::fmt::Write;
        let _ = write!(out, "{b:02x}");
        out
    })
}
