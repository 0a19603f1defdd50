use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

/// Pricing policy knobs for the condition-signal adjuster.
///
/// The percentages and thresholds are deployment policy, not law,
/// so they all live here rather than as constants.
#[derive(Copy, Clone, Debug)]
pub struct PricingPolicy {
    /// Lowest fraction of the original start price that repeated
    /// condition signals may degrade an auction to.
    pub floor_fraction: f64,
    /// Temperature reading above which a price cut is applied.
    pub temperature_threshold: f64,
    /// Severity applied per temperature reading over the threshold.
    pub temperature_cut: f64,
    /// Weight applied to `1 - score` for AI condition assessments.
    pub condition_score_weight: f64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            floor_fraction: 0.5,
            temperature_threshold: 30.0,
            temperature_cut: 0.05,
            condition_score_weight: 0.25,
        }
    }
}

/// Process configuration, constructed once in `main` and passed down.
#[derive(Clone, Debug)]
pub struct Config {
    pub http_bind: SocketAddr,
    pub signal_poll_timeout: Duration,
    pub sweep_interval: Duration,
    pub pricing: PricingPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            signal_poll_timeout: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(1),
            pricing: PricingPolicy::default(),
        }
    }
}

impl Config {
    /// Read configuration from `AUCTIONX_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(bind) = env_var("AUCTIONX_HTTP_BIND") {
            config.http_bind = bind
                .parse()
                .with_context(|| format!("invalid AUCTIONX_HTTP_BIND: {bind}"))?;
        }
        if let Some(v) = env_var("AUCTIONX_FLOOR_FRACTION") {
            config.pricing.floor_fraction = parse_fraction("AUCTIONX_FLOOR_FRACTION", &v)?;
        }
        if let Some(v) = env_var("AUCTIONX_TEMPERATURE_THRESHOLD") {
            config.pricing.temperature_threshold = v
                .parse()
                .with_context(|| format!("invalid AUCTIONX_TEMPERATURE_THRESHOLD: {v}"))?;
        }
        if let Some(v) = env_var("AUCTIONX_TEMPERATURE_CUT") {
            config.pricing.temperature_cut = parse_fraction("AUCTIONX_TEMPERATURE_CUT", &v)?;
        }
        if let Some(v) = env_var("AUCTIONX_CONDITION_SCORE_WEIGHT") {
            config.pricing.condition_score_weight =
                parse_fraction("AUCTIONX_CONDITION_SCORE_WEIGHT", &v)?;
        }
        if let Some(v) = env_var("AUCTIONX_SWEEP_INTERVAL_SECS") {
            config.sweep_interval = Duration::from_secs(
                v.parse()
                    .with_context(|| format!("invalid AUCTIONX_SWEEP_INTERVAL_SECS: {v}"))?,
            );
        }

        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_fraction(name: &str, value: &str) -> Result<f64> {
    let parsed: f64 = value
        .parse()
        .with_context(|| format!("invalid {name}: {value}"))?;
    if !(0.0..=1.0).contains(&parsed) {
        anyhow::bail!("{name} must be within [0, 1], got {parsed}");
    }
    Ok(parsed)
}
