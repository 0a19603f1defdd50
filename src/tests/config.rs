use crate::config::Config;
use anyhow::Result;

// The AUCTIONX_* variables are process-global, so everything touching
// them lives in this one test.
#[test]
fn config_reads_env_overrides_and_rejects_bad_fractions() -> Result<()> {
    let defaults = Config::default();
    assert_eq!(defaults.pricing.floor_fraction, 0.5);
    assert_eq!(defaults.pricing.temperature_threshold, 30.0);

    std::env::set_var("AUCTIONX_FLOOR_FRACTION", "0.25");
    std::env::set_var("AUCTIONX_TEMPERATURE_THRESHOLD", "28.5");
    std::env::set_var("AUCTIONX_SWEEP_INTERVAL_SECS", "5");
    let config = Config::from_env()?;
    assert_eq!(config.pricing.floor_fraction, 0.25);
    assert_eq!(config.pricing.temperature_threshold, 28.5);
    assert_eq!(config.sweep_interval.as_secs(), 5);
    // Unset variables keep their defaults.
    assert_eq!(config.http_bind, defaults.http_bind);

    std::env::set_var("AUCTIONX_FLOOR_FRACTION", "1.5");
    assert!(Config::from_env().is_err());

    // Empty values count as unset.
    std::env::set_var("AUCTIONX_FLOOR_FRACTION", "");
    assert_eq!(Config::from_env()?.pricing.floor_fraction, 0.5);

    std::env::remove_var("AUCTIONX_FLOOR_FRACTION");
    std::env::remove_var("AUCTIONX_TEMPERATURE_THRESHOLD");
    std::env::remove_var("AUCTIONX_SWEEP_INTERVAL_SECS");
    Ok(())
}
