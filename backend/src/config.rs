//! Service configuration loaded via OrthoConfig.
//!
//! Values come from CLI flags, `CARTWATCH_*` environment variables, and
//! configuration files. Every field is optional; accessors supply defaults.

use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{DEFAULT_STALENESS, DEFAULT_SWEEP_INTERVAL, RadiusKm, StalenessSweeperConfig};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Timing, radius, and listener settings for the sync service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CARTWATCH")]
pub struct SyncSettings {
    /// Maximum report age in milliseconds before eviction.
    pub staleness_ms: Option<u64>,
    /// Delay between sweeps in milliseconds.
    pub sweep_interval_ms: Option<u64>,
    /// Radius used when a nearby subscription omits one.
    pub default_radius_km: Option<f64>,
    /// Socket address the HTTP server binds to.
    pub bind_address: Option<String>,
}

impl SyncSettings {
    /// Maximum report age, falling back to ten minutes.
    pub fn staleness(&self) -> Duration {
        self.staleness_ms
            .map_or(DEFAULT_STALENESS, Duration::from_millis)
    }

    /// Sweep cadence, falling back to one minute.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval_ms
            .map_or(DEFAULT_SWEEP_INTERVAL, Duration::from_millis)
    }

    /// Default nearby radius, falling back to one mile.
    ///
    /// Non-positive or non-finite overrides are ignored.
    pub fn default_radius(&self) -> RadiusKm {
        self.default_radius_km
            .and_then(|km| RadiusKm::new(km).ok())
            .unwrap_or_default()
    }

    /// Listener address, falling back to `0.0.0.0:8080`.
    ///
    /// # Errors
    /// Returns [`std::io::Error`] when the configured address does not parse.
    pub fn bind_address(&self) -> std::io::Result<SocketAddr> {
        let raw = self.bind_address.as_deref().unwrap_or(DEFAULT_BIND_ADDRESS);
        raw.parse().map_err(|error| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid bind address {raw}: {error}"),
            )
        })
    }

    /// Sweeper configuration derived from these settings.
    pub fn sweeper_config(&self) -> StalenessSweeperConfig {
        StalenessSweeperConfig {
            sweep_interval: self.sweep_interval(),
            staleness: self.staleness(),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for service configuration parsing.

    use super::*;
    use crate::domain::DEFAULT_RADIUS_KM;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 4] = [
        "CARTWATCH_STALENESS_MS",
        "CARTWATCH_SWEEP_INTERVAL_MS",
        "CARTWATCH_DEFAULT_RADIUS_KM",
        "CARTWATCH_BIND_ADDRESS",
    ];

    fn load_from_empty_args() -> SyncSettings {
        SyncSettings::load_from_iter([OsString::from("cartwatch")]).expect("config should load")
    }

    #[rstest]
    fn default_values_are_used_when_missing() {
        let _guard = lock_env(VARS.map(|name| (name, None::<String>)));

        let settings = load_from_empty_args();

        assert_eq!(settings.staleness(), Duration::from_secs(600));
        assert_eq!(settings.sweep_interval(), Duration::from_secs(60));
        assert_eq!(settings.default_radius().get(), DEFAULT_RADIUS_KM);
        assert_eq!(
            settings.bind_address().expect("default address parses"),
            "0.0.0.0:8080".parse::<SocketAddr>().expect("valid address")
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            ("CARTWATCH_STALENESS_MS", Some("1500".to_owned())),
            ("CARTWATCH_SWEEP_INTERVAL_MS", Some("250".to_owned())),
            ("CARTWATCH_DEFAULT_RADIUS_KM", Some("3.5".to_owned())),
            ("CARTWATCH_BIND_ADDRESS", Some("127.0.0.1:9000".to_owned())),
        ]);

        let settings = load_from_empty_args();

        assert_eq!(
            settings.sweeper_config(),
            StalenessSweeperConfig {
                sweep_interval: Duration::from_millis(250),
                staleness: Duration::from_millis(1500),
            }
        );
        assert_eq!(settings.default_radius().get(), 3.5);
        assert_eq!(
            settings.bind_address().expect("override parses").port(),
            9000
        );
    }

    #[rstest]
    fn invalid_overrides_fall_back_or_fail_loudly() {
        let _guard = lock_env([
            ("CARTWATCH_STALENESS_MS", None::<String>),
            ("CARTWATCH_SWEEP_INTERVAL_MS", None::<String>),
            ("CARTWATCH_DEFAULT_RADIUS_KM", Some("-2".to_owned())),
            ("CARTWATCH_BIND_ADDRESS", Some("not an address".to_owned())),
        ]);

        let settings = load_from_empty_args();

        assert_eq!(settings.default_radius(), RadiusKm::default());
        assert!(settings.bind_address().is_err());
    }
}
