//! Configuration management

use anyhow::{self, Context, Result};

use crate::services::geocoding::DEFAULT_NOMINATIM_URL;
use crate::services::hos::rules::DEFAULT_FUEL_STOP_MINUTES;
use crate::services::hos::HosRules;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Nominatim API URL (for geocoding)
    pub nominatim_url: String,

    /// "mock" or "nominatim"
    pub geocoder_backend: String,

    /// Valhalla routing engine URL (optional, falls back to mock if unavailable)
    pub valhalla_url: Option<String>,

    /// Fuel stop dwell, fixed per deployment
    pub fuel_stop_minutes: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let nats_url = var("NATS_URL")
            .unwrap_or_else(|| "nats://localhost:4222".to_string());

        let database_url = var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let nominatim_url = var("NOMINATIM_URL")
            .unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string());

        let geocoder_backend = var("GEOCODER_BACKEND")
            .unwrap_or_else(|| "mock".to_string());

        let valhalla_url = var("VALHALLA_URL").filter(|url| !url.is_empty());

        let fuel_stop_minutes = fuel_stop_minutes(&var)?;

        Ok(Self {
            nats_url,
            nats_user: var("NATS_USER").filter(|user| !user.is_empty()),
            nats_password: var("NATS_PASSWORD"),
            database_url,
            nominatim_url,
            geocoder_backend,
            valhalla_url,
            fuel_stop_minutes,
        })
    }

    /// Rule record for this deployment
    pub fn hos_rules(&self) -> HosRules {
        HosRules::default().with_fuel_stop_minutes(self.fuel_stop_minutes)
    }
}

/// Rule record from the environment alone, for offline commands that need
/// no broker or database.
pub fn hos_rules_from_env() -> Result<HosRules> {
    dotenvy::dotenv().ok();
    let minutes = fuel_stop_minutes(&|key: &str| std::env::var(key).ok())?;
    Ok(HosRules::default().with_fuel_stop_minutes(minutes))
}

fn fuel_stop_minutes(var: &impl Fn(&str) -> Option<String>) -> Result<u32> {
    let minutes = match var("HOS_FUEL_STOP_MINUTES") {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .with_context(|| format!("HOS_FUEL_STOP_MINUTES must be a whole number of minutes, got '{}'", raw))?,
        None => DEFAULT_FUEL_STOP_MINUTES,
    };
    if minutes == 0 {
        anyhow::bail!("HOS_FUEL_STOP_MINUTES must be greater than zero");
    }
    Ok(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://test")]).unwrap();
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.nominatim_url, "https://nominatim.openstreetmap.org");
        assert_eq!(config.geocoder_backend, "mock");
        assert!(config.valhalla_url.is_none());
        assert!(config.nats_user.is_none());
        assert_eq!(config.fuel_stop_minutes, 30);
    }

    #[test]
    fn test_config_requires_database_url() {
        assert!(config_from(&[]).is_err());
    }

    #[test]
    fn test_config_valhalla_url_some_when_set() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("VALHALLA_URL", "http://localhost:8002"),
        ])
        .unwrap();
        assert_eq!(config.valhalla_url, Some("http://localhost:8002".to_string()));
    }

    #[test]
    fn test_config_fuel_stop_override_flows_into_rules() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("HOS_FUEL_STOP_MINUTES", "45"),
        ])
        .unwrap();
        assert_eq!(config.hos_rules().fuel_stop_duration_minutes, 45);
        assert_eq!(config.hos_rules().max_drive_minutes_per_shift, 660);
    }

    #[test]
    fn test_config_rejects_bad_fuel_stop_minutes() {
        for value in ["abc", "-5", "0"] {
            let result = config_from(&[
                ("DATABASE_URL", "postgres://test"),
                ("HOS_FUEL_STOP_MINUTES", value),
            ]);
            assert!(result.is_err(), "accepted {}", value);
        }
    }

    #[test]
    fn test_config_nats_credentials() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://test"),
            ("NATS_USER", "planner"),
            ("NATS_PASSWORD", "secret"),
        ])
        .unwrap();
        assert_eq!(config.nats_user.as_deref(), Some("planner"));
        assert_eq!(config.nats_password.as_deref(), Some("secret"));
    }
}
