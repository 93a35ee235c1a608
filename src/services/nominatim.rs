//! Nominatim geocoding client

use anyhow::{Context, Result};
use serde::Deserialize;
use crate::types::Coordinates;

/// Nominatim API response
#[derive(Debug, Deserialize)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
}

/// A place found by free-text search
#[derive(Debug, Clone)]
pub struct Place {
    pub coordinates: Coordinates,
    pub display_name: String,
}

impl NominatimResult {
    fn into_place(self) -> Result<Place> {
        let lat: f64 = self.lat.parse().context("Invalid latitude")?;
        let lng: f64 = self.lon.parse().context("Invalid longitude")?;
        Ok(Place {
            coordinates: Coordinates { lat, lng },
            display_name: self.display_name,
        })
    }
}

/// Nominatim geocoding client
pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hos-planner/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/search?q={}&format=json&countrycodes=us&limit=1",
            self.base_url,
            urlencoding::encode(query.trim())
        )
    }

    /// Free-text search restricted to the United States
    pub async fn search(&self, query: &str) -> Result<Option<Place>> {
        let response = self.client
            .get(self.search_url(query))
            .send()
            .await
            .context("Failed to send geocoding request")?;

        if !response.status().is_success() {
            anyhow::bail!("Nominatim returned status {}", response.status());
        }

        let results: Vec<NominatimResult> = response
            .json()
            .await
            .context("Failed to parse geocoding response")?;

        results.into_iter().next().map(NominatimResult::into_place).transpose()
    }
}
