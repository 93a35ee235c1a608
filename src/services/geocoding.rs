//! Location resolution for free-text trip locations
//!
//! The planning core never does network I/O itself; callers resolve the
//! three trip locations through a [`LocationResolver`] first.
//!
//! Configuration via GEOCODER_BACKEND env variable:
//! - "mock" → MockLocationResolver (tests, development)
//! - "nominatim" → NominatimResolver (production, rate limited)

use anyhow::Result;
use async_trait::async_trait;
use crate::types::Coordinates;

/// Resolver trait - abstraction for all geocoding implementations
#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// Resolve a free-text location ("Dallas, TX") to coordinates.
    /// Returns None if the location cannot be found.
    async fn resolve(&self, query: &str) -> Result<Option<GeocodingResult>>;

    fn name(&self) -> &'static str;
}

/// Result of geocoding operation
#[derive(Debug, Clone)]
pub struct GeocodingResult {
    pub coordinates: Coordinates,
    /// Display name returned by geocoder
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // MockLocationResolver
    // ==========================================================================

    #[tokio::test]
    async fn mock_resolver_is_deterministic() {
        let resolver = MockLocationResolver::new();

        let first = resolver.resolve("Dallas, TX").await.unwrap().unwrap();
        let second = resolver.resolve("Dallas, TX").await.unwrap().unwrap();

        assert_eq!(first.coordinates, second.coordinates);
        assert_eq!(first.display_name, "Dallas, TX");
    }

    #[tokio::test]
    async fn mock_resolver_distinguishes_locations() {
        let resolver = MockLocationResolver::new();

        let dallas = resolver.resolve("Dallas, TX").await.unwrap().unwrap();
        let denver = resolver.resolve("Denver, CO").await.unwrap().unwrap();

        assert_ne!(dallas.coordinates, denver.coordinates);
    }

    #[tokio::test]
    async fn mock_resolver_stays_in_continental_us() {
        let resolver = MockLocationResolver::new();

        for query in ["Philadelphia, PA", "Chicago, IL", "Reno, NV", "Atlanta, GA", "Boise, ID"] {
            let result = resolver.resolve(query).await.unwrap().unwrap();
            assert!(result.coordinates.lat >= 30.0 && result.coordinates.lat <= 47.0,
                "Latitude {} out of bounds for {}", result.coordinates.lat, query);
            assert!(result.coordinates.lng >= -120.0 && result.coordinates.lng <= -75.0,
                "Longitude {} out of bounds for {}", result.coordinates.lng, query);
        }
    }

    #[tokio::test]
    async fn mock_resolver_ignores_case_and_whitespace() {
        let resolver = MockLocationResolver::new();
        let a = resolver.resolve("  Dallas, TX ").await.unwrap().unwrap();
        let b = resolver.resolve("dallas, tx").await.unwrap().unwrap();
        assert_eq!(a.coordinates, b.coordinates);
    }

    #[tokio::test]
    async fn mock_resolver_returns_none_for_blank_query() {
        let resolver = MockLocationResolver::new();
        assert!(resolver.resolve("   ").await.unwrap().is_none());
    }

    // ==========================================================================
    // RateLimiter
    // ==========================================================================

    #[tokio::test]
    async fn rate_limiter_enforces_minimum_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(100));

        let start = Instant::now();

        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(50), "First call should be immediate");

        limiter.wait().await;
        let after_second = start.elapsed();
        assert!(after_second >= Duration::from_millis(100),
            "Second call should wait at least 100ms, took {:?}", after_second);
    }

    #[tokio::test]
    async fn rate_limiter_allows_call_after_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(50));

        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let start = Instant::now();
        limiter.wait().await;
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_millis(20),
            "Call after interval should be immediate, took {:?}", elapsed);
    }

    // ==========================================================================
    // CircuitBreaker
    // ==========================================================================

    #[test]
    fn circuit_breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        assert!(!breaker.is_open());

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open(), "Should not open after 2 failures");

        breaker.record_failure();
        assert!(breaker.is_open(), "Should open after 3 failures");
    }

    #[test]
    fn circuit_breaker_resets_on_success() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();

        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open(), "Should not be open, count was reset");
    }

    #[tokio::test]
    async fn circuit_breaker_closes_after_recovery_time() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(50));

        breaker.record_failure();
        assert!(breaker.is_open());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!breaker.is_open(), "Circuit breaker should half-open after recovery time");
    }

    // ==========================================================================
    // NominatimResolver
    // ==========================================================================

    #[tokio::test]
    async fn nominatim_resolver_rejects_when_circuit_breaker_open() {
        let resolver = NominatimResolver::with_config(
            "https://nominatim.openstreetmap.org",
            Duration::from_millis(100),
            1,
            Duration::from_secs(300),
        )
        .unwrap();

        resolver.circuit_breaker.record_failure();
        assert!(resolver.circuit_breaker.is_open());

        let result = resolver.resolve("Dallas, TX").await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("circuit breaker"));
    }

    #[test]
    fn factory_selects_backend() {
        assert_eq!(create_location_resolver("mock", DEFAULT_NOMINATIM_URL).unwrap().name(), "mock");
        assert_eq!(create_location_resolver("nominatim", DEFAULT_NOMINATIM_URL).unwrap().name(), "nominatim");
        assert_eq!(create_location_resolver("bogus", DEFAULT_NOMINATIM_URL).unwrap().name(), "mock");
    }

    #[tokio::test]
    #[ignore = "Requires network access to public Nominatim"]
    async fn nominatim_resolver_finds_us_city() {
        let resolver = NominatimResolver::new(DEFAULT_NOMINATIM_URL).unwrap();
        let result = resolver.resolve("Chicago, IL").await.unwrap().unwrap();
        assert!((result.coordinates.lat - 41.88).abs() < 0.2);
        assert!((result.coordinates.lng + 87.63).abs() < 0.2);
    }
}

// ==========================================================================
// MockLocationResolver Implementation
// ==========================================================================

/// Mock resolver for tests - returns deterministic fake coordinates
pub struct MockLocationResolver;

impl MockLocationResolver {
    pub fn new() -> Self {
        Self
    }

    /// Generate deterministic coordinates from the normalized query hash.
    /// Bounds are well inside the continental US so mock routes stay on land.
    fn hash_to_coordinates(query: &str) -> Coordinates {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        let hash = hasher.finish();

        const LAT_MIN: f64 = 30.0;
        const LAT_MAX: f64 = 47.0;
        const LNG_MIN: f64 = -120.0;
        const LNG_MAX: f64 = -75.0;

        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lng_normalized = ((hash & 0xFFFFFFFF) as f64) / (u32::MAX as f64);

        Coordinates {
            lat: LAT_MIN + lat_normalized * (LAT_MAX - LAT_MIN),
            lng: LNG_MIN + lng_normalized * (LNG_MAX - LNG_MIN),
        }
    }
}

impl Default for MockLocationResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationResolver for MockLocationResolver {
    async fn resolve(&self, query: &str) -> Result<Option<GeocodingResult>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        Ok(Some(GeocodingResult {
            coordinates: Self::hash_to_coordinates(&trimmed.to_lowercase()),
            display_name: trimmed.to_string(),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================================================
// RateLimiter Implementation
// ==========================================================================

use std::sync::Arc;
use tokio::sync::Mutex;
use std::time::{Duration, Instant};

/// Rate limiter that enforces minimum interval between calls
pub struct RateLimiter {
    last_call: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    /// Wait until it's safe to make another call
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

// ==========================================================================
// CircuitBreaker Implementation
// ==========================================================================

use std::sync::atomic::{AtomicU32, Ordering};

/// Circuit breaker to stop hammering a failing service
pub struct CircuitBreaker {
    failure_count: AtomicU32,
    threshold: u32,
    last_failure: std::sync::Mutex<Option<Instant>>,
    recovery_time: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery_time: Duration) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            threshold,
            last_failure: std::sync::Mutex::new(None),
            recovery_time,
        }
    }

    /// Open circuit rejects calls until the recovery time has passed
    pub fn is_open(&self) -> bool {
        if self.failure_count.load(Ordering::Relaxed) < self.threshold {
            return false;
        }
        match self.last_failure.lock() {
            Ok(last) => !matches!(*last, Some(t) if t.elapsed() >= self.recovery_time),
            Err(_) => true,
        }
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_failure.lock() {
            *last = Some(Instant::now());
        }
    }

    /// Record a success (resets failure count)
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }
}

// ==========================================================================
// NominatimResolver Implementation
// ==========================================================================

use crate::services::nominatim::NominatimClient;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Nominatim usage policy allows at most 1 request per second
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 3;

const DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS: u64 = 300;

/// Rate-limited Nominatim resolver with circuit breaker protection
pub struct NominatimResolver {
    client: NominatimClient,
    rate_limiter: RateLimiter,
    pub(crate) circuit_breaker: CircuitBreaker,
}

impl NominatimResolver {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(
            base_url,
            Duration::from_millis(DEFAULT_RATE_LIMIT_MS),
            DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            Duration::from_secs(DEFAULT_CIRCUIT_BREAKER_RECOVERY_SECS),
        )
    }

    pub fn with_config(
        base_url: &str,
        rate_limit_interval: Duration,
        circuit_breaker_threshold: u32,
        circuit_breaker_recovery: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: NominatimClient::new(base_url)?,
            rate_limiter: RateLimiter::new(rate_limit_interval),
            circuit_breaker: CircuitBreaker::new(circuit_breaker_threshold, circuit_breaker_recovery),
        })
    }
}

#[async_trait]
impl LocationResolver for NominatimResolver {
    async fn resolve(&self, query: &str) -> Result<Option<GeocodingResult>> {
        if self.circuit_breaker.is_open() {
            tracing::warn!("Circuit breaker is open, rejecting geocoding request");
            return Err(anyhow::anyhow!("Geocoding service temporarily unavailable (circuit breaker open)"));
        }

        self.rate_limiter.wait().await;

        match self.client.search(query).await {
            Ok(Some(place)) => {
                self.circuit_breaker.record_success();
                Ok(Some(GeocodingResult {
                    coordinates: place.coordinates,
                    display_name: place.display_name,
                }))
            }
            Ok(None) => {
                // No result found is not a failure
                self.circuit_breaker.record_success();
                Ok(None)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                tracing::error!("Geocoding '{}' failed: {}", query, e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

// ==========================================================================
// Factory function
// ==========================================================================

/// Create resolver for the configured backend ("mock" or "nominatim")
pub fn create_location_resolver(backend: &str, nominatim_url: &str) -> Result<Box<dyn LocationResolver>> {
    match backend {
        "mock" => {
            tracing::info!("Using MockLocationResolver");
            Ok(Box::new(MockLocationResolver::new()))
        }
        "nominatim" => {
            tracing::info!("Using NominatimResolver at {}", nominatim_url);
            Ok(Box::new(NominatimResolver::new(nominatim_url)?))
        }
        _ => {
            tracing::warn!("Unknown GEOCODER_BACKEND '{}', using mock", backend);
            Ok(Box::new(MockLocationResolver::new()))
        }
    }
}
