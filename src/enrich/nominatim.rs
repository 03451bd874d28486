use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::ReverseGeocoder;
use crate::config::GeocodingConfig;
use crate::error::GeocodeError;
use crate::metrics::EnrichMetrics;
use crate::rate_limiter::{Limits, RateLimiter};

/// Reverse geocoder backed by a Nominatim-compatible `/reverse` endpoint.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
    limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    postcode: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(GeocodeError::Client)?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            limiter: RateLimiter::new(Limits::per_minute(config.requests_per_min)),
        })
    }
}

fn postcode_from(body: ReverseResponse) -> Result<String, GeocodeError> {
    body.address
        .and_then(|address| address.postcode)
        .map(|postcode| postcode.trim().to_string())
        .filter(|postcode| !postcode.is_empty())
        .ok_or(GeocodeError::MissingPostcode)
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError> {
        self.limiter.acquire().await;
        let started = std::time::Instant::now();
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "jsonv2"), ("addressdetails", "1")])
            .query(&[("lat", latitude), ("lon", longitude)])
            .send()
            .await
            .map_err(GeocodeError::Unreachable)?;
        EnrichMetrics::record_request_duration(started.elapsed().as_secs_f64());

        let status = resp.status();
        debug!(status = status.as_u16(), latitude, longitude, "reverse geocode response");
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body: ReverseResponse = resp.json().await.map_err(GeocodeError::Decode)?;
        postcode_from(body)
    }
}
