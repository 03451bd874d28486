//! Postal code back-fill through reverse geocoding.
//!
//! Rows with an empty postal code but both coordinates present are looked up one
//! at a time, before partitioning. Failed lookups are either collected into an
//! [`EnrichmentReport`] or, with `fail_fast`, abort the run.

pub mod nominatim;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::GeocodingConfig;
use crate::constants::{LATITUDE_COLUMN, LONGITUDE_COLUMN, POSTAL_CODE_COLUMN, REGION_COLUMN};
use crate::error::{EnrichError, GeocodeError, LoadError};
use crate::metrics::EnrichMetrics;
use crate::schema::Schema;
use crate::types::RawRecord;

pub use nominatim::NominatimGeocoder;

/// Reverse geocoding service: coordinates in, postal code out.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError>;
}

/// Schema positions the enricher reads and writes.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentColumns {
    pub postal_code: usize,
    pub latitude: usize,
    pub longitude: usize,
    pub region: usize,
}

impl EnrichmentColumns {
    pub fn resolve(schema: &Schema) -> Result<Self, LoadError> {
        Ok(Self {
            postal_code: schema.require(POSTAL_CODE_COLUMN)?,
            latitude: schema.require(LATITUDE_COLUMN)?,
            longitude: schema.require(LONGITUDE_COLUMN)?,
            region: schema.require(REGION_COLUMN)?,
        })
    }
}

/// A lookup that did not produce a postal code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentFailure {
    pub row: usize,
    pub latitude: String,
    pub longitude: String,
    pub reason: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentReport {
    pub attempted: usize,
    pub enriched: usize,
    pub failures: Vec<EnrichmentFailure>,
}

pub struct Enricher {
    geocoder: Arc<dyn ReverseGeocoder>,
    region: String,
    max_retries: u32,
    retry_backoff: Duration,
    fail_fast: bool,
}

impl Enricher {
    pub fn new(
        config: &GeocodingConfig,
        region: impl Into<String>,
        geocoder: Arc<dyn ReverseGeocoder>,
    ) -> Self {
        Self {
            geocoder,
            region: region.into(),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            fail_fast: config.fail_fast,
        }
    }

    /// Whether a record qualifies for a lookup: empty (not absent) postal code,
    /// both coordinates present, and inside the target region.
    pub fn needs_lookup(&self, columns: &EnrichmentColumns, record: &RawRecord) -> bool {
        record.field(columns.postal_code).is_empty()
            && !record.field(columns.latitude).trim().is_empty()
            && !record.field(columns.longitude).trim().is_empty()
            && record.field(columns.region) == self.region
    }

    #[instrument(skip_all, fields(region = %self.region))]
    pub async fn enrich(
        &self,
        columns: &EnrichmentColumns,
        records: &mut [RawRecord],
    ) -> Result<EnrichmentReport, EnrichError> {
        let mut report = EnrichmentReport::default();

        for record in records.iter_mut() {
            if !self.needs_lookup(columns, record) {
                continue;
            }
            report.attempted += 1;

            let lat_text = record.field(columns.latitude).trim().to_string();
            let lon_text = record.field(columns.longitude).trim().to_string();

            let result = match (lat_text.parse::<f64>(), lon_text.parse::<f64>()) {
                (Ok(lat), Ok(lon)) => self.lookup(lat, lon).await,
                _ => Err(GeocodeError::InvalidCoordinates {
                    latitude: lat_text.clone(),
                    longitude: lon_text.clone(),
                }),
            };

            match result {
                Ok(postcode) => {
                    debug!(row = record.row, %postcode, "postal code filled");
                    record.set_field(columns.postal_code, postcode);
                    report.enriched += 1;
                    EnrichMetrics::record_lookup_success();
                }
                Err(source) if self.fail_fast => {
                    EnrichMetrics::record_lookup_failure(source.is_retryable());
                    return Err(EnrichError {
                        row: record.row,
                        source,
                    });
                }
                Err(source) => {
                    warn!(row = record.row, error = %source, "postal code lookup failed");
                    EnrichMetrics::record_lookup_failure(source.is_retryable());
                    report.failures.push(EnrichmentFailure {
                        row: record.row,
                        latitude: lat_text,
                        longitude: lon_text,
                        reason: source.to_string(),
                        retryable: source.is_retryable(),
                    });
                }
            }
        }

        info!(
            attempted = report.attempted,
            enriched = report.enriched,
            failed = report.failures.len(),
            "enrichment finished"
        );
        Ok(report)
    }

    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError> {
        let mut attempt = 0;
        loop {
            let outcome = self
                .geocoder
                .reverse(latitude, longitude)
                .await
                .and_then(|postcode| {
                    let postcode = postcode.trim().to_string();
                    if postcode.is_empty() {
                        Err(GeocodeError::MissingPostcode)
                    } else {
                        Ok(postcode)
                    }
                });
            match outcome {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "retrying reverse geocode");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted geocoder: pops queued results per coordinate pair.
    #[derive(Default)]
    struct ScriptedGeocoder {
        responses: Mutex<HashMap<String, Vec<Result<String, GeocodeError>>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedGeocoder {
        fn respond(self, lat: f64, lon: f64, results: Vec<Result<String, GeocodeError>>) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(format!("{lat},{lon}"), results.into_iter().rev().collect());
            self
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ReverseGeocoder for ScriptedGeocoder {
        async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .get_mut(&format!("{latitude},{longitude}"))
                .and_then(Vec::pop)
                .unwrap_or(Err(GeocodeError::MissingPostcode))
        }
    }

    fn schema() -> Schema {
        Schema::new(["id", "state", "zipcode", "latitude", "longitude"])
    }

    fn record(row: usize, state: &str, zip: &str, lat: &str, lon: &str) -> RawRecord {
        RawRecord::new(
            row,
            vec![row.to_string(), state.into(), zip.into(), lat.into(), lon.into()],
        )
    }

    fn config(fail_fast: bool) -> GeocodingConfig {
        GeocodingConfig {
            max_retries: 2,
            retry_backoff_ms: 0,
            fail_fast,
            ..GeocodingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fills_only_empty_postal_codes_with_coordinates() {
        let geocoder = Arc::new(
            ScriptedGeocoder::default().respond(40.7, -74.0, vec![Ok("10001".to_string())]),
        );
        let enricher = Enricher::new(&config(false), "NY", geocoder.clone());
        let columns = EnrichmentColumns::resolve(&schema()).unwrap();
        let mut records = vec![
            record(0, "NY", "", "40.7", "-74.0"),
            record(1, "NY", "10002", "40.7", "-74.0"),
            record(2, "NY", "", "", "-74.0"),
            record(3, "NJ", "", "40.7", "-74.0"),
        ];

        let report = enricher.enrich(&columns, &mut records).await.unwrap();

        assert_eq!(report.attempted, 1);
        assert_eq!(report.enriched, 1);
        assert!(report.failures.is_empty());
        assert_eq!(records[0].field(2), "10001");
        assert_eq!(records[1].field(2), "10002");
        assert_eq!(records[2].field(2), "");
        assert_eq!(records[3].field(2), "");
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_retryable_failures_are_retried() {
        let geocoder = Arc::new(ScriptedGeocoder::default().respond(
            40.7,
            -74.0,
            vec![Err(GeocodeError::RateLimited), Ok("10003".to_string())],
        ));
        let enricher = Enricher::new(&config(false), "NY", geocoder.clone());
        let columns = EnrichmentColumns::resolve(&schema()).unwrap();
        let mut records = vec![record(0, "NY", "", "40.7", "-74.0")];

        let report = enricher.enrich(&columns, &mut records).await.unwrap();

        assert_eq!(report.enriched, 1);
        assert_eq!(records[0].field(2), "10003");
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn test_terminal_failures_are_reported_not_retried() {
        let geocoder = Arc::new(ScriptedGeocoder::default());
        let enricher = Enricher::new(&config(false), "NY", geocoder.clone());
        let columns = EnrichmentColumns::resolve(&schema()).unwrap();
        let mut records = vec![
            record(0, "NY", "", "40.7", "-74.0"),
            record(1, "NY", "", "north", "-74.0"),
        ];

        let report = enricher.enrich(&columns, &mut records).await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.enriched, 0);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().all(|f| !f.retryable));
        assert_eq!(report.failures[1].latitude, "north");
        // Invalid coordinates never reach the service
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_fail_fast_aborts_on_first_failure() {
        let geocoder = Arc::new(ScriptedGeocoder::default());
        let enricher = Enricher::new(&config(true), "NY", geocoder);
        let columns = EnrichmentColumns::resolve(&schema()).unwrap();
        let mut records = vec![
            record(5, "NY", "", "40.7", "-74.0"),
            record(6, "NY", "", "40.8", "-74.0"),
        ];

        let err = enricher.enrich(&columns, &mut records).await.unwrap_err();
        assert_eq!(err.row, 5);
        assert!(matches!(err.source, GeocodeError::MissingPostcode));
    }
}
