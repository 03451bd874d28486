use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::clean::RowCleaner;
use crate::config::Config;
use crate::enrich::{Enricher, EnrichmentColumns, EnrichmentReport, NominatimGeocoder, ReverseGeocoder};
use crate::error::{ConfigError, Result, WorkerError};
use crate::loader::load_listings;
use crate::orchestrator::{resolve_partition_count, run_partitions, split_partitions, worker_count};
use crate::output::{group_by_zone, write_failure_report, write_inventory, ZoneWriter};

/// Result of a complete pipeline run
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub rows_loaded: usize,
    pub rows_cleaned: usize,
    pub enrichment: EnrichmentReport,
    /// Rows left without a postal code after enrichment; never zoned.
    pub unresolved: usize,
    pub partitions: usize,
    pub workers: usize,
    pub zones_written: Vec<PathBuf>,
    pub zones_skipped: Vec<String>,
    pub inventory_path: PathBuf,
    pub failure_report: Option<PathBuf>,
}

/// Load → enrich → clean in parallel → group by zone → write.
pub struct Pipeline {
    config: Config,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    show_progress: bool,
}

impl Pipeline {
    /// A pipeline without a geocoder; empty postal codes stay unresolved.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            geocoder: None,
            show_progress: true,
        }
    }

    /// Build the pipeline with the Nominatim geocoder when geocoding is enabled.
    pub fn from_config(config: Config) -> Result<Self> {
        let geocoder: Option<Arc<dyn ReverseGeocoder>> = if config.geocoding.enabled {
            let client = NominatimGeocoder::new(&config.geocoding)
                .map_err(|e| ConfigError::Invalid(format!("geocoder: {e}")))?;
            Some(Arc::new(client))
        } else {
            None
        };
        Ok(Self {
            geocoder,
            ..Self::new(config)
        })
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    #[instrument(skip(self), fields(region = %self.config.cleaning.region))]
    pub async fn run(&self) -> Result<PipelineSummary> {
        let cfg = &self.config;

        let dataset = load_listings(&cfg.input.dir, &cfg.input.files)?;
        let schema = dataset.schema;
        let mut records = dataset.records;
        let rows_loaded = records.len();

        // Resolve every column before any network traffic
        let cleaner = RowCleaner::new(&schema, cfg.cleaning.region.clone())?;
        let columns = EnrichmentColumns::resolve(&schema)?;

        let enrichment = match &self.geocoder {
            Some(geocoder) => {
                let enricher =
                    Enricher::new(&cfg.geocoding, cfg.cleaning.region.clone(), geocoder.clone());
                let pending = records
                    .iter()
                    .filter(|r| enricher.needs_lookup(&columns, r))
                    .count();
                if pending > 0 {
                    println!("Start filling zipcode through geocoder ({pending} rows)");
                }
                let report = enricher.enrich(&columns, &mut records).await?;
                if pending > 0 {
                    println!("Finish filling");
                }
                report
            }
            None => EnrichmentReport::default(),
        };

        let before = records.len();
        let unresolved = records
            .iter()
            .filter(|r| r.field(columns.postal_code).is_empty() && cleaner.in_region(r))
            .count();
        records.retain(|r| !r.field(columns.postal_code).is_empty());
        if unresolved > 0 {
            warn!(
                unresolved,
                dropped = before - records.len(),
                "rows without a postal code are excluded from zoning"
            );
        }

        let workers = cfg.cleaning.workers.unwrap_or_else(worker_count);
        let partitions = resolve_partition_count(cfg.cleaning.partitions, records.len(), workers);
        let chunks = split_partitions(records, partitions);
        info!(partitions, workers, "cleaning partitions");

        let show_progress = self.show_progress;
        let cleaned = tokio::task::spawn_blocking(move || {
            run_partitions(&cleaner, chunks, workers, show_progress)
        })
        .await
        .map_err(|e| WorkerError::Join(e.to_string()))??;
        let rows_cleaned = cleaned.len();

        let zones = group_by_zone(cleaned, columns.postal_code);
        let writer = ZoneWriter::new(
            &cfg.output.dir,
            Arc::clone(&schema),
            cfg.cleaning.min_zone_records,
        );
        let outcome = writer.write_zones(&zones)?;
        write_inventory(&cfg.output.inventory, &outcome.inventory)?;

        let failure_report = if enrichment.failures.is_empty() {
            None
        } else {
            write_failure_report(&cfg.output.failure_report, &enrichment.failures)?;
            Some(cfg.output.failure_report.clone())
        };

        info!(
            rows_loaded,
            rows_cleaned,
            zones_written = outcome.written.len(),
            zones_skipped = outcome.skipped.len(),
            "pipeline finished"
        );

        Ok(PipelineSummary {
            rows_loaded,
            rows_cleaned,
            enrichment,
            unresolved,
            partitions,
            workers,
            zones_written: outcome.written,
            zones_skipped: outcome.skipped,
            inventory_path: cfg.output.inventory.clone(),
            failure_report,
        })
    }
}
