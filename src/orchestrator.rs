//! Fan-out/fan-in of the row cleaner over a dedicated worker pool.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::clean::RowCleaner;
use crate::config::PartitionCount;
use crate::constants::PARTITIONS_PER_WORKER;
use crate::error::{CleanError, WorkerError};
use crate::metrics::CleanMetrics;
use crate::types::{CleanedRecord, RawRecord};

/// Available parallelism minus one, leaving a core for the orchestrating thread.
pub fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

/// Number of partitions to cut, never more than there are rows.
pub fn resolve_partition_count(setting: PartitionCount, rows: usize, workers: usize) -> usize {
    let wanted = match setting {
        PartitionCount::Fixed(n) => n,
        PartitionCount::Auto => workers.saturating_mul(PARTITIONS_PER_WORKER),
    };
    wanted.clamp(1, rows.max(1))
}

/// Split into `count` contiguous partitions whose sizes differ by at most one,
/// larger partitions first.
pub fn split_partitions<T>(records: Vec<T>, count: usize) -> Vec<Vec<T>> {
    let count = count.max(1);
    let base = records.len() / count;
    let extra = records.len() % count;
    let mut rest = records.into_iter();
    (0..count)
        .map(|i| {
            let size = base + usize::from(i < extra);
            rest.by_ref().take(size).collect()
        })
        .collect()
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} partitions")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Clean every partition on a pool of `workers` threads.
///
/// Partitions complete in any order; one progress tick per completed partition.
/// The first failing partition aborts the job. The merged result is sorted by
/// row index so output does not depend on scheduling.
pub fn run_partitions(
    cleaner: &RowCleaner,
    partitions: Vec<Vec<RawRecord>>,
    workers: usize,
    show_progress: bool,
) -> Result<Vec<CleanedRecord>, WorkerError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("clean-worker-{i}"))
        .build()?;

    let started = Instant::now();
    let partition_total = partitions.len();
    let pb = progress_bar(partition_total, show_progress);

    let cleaned: Result<Vec<Vec<CleanedRecord>>, CleanError> = pool.install(|| {
        partitions
            .into_par_iter()
            .enumerate()
            .map(|(index, partition)| {
                let rows_in = partition.len();
                let result = cleaner.clean_partition(partition);
                if let Ok(rows) = &result {
                    CleanMetrics::record_partition(rows_in, rows.len());
                    debug!(partition = index, rows_in, rows_out = rows.len(), "partition done");
                }
                pb.inc(1);
                result
            })
            .collect()
    });
    pb.finish();

    let mut merged: Vec<CleanedRecord> = cleaned?.into_iter().flatten().collect();
    merged.sort_by_key(|record| record.row);

    CleanMetrics::record_duration(started.elapsed().as_secs_f64());
    info!(
        partitions = partition_total,
        workers,
        rows = merged.len(),
        "cleaning finished"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    #[test]
    fn test_split_sizes_differ_by_at_most_one() {
        let parts = split_partitions((0..23).collect::<Vec<_>>(), 10);
        let sizes: Vec<usize> = parts.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 3, 2, 2, 2, 2, 2, 2, 2]);
        let flattened: Vec<i32> = parts.into_iter().flatten().collect();
        assert_eq!(flattened, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_handles_more_partitions_than_rows() {
        let parts = split_partitions(vec![1, 2], 4);
        assert_eq!(parts, vec![vec![1], vec![2], vec![], vec![]]);
        assert_eq!(split_partitions(Vec::<u8>::new(), 0).len(), 1);
    }

    #[test]
    fn test_resolve_partition_count() {
        assert_eq!(resolve_partition_count(PartitionCount::Fixed(10), 1_000, 3), 10);
        assert_eq!(resolve_partition_count(PartitionCount::Fixed(10), 4, 3), 4);
        assert_eq!(resolve_partition_count(PartitionCount::Auto, 1_000, 3), 12);
        assert_eq!(resolve_partition_count(PartitionCount::Auto, 5, 3), 5);
        assert_eq!(resolve_partition_count(PartitionCount::Auto, 0, 3), 1);
    }

    #[test]
    fn test_worker_count_is_at_least_one() {
        assert!(worker_count() >= 1);
    }

    fn cleaner() -> RowCleaner {
        let schema = Schema::new([
            "state",
            "zipcode",
            "latitude",
            "longitude",
            "license",
            "price",
            "weekly_price",
            "monthly_price",
            "security_deposit",
            "cleaning_fee",
            "extra_people",
            "guests_included",
            "last_scraped",
            "host_since",
            "calendar_last_scraped",
            "first_review",
            "last_review",
        ]);
        RowCleaner::new(&schema, "NY").unwrap()
    }

    fn record(row: usize, state: &str, price: &str) -> RawRecord {
        let mut fields = vec![String::new(); 17];
        fields[0] = state.to_string();
        fields[1] = format!("{}", 10_000 + row % 3);
        fields[5] = price.to_string();
        RawRecord::new(row, fields)
    }

    #[test]
    fn test_results_are_merged_in_row_order() {
        let records: Vec<RawRecord> = (0..40)
            .map(|i| record(i, if i % 4 == 0 { "NJ" } else { "NY" }, "$5"))
            .collect();
        let serial = cleaner().clean_partition(records.clone()).unwrap();

        for count in [1, 3, 10, 40] {
            let parts = split_partitions(records.clone(), count);
            let merged = run_partitions(&cleaner(), parts, 4, false).unwrap();
            assert_eq!(merged, serial, "partition count {count}");
        }
    }

    #[test]
    fn test_any_failing_partition_aborts_the_job() {
        let mut records: Vec<RawRecord> = (0..20).map(|i| record(i, "NY", "$5")).collect();
        records[17] = record(17, "NY", "five dollars");
        let parts = split_partitions(records, 5);

        match run_partitions(&cleaner(), parts, 2, false) {
            Err(WorkerError::Clean(err)) => assert_eq!(err.row, 17),
            other => panic!("expected a cleaning failure, got {other:?}"),
        }
    }
}
