use crate::batcher::Batcher;
use crate::csv_reader::{self, CsvRowReader};
use crate::error::ImportError;
use crate::normalizer::{normalize, Normalized};
use crate::progress::{JobProgressReporter, ProgressSink};
use crate::upsert::UpsertExecutor;
use catalog_types::import_job::{ImportJob, ImportJobRepository, ImportJobStatus};
use catalog_types::product::ProductStore;
use log_error::LogError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

const UPDATES_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Data rows in the file, including the ones skipped.
    pub total_rows: u64,
    /// Rows applied to the store.
    pub processed: u64,
    /// Rows dropped for a blank SKU.
    pub skipped: u64,
    pub created: usize,
    pub updated: usize,
    pub batches: usize,
}

impl ImportSummary {
    pub fn affected(&self) -> usize {
        self.created + self.updated
    }
}

impl std::fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Processed {} of {} rows. Products affected: {} ({} created, {} updated). Skipped rows: {}",
            self.processed,
            self.total_rows,
            self.affected(),
            self.created,
            self.updated,
            self.skipped
        )
    }
}

/// Runs one import job end to end: count, read, normalize, batch, upsert and
/// report, strictly in sequence.
pub struct ImportJobRunner {
    jobs: Arc<dyn ImportJobRepository>,
    executor: UpsertExecutor,
    batch_size: usize,
    updates: broadcast::Sender<ImportJob>,
}

impl ImportJobRunner {
    pub fn new(
        jobs: Arc<dyn ImportJobRepository>,
        store: Arc<dyn ProductStore>,
        batch_size: usize,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATES_CAPACITY);
        Self {
            jobs,
            executor: UpsertExecutor::new(store),
            batch_size,
            updates,
        }
    }

    pub fn jobs(&self) -> &Arc<dyn ImportJobRepository> {
        &self.jobs
    }

    /// Every persisted change of every job this runner executes.
    pub fn subscribe(&self) -> broadcast::Receiver<ImportJob> {
        self.updates.subscribe()
    }

    /// Imports `path` into the product store under the `Pending` job `job_id`.
    ///
    /// The job ends `Completed` or `Failed` unless it does not exist or is not
    /// `Pending`, in which case it is left untouched. Batches committed before
    /// a failure stay committed.
    pub async fn run_import<P: AsRef<Path>>(
        &self,
        job_id: Uuid,
        path: P,
    ) -> Result<ImportSummary, ImportError> {
        let path = path.as_ref();
        let reporter =
            JobProgressReporter::load(self.jobs.clone(), job_id, self.updates.clone()).await?;

        let mut summary = ImportSummary::default();
        let res = self.execute(&reporter, path, &mut summary).await;
        let res = match res {
            Ok(()) => reporter
                .report_terminal(ImportJobStatus::Completed, summary.to_string(), None)
                .await
                .map_err(ImportError::StoreUnavailable),
            Err(err) => Err(err),
        };
        match res {
            Ok(()) => {
                log::info!("Import job {job_id} completed. {summary}");
                Ok(summary)
            }
            Err(err) => {
                let error = failure_text(&err, summary.processed);
                log::error!("Import job {job_id} failed: {error}");
                let _ = reporter
                    .report_terminal(
                        ImportJobStatus::Failed,
                        "Import failed".to_string(),
                        Some(error),
                    )
                    .await
                    .log_error("Unable to mark import job as failed");
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        reporter: &dyn ProgressSink,
        path: &Path,
        summary: &mut ImportSummary,
    ) -> Result<(), ImportError> {
        reporter
            .report_started(format!("Reading {}", path.display()))
            .await
            .map_err(ImportError::StoreUnavailable)?;
        log::info!("Import of {} started", path.display());

        let total = csv_reader::count_rows(path).await?;
        if total == 0 {
            return Err(ImportError::EmptyFile(path.to_path_buf()));
        }
        summary.total_rows = total;
        reporter
            .report_progress(0, total, format!("Found {total} rows"))
            .await
            .map_err(ImportError::StoreUnavailable)?;

        let mut reader = CsvRowReader::open(path).await?;
        let mut batcher = Batcher::new(self.batch_size);
        while let Some(row) = reader.next_row().await {
            match normalize(&row?) {
                Normalized::Row(row) => {
                    if let Some(batch) = batcher.push(row) {
                        self.apply(reporter, batch, summary).await?;
                    }
                }
                Normalized::Skip => summary.skipped += 1,
            }
        }
        if let Some(batch) = batcher.finish() {
            self.apply(reporter, batch, summary).await?;
        }
        Ok(())
    }

    async fn apply(
        &self,
        reporter: &dyn ProgressSink,
        batch: Vec<catalog_types::product::NormalizedRow>,
        summary: &mut ImportSummary,
    ) -> Result<(), ImportError> {
        let outcome = self.executor.apply(batch).await?;
        summary.batches += 1;
        summary.processed += outcome.rows as u64;
        summary.created += outcome.created;
        summary.updated += outcome.updated;
        reporter
            .report_progress(
                summary.processed,
                summary.total_rows,
                format!(
                    "Imported {} of {} rows",
                    summary.processed, summary.total_rows
                ),
            )
            .await
            .map_err(ImportError::StoreUnavailable)
    }
}

fn failure_text(err: &ImportError, committed: u64) -> String {
    if committed == 0 {
        err.to_string()
    } else {
        format!("{err}. {committed} rows from earlier batches remain committed and were not rolled back")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_message() {
        let summary = ImportSummary {
            total_rows: 3,
            processed: 2,
            skipped: 1,
            created: 1,
            updated: 0,
            batches: 1,
        };
        assert_eq!(
            summary.to_string(),
            "Processed 2 of 3 rows. Products affected: 1 (1 created, 0 updated). Skipped rows: 1"
        );
    }

    #[test]
    fn failure_text_mentions_kept_rows() {
        let err = ImportError::BatchApplyFailed {
            row_count: 2,
            cause: anyhow::anyhow!("disk I/O error"),
        };
        assert_eq!(
            failure_text(&err, 0),
            "batch of 2 rows failed: disk I/O error"
        );
        assert!(failure_text(&err, 4).contains("4 rows from earlier batches remain committed"));
    }
}
