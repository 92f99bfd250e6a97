use crate::error::ImportError;
use crate::import_throttle;
use crate::runner::{ImportJobRunner, ImportSummary};
use catalog_types::import_job::{ImportJob, ImportJobView};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct ImportTicket {
    pub job_id: Uuid,
    pub handle: JoinHandle<Result<ImportSummary, ImportError>>,
}

/// Front door for callers: creates jobs and runs them in the background.
#[derive(Clone)]
pub struct ImportService {
    runner: Arc<ImportJobRunner>,
}

impl ImportService {
    pub fn new(runner: Arc<ImportJobRunner>) -> Self {
        Self { runner }
    }

    /// Creates a `Pending` job for `path` and dispatches it without waiting.
    pub async fn submit(&self, path: PathBuf) -> Result<ImportTicket, anyhow::Error> {
        let job = ImportJob::new();
        let job_id = job.id;
        self.runner.jobs().save(job).await?;
        log::info!("Import job {job_id} queued for {}", path.display());
        Ok(ImportTicket {
            job_id,
            handle: self.dispatch(job_id, path),
        })
    }

    /// Runs an already created `Pending` job on a background task.
    pub fn dispatch(
        &self,
        job_id: Uuid,
        path: PathBuf,
    ) -> JoinHandle<Result<ImportSummary, ImportError>> {
        let runner = self.runner.clone();
        tokio::spawn(async move {
            let _permit = match import_throttle::acquire_import_permit().await {
                Ok(permit) => Some(permit),
                Err(err) => {
                    log::warn!("Import throttle unavailable, running job {job_id} unthrottled: {err}");
                    None
                }
            };
            runner.run_import(job_id, path).await
        })
    }

    pub async fn status(&self, job_id: Uuid) -> Result<Option<ImportJobView>, anyhow::Error> {
        Ok(self
            .runner
            .jobs()
            .get_one(&job_id)
            .await?
            .map(|job| job.view()))
    }

    pub async fn list(&self) -> Result<Vec<ImportJob>, anyhow::Error> {
        self.runner.jobs().list().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ImportJob> {
        self.runner.subscribe()
    }
}
