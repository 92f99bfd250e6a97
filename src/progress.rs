use crate::error::ImportError;
use async_trait::async_trait;
use catalog_types::import_job::{ImportJob, ImportJobRepository, ImportJobStatus};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// `floor(processed / total * 100)`, clamped to `0..=100`.
pub fn percent(processed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (processed.min(total).saturating_mul(100) / total) as u8
}

/// Receives milestones of one import run.
///
/// Calls to `report_progress` must come with a non-decreasing `processed`;
/// that is the caller's obligation and is not checked here.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report_started(&self, message: String) -> Result<(), anyhow::Error>;
    async fn report_progress(
        &self,
        processed: u64,
        total: u64,
        message: String,
    ) -> Result<(), anyhow::Error>;
    async fn report_terminal(
        &self,
        status: ImportJobStatus,
        message: String,
        error: Option<String>,
    ) -> Result<(), anyhow::Error>;
}

/// Keeps one `ImportJob` record current: every change is saved to the job
/// repository and then broadcast to subscribers.
///
/// The in-memory job only takes a change after it was saved, so a failed save
/// leaves it at the last stored state.
pub struct JobProgressReporter {
    repo: Arc<dyn ImportJobRepository>,
    job: Mutex<ImportJob>,
    updates: broadcast::Sender<ImportJob>,
}

impl JobProgressReporter {
    /// Loads the job, which must still be `Pending`.
    pub async fn load(
        repo: Arc<dyn ImportJobRepository>,
        id: Uuid,
        updates: broadcast::Sender<ImportJob>,
    ) -> Result<Self, ImportError> {
        let job = repo
            .get_one(&id)
            .await
            .map_err(ImportError::StoreUnavailable)?
            .ok_or(ImportError::JobNotFound(id))?;
        if job.status != ImportJobStatus::Pending {
            return Err(ImportError::JobNotPending(id, job.status));
        }
        Ok(Self {
            repo,
            job: Mutex::new(job),
            updates,
        })
    }

    pub async fn snapshot(&self) -> ImportJob {
        self.job.lock().await.clone()
    }

    async fn persist(&self, job: &ImportJob) -> Result<(), anyhow::Error> {
        self.repo.save(job.clone()).await?;
        // No subscribers is fine.
        let _ = self.updates.send(job.clone());
        Ok(())
    }
}

#[async_trait]
impl ProgressSink for JobProgressReporter {
    async fn report_started(&self, message: String) -> Result<(), anyhow::Error> {
        let mut job = self.job.lock().await;
        let mut next = job.clone();
        next.start(message)?;
        self.persist(&next).await?;
        *job = next;
        Ok(())
    }

    async fn report_progress(
        &self,
        processed: u64,
        total: u64,
        message: String,
    ) -> Result<(), anyhow::Error> {
        let mut job = self.job.lock().await;
        let mut next = job.clone();
        next.advance(percent(processed, total), message);
        self.persist(&next).await?;
        *job = next;
        Ok(())
    }

    async fn report_terminal(
        &self,
        status: ImportJobStatus,
        message: String,
        error: Option<String>,
    ) -> Result<(), anyhow::Error> {
        let mut job = self.job.lock().await;
        let mut next = job.clone();
        next.finish(status, message, error)?;
        self.persist(&next).await?;
        *job = next;
        Ok(())
    }
}
