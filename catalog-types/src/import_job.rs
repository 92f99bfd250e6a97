use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Get, List, Save};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use uuid::Uuid;

pub const QUEUED_MESSAGE: &str = "Queued for processing...";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "lowercase")]
pub enum ImportJobStatus {
    #[display("Pending")]
    Pending,
    #[display("Processing")]
    Processing,
    #[display("Completed")]
    Completed,
    #[display("Failed")]
    Failed,
}

impl ImportJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl FromStr for ImportJobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(anyhow::anyhow!("Unknown import job status: {other}")),
        }
    }
}

#[derive(Id, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[Id(ref_id, get_id)]
pub struct ImportJob {
    pub id: Uuid,
    pub created_at: OffsetDateTime,
    pub status: ImportJobStatus,
    /// Percent done, 0..=100. Never decreases within a run.
    pub progress: u8,
    pub message: String,
    /// Set only when `status` is `Failed`.
    pub error: Option<String>,
}

impl ImportJob {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: OffsetDateTime::now_utc(),
            status: ImportJobStatus::Pending,
            progress: 0,
            message: QUEUED_MESSAGE.to_string(),
            error: None,
        }
    }

    pub fn start(&mut self, message: impl Into<String>) -> Result<(), anyhow::Error> {
        if self.status != ImportJobStatus::Pending {
            return Err(anyhow::anyhow!(
                "Import job {} can not be started from {} state",
                self.id,
                self.status
            ));
        }
        self.status = ImportJobStatus::Processing;
        self.message = message.into();
        Ok(())
    }

    /// Keeps the larger of the stored and the given progress.
    pub fn advance(&mut self, progress: u8, message: impl Into<String>) {
        self.progress = self.progress.max(progress.min(100));
        self.message = message.into();
    }

    pub fn finish(
        &mut self,
        status: ImportJobStatus,
        message: impl Into<String>,
        error: Option<String>,
    ) -> Result<(), anyhow::Error> {
        if !status.is_terminal() {
            return Err(anyhow::anyhow!("{status} is not a terminal status"));
        }
        if self.status.is_terminal() {
            return Err(anyhow::anyhow!(
                "Import job {} is already {}",
                self.id,
                self.status
            ));
        }
        self.status = status;
        self.message = message.into();
        match status {
            ImportJobStatus::Completed => {
                self.progress = 100;
                self.error = None;
            }
            _ => self.error = error,
        }
        Ok(())
    }

    pub fn view(&self) -> ImportJobView {
        ImportJobView {
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            error: self.error.clone().unwrap_or_default(),
        }
    }
}

impl Default for ImportJob {
    fn default() -> Self {
        Self::new()
    }
}

/// What a polling observer gets back for a job id.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ImportJobView {
    pub status: ImportJobStatus,
    pub progress: u8,
    pub message: String,
    pub error: String,
}

pub trait ImportJobRepository:
    Repository<ImportJob, Error = anyhow::Error>
    + Get<ImportJob>
    + List<ImportJob>
    + Save<ImportJob>
    + Send
    + Sync
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_lifecycle() {
        let mut job = ImportJob::new();
        assert_eq!(job.status, ImportJobStatus::Pending);
        assert_eq!(job.message, QUEUED_MESSAGE);

        job.start("Reading file").unwrap();
        assert_eq!(job.status, ImportJobStatus::Processing);
        assert!(job.start("again").is_err());

        job.advance(40, "40%");
        job.advance(20, "stale");
        assert_eq!(job.progress, 40);

        job.finish(ImportJobStatus::Completed, "done", None).unwrap();
        assert_eq!(job.progress, 100);
        assert!(job
            .finish(ImportJobStatus::Failed, "late", Some("boom".into()))
            .is_err());
        assert_eq!(job.status, ImportJobStatus::Completed);
    }

    #[test]
    fn finish_rejects_non_terminal_status() {
        let mut job = ImportJob::new();
        job.start("go").unwrap();
        assert!(job
            .finish(ImportJobStatus::Processing, "nope", None)
            .is_err());
    }

    #[test]
    fn failed_job_keeps_error_and_progress() {
        let mut job = ImportJob::new();
        job.start("go").unwrap();
        job.advance(60, "60%");
        job.finish(ImportJobStatus::Failed, "Import failed", Some("disk full".into()))
            .unwrap();
        let view = job.view();
        assert_eq!(view.status, ImportJobStatus::Failed);
        assert_eq!(view.progress, 60);
        assert_eq!(view.error, "disk full");
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            ImportJobStatus::Pending,
            ImportJobStatus::Processing,
            ImportJobStatus::Completed,
            ImportJobStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<ImportJobStatus>().unwrap(), s);
        }
        assert!("archived".parse::<ImportJobStatus>().is_err());
    }
}
