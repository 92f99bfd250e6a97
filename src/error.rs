use catalog_types::import_job::ImportJobStatus;
use derive_more::{Display, Error};
use std::path::PathBuf;
use uuid::Uuid;

/// Everything that can end an import run. Nothing is retried. Apart from
/// `JobNotFound` and `JobNotPending`, the job is marked `Failed` with the
/// display text as its error.
#[derive(Debug, Display, Error)]
pub enum ImportError {
    #[error(ignore)]
    #[display("file not found: {}", _0.display())]
    FileNotFound(PathBuf),
    #[error(ignore)]
    #[display("file is empty: {} has no data rows", _0.display())]
    EmptyFile(PathBuf),
    #[error(ignore)]
    #[display("header of {} has no sku column", _0.display())]
    MissingSkuColumn(PathBuf),
    #[display("unable to open file: {_0}")]
    Io(std::io::Error),
    #[display("unable to read csv: {_0}")]
    Read(csv_async::Error),
    #[error(ignore)]
    #[display("batch of {row_count} rows failed: {cause}")]
    BatchApplyFailed {
        row_count: usize,
        cause: anyhow::Error,
    },
    #[error(ignore)]
    #[display("store unavailable: {_0}")]
    StoreUnavailable(anyhow::Error),
    #[error(ignore)]
    #[display("import job {_0} not found")]
    JobNotFound(Uuid),
    #[error(ignore)]
    #[display("import job {_0} is {_1}, expected Pending")]
    JobNotPending(Uuid, ImportJobStatus),
}

impl From<csv_async::Error> for ImportError {
    fn from(err: csv_async::Error) -> Self {
        ImportError::Read(err)
    }
}
