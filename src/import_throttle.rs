use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_IMPORT_CONCURRENCY: usize = 1;

static IMPORT_SEMAPHORE: Lazy<Arc<Semaphore>> = Lazy::new(|| {
    let limit: Option<usize> = envmnt::get_parse("IMPORT_CONCURRENCY").ok();
    let limit = limit
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_IMPORT_CONCURRENCY);
    Arc::new(Semaphore::new(limit))
});

/// Waits until fewer than `IMPORT_CONCURRENCY` imports hold a permit.
pub async fn acquire_import_permit() -> Result<OwnedSemaphorePermit, AcquireError> {
    IMPORT_SEMAPHORE.clone().acquire_owned().await
}
