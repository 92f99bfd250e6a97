use crate::error::ImportError;
use catalog_types::product::{NormalizedRow, ProductStore, UpsertOutcome};
use std::sync::Arc;

/// Applies batches to the product store, one atomic upsert per batch.
#[derive(Clone)]
pub struct UpsertExecutor {
    store: Arc<dyn ProductStore>,
}

impl UpsertExecutor {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }

    pub async fn apply(&self, batch: Vec<NormalizedRow>) -> Result<UpsertOutcome, ImportError> {
        let row_count = batch.len();
        if row_count == 0 {
            return Ok(UpsertOutcome::default());
        }
        match self.store.upsert_batch(batch).await {
            Ok(outcome) => {
                log::debug!(
                    "Applied batch of {row_count} rows: {} created, {} updated",
                    outcome.created,
                    outcome.updated
                );
                Ok(outcome)
            }
            Err(cause) => {
                log::error!("Batch of {row_count} rows rolled back: {cause:#}");
                Err(ImportError::BatchApplyFailed { row_count, cause })
            }
        }
    }
}
