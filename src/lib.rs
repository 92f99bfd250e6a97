#![deny(clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;
use tokio_rusqlite::Connection;

pub mod batcher;
pub mod config;
pub mod csv_reader;
pub mod error;
pub mod import_job;
pub mod import_throttle;
pub mod normalizer;
pub mod product;
pub mod progress;
pub mod runner;
pub mod service;
pub mod upsert;

pub use error::ImportError;
pub use runner::{ImportJobRunner, ImportSummary};
pub use service::ImportService;

/// Opens a SQLite database tuned for several connections and concurrent jobs.
pub async fn open_connection<P: AsRef<Path>>(path: P) -> Result<Connection, tokio_rusqlite::Error> {
    let conn = Connection::open(path).await?;
    conn.call(|conn| {
        let _ = conn.pragma_update(None, "journal_mode", &"WAL");
        let _ = conn.pragma_update(None, "synchronous", &"NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", &5000i64);
        Ok(())
    })
    .await?;
    Ok(conn)
}

/// Wires repositories, runner and service over the database at `config.db_path`.
pub async fn build_service(config: &config::ImportConfig) -> Result<ImportService, anyhow::Error> {
    if let Some(dir) = config.db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    // Each repository owns a connection; WAL lets them share the file.
    let products =
        product::SqliteProductRepository::init(open_connection(&config.db_path).await?).await?;
    let jobs =
        import_job::SqliteImportJobRepository::init(open_connection(&config.db_path).await?).await?;
    let runner = ImportJobRunner::new(Arc::new(jobs), Arc::new(products), config.batch_size);
    Ok(ImportService::new(Arc::new(runner)))
}
