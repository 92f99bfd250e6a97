use std::path::PathBuf;

pub const DEFAULT_BATCH_SIZE: usize = 5000;
pub const DEFAULT_DB_PATH: &str = "storage/catalog.db";

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub db_path: PathBuf,
    /// Rows per upsert transaction. Bounds peak memory of a run.
    pub batch_size: usize,
}

impl ImportConfig {
    pub fn from_env() -> Self {
        let batch_size: Option<usize> = envmnt::get_parse("IMPORT_BATCH_SIZE").ok();
        let batch_size = batch_size
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        Self {
            db_path: PathBuf::from(envmnt::get_or("CATALOG_DB", DEFAULT_DB_PATH)),
            batch_size,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}
