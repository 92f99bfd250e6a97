use async_trait::async_trait;
use catalog_types::import_job::{ImportJob, ImportJobRepository, ImportJobStatus};
use rusqlite::params;
use rusqlite::types::Type;
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, List, Save};
use typesafe_repository::prelude::*;

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImportJob> {
    let status: String = row.get(2)?;
    let status = status
        .parse::<ImportJobStatus>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, err.into()))?;
    Ok(ImportJob {
        id: row.get(0)?,
        created_at: row.get(1)?,
        status,
        progress: row.get(3)?,
        message: row.get(4)?,
        error: row.get(5)?,
    })
}

pub struct SqliteImportJobRepository {
    conn: Connection,
}

impl SqliteImportJobRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS import_job (
                    id BLOB PRIMARY KEY,
                    created_at TEXT NOT NULL,
                    status TEXT NOT NULL,
                    progress INTEGER NOT NULL DEFAULT 0,
                    message TEXT NOT NULL DEFAULT '',
                    error TEXT
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

impl Repository<ImportJob> for SqliteImportJobRepository {
    type Error = anyhow::Error;
}

impl ImportJobRepository for SqliteImportJobRepository {}

#[async_trait]
impl Save<ImportJob> for SqliteImportJobRepository {
    async fn save(&self, job: ImportJob) -> Result<(), Self::Error> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO import_job (id, created_at, status, progress, message, error)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(id) DO UPDATE SET
                        status = ?3, progress = ?4, message = ?5, error = ?6",
                    params![
                        job.id,
                        job.created_at,
                        job.status.as_str(),
                        job.progress,
                        job.message,
                        job.error,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Get<ImportJob> for SqliteImportJobRepository {
    async fn get_one(&self, id: &IdentityOf<ImportJob>) -> Result<Option<ImportJob>, Self::Error> {
        let id = *id;
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, created_at, status, progress, message, error
                    FROM import_job WHERE id = ?1",
                )?;
                let mut j = stmt
                    .query_map(params![id], row_to_job)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(j.pop())
            })
            .await?)
    }
}

#[async_trait]
impl List<ImportJob> for SqliteImportJobRepository {
    async fn list(&self) -> Result<Vec<ImportJob>, Self::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, created_at, status, progress, message, error
                    FROM import_job ORDER BY created_at DESC, rowid DESC",
                )?;
                let j = stmt
                    .query_map([], row_to_job)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(j)
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> SqliteImportJobRepository {
        let conn = Connection::open_in_memory().await.unwrap();
        SqliteImportJobRepository::init(conn).await.unwrap()
    }

    #[tokio::test]
    async fn saves_and_updates_jobs() {
        let repo = repo().await;
        let mut job = ImportJob::new();
        repo.save(job.clone()).await.unwrap();
        let stored = repo.get_one(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ImportJobStatus::Pending);
        assert_eq!(stored.message, job.message);

        job.start("Reading").unwrap();
        job.advance(50, "Half way");
        job.finish(ImportJobStatus::Failed, "Import failed", Some("boom".into()))
            .unwrap();
        repo.save(job.clone()).await.unwrap();

        let stored = repo.get_one(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ImportJobStatus::Failed);
        assert_eq!(stored.progress, 50);
        assert_eq!(stored.error.as_deref(), Some("boom"));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_job_is_none() {
        let repo = repo().await;
        assert!(repo.get_one(&uuid::Uuid::new_v4()).await.unwrap().is_none());
    }
}
