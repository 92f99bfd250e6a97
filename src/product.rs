use async_trait::async_trait;
use catalog_types::product::{
    CountProducts, ExistingKeys, NormalizedRow, Product, ProductRepository, ProductStore,
    UpsertOutcome,
};
use catalog_types::SkuKey;
use rusqlite::types::{ToSql, Type};
use rusqlite::{params_from_iter, TransactionBehavior};
use std::collections::{HashMap, HashSet};
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, List};
use typesafe_repository::prelude::*;

/// SQLite keeps at least 999 host parameters per statement on every build.
const KEY_LOOKUP_CHUNK: usize = 500;
/// Five parameters per row.
const UPSERT_CHUNK: usize = 150;

fn stored_keys(conn: &rusqlite::Connection, keys: &[&str]) -> rusqlite::Result<HashSet<String>> {
    let mut found = HashSet::new();
    for chunk in keys.chunks(KEY_LOOKUP_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT sku_key FROM product WHERE sku_key IN ({placeholders})"
        ))?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            row.get::<_, String>(0)
        })?;
        for key in rows {
            found.insert(key?);
        }
    }
    Ok(found)
}

/// Keeps the last row of every key, in order of that last occurrence.
fn last_per_key(rows: &[NormalizedRow]) -> Vec<&NormalizedRow> {
    let last: HashMap<&str, usize> = rows
        .iter()
        .enumerate()
        .map(|(idx, r)| (r.sku_key.as_str(), idx))
        .collect();
    rows.iter()
        .enumerate()
        .filter(|(idx, r)| last.get(r.sku_key.as_str()) == Some(idx))
        .map(|(_, r)| r)
        .collect()
}

fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    let sku_key: String = row.get(0)?;
    let sku_key = SkuKey::parse(&sku_key).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, "blank sku_key".into())
    })?;
    Ok(Product {
        sku_key,
        sku: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        active: row.get(4)?,
    })
}

pub struct SqliteProductRepository {
    conn: Connection,
}

impl SqliteProductRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS product (
                    sku_key TEXT PRIMARY KEY,
                    sku TEXT NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    active INTEGER NOT NULL DEFAULT 1
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

impl Repository<Product> for SqliteProductRepository {
    type Error = anyhow::Error;
}

impl ProductRepository for SqliteProductRepository {}

#[async_trait]
impl ExistingKeys for SqliteProductRepository {
    async fn existing_keys(&self, keys: &[SkuKey]) -> Result<HashSet<SkuKey>, anyhow::Error> {
        let keys: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();
        Ok(self
            .conn
            .call(move |conn| {
                let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
                Ok(stored_keys(conn, &keys)?
                    .into_iter()
                    .filter_map(SkuKey::parse)
                    .collect())
            })
            .await?)
    }
}

#[async_trait]
impl ProductStore for SqliteProductRepository {
    async fn upsert_batch(&self, rows: Vec<NormalizedRow>) -> Result<UpsertOutcome, anyhow::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let unique = last_per_key(&rows);
                let keys: Vec<&str> = unique.iter().map(|r| r.sku_key.as_str()).collect();
                let updated = stored_keys(&tx, &keys)?.len();
                for chunk in unique.chunks(UPSERT_CHUNK) {
                    let values = vec!["(?, ?, ?, ?, ?)"; chunk.len()].join(", ");
                    let mut stmt = tx.prepare_cached(&format!(
                        "INSERT INTO product (sku_key, sku, name, description, active)
                        VALUES {values}
                        ON CONFLICT(sku_key) DO UPDATE SET
                            sku = excluded.sku,
                            name = excluded.name,
                            description = excluded.description,
                            active = excluded.active"
                    ))?;
                    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(chunk.len() * 5);
                    for r in chunk {
                        params.push(&*r.sku_key);
                        params.push(&r.sku);
                        params.push(&r.name);
                        params.push(&r.description);
                        params.push(&r.active);
                    }
                    stmt.execute(params.as_slice())?;
                }
                tx.commit()?;
                Ok(UpsertOutcome {
                    rows: rows.len(),
                    created: keys.len() - updated,
                    updated,
                })
            })
            .await?)
    }
}

#[async_trait]
impl Get<Product> for SqliteProductRepository {
    async fn get_one(&self, id: &IdentityOf<Product>) -> Result<Option<Product>, Self::Error> {
        let id = id.clone();
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT sku_key, sku, name, description, active FROM product WHERE sku_key = ?1",
                )?;
                let mut p = stmt
                    .query_map([id.as_str()], row_to_product)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(p.pop())
            })
            .await?)
    }
}

#[async_trait]
impl List<Product> for SqliteProductRepository {
    async fn list(&self) -> Result<Vec<Product>, Self::Error> {
        Ok(self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT sku_key, sku, name, description, active FROM product ORDER BY sku_key",
                )?;
                let p = stmt
                    .query_map([], row_to_product)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(p)
            })
            .await?)
    }
}

#[async_trait]
impl CountProducts for SqliteProductRepository {
    async fn count(&self) -> Result<usize, anyhow::Error> {
        let count: i64 = self
            .conn
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM product", [], |row| row.get(0))?))
            .await?;
        Ok(count.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sku: &str, name: &str) -> NormalizedRow {
        NormalizedRow {
            sku_key: SkuKey::parse(sku).unwrap(),
            sku: sku.trim().to_string(),
            name: name.to_string(),
            description: String::new(),
            active: true,
        }
    }

    async fn repo() -> SqliteProductRepository {
        let conn = Connection::open_in_memory().await.unwrap();
        SqliteProductRepository::init(conn).await.unwrap()
    }

    #[tokio::test]
    async fn upsert_creates_then_updates() {
        let repo = repo().await;
        let outcome = repo
            .upsert_batch(vec![row("A1", "Widget"), row("B2", "Gadget")])
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome { rows: 2, created: 2, updated: 0 });

        let outcome = repo
            .upsert_batch(vec![row("a1", "Widget v2"), row("C3", "Gizmo")])
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome { rows: 2, created: 1, updated: 1 });

        let a1 = repo.get_one(&SkuKey::parse("A1").unwrap()).await.unwrap().unwrap();
        assert_eq!(a1.name, "Widget v2");
        assert_eq!(a1.sku, "a1");
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn last_duplicate_in_batch_wins() {
        let repo = repo().await;
        let outcome = repo
            .upsert_batch(vec![row("A1", "first"), row("a1", "second"), row(" A1 ", "third")])
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome { rows: 3, created: 1, updated: 0 });
        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "third");
    }

    #[tokio::test]
    async fn reapplying_a_batch_is_idempotent() {
        let repo = repo().await;
        let batch = vec![row("A1", "Widget"), row("B2", "Gadget")];
        repo.upsert_batch(batch.clone()).await.unwrap();
        let before = repo.list().await.unwrap();
        let outcome = repo.upsert_batch(batch).await.unwrap();
        assert_eq!(outcome.updated, 2);
        assert_eq!(repo.list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn looks_up_existing_keys() {
        let repo = repo().await;
        repo.upsert_batch(vec![row("A1", "Widget")]).await.unwrap();
        let keys: Vec<_> = (0..1200)
            .map(|i| SkuKey::parse(format!("k{i}")).unwrap())
            .chain(SkuKey::parse("a1"))
            .collect();
        let found = repo.existing_keys(&keys).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains(&SkuKey::parse("A1").unwrap()));
    }

    #[tokio::test]
    async fn upserts_batches_wider_than_one_statement() {
        let repo = repo().await;
        let mut batch: Vec<_> = (0..400).map(|i| row(&format!("K{i}"), "first")).collect();
        batch.push(row("k7", "again"));
        let outcome = repo.upsert_batch(batch).await.unwrap();
        assert_eq!(outcome, UpsertOutcome { rows: 401, created: 400, updated: 0 });
        assert_eq!(repo.count().await.unwrap(), 400);

        let k7 = repo.get_one(&SkuKey::parse("K7").unwrap()).await.unwrap().unwrap();
        assert_eq!(k7.sku, "k7");
        assert_eq!(k7.name, "again");
        assert_eq!(
            repo.get_one(&SkuKey::parse("K399").unwrap()).await.unwrap().unwrap().name,
            "first"
        );
    }
}
