use crate::SkuKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use typesafe_repository::async_ops::{Get, List};
use typesafe_repository::{Identity, RefIdentity, Repository};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub sku_key: SkuKey,
    /// SKU as it appeared in the last applied row, original casing kept for display.
    pub sku: String,
    pub name: String,
    pub description: String,
    pub active: bool,
}

impl Identity for Product {
    type Id = SkuKey;
}

impl RefIdentity for Product {
    fn id_ref(&self) -> &Self::Id {
        &self.sku_key
    }
}

/// A CSV row after normalization, ready to be applied to the product table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub sku_key: SkuKey,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub active: bool,
}

impl From<NormalizedRow> for Product {
    fn from(r: NormalizedRow) -> Self {
        Product {
            sku_key: r.sku_key,
            sku: r.sku,
            name: r.name,
            description: r.description,
            active: r.active,
        }
    }
}

/// Effect of one applied batch. `created + updated` counts distinct keys,
/// `rows` counts every row of the batch including in-batch duplicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub rows: usize,
    pub created: usize,
    pub updated: usize,
}

/// Storage capability consumed by the importer.
///
/// `upsert_batch` must be atomic: either every row of the batch is visible
/// afterwards or none is. For duplicate keys inside one batch the last row wins.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn upsert_batch(&self, rows: Vec<NormalizedRow>) -> Result<UpsertOutcome, anyhow::Error>;
}

/// Bulk lookup of keys that are already stored.
#[async_trait]
pub trait ExistingKeys {
    async fn existing_keys(&self, keys: &[SkuKey]) -> Result<HashSet<SkuKey>, anyhow::Error>;
}

#[async_trait]
pub trait CountProducts {
    async fn count(&self) -> Result<usize, anyhow::Error>;
}

pub trait ProductRepository:
    Repository<Product, Error = anyhow::Error>
    + Get<Product>
    + List<Product>
    + CountProducts
    + ExistingKeys
    + ProductStore
    + Send
    + Sync
{
}
