use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};

pub mod import_job;
pub mod product;

/// Case-insensitive product key: trimmed and lower-cased SKU.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deref,
)]
#[serde(transparent)]
pub struct SkuKey(String);

impl SkuKey {
    /// Returns `None` when the SKU is blank after trimming.
    pub fn parse<S: AsRef<str>>(sku: S) -> Option<Self> {
        let sku = sku.as_ref().trim();
        if sku.is_empty() {
            None
        } else {
            Some(Self(sku.to_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<SkuKey> for String {
    fn from(key: SkuKey) -> Self {
        key.0
    }
}
