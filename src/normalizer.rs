use crate::csv_reader::RawRow;
use catalog_types::product::NormalizedRow;
use catalog_types::SkuKey;
use std::collections::HashMap;

/// Anything a row can be normalized from: a CSV row or a plain map.
pub trait RowFields {
    fn field(&self, name: &str) -> Option<&str>;
}

impl RowFields for RawRow {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name)
    }
}

impl<S: std::hash::BuildHasher> RowFields for HashMap<String, String, S> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<S: std::hash::BuildHasher> RowFields for HashMap<&str, &str, S> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Row(NormalizedRow),
    /// Blank SKU. Not applied and not counted as processed.
    Skip,
}

pub fn normalize<R: RowFields + ?Sized>(row: &R) -> Normalized {
    let sku = trimmed(row, "sku");
    let Some(sku_key) = SkuKey::parse(sku) else {
        return Normalized::Skip;
    };
    Normalized::Row(NormalizedRow {
        sku_key,
        sku: sku.to_string(),
        name: trimmed(row, "name").to_string(),
        description: trimmed(row, "description").to_string(),
        active: true,
    })
}

fn trimmed<'r, R: RowFields + ?Sized>(row: &'r R, name: &str) -> &'r str {
    row.field(name).unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn trims_and_keys_by_lowercase_sku() {
        let r = row(&[("sku", "  AB-12 "), ("name", " Widget "), ("description", "\tBlue\n")]);
        let Normalized::Row(n) = normalize(&r) else {
            panic!("row should not be skipped");
        };
        assert_eq!(n.sku_key.as_str(), "ab-12");
        assert_eq!(n.sku, "AB-12");
        assert_eq!(n.name, "Widget");
        assert_eq!(n.description, "Blue");
        assert!(n.active);
    }

    #[test]
    fn missing_fields_are_empty() {
        let r = row(&[("sku", "X")]);
        let Normalized::Row(n) = normalize(&r) else {
            panic!("row should not be skipped");
        };
        assert_eq!(n.name, "");
        assert_eq!(n.description, "");
    }

    #[test]
    fn blank_sku_is_skipped() {
        assert_eq!(normalize(&row(&[("sku", "   "), ("name", "Ghost")])), Normalized::Skip);
        assert_eq!(normalize(&row(&[("name", "No sku at all")])), Normalized::Skip);
    }

    #[test]
    fn owned_maps_normalize_too() {
        let r: HashMap<String, String> = [("sku".to_string(), "a1".to_string())].into();
        assert!(matches!(normalize(&r), Normalized::Row(n) if n.sku_key.as_str() == "a1"));
    }
}
