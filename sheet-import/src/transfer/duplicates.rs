//! Intra-batch duplicate business key detection

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ImportRow;

/// Separator between the parts of a composite key
pub const KEY_SEPARATOR: &str = "|";

/// A business key shared by more than one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateKey {
    pub key: String,
    /// Sheet row numbers carrying the key, ascending
    pub row_numbers: Vec<usize>,
}

impl std::fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows: Vec<String> = self.row_numbers.iter().map(|r| r.to_string()).collect();
        write!(f, "key '{}' appears in rows {}", self.key, rows.join(", "))
    }
}

/// Case-fold and trim a key part
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalized business key of a row.
/// `None` when there are no key fields or any key part is blank.
pub fn business_key(row: &ImportRow, key_fields: &[&str]) -> Option<String> {
    if key_fields.is_empty() {
        return None;
    }

    let mut parts = Vec::with_capacity(key_fields.len());
    for field in key_fields {
        let part = normalize_key(&row.get(field).to_text()?);
        if part.is_empty() {
            return None;
        }
        parts.push(part);
    }
    Some(parts.join(KEY_SEPARATOR))
}

/// Group positions by key, keeping only keys seen at least twice.
/// Items whose key function returns `None` are skipped.
pub fn find_duplicates_by<T, F>(items: &[T], key_fn: F) -> BTreeMap<String, Vec<usize>>
where
    F: Fn(&T) -> Option<String>,
{
    let mut seen: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, item) in items.iter().enumerate() {
        if let Some(key) = key_fn(item) {
            seen.entry(key).or_default().push(idx);
        }
    }
    seen.retain(|_, positions| positions.len() > 1);
    seen
}

/// Duplicate business keys across rows, as positions into `rows`
pub fn find_duplicates(rows: &[ImportRow], key_fields: &[&str]) -> BTreeMap<String, Vec<usize>> {
    find_duplicates_by(rows, |row| business_key(row, key_fields))
}

/// Resolve positions from [`find_duplicates`] to sheet row numbers
pub fn duplicate_report(
    rows: &[ImportRow],
    duplicates: &BTreeMap<String, Vec<usize>>,
) -> Vec<DuplicateKey> {
    duplicates
        .iter()
        .map(|(key, positions)| DuplicateKey {
            key: key.clone(),
            row_numbers: positions
                .iter()
                .filter_map(|&p| rows.get(p).map(|r| r.row_number))
                .collect(),
        })
        .collect()
}
