// Column reconciliation: resolves raw header labels to canonical fields
//
// Pure functions over the header row and an EntitySchema. Nothing here
// touches IO or shared state, so the same input always yields the same
// mapping.

pub mod core;
pub mod models;

// Re-export commonly used types
pub use self::core::normalize_label;
pub use models::{
    ColumnMapping, LowConfidenceMatch, MappedColumn, MappingAmbiguity, MatchInfo, MatchThresholds,
    MatchType,
};

use crate::schema::EntitySchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete reconciliation result, handed to the caller for review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingReport {
    pub mapping: ColumnMapping,
    /// Non-empty headers that did not map, including low-confidence ones
    pub unmapped_headers: Vec<String>,
    pub low_confidence: Vec<LowConfidenceMatch>,
}

impl MappingReport {
    /// Required fields that are unmapped or only matched with low confidence
    pub fn ambiguities(&self, schema: &EntitySchema) -> Vec<MappingAmbiguity> {
        schema
            .required_fields()
            .filter(|f| !self.mapping.contains_field(&f.id))
            .map(|f| MappingAmbiguity {
                field: f.id.clone(),
                display_name: f.display_name.clone(),
                candidate: self
                    .low_confidence
                    .iter()
                    .filter(|m| m.field == f.id)
                    .max_by(|a, b| a.score.total_cmp(&b.score))
                    .cloned(),
            })
            .collect()
    }
}

/// Map a header row onto a schema
/// Main orchestrator function for the matching service
pub fn reconcile_columns(
    headers: &[String],
    schema: &EntitySchema,
    overrides: &HashMap<String, String>,
    thresholds: &MatchThresholds,
) -> MappingReport {
    let matches = core::compute_column_matches(headers, schema, overrides, thresholds);

    log::info!(
        "Mapped {}/{} headers for '{}' ({} low confidence)",
        matches.mapped.len(),
        headers.iter().filter(|h| !h.trim().is_empty()).count(),
        schema.name,
        matches.low_confidence.len()
    );

    MappingReport {
        mapping: ColumnMapping {
            columns: matches.mapped,
        },
        unmapped_headers: matches.unmapped,
        low_confidence: matches.low_confidence,
    }
}
