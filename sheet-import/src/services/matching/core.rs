//! Core header matching functions

use super::models::{LowConfidenceMatch, MappedColumn, MatchInfo, MatchThresholds, MatchType};
use crate::schema::EntitySchema;
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalize a header or variant label for comparison.
///
/// Trims, lowercases, strips diacritics and collapses runs of
/// underscores, hyphens and whitespace into a single space.
pub fn normalize_label(label: &str) -> String {
    let folded: String = label
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c == 'đ' { 'd' } else { c })
        .collect();

    folded
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Score two normalized labels.
/// Returns the best tier that clears its own threshold.
pub fn score_labels(a: &str, b: &str, thresholds: &MatchThresholds) -> Option<(MatchType, f64)> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    if a == b {
        return Some((MatchType::Exact, 1.0));
    }

    // Containment scores the same under edit distance
    if a.contains(b) || b.contains(a) {
        let (a_len, b_len) = (a.chars().count(), b.chars().count());
        let ratio = a_len.min(b_len) as f64 / a_len.max(b_len) as f64;
        if ratio >= thresholds.substring {
            return Some((MatchType::Substring, ratio));
        }
    }

    let similarity = strsim::normalized_levenshtein(a, b);
    (similarity >= thresholds.possible).then_some((MatchType::Fuzzy, similarity))
}

/// A field's candidate labels, normalized once per reconciliation
pub(super) struct FieldCandidates<'a> {
    pub field: &'a str,
    pub labels: Vec<String>,
}

pub(super) fn build_candidates(schema: &EntitySchema) -> Vec<FieldCandidates<'_>> {
    schema
        .fields
        .iter()
        .map(|f| FieldCandidates {
            field: f.id.as_str(),
            labels: f
                .candidate_labels()
                .map(normalize_label)
                .filter(|l| !l.is_empty())
                .collect(),
        })
        .collect()
}

/// Best unclaimed field for one normalized header.
/// Fields are visited in schema order and only a strictly better score
/// replaces the current best, so ties go to the earlier field.
pub(super) fn best_field_match<'a>(
    header: &str,
    candidates: &[FieldCandidates<'a>],
    claimed: &HashSet<&str>,
    thresholds: &MatchThresholds,
) -> Option<(&'a str, MatchType, f64)> {
    let mut best: Option<(&'a str, MatchType, f64)> = None;

    for candidate in candidates {
        if claimed.contains(candidate.field) {
            continue;
        }
        for label in &candidate.labels {
            let Some((match_type, score)) = score_labels(header, label, thresholds) else {
                continue;
            };
            if match_type == MatchType::Exact {
                return Some((candidate.field, match_type, score));
            }
            if best.is_none_or(|(_, _, s)| score > s) {
                best = Some((candidate.field, match_type, score));
            }
        }
    }

    best
}

/// Output of [`compute_column_matches`]
#[derive(Debug, Default)]
pub(super) struct ColumnMatches {
    pub mapped: Vec<MappedColumn>,
    pub unmapped: Vec<String>,
    pub low_confidence: Vec<LowConfidenceMatch>,
}

/// Compute header matches against a schema
/// Priority: Manual → Exact → Substring/Fuzzy (best score)
pub(super) fn compute_column_matches(
    headers: &[String],
    schema: &EntitySchema,
    overrides: &HashMap<String, String>,
    thresholds: &MatchThresholds,
) -> ColumnMatches {
    let candidates = build_candidates(schema);
    let normalized: Vec<String> = headers.iter().map(|h| normalize_label(h)).collect();

    // Track already matched fields to prevent two columns feeding one field
    let mut already_matched: HashSet<&str> = HashSet::new();
    let mut resolved: Vec<Option<MappedColumn>> = vec![None; headers.len()];

    // 1. Manual overrides claim their fields first
    let overrides: HashMap<String, &String> = overrides
        .iter()
        .map(|(header, field)| (normalize_label(header), field))
        .collect();
    for (column, header) in headers.iter().enumerate() {
        let Some(field_id) = overrides.get(&normalized[column]) else {
            continue;
        };
        let Some(field) = schema.field(field_id) else {
            log::warn!(
                "Ignoring override '{}' -> '{}': no such field in '{}'",
                header,
                field_id,
                schema.name
            );
            continue;
        };
        if !already_matched.insert(field.id.as_str()) {
            log::warn!(
                "Ignoring override '{}' -> '{}': field already mapped",
                header,
                field.id
            );
            continue;
        }
        resolved[column] = Some(MappedColumn {
            column,
            header: header.clone(),
            info: MatchInfo::new(field.id.clone(), MatchType::Manual, 1.0),
        });
    }

    // 2. Remaining headers in order, first sufficiently good match wins
    let mut low_confidence = Vec::new();
    for (column, header) in headers.iter().enumerate() {
        if resolved[column].is_some() || normalized[column].is_empty() {
            continue;
        }

        let Some((field, match_type, score)) =
            best_field_match(&normalized[column], &candidates, &already_matched, thresholds)
        else {
            continue;
        };

        if score >= thresholds.accept {
            log::debug!(
                "Header '{}' -> '{}' {} {:.2}",
                header,
                field,
                match_type.label(),
                score
            );
            already_matched.insert(field);
            resolved[column] = Some(MappedColumn {
                column,
                header: header.clone(),
                info: MatchInfo::new(field, match_type, score),
            });
        } else if score >= thresholds.possible {
            low_confidence.push(LowConfidenceMatch {
                header: header.clone(),
                field: field.to_string(),
                score,
            });
        }
    }

    let mut matches = ColumnMatches {
        low_confidence,
        ..Default::default()
    };
    for (column, slot) in resolved.into_iter().enumerate() {
        match slot {
            Some(mapped) => matches.mapped.push(mapped),
            None if !normalized[column].is_empty() => {
                matches.unmapped.push(headers[column].clone())
            }
            None => {}
        }
    }
    matches
}
