use serde::{Deserialize, Serialize};

/// How a header was paired with a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Manual,    // Caller-supplied override
    Exact,     // Normalized labels are equal
    Substring, // One normalized label contains the other
    Fuzzy,     // Edit-distance similarity
}

impl MatchType {
    /// Get display label for match type
    pub fn label(&self) -> &'static str {
        match self {
            MatchType::Manual => "[Manual]",
            MatchType::Exact => "[Exact]",
            MatchType::Substring => "[Substring]",
            MatchType::Fuzzy => "[Fuzzy]",
        }
    }
}

/// Information about a header/field match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub field: String,
    pub match_type: MatchType,
    /// Similarity in [0, 1]
    pub score: f64,
}

impl MatchInfo {
    pub fn new(field: impl Into<String>, match_type: MatchType, score: f64) -> Self {
        Self {
            field: field.into(),
            match_type,
            score,
        }
    }
}

/// Score cut-offs for the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    /// Minimum score for a header to be mapped
    pub accept: f64,
    /// Minimum containment ratio for a substring match to count
    pub substring: f64,
    /// Minimum score worth reporting as a possible match
    pub possible: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            accept: 0.8,
            substring: 0.8,
            possible: 0.7,
        }
    }
}

impl MatchThresholds {
    pub fn with_accept(mut self, accept: f64) -> Self {
        self.accept = accept;
        self
    }

    pub fn with_substring(mut self, substring: f64) -> Self {
        self.substring = substring;
        self
    }

    pub fn with_possible(mut self, possible: f64) -> Self {
        self.possible = possible;
        self
    }
}

/// A source column resolved to a canonical field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedColumn {
    /// Zero-based column index in the upload
    pub column: usize,
    pub header: String,
    #[serde(flatten)]
    pub info: MatchInfo,
}

/// Header to field resolution for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub columns: Vec<MappedColumn>,
}

impl ColumnMapping {
    /// Canonical field for a column index
    pub fn field_for_column(&self, column: usize) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.info.field.as_str())
    }

    /// Canonical field for a header label (first column carrying it)
    pub fn field_for_header(&self, header: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.header == header)
            .map(|c| c.info.field.as_str())
    }

    pub fn match_for_field(&self, field: &str) -> Option<&MappedColumn> {
        self.columns.iter().find(|c| c.info.field == field)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.match_for_field(field).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A pairing in the "possible" band, left unmapped for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowConfidenceMatch {
    pub header: String,
    pub field: String,
    pub score: f64,
}

/// A required field the reconciler could not settle on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingAmbiguity {
    pub field: String,
    pub display_name: String,
    /// Best low-confidence candidate, if any
    pub candidate: Option<LowConfidenceMatch>,
}

impl std::fmt::Display for MappingAmbiguity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.candidate {
            Some(c) => write!(
                f,
                "required field '{}' only matched header '{}' with low confidence ({:.2})",
                self.display_name, c.header, c.score
            ),
            None => write!(
                f,
                "required field '{}' has no matching column",
                self.display_name
            ),
        }
    }
}
