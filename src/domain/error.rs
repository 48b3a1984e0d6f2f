// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Typed failures of the schema contract and of a scoring call.
// Every problem found in a record is collected into a single
// SchemaMismatch so the caller sees the full picture at once.

use thiserror::Error;

/// One concrete way a record, row or artifact disagrees with the schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaIssue {
    #[error("missing field '{field}'")]
    MissingField { field: String },

    #[error("unexpected field '{field}'")]
    UnexpectedField { field: String },

    #[error("field '{field}' expects {expected}, got {found}")]
    TypeMismatch { field: String, expected: &'static str, found: &'static str },

    #[error("field '{field}' is not a finite number")]
    NonFinite { field: String },

    #[error("field '{field}' expects an integer, got {value}")]
    NotInteger { field: String, value: f64 },

    #[error("field '{field}' = {value} is outside [{}, {}]", bound(.min, "-inf"), bound(.max, "+inf"))]
    OutOfRange { field: String, value: f64, min: Option<f64>, max: Option<f64> },

    #[error("field '{field}' has unknown category '{value}' (allowed: {})", .allowed.join(", "))]
    UnknownCategory { field: String, value: String, allowed: Vec<String> },

    #[error("expected {expected} encoded columns, got {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("column {position} should be '{expected}', got '{found}'")]
    ColumnOrder { position: usize, expected: String, found: String },

    #[error("artifact '{artifact}' was trained on schema {found}, current schema is {expected}")]
    FingerprintMismatch { artifact: String, expected: String, found: String },

    #[error("artifact '{artifact}' is malformed: {detail}")]
    MalformedArtifact { artifact: String, detail: String },
}

fn bound(value: &Option<f64>, unbounded: &str) -> String {
    value.map_or(unbounded.to_string(), |v| v.to_string())
}

/// A rejected record: one or more schema issues.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("schema mismatch: {}", join_issues(.issues))]
pub struct SchemaMismatch {
    pub issues: Vec<SchemaIssue>,
}

fn join_issues(issues: &[SchemaIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl SchemaMismatch {
    pub fn new(issues: Vec<SchemaIssue>) -> Self {
        Self { issues }
    }

    pub fn single(issue: SchemaIssue) -> Self {
        Self { issues: vec![issue] }
    }

    /// Ok when no issue was collected, the mismatch otherwise.
    pub fn check(issues: Vec<SchemaIssue>) -> Result<(), Self> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Self::new(issues))
        }
    }

    pub fn has_missing_field(&self, name: &str) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i, SchemaIssue::MissingField { field } if field == name))
    }
}

/// Failures of a single scoring call.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),

    #[error("unknown model selector '{0}' (expected gbt or logreg)")]
    UnknownModel(String),

    #[error("model '{0}' is not loaded")]
    ModelUnavailable(String),

    #[error("threshold must be a finite value in [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("model produced an invalid probability {0}")]
    InvalidProbability(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_lists_every_issue() {
        let err = SchemaMismatch::new(vec![
            SchemaIssue::MissingField { field: "plan".into() },
            SchemaIssue::UnexpectedField { field: "extra".into() },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("schema mismatch: "));
        assert!(msg.contains("missing field 'plan'"));
        assert!(msg.contains("unexpected field 'extra'"));
        assert!(err.has_missing_field("plan"));
        assert!(!err.has_missing_field("extra"));
    }

    #[test]
    fn test_check_empty_is_ok() {
        assert!(SchemaMismatch::check(Vec::new()).is_ok());
        assert!(SchemaMismatch::check(vec![SchemaIssue::ColumnCount { expected: 3, found: 2 }]).is_err());
    }

    #[test]
    fn test_out_of_range_message_shows_open_bound() {
        let issue = SchemaIssue::OutOfRange {
            field: "sessions_7d".into(),
            value: -1.0,
            min: Some(0.0),
            max: None,
        };
        assert_eq!(issue.to_string(), "field 'sessions_7d' = -1 is outside [0, +inf]");
    }

    #[test]
    fn test_scoring_error_wraps_schema_mismatch() {
        let err: ScoringError =
            SchemaMismatch::single(SchemaIssue::MissingField { field: "plan".into() }).into();
        assert!(matches!(err, ScoringError::Schema(_)));
        assert!(err.to_string().contains("missing field 'plan'"));
    }
}
