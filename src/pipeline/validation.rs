use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::config::ValidationConfig;

/// How many offending records to attach to a failure for diagnosis
const OFFENDER_SAMPLE_LIMIT: usize = 3;

/// Expected shape of a required field in the canonical output
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
        }
    }
}

/// One failed run-level check, with enough structure to diagnose it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub check: String,
    pub detail: String,
    pub suggested_cause: String,
    /// A few offending records, when the check is record-derived
    pub offenders: Vec<Value>,
}

/// Result of the run-level validation gates. The destructive replace is
/// gated on `Passed`; failure aborts the run with prior persisted state
/// untouched. No control flow unwinds through exceptions here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Passed,
    Failed(Vec<ValidationFailure>),
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed)
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        match self {
            ValidationOutcome::Passed => &[],
            ValidationOutcome::Failed(failures) => failures,
        }
    }
}

/// Run-level gates applied to a canonical record set before any write.
pub struct DatasetValidator {
    config: ValidationConfig,
}

impl DatasetValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate(
        &self,
        collection: &str,
        records: &[Value],
        required_fields: &[FieldSpec],
    ) -> ValidationOutcome {
        let mut failures = Vec::new();

        if records.len() < self.config.min_record_count {
            failures.push(ValidationFailure {
                check: "minimum record count".to_string(),
                detail: format!(
                    "{} records, expected at least {}",
                    records.len(),
                    self.config.min_record_count
                ),
                suggested_cause: "upstream feed truncated or fetch failed part-way".to_string(),
                offenders: Vec::new(),
            });
        }

        for field in required_fields {
            self.check_field(records, field, &mut failures);
        }

        if failures.is_empty() {
            info!(collection, records = records.len(), "Dataset validation passed");
            ValidationOutcome::Passed
        } else {
            for failure in &failures {
                error!(
                    collection,
                    check = %failure.check,
                    detail = %failure.detail,
                    "Dataset validation failed"
                );
            }
            ValidationOutcome::Failed(failures)
        }
    }

    fn check_field(
        &self,
        records: &[Value],
        field: &FieldSpec,
        failures: &mut Vec<ValidationFailure>,
    ) {
        if records.is_empty() {
            return;
        }

        let missing: Vec<&Value> = records
            .iter()
            .filter(|record| record.get(field.name).map(Value::is_null).unwrap_or(true))
            .collect();
        let missing_rate = missing.len() as f64 / records.len() as f64;
        if missing_rate > self.config.max_missing_field_rate {
            failures.push(ValidationFailure {
                check: format!("required field '{}'", field.name),
                detail: format!(
                    "missing in {:.1}% of {} records (threshold {:.1}%)",
                    missing_rate * 100.0,
                    records.len(),
                    self.config.max_missing_field_rate * 100.0
                ),
                suggested_cause: "source schema change or renamed column".to_string(),
                offenders: missing
                    .iter()
                    .take(OFFENDER_SAMPLE_LIMIT)
                    .map(|v| (*v).clone())
                    .collect(),
            });
        }

        // Type check a bounded prefix; present-but-wrong-typed values point
        // at a parser regression rather than sparse data
        let sample: Vec<&Value> = records.iter().take(self.config.type_check_sample).collect();
        let mistyped: Vec<&&Value> = sample
            .iter()
            .filter(|record| {
                record
                    .get(field.name)
                    .map(|v| !v.is_null() && !field.kind.matches(v))
                    .unwrap_or(false)
            })
            .collect();
        let mistyped_rate = mistyped.len() as f64 / sample.len() as f64;
        if mistyped_rate > self.config.max_type_error_rate {
            failures.push(ValidationFailure {
                check: format!("field type '{}'", field.name),
                detail: format!(
                    "wrong type in {:.1}% of a {}-record sample (threshold {:.1}%)",
                    mistyped_rate * 100.0,
                    sample.len(),
                    self.config.max_type_error_rate * 100.0
                ),
                suggested_cause: "serialization change in the normalizer".to_string(),
                offenders: mistyped
                    .iter()
                    .take(OFFENDER_SAMPLE_LIMIT)
                    .map(|v| (**v).clone())
                    .collect(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator(min_count: usize) -> DatasetValidator {
        DatasetValidator::new(ValidationConfig {
            min_record_count: min_count,
            max_missing_field_rate: 0.05,
            max_type_error_rate: 0.01,
            type_check_sample: 500,
        })
    }

    const FIELDS: &[FieldSpec] = &[
        FieldSpec { name: "job_id", kind: FieldKind::String },
        FieldSpec { name: "units", kind: FieldKind::Number },
    ];

    fn good_rows(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"job_id": format!("{}", i), "units": i}))
            .collect()
    }

    #[test]
    fn test_clean_dataset_passes() {
        let outcome = validator(10).validate("buildings", &good_rows(50), FIELDS);
        assert!(outcome.passed());
    }

    #[test]
    fn test_undersized_dataset_fails() {
        let outcome = validator(100).validate("buildings", &good_rows(50), FIELDS);
        assert!(!outcome.passed());
        assert_eq!(outcome.failures().len(), 1);
        assert!(outcome.failures()[0].check.contains("minimum record count"));
    }

    #[test]
    fn test_widely_missing_field_fails_with_offenders() {
        let mut rows = good_rows(50);
        for row in rows.iter_mut().take(10) {
            row.as_object_mut().unwrap().remove("units");
        }
        let outcome = validator(10).validate("buildings", &rows, FIELDS);
        assert!(!outcome.passed());

        let failure = &outcome.failures()[0];
        assert!(failure.check.contains("units"));
        assert_eq!(failure.offenders.len(), 3);
    }

    #[test]
    fn test_sparse_missing_field_is_tolerated() {
        let mut rows = good_rows(100);
        rows[0].as_object_mut().unwrap().remove("units");
        let outcome = validator(10).validate("buildings", &rows, FIELDS);
        assert!(outcome.passed());
    }

    #[test]
    fn test_mistyped_field_fails() {
        let mut rows = good_rows(50);
        for row in rows.iter_mut().take(5) {
            row["units"] = json!("twelve");
        }
        let outcome = validator(10).validate("buildings", &rows, FIELDS);
        assert!(!outcome.passed());
        assert!(outcome.failures()[0].check.contains("field type"));
    }
}
