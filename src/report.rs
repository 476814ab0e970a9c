//! Non-fatal conditions and the end-of-run summary.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::domain::ProcessType;

/// A problem that skips a row, a field or a join but never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    RowValidation { line: usize, reason: String },
    FieldParse { line: usize, field: String, value: String },
    JoinMismatch { sample: String, matrix: String },
    AmbiguousClassification { line: usize, value: String },
    AlreadyIndexed { line: usize, run: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::RowValidation { line, reason } => {
                write!(f, "line {line}: row skipped: {reason}")
            }
            Warning::FieldParse { line, field, value } => {
                write!(f, "line {line}: {field} value {value:?} not parseable, omitted")
            }
            Warning::JoinMismatch { sample, matrix } => {
                write!(f, "{matrix}: sample {sample:?} not in metadata, row skipped")
            }
            Warning::AmbiguousClassification { line, value } => {
                write!(f, "line {line}: product type {value:?} not recognized, no gene link")
            }
            Warning::AlreadyIndexed { line, run } => {
                write!(f, "line {line}: run {run:?} already in instance graph, row skipped")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarningCounts {
    pub row_validation: usize,
    pub field_parse: usize,
    pub join_mismatch: usize,
    pub ambiguous_classification: usize,
    pub already_indexed: usize,
}

impl WarningCounts {
    pub fn total(&self) -> usize {
        self.row_validation
            + self.field_parse
            + self.join_mismatch
            + self.ambiguous_classification
            + self.already_indexed
    }
}

/// Counters threaded through the row fold.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    pub rows_seen: usize,
    pub rows_processed: usize,
    pub rows_skipped: usize,
    pub measurements: usize,
    pub process_types: BTreeMap<ProcessType, usize>,
    pub warnings: Vec<Warning>,
}

impl Tally {
    pub fn warn(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn skip_row(&mut self, warning: Warning) {
        self.rows_skipped += 1;
        self.warn(warning);
    }

    pub fn warning_counts(&self) -> WarningCounts {
        let mut counts = WarningCounts::default();
        for warning in &self.warnings {
            match warning {
                Warning::RowValidation { .. } => counts.row_validation += 1,
                Warning::FieldParse { .. } => counts.field_parse += 1,
                Warning::JoinMismatch { .. } => counts.join_mismatch += 1,
                Warning::AmbiguousClassification { .. } => counts.ambiguous_classification += 1,
                Warning::AlreadyIndexed { .. } => counts.already_indexed += 1,
            }
        }
        counts
    }

    pub fn absorb(&mut self, other: Tally) {
        self.rows_seen += other.rows_seen;
        self.rows_processed += other.rows_processed;
        self.rows_skipped += other.rows_skipped;
        self.measurements += other.measurements;
        for (kind, count) in other.process_types {
            *self.process_types.entry(kind).or_default() += count;
        }
        self.warnings.extend(other.warnings);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RowCounts {
    pub seen: usize,
    pub processed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: String,
    pub studies: Vec<String>,
    pub rows: RowCounts,
    pub warnings: WarningCounts,
    pub measurements: usize,
    pub genes: usize,
    pub instance_nodes: usize,
    pub instance_triples: usize,
    pub triples_added: usize,
    pub output_triples: usize,
    pub process_types: BTreeMap<String, usize>,
    pub outputs: Vec<String>,
}

impl RunSummary {
    pub fn from_tally(mode: &str, tally: &Tally) -> Self {
        Self {
            mode: mode.to_string(),
            studies: Vec::new(),
            rows: RowCounts {
                seen: tally.rows_seen,
                processed: tally.rows_processed,
                skipped: tally.rows_skipped,
            },
            warnings: tally.warning_counts(),
            measurements: tally.measurements,
            genes: 0,
            instance_nodes: 0,
            instance_triples: 0,
            triples_added: 0,
            output_triples: 0,
            process_types: tally
                .process_types
                .iter()
                .map(|(kind, count)| (kind.to_string(), *count))
                .collect(),
            outputs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_kind() {
        let mut tally = Tally::default();
        tally.skip_row(Warning::RowValidation {
            line: 2,
            reason: "missing SampleAccession".to_string(),
        });
        tally.warn(Warning::FieldParse {
            line: 3,
            field: "Temperature".to_string(),
            value: "warm".to_string(),
        });
        let counts = tally.warning_counts();
        assert_eq!(counts.row_validation, 1);
        assert_eq!(counts.field_parse, 1);
        assert_eq!(counts.total(), 2);
        assert_eq!(tally.rows_skipped, 1);
    }

    #[test]
    fn warnings_serialize_with_kind_tag() {
        let warning = Warning::JoinMismatch {
            sample: "S9".to_string(),
            matrix: "expr.csv".to_string(),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "join_mismatch");
        assert_eq!(json["sample"], "S9");
    }
}
