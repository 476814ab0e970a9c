//! Expression matrices and their join onto sample nodes.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use tracing::debug;

use crate::builder::BuildState;
use crate::config::ResolvedConfig;
use crate::error::GraphError;
use crate::identity::NodeIds;
use crate::metadata::{RejectedRecord, is_null_token, parse_decimal, table_error};
use crate::report::Warning;

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixRow {
    pub line: usize,
    pub sample: String,
    /// Raw cell text per gene column, in header order.
    pub cells: Vec<String>,
}

/// Samples by genes. The first column is the sample id; every other header is a gene
/// symbol.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    pub source: PathBuf,
    pub genes: Vec<String>,
    pub rows: Vec<MatrixRow>,
    pub rejected: Vec<RejectedRecord>,
}

impl ExpressionMatrix {
    pub fn read(path: &Path) -> Result<Self, GraphError> {
        if !path.is_file() {
            return Err(GraphError::MissingInput(path.to_path_buf()));
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_path(path)
            .map_err(|err| table_error(path, err))?;

        let headers = reader.headers().map_err(|err| table_error(path, err))?;
        if headers.is_empty() || headers.iter().all(str::is_empty) {
            return Err(GraphError::EmptyMatrix(path.to_path_buf()));
        }
        let genes = headers
            .iter()
            .skip(1)
            .map(|gene| gene.to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        let mut rejected = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let line = index + 2;
            match record {
                Ok(record) => {
                    let mut fields = record.iter();
                    let sample = fields.next().unwrap_or_default().to_string();
                    rows.push(MatrixRow {
                        line,
                        sample,
                        cells: fields.map(str::to_string).collect(),
                    });
                }
                Err(err) => rejected.push(RejectedRecord {
                    line: err.position().map(|pos| pos.line() as usize).unwrap_or(line),
                    message: err.to_string(),
                }),
            }
        }

        Ok(Self {
            source: path.to_path_buf(),
            genes,
            rows,
            rejected,
        })
    }

    /// Every `*.csv` file directly under `dir`, in file-name order.
    pub fn read_dir(dir: &Path) -> Result<Vec<Self>, GraphError> {
        if !dir.is_dir() {
            return Err(GraphError::MissingInput(dir.to_path_buf()));
        }
        let entries = fs::read_dir(dir)
            .map_err(|err| GraphError::Filesystem(format!("read {}: {err}", dir.display())))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|err| GraphError::Filesystem(err.to_string()))?
                .path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
                paths.push(path);
            }
        }
        paths.sort();
        paths.iter().map(|path| Self::read(path)).collect()
    }

    fn name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

pub struct ExpressionIntegrator<'a> {
    ids: NodeIds<'a>,
}

impl<'a> ExpressionIntegrator<'a> {
    pub fn new(config: &'a ResolvedConfig) -> Self {
        Self {
            ids: NodeIds::new(&config.namespaces),
        }
    }

    /// Adds one measurement per numeric cell whose row sample is in `scope`.
    ///
    /// Rows for other samples are skipped with a join warning; no sample node is created
    /// for them. Measurements are keyed by sample and gene, so integrating the same
    /// matrix twice leaves the graph unchanged.
    pub fn integrate(
        &self,
        matrix: &ExpressionMatrix,
        scope: &BTreeSet<String>,
        mut state: BuildState,
    ) -> BuildState {
        let name = matrix.name();
        for rejected in &matrix.rejected {
            state.tally.warn(Warning::RowValidation {
                line: rejected.line,
                reason: format!("{name}: {}", rejected.message),
            });
        }

        let before = state.tally.measurements;
        for row in &matrix.rows {
            if !scope.contains(&row.sample) {
                state.tally.warn(Warning::JoinMismatch {
                    sample: row.sample.clone(),
                    matrix: name.clone(),
                });
                continue;
            }
            for (gene, cell) in matrix.genes.iter().zip(&row.cells) {
                if gene.is_empty() || is_null_token(cell) {
                    continue;
                }
                match parse_decimal(cell) {
                    Some(value) => {
                        state.measurement(self.ids, &row.sample, gene, Some(value));
                    }
                    None => state.tally.warn(Warning::FieldParse {
                        line: row.line,
                        field: gene.clone(),
                        value: cell.clone(),
                    }),
                }
            }
        }
        debug!(
            matrix = %name,
            measurements = state.tally.measurements - before,
            "expression matrix joined"
        );
        state
    }
}
