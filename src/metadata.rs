//! Header-driven metadata tables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::GraphError;

pub mod column {
    pub const RUN_ACCESSION: &str = "RunAccession";
    pub const SAMPLE_ACCESSION: &str = "SampleAccession";
    pub const CELL_LINE: &str = "CellLine";
    pub const PROCESS_TYPE: &str = "ProcessType";
    pub const TEMPERATURE: &str = "Temperature";
    pub const PH: &[&str] = &["pH", "PH"];
    pub const DISSOLVED_OXYGEN: &[&str] = &["DissolvedOxygen", "DO"];
    pub const MEDIUM: &[&str] = &["CultureMedium", "Medium"];
    pub const CULTURE_PHASE: &str = "CulturePhase";
    pub const PRODUCTIVITY: &str = "Productivity";
    pub const COLLECTION_DAY: &str = "CollectionDay";
    pub const VIABLE_CELL_DENSITY: &str = "ViableCellDensity";
    pub const VIABILITY_PERCENTAGE: &str = "ViabilityPercentage";
    pub const CLONE_ID: &str = "CloneID";
    pub const GENE_SYMBOL: &str = "GeneSymbol";
    pub const EXPRESSION_VALUE: &str = "ExpressionValue";
    pub const ENSEMBL_GENE_ID: &str = "EnsemblGeneID";
    pub const TITER_VALUE: &str = "TiterValue";
    pub const QUALITY_TYPE: &str = "QualityType";
    pub const GLUTAMINE_CONCENTRATION: &str = "GlutamineConcentration";
    pub const PRODUCER: &str = "Producer";
    pub const PRODUCT_TYPE: &str = "ProductType";
    pub const OVEREXPRESSED_GENE: &[&str] = &[
        "OverexpressedGene",
        "OverexpressedGenes",
        "EngineeringGene",
        "EngineeringGenes",
        "OverexpressesGene",
        "OverexpressesGenes",
    ];
}

const NULL_TOKENS: [&str; 6] = ["", "na", "n/a", "nan", "null", "none"];

/// True for blank cells and the usual spreadsheet spellings of "missing".
pub fn is_null_token(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    NULL_TOKENS.contains(&lowered.as_str())
}

/// Finite decimal value of `value`, if it has one.
pub fn parse_decimal(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// One data row. Lookups are case-insensitive on the header name and return `None`
/// for null tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRow {
    line: usize,
    values: HashMap<String, String>,
}

impl MetadataRow {
    pub fn from_pairs<K: AsRef<str>, V: AsRef<str>>(line: usize, pairs: &[(K, V)]) -> Self {
        let values = pairs
            .iter()
            .map(|(key, value)| {
                (
                    key.as_ref().trim().to_lowercase(),
                    value.as_ref().trim().to_string(),
                )
            })
            .collect();
        Self { line, values }
    }

    /// Line number in the source file, counting the header as line 1.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(&column.to_lowercase())
            .map(String::as_str)
            .filter(|value| !is_null_token(value))
    }

    pub fn first_of(&self, columns: &[&str]) -> Option<&str> {
        columns.iter().find_map(|column| self.get(column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct MetadataTable {
    pub source: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<MetadataRow>,
    pub rejected: Vec<RejectedRecord>,
}

impl MetadataTable {
    /// Reads a CSV file with a header row. Records that cannot be decoded are kept as
    /// [`RejectedRecord`]s rather than failing the whole table.
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

        let headers = reader
            .headers()
            .map_err(|err| table_error(path, err))?
            .iter()
            .map(|header| header.trim_start_matches('\u{feff}').to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        let mut rejected = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let line = index + 2;
            match record {
                Ok(record) => rows.push(row_from_record(line, &headers, &record)),
                Err(err) => rejected.push(RejectedRecord {
                    line: err.position().map(|pos| pos.line() as usize).unwrap_or(line),
                    message: err.to_string(),
                }),
            }
        }

        Ok(Self {
            source: path.to_path_buf(),
            headers,
            rows,
            rejected,
        })
    }

    pub fn from_rows(source: PathBuf, headers: Vec<String>, rows: Vec<MetadataRow>) -> Self {
        Self {
            source,
            headers,
            rows,
            rejected: Vec::new(),
        }
    }
}

fn row_from_record(line: usize, headers: &[String], record: &StringRecord) -> MetadataRow {
    let pairs = headers
        .iter()
        .zip(record.iter())
        .map(|(header, value)| (header.as_str(), value))
        .collect::<Vec<_>>();
    MetadataRow::from_pairs(line, &pairs)
}

pub(crate) fn table_error(path: &Path, err: csv::Error) -> GraphError {
    GraphError::TableRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
