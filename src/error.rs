use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("required input not found: {}", .0.display())]
    #[diagnostic(help("check the path; missing inputs abort the whole run"))]
    MissingInput(PathBuf),

    #[error("failed to read config file at {}", .0.display())]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid gene symbol pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid namespace IRI: {0}")]
    InvalidNamespace(String),

    #[error("failed to read table {}: {message}", path.display())]
    TableRead { path: PathBuf, message: String },

    #[error("expression matrix {} has no sample id column", .0.display())]
    EmptyMatrix(PathBuf),

    #[error("failed to parse Turtle in {}: {message}", path.display())]
    TurtleParse { path: PathBuf, message: String },

    #[error("failed to parse identity index {}: {message}", path.display())]
    #[diagnostic(help("delete the index to rebuild it from the next add-study run"))]
    IndexParse { path: PathBuf, message: String },

    #[error("conflicting options: {0}")]
    ConflictingOptions(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
