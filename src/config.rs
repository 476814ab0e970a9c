use std::fs;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::ProductivityBands;
use crate::error::GraphError;
use crate::vocab::{DEFAULT_MCBO_IRI, DEFAULT_OBO_IRI, Namespaces};

pub const DEFAULT_CONFIG_FILE: &str = "mcbo-graph.json";
pub const DEFAULT_GENE_SYMBOL_PATTERN: &str = r"^[A-Z][A-Z0-9]{1,9}(-[A-Z0-9]{1,4})?$";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub base_iri: Option<String>,
    #[serde(default)]
    pub obo_iri: Option<String>,
    #[serde(default)]
    pub cell_line_prefixes: Option<Vec<CellLinePrefix>>,
    #[serde(default)]
    pub productivity_bands: Option<ProductivityBands>,
    #[serde(default)]
    pub gene_symbol_pattern: Option<String>,
    #[serde(default)]
    pub antibody_terms: Option<Vec<String>>,
    #[serde(default)]
    pub control_terms: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CellLinePrefix {
    pub prefix: String,
    pub class: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub namespaces: Namespaces,
    pub cell_line_prefixes: Vec<CellLinePrefix>,
    pub productivity_bands: ProductivityBands,
    pub gene_symbol_pattern: Regex,
    pub antibody_terms: Vec<String>,
    pub control_terms: Vec<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            namespaces: Namespaces::default(),
            cell_line_prefixes: default_cell_line_prefixes(),
            productivity_bands: ProductivityBands::default(),
            gene_symbol_pattern: default_gene_symbol_pattern(),
            antibody_terms: default_antibody_terms(),
            control_terms: default_control_terms(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `mcbo-graph.json` from the working directory when no path is given.
    ///
    /// A missing default file falls back to built-in defaults; a missing explicit path is
    /// an error.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, GraphError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| GraphError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| GraphError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, GraphError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let namespaces = Namespaces::new(
            config.base_iri.as_deref().unwrap_or(DEFAULT_MCBO_IRI),
            config.obo_iri.as_deref().unwrap_or(DEFAULT_OBO_IRI),
        )?;

        let productivity_bands = config.productivity_bands.unwrap_or_default();
        if !productivity_bands.is_ordered() {
            return Err(GraphError::ConfigParse(format!(
                "productivity bands must be strictly increasing: {productivity_bands:?}"
            )));
        }

        let gene_symbol_pattern = match config.gene_symbol_pattern {
            Some(pattern) => Regex::new(&pattern)
                .map_err(|err| GraphError::InvalidPattern(format!("{pattern}: {err}")))?,
            None => default_gene_symbol_pattern(),
        };

        let cell_line_prefixes = config
            .cell_line_prefixes
            .unwrap_or_else(default_cell_line_prefixes)
            .into_iter()
            .filter(|entry| !entry.prefix.trim().is_empty() && !entry.class.trim().is_empty())
            .collect();

        Ok(ResolvedConfig {
            schema_version,
            namespaces,
            cell_line_prefixes,
            productivity_bands,
            gene_symbol_pattern,
            antibody_terms: normalize_terms(
                config.antibody_terms.unwrap_or_else(default_antibody_terms),
            ),
            control_terms: normalize_terms(
                config.control_terms.unwrap_or_else(default_control_terms),
            ),
        })
    }
}

fn normalize_terms(terms: Vec<String>) -> Vec<String> {
    let mut out = terms
        .into_iter()
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>();
    out.sort();
    out.dedup();
    out
}

fn default_gene_symbol_pattern() -> Regex {
    Regex::new(DEFAULT_GENE_SYMBOL_PATTERN).expect("built-in gene symbol pattern compiles")
}

pub fn default_cell_line_prefixes() -> Vec<CellLinePrefix> {
    vec![
        CellLinePrefix {
            prefix: "CHO".to_string(),
            class: "CHOCellLine".to_string(),
        },
        CellLinePrefix {
            prefix: "HEK293".to_string(),
            class: "HEK293CellLine".to_string(),
        },
        CellLinePrefix {
            prefix: "HEK-293".to_string(),
            class: "HEK293CellLine".to_string(),
        },
    ]
}

pub fn default_antibody_terms() -> Vec<String> {
    ["mab", "bsab", "antibody", "igg", "igg1", "igg2", "igg4", "fab", "scfv"]
        .iter()
        .map(|term| term.to_string())
        .collect()
}

pub fn default_control_terms() -> Vec<String> {
    [
        "control",
        "none",
        "mock",
        "parental",
        "empty vector",
        "no product",
    ]
    .iter()
    .map(|term| term.to_string())
    .collect()
}
