//! Heuristic mapping of raw field values onto closed categories.

use regex::Regex;

use crate::config::{CellLinePrefix, ResolvedConfig};
use crate::domain::{
    CulturePhase, ProcessType, ProductClass, ProductivityBands, ProductivityTier,
};
use crate::metadata::parse_decimal;

/// One product-type pattern class. Matchers run in the order they are stored.
#[derive(Debug, Clone)]
pub enum ProductMatcher {
    /// Symbol-shaped values, except those spelling a term another class owns.
    GeneSymbol { pattern: Regex, reserved: Vec<String> },
    AntibodyTerms(Vec<String>),
    ControlTerms(Vec<String>),
}

impl ProductMatcher {
    pub fn try_match(&self, value: &str) -> Option<ProductClass> {
        match self {
            ProductMatcher::GeneSymbol { pattern, reserved } => {
                (pattern.is_match(value) && !contains_term(reserved, value))
                    .then(|| ProductClass::Gene(value.to_string()))
            }
            ProductMatcher::AntibodyTerms(terms) => {
                contains_term(terms, value).then_some(ProductClass::Antibody)
            }
            ProductMatcher::ControlTerms(terms) => {
                contains_term(terms, value).then_some(ProductClass::Control)
            }
        }
    }
}

fn contains_term(terms: &[String], value: &str) -> bool {
    let needle = value.to_lowercase();
    terms.iter().any(|term| *term == needle)
}

/// Outcome of reading a productivity field that was present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Productivity {
    Category(ProductivityTier),
    Measured { tier: ProductivityTier, value: f64 },
    Unrecognized,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    matchers: Vec<ProductMatcher>,
    bands: ProductivityBands,
    cell_line_prefixes: Vec<CellLinePrefix>,
}

impl Classifier {
    pub fn new(config: &ResolvedConfig) -> Self {
        let reserved = config
            .antibody_terms
            .iter()
            .chain(&config.control_terms)
            .cloned()
            .collect();
        Self {
            matchers: vec![
                ProductMatcher::GeneSymbol {
                    pattern: config.gene_symbol_pattern.clone(),
                    reserved,
                },
                ProductMatcher::AntibodyTerms(config.antibody_terms.clone()),
                ProductMatcher::ControlTerms(config.control_terms.clone()),
            ],
            bands: config.productivity_bands,
            cell_line_prefixes: config.cell_line_prefixes.clone(),
        }
    }

    /// Case-insensitive exact match; anything else is `Unknown`.
    pub fn process_type(&self, raw: &str) -> ProcessType {
        match raw.trim().to_lowercase().as_str() {
            "batch" => ProcessType::Batch,
            "fedbatch" => ProcessType::FedBatch,
            "perfusion" => ProcessType::Perfusion,
            _ => ProcessType::Unknown,
        }
    }

    pub fn productivity(&self, raw: &str) -> Productivity {
        if let Some(tier) = ProductivityTier::from_label(raw) {
            return Productivity::Category(tier);
        }
        match parse_decimal(raw) {
            Some(value) => Productivity::Measured {
                tier: self.bands.tier_for(value),
                value,
            },
            None => Productivity::Unrecognized,
        }
    }

    /// First matching pattern class wins; no match is `Unknown`.
    pub fn product_type(&self, raw: &str) -> ProductClass {
        let value = raw.trim();
        if value.is_empty() {
            return ProductClass::Unknown;
        }
        self.matchers
            .iter()
            .find_map(|matcher| matcher.try_match(value))
            .unwrap_or(ProductClass::Unknown)
    }

    pub fn culture_phase(&self, raw: &str) -> CulturePhase {
        let value = raw.to_lowercase();
        if value.contains("stat") {
            CulturePhase::Stationary
        } else if value.contains("exp") || value.contains("log") {
            CulturePhase::Exponential
        } else {
            CulturePhase::Other
        }
    }

    /// Subclass name for a cell line whose name starts with a configured prefix.
    pub fn cell_line_class(&self, name: &str) -> Option<&str> {
        let upper = name.trim().to_uppercase();
        self.cell_line_prefixes
            .iter()
            .find(|entry| upper.starts_with(&entry.prefix.trim().to_uppercase()))
            .map(|entry| entry.class.as_str())
    }
}
