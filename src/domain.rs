use std::fmt;

use serde::{Deserialize, Serialize};

use crate::vocab::class;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessType {
    Batch,
    FedBatch,
    Perfusion,
    Unknown,
}

impl ProcessType {
    pub const ALL: [ProcessType; 4] = [
        ProcessType::Batch,
        ProcessType::FedBatch,
        ProcessType::Perfusion,
        ProcessType::Unknown,
    ];

    pub fn class_name(self) -> &'static str {
        match self {
            ProcessType::Batch => class::BATCH_CULTURE_PROCESS,
            ProcessType::FedBatch => class::FED_BATCH_CULTURE_PROCESS,
            ProcessType::Perfusion => class::PERFUSION_CULTURE_PROCESS,
            ProcessType::Unknown => class::UNKNOWN_CULTURE_PROCESS,
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessType::Batch => write!(f, "Batch"),
            ProcessType::FedBatch => write!(f, "FedBatch"),
            ProcessType::Perfusion => write!(f, "Perfusion"),
            ProcessType::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProductivityTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ProductivityTier {
    /// Exact category label, compared without regard to case.
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(ProductivityTier::Low),
            "medium" => Some(ProductivityTier::Medium),
            "high" => Some(ProductivityTier::High),
            "veryhigh" => Some(ProductivityTier::VeryHigh),
            _ => None,
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            ProductivityTier::Low => class::LOW_PRODUCTIVITY,
            ProductivityTier::Medium => class::MEDIUM_PRODUCTIVITY,
            ProductivityTier::High => class::HIGH_PRODUCTIVITY,
            ProductivityTier::VeryHigh => class::VERY_HIGH_PRODUCTIVITY,
        }
    }
}

impl fmt::Display for ProductivityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductivityTier::Low => write!(f, "Low"),
            ProductivityTier::Medium => write!(f, "Medium"),
            ProductivityTier::High => write!(f, "High"),
            ProductivityTier::VeryHigh => write!(f, "VeryHigh"),
        }
    }
}

/// Lower bounds of the upper three productivity tiers. Values below `medium` are `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductivityBands {
    pub medium: f64,
    pub high: f64,
    pub very_high: f64,
}

impl ProductivityBands {
    pub fn tier_for(&self, value: f64) -> ProductivityTier {
        if value >= self.very_high {
            ProductivityTier::VeryHigh
        } else if value >= self.high {
            ProductivityTier::High
        } else if value >= self.medium {
            ProductivityTier::Medium
        } else {
            ProductivityTier::Low
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.medium.is_finite()
            && self.high.is_finite()
            && self.very_high.is_finite()
            && self.medium < self.high
            && self.high < self.very_high
    }
}

impl Default for ProductivityBands {
    fn default() -> Self {
        Self {
            medium: 10.0,
            high: 20.0,
            very_high: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CulturePhase {
    Exponential,
    Stationary,
    Other,
}

impl CulturePhase {
    pub fn class_name(self) -> &'static str {
        match self {
            CulturePhase::Exponential => class::EXPONENTIAL_PHASE,
            CulturePhase::Stationary => class::STATIONARY_PHASE,
            CulturePhase::Other => class::CULTURE_PHASE,
        }
    }
}

/// What a producer cell line makes, as far as gene-overexpression inference cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductClass {
    Gene(String),
    Antibody,
    Control,
    Unknown,
}
