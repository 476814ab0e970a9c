//! Fixed vocabulary of the instance graph.
//!
//! Class and property names are local names under the project namespace; the four
//! OBO relations are local names under the OBO namespace. Both bases come from the
//! resolved configuration through [`Namespaces`].

use crate::error::GraphError;

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

pub const DEFAULT_MCBO_IRI: &str = "http://example.org/mcbo#";
pub const DEFAULT_OBO_IRI: &str = "http://purl.obolibrary.org/obo/";

/// Relations from the shared OBO relation vocabulary.
pub mod obo {
    pub const HAS_PART: &str = "BFO_0000051";
    pub const HAS_PARTICIPANT: &str = "RO_0000057";
    pub const HAS_QUALITY: &str = "RO_0000086";
    pub const IS_ABOUT: &str = "IAO_0000136";
}

pub mod class {
    pub const BATCH_CULTURE_PROCESS: &str = "BatchCultureProcess";
    pub const FED_BATCH_CULTURE_PROCESS: &str = "FedBatchCultureProcess";
    pub const PERFUSION_CULTURE_PROCESS: &str = "PerfusionCultureProcess";
    pub const UNKNOWN_CULTURE_PROCESS: &str = "UnknownCultureProcess";
    pub const CELL_CULTURE_SYSTEM: &str = "CellCultureSystem";
    pub const CULTURE_CONDITION_QUALITY: &str = "CultureConditionQuality";
    pub const BIOPROCESS_SAMPLE: &str = "BioprocessSample";
    pub const CELL_LINE: &str = "CellLine";
    pub const CLONE: &str = "Clone";
    pub const CULTURE_MEDIUM: &str = "CultureMedium";
    pub const CULTURE_PHASE: &str = "CulturePhase";
    pub const EXPONENTIAL_PHASE: &str = "ExponentialPhase";
    pub const STATIONARY_PHASE: &str = "StationaryPhase";
    pub const LOW_PRODUCTIVITY: &str = "LowProductivity";
    pub const MEDIUM_PRODUCTIVITY: &str = "MediumProductivity";
    pub const HIGH_PRODUCTIVITY: &str = "HighProductivity";
    pub const VERY_HIGH_PRODUCTIVITY: &str = "VeryHighProductivity";
    pub const CELL_VIABILITY_MEASUREMENT: &str = "CellViabilityMeasurement";
    pub const THERAPEUTIC_PROTEIN: &str = "TherapeuticProtein";
    pub const QUALITY_MEASUREMENT: &str = "QualityMeasurement";
    pub const GLUTAMINE_CONCENTRATION: &str = "GlutamineConcentration";
    pub const NUTRIENT_CONCENTRATION: &str = "NutrientConcentration";
    pub const GENE: &str = "Gene";
    pub const GENE_EXPRESSION_MEASUREMENT: &str = "GeneExpressionMeasurement";
}

pub mod prop {
    pub const HAS_PROCESS_OUTPUT: &str = "hasProcessOutput";
    pub const USES_CELL_LINE: &str = "usesCellLine";
    pub const HAS_CLONE: &str = "hasClone";
    pub const HAS_TEMPERATURE: &str = "hasTemperature";
    pub const HAS_PH: &str = "hasPH";
    pub const HAS_DISSOLVED_OXYGEN: &str = "hasDissolvedOxygen";
    pub const IN_CULTURE_PHASE: &str = "inCulturePhase";
    pub const HAS_PRODUCTIVITY_MEASUREMENT: &str = "hasProductivityMeasurement";
    pub const HAS_PRODUCTIVITY_CATEGORY: &str = "hasProductivityCategory";
    pub const HAS_PRODUCTIVITY_VALUE: &str = "hasProductivityValue";
    pub const HAS_COLLECTION_DAY: &str = "hasCollectionDay";
    pub const HAS_CELL_VIABILITY_MEASUREMENT: &str = "hasCellViabilityMeasurement";
    pub const HAS_VIABLE_CELL_DENSITY: &str = "hasViableCellDensity";
    pub const HAS_VIABILITY_PERCENTAGE: &str = "hasViabilityPercentage";
    pub const HAS_PRODUCT: &str = "hasProduct";
    pub const HAS_TITER_VALUE: &str = "hasTiterValue";
    pub const HAS_QUALITY_MEASUREMENT: &str = "hasQualityMeasurement";
    pub const HAS_NUTRIENT_CONCENTRATION: &str = "hasNutrientConcentration";
    pub const HAS_CONCENTRATION_VALUE: &str = "hasConcentrationValue";
    pub const HAS_CONCENTRATION_UNIT: &str = "hasConcentrationUnit";
    pub const HAS_GENE_EXPRESSION: &str = "hasGeneExpression";
    pub const HAS_EXPRESSION_VALUE: &str = "hasExpressionValue";
    pub const HAS_ENSEMBL_GENE_ID: &str = "hasEnsemblGeneID";
    pub const OVEREXPRESSES_GENE: &str = "overexpressesGene";
    pub const PRODUCES_PRODUCT: &str = "producesProduct";
}

/// Namespace bases for minted IRIs. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespaces {
    mcbo: String,
    obo: String,
}

impl Namespaces {
    pub fn new(mcbo: &str, obo: &str) -> Result<Self, GraphError> {
        Ok(Self {
            mcbo: validate_base(mcbo)?,
            obo: validate_base(obo)?,
        })
    }

    pub fn mcbo(&self, local: &str) -> String {
        format!("{}{local}", self.mcbo)
    }

    pub fn obo(&self, local: &str) -> String {
        format!("{}{local}", self.obo)
    }

    /// Prefix table used when writing Turtle, in output order.
    pub fn prefixes(&self) -> Vec<(String, String)> {
        vec![
            ("rdf".to_string(), RDF_NS.to_string()),
            ("rdfs".to_string(), RDFS_NS.to_string()),
            ("xsd".to_string(), XSD_NS.to_string()),
            ("owl".to_string(), OWL_NS.to_string()),
            ("obo".to_string(), self.obo.clone()),
            ("mcbo".to_string(), self.mcbo.clone()),
        ]
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Self {
            mcbo: DEFAULT_MCBO_IRI.to_string(),
            obo: DEFAULT_OBO_IRI.to_string(),
        }
    }
}

fn validate_base(value: &str) -> Result<String, GraphError> {
    let trimmed = value.trim();
    let has_scheme = trimmed
        .split_once(':')
        .map(|(scheme, _)| {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
        })
        .unwrap_or(false);
    let terminated = trimmed.ends_with('#') || trimmed.ends_with('/');
    let clean = !trimmed
        .chars()
        .any(|ch| ch.is_whitespace() || matches!(ch, '<' | '>' | '"' | '{' | '}'));
    if !has_scheme || !terminated || !clean {
        return Err(GraphError::InvalidNamespace(value.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn default_namespaces_mint_iris() {
        let ns = Namespaces::default();
        assert_eq!(
            ns.mcbo(class::BIOPROCESS_SAMPLE),
            "http://example.org/mcbo#BioprocessSample"
        );
        assert_eq!(
            ns.obo(obo::HAS_PARTICIPANT),
            "http://purl.obolibrary.org/obo/RO_0000057"
        );
    }

    #[test]
    fn rejects_unterminated_base() {
        let err = Namespaces::new("http://example.org/mcbo", DEFAULT_OBO_IRI).unwrap_err();
        assert_matches!(err, GraphError::InvalidNamespace(_));
    }

    #[test]
    fn rejects_base_without_scheme() {
        let err = Namespaces::new("example.org/mcbo#", DEFAULT_OBO_IRI).unwrap_err();
        assert_matches!(err, GraphError::InvalidNamespace(_));
    }
}
