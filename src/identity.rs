//! Canonical node identifiers.
//!
//! Every instance IRI is `<project namespace><kind>_<fragment>` where the fragment is
//! the raw identifier passed through [`iri_safe`]. The mapping is pure: the same raw
//! text always yields the same IRI. It is not injective; `"CHO K1"` and `"CHO-K1"`
//! differ, but `"CHO K1"` and `"CHO/K1"` both become `CHO_K1`.

use crate::vocab::Namespaces;

pub const EMPTY_FRAGMENT: &str = "EMPTY";
pub const ANTIBODY_PRODUCT_GENE: &str = "AntibodyProductGene";

/// Replaces every character that is not alphanumeric, `_` or `-` with `_`.
///
/// Surrounding whitespace is trimmed first; case and digits are kept as-is. An empty
/// input yields [`EMPTY_FRAGMENT`].
pub fn iri_safe(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return EMPTY_FRAGMENT.to_string();
    }
    trimmed
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Mints instance IRIs under the configured project namespace.
#[derive(Debug, Clone, Copy)]
pub struct NodeIds<'a> {
    ns: &'a Namespaces,
}

impl<'a> NodeIds<'a> {
    pub fn new(ns: &'a Namespaces) -> Self {
        Self { ns }
    }

    pub fn namespaces(&self) -> &'a Namespaces {
        self.ns
    }

    fn mint(&self, kind: &str, raw: &str) -> String {
        self.ns.mcbo(&format!("{kind}_{}", iri_safe(raw)))
    }

    pub fn run(&self, run_id: &str) -> String {
        self.mint("run", run_id)
    }

    pub fn system(&self, run_id: &str) -> String {
        self.mint("system", run_id)
    }

    pub fn condition_quality(&self, run_id: &str) -> String {
        self.mint("culture_condition_quality", run_id)
    }

    pub fn sample(&self, sample_id: &str) -> String {
        self.mint("sample", sample_id)
    }

    pub fn cell_line(&self, name: &str) -> String {
        self.mint("cellline", name)
    }

    pub fn clone_line(&self, clone_id: &str) -> String {
        self.mint("clone", clone_id)
    }

    pub fn medium(&self, name: &str) -> String {
        self.mint("medium", name)
    }

    pub fn phase(&self, run_id: &str) -> String {
        self.mint("phase", run_id)
    }

    pub fn productivity(&self, run_id: &str) -> String {
        self.mint("productivity", run_id)
    }

    pub fn viability(&self, sample_id: &str) -> String {
        self.mint("viability", sample_id)
    }

    pub fn product(&self, run_id: &str) -> String {
        self.mint("product", run_id)
    }

    pub fn quality(&self, run_id: &str, quality_type: &str) -> String {
        self.ns.mcbo(&format!(
            "quality_{}_{}",
            iri_safe(run_id),
            iri_safe(quality_type)
        ))
    }

    pub fn glutamine(&self, run_id: &str) -> String {
        self.mint("glutamine", run_id)
    }

    pub fn gene(&self, symbol: &str) -> String {
        self.mint("gene", symbol)
    }

    pub fn antibody_gene(&self) -> String {
        self.ns.mcbo(ANTIBODY_PRODUCT_GENE)
    }

    pub fn expression(&self, sample_id: &str, symbol: &str) -> String {
        self.ns.mcbo(&format!(
            "expr_{}_{}",
            iri_safe(sample_id),
            iri_safe(symbol)
        ))
    }
}
