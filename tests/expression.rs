use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use assert_matches::assert_matches;

use mcbo_graph::builder::{BuildState, EntityBuilder};
use mcbo_graph::config::ResolvedConfig;
use mcbo_graph::expression::{ExpressionIntegrator, ExpressionMatrix};
use mcbo_graph::graph::{Literal, Term};
use mcbo_graph::metadata::{MetadataRow, MetadataTable};
use mcbo_graph::report::Warning;
use mcbo_graph::vocab::{RDF_TYPE, class, obo, prop};

const HEADERS: [&str; 4] = ["RunAccession", "SampleAccession", "CellLine", "ProcessType"];

fn metadata(samples: &[&str]) -> MetadataTable {
    let rows = samples
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            let values = ["R1", *sample, "CHO-K1", "FedBatch"];
            let pairs = HEADERS
                .iter()
                .zip(values.iter())
                .map(|(header, value)| (*header, *value))
                .collect::<Vec<_>>();
            MetadataRow::from_pairs(index + 2, &pairs)
        })
        .collect();
    MetadataTable::from_rows(
        PathBuf::from("metadata.csv"),
        HEADERS.iter().map(|header| header.to_string()).collect(),
        rows,
    )
}

fn matrix(content: &str) -> (tempfile::TempDir, ExpressionMatrix) {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("expression_matrix.csv");
    fs::write(&path, content).unwrap();
    let matrix = ExpressionMatrix::read(&path).unwrap();
    (temp, matrix)
}

fn integrate(config: &ResolvedConfig, samples: &[&str], content: &str) -> BuildState {
    let state = EntityBuilder::new(config).build(&metadata(samples), BuildState::new());
    let (_temp, matrix) = matrix(content);
    let scope = state.samples.clone();
    ExpressionIntegrator::new(config).integrate(&matrix, &scope, state)
}

#[test]
fn one_measurement_per_sample_and_gene() {
    let config = ResolvedConfig::default();
    let ns = &config.namespaces;
    let state = integrate(&config, &["S1"], "SampleAccession,A,B\nS1,10,20\n");

    let measurements = state
        .graph
        .instances_of(&ns.mcbo(class::GENE_EXPRESSION_MEASUREMENT));
    assert_eq!(measurements.len(), 2);
    assert_eq!(state.tally.measurements, 2);

    let linked = state
        .graph
        .objects(&ns.mcbo("sample_S1"), &ns.mcbo(prop::HAS_GENE_EXPRESSION));
    assert_eq!(linked.len(), 2);

    for (gene, value) in [("A", 10.0), ("B", 20.0)] {
        let measurement = ns.mcbo(&format!("expr_S1_{gene}"));
        assert_eq!(
            state
                .graph
                .objects(&measurement, &ns.mcbo(prop::HAS_EXPRESSION_VALUE)),
            vec![&Term::from(Literal::decimal(value))]
        );
        let gene_iri = ns.mcbo(&format!("gene_{gene}"));
        assert!(
            state
                .graph
                .has_link(&measurement, &ns.obo(obo::IS_ABOUT), &gene_iri)
        );
        assert!(state.graph.has_link(&gene_iri, RDF_TYPE, &ns.mcbo(class::GENE)));
    }
    assert!(state.tally.warnings.is_empty());
}

#[test]
fn unknown_sample_is_reported_and_not_materialized() {
    let config = ResolvedConfig::default();
    let ns = &config.namespaces;
    let state = integrate(&config, &["S1"], "SampleAccession,A\nS1,1.5\nS9,2.5\n");

    assert_matches!(
        state.tally.warnings.as_slice(),
        [Warning::JoinMismatch { sample, .. }] if sample == "S9"
    );
    let s9 = ns.mcbo("sample_S9");
    assert!(
        state
            .graph
            .iter()
            .all(|triple| triple.subject.as_iri() != Some(s9.as_str()))
    );
    assert_eq!(state.tally.measurements, 1);
}

#[test]
fn integrating_the_same_matrix_twice_adds_nothing() {
    let config = ResolvedConfig::default();
    let state = EntityBuilder::new(&config).build(&metadata(&["S1", "S2"]), BuildState::new());
    let (_temp, matrix) = matrix("SampleAccession,A,B\nS1,1,2\nS2,3,4\n");
    let scope = state.samples.clone();
    let integrator = ExpressionIntegrator::new(&config);

    let once = integrator.integrate(&matrix, &scope, state);
    let triples = once.graph.len();
    let twice = integrator.integrate(&matrix, &scope, once);
    assert_eq!(twice.graph.len(), triples);
    assert_eq!(twice.tally.measurements, 4);
}

#[test]
fn blank_and_null_cells_are_skipped_and_text_is_a_warning() {
    let config = ResolvedConfig::default();
    let ns = &config.namespaces;
    let state = integrate(&config, &["S1"], "SampleAccession,A,B,C,D\nS1,,NA,high,0.5\n");

    assert_eq!(state.tally.measurements, 1);
    assert!(state.graph.has_link(
        &ns.mcbo("sample_S1"),
        &ns.mcbo(prop::HAS_GENE_EXPRESSION),
        &ns.mcbo("expr_S1_D"),
    ));
    assert_matches!(
        state.tally.warnings.as_slice(),
        [Warning::FieldParse { line: 2, field, value }] if field == "C" && value == "high"
    );
}

#[test]
fn matrix_without_header_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("empty.csv");
    fs::write(&path, "").unwrap();
    assert_matches!(
        ExpressionMatrix::read(&path),
        Err(mcbo_graph::error::GraphError::EmptyMatrix(_))
    );
}

#[test]
fn scope_is_unaffected_by_measurements() {
    let config = ResolvedConfig::default();
    let state = EntityBuilder::new(&config).build(&metadata(&["S1"]), BuildState::new());
    let (_temp, matrix) = matrix("SampleAccession,A\nS1,4\n");
    let scope = BTreeSet::from(["S1".to_string()]);
    let state = ExpressionIntegrator::new(&config).integrate(&matrix, &scope, state);
    assert_eq!(state.samples, scope);
}
