use std::fs;

use assert_matches::assert_matches;

use mcbo_graph::config::{CellLinePrefix, Config, ConfigLoader};
use mcbo_graph::domain::{ProductivityBands, ProductivityTier};
use mcbo_graph::error::GraphError;

#[test]
fn config_file_overrides_namespaces_and_bands() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("mcbo-graph.json");
    fs::write(
        &path,
        r#"{
            "base_iri": "https://bioprocess.example/mcbo#",
            "productivity_bands": { "medium": 5.0, "high": 15.0, "very_high": 30.0 },
            "control_terms": ["  Mock  ", "mock"]
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(
        resolved.namespaces.mcbo("run_R1"),
        "https://bioprocess.example/mcbo#run_R1"
    );
    assert_eq!(resolved.productivity_bands.tier_for(16.0), ProductivityTier::High);
    assert_eq!(resolved.control_terms, vec!["mock".to_string()]);
    assert!(!resolved.antibody_terms.is_empty());
}

#[test]
fn missing_explicit_config_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();
    assert_matches!(err, GraphError::ConfigRead(_));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("broken.json");
    fs::write(&path, "{ \"base_iri\": ").unwrap();
    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();
    assert_matches!(err, GraphError::ConfigParse(_));
}

#[test]
fn namespace_must_be_an_absolute_terminated_iri() {
    for base in ["mcbo#", "http://example.org/mcbo", "http://example.org/a b#"] {
        let config = Config {
            base_iri: Some(base.to_string()),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, GraphError::InvalidNamespace(_), "{base}");
    }
}

#[test]
fn blank_cell_line_prefixes_are_dropped() {
    let config = Config {
        cell_line_prefixes: Some(vec![
            CellLinePrefix {
                prefix: "CHO".to_string(),
                class: "CHOCellLine".to_string(),
            },
            CellLinePrefix {
                prefix: " ".to_string(),
                class: "Empty".to_string(),
            },
        ]),
        productivity_bands: Some(ProductivityBands::default()),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.cell_line_prefixes.len(), 1);
    assert_eq!(resolved.cell_line_prefixes[0].prefix, "CHO");
}
