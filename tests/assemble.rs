use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use mcbo_graph::app::{
    AddStudyRequest, BootstrapRequest, BuildRequest, ExpressionSource, GraphAssembler,
    MergeRequest, ProgressEvent, ProgressSink,
};
use mcbo_graph::config::ResolvedConfig;
use mcbo_graph::error::GraphError;
use mcbo_graph::graph::Term;
use mcbo_graph::output::JsonOutput;
use mcbo_graph::store::IdentityIndex;
use mcbo_graph::turtle::read_turtle;
use mcbo_graph::vocab::{RDF_TYPE, class};

const SCHEMA: &str = "\
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix mcbo: <http://example.org/mcbo#> .

mcbo:CellLine a owl:Class ;
    rdfs:label \"cell line\" .
mcbo:Gene a owl:Class .
";

const SCHEMA_TRIPLES: usize = 3;

const METADATA: &str = "\
RunAccession,SampleAccession,CellLine,ProcessType,Temperature,Producer,ProductType
R1,S1,CHO-K1,Batch,37,true,EPO
R1,S2,CHO-K1,Batch,37,true,EPO
R2,S3,HEK293,FedBatch,36.5,false,
";

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

struct Workspace {
    _temp: tempfile::TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        fs::write(root.join("schema.ttl"), SCHEMA).unwrap();
        Self { _temp: temp, root }
    }

    fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    fn write(&self, name: &str, content: &str) -> Utf8PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn bootstrap_request(&self, expression: ExpressionSource) -> BootstrapRequest {
        BootstrapRequest {
            metadata: self.path("sample_metadata.csv"),
            schema: self.path("schema.ttl"),
            output: self.path("out/graph.ttl"),
            instances: None,
            expression,
        }
    }
}

fn read(path: &Utf8Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn bootstrap_is_deterministic() {
    let workspace = Workspace::new();
    workspace.write("sample_metadata.csv", METADATA);
    fs::create_dir_all(workspace.path("out")).unwrap();
    let config = ResolvedConfig::default();
    let assembler = GraphAssembler::new(&config);
    let request = workspace.bootstrap_request(ExpressionSource::None);

    let first = assembler.bootstrap(&request, &JsonOutput).unwrap();
    let graph = read(&request.output);
    let instances = read(&workspace.path("out/mcbo-instances.ttl"));

    let second = assembler.bootstrap(&request, &JsonOutput).unwrap();
    assert_eq!(read(&request.output), graph);
    assert_eq!(read(&workspace.path("out/mcbo-instances.ttl")), instances);
    assert_eq!(first.output_triples, second.output_triples);
    assert_eq!(first.output_triples, first.instance_triples + SCHEMA_TRIPLES);
    assert_eq!(first.rows.processed, 3);
    assert_eq!(first.process_types.get("Batch"), Some(&2));
    assert_eq!(first.process_types.get("FedBatch"), Some(&1));
    assert!(graph.contains("mcbo:Gene\n    a owl:Class"));
}

#[test]
fn missing_metadata_aborts_before_writing() {
    let workspace = Workspace::new();
    let config = ResolvedConfig::default();
    let request = workspace.bootstrap_request(ExpressionSource::None);

    let err = GraphAssembler::new(&config)
        .bootstrap(&request, &JsonOutput)
        .unwrap_err();
    assert_matches!(err, GraphError::MissingInput(_));
    assert!(!request.output.exists());
}

#[test]
fn matrix_and_directory_are_mutually_exclusive() {
    let err = ExpressionSource::from_options(
        Some(Utf8PathBuf::from("matrix.csv")),
        Some(Utf8PathBuf::from("expression")),
    )
    .unwrap_err();
    assert_matches!(err, GraphError::ConflictingOptions(_));
}

#[test]
fn bootstrap_joins_every_matrix_in_a_directory() {
    let workspace = Workspace::new();
    workspace.write("sample_metadata.csv", METADATA);
    workspace.write("expression/a.csv", "SampleAccession,GAPDH\nS1,5.5\nS2,6\n");
    workspace.write("expression/b.csv", "SampleAccession,ACTB\nS3,1\nS7,2\n");
    fs::create_dir_all(workspace.path("out")).unwrap();
    let config = ResolvedConfig::default();
    let request =
        workspace.bootstrap_request(ExpressionSource::Directory(workspace.path("expression")));
    let sink = RecordingSink::default();

    let summary = GraphAssembler::new(&config).bootstrap(&request, &sink).unwrap();
    assert_eq!(summary.measurements, 3);
    assert_eq!(summary.warnings.join_mismatch, 1);

    let messages = sink.messages.lock().unwrap();
    assert_eq!(
        messages
            .iter()
            .filter(|message| message.starts_with("phase=Expression"))
            .count(),
        2
    );
    assert!(messages.last().unwrap().starts_with("phase=Done"));
}

#[test]
fn build_scopes_each_matrix_to_its_study() {
    let workspace = Workspace::new();
    workspace.write(
        "studies/b_study/sample_metadata.csv",
        "RunAccession,SampleAccession,CellLine,ProcessType\nRB,SB1,HEK293,Perfusion\n",
    );
    workspace.write(
        "studies/b_study/expression_matrix.csv",
        "SampleAccession,ACTB\nSB1,3\n",
    );
    workspace.write(
        "studies/a_study/metadata.csv",
        "RunAccession,SampleAccession,CellLine,ProcessType\nRA,SA1,CHO-K1,Batch\n",
    );
    workspace.write(
        "studies/a_study/expression_matrix.csv",
        "SampleAccession,GAPDH\nSA1,1\nSB1,2\n",
    );
    workspace.write("studies/notes/readme.txt", "not a study");
    let config = ResolvedConfig::default();
    let ns = &config.namespaces;
    let request = BuildRequest {
        studies_dir: workspace.path("studies"),
        schema: workspace.path("schema.ttl"),
        instances: workspace.path("mcbo-instances.ttl"),
        output: workspace.path("graph.ttl"),
    };

    let summary = GraphAssembler::new(&config)
        .build(&request, &JsonOutput)
        .unwrap();
    assert_eq!(summary.studies, vec!["a_study", "b_study"]);
    assert_eq!(summary.rows.processed, 2);
    assert_eq!(summary.measurements, 2);
    assert_eq!(summary.warnings.join_mismatch, 1);

    let instances = read_turtle(request.instances.as_std_path(), "instances").unwrap();
    assert_eq!(instances.len(), summary.instance_triples);
    assert!(instances.has_link(
        &ns.mcbo("expr_SB1_ACTB"),
        RDF_TYPE,
        &ns.mcbo(class::GENE_EXPRESSION_MEASUREMENT),
    ));
    assert!(
        instances
            .objects(&ns.mcbo("expr_SB1_GAPDH"), RDF_TYPE)
            .is_empty()
    );
}

#[test]
fn adding_the_same_study_twice_changes_nothing() {
    let workspace = Workspace::new();
    let study = workspace.path("studies/s1");
    workspace.write("studies/s1/sample_metadata.csv", METADATA);
    workspace.write(
        "studies/s1/expression_matrix.csv",
        "SampleAccession,GAPDH\nS1,1\nS3,2\n",
    );
    let config = ResolvedConfig::default();
    let assembler = GraphAssembler::new(&config);
    let request = AddStudyRequest {
        study_dir: study,
        instances: workspace.path("mcbo-instances.ttl"),
    };

    let first = assembler.add_study(&request, &JsonOutput).unwrap();
    assert_eq!(first.triples_added, first.instance_triples);
    assert_eq!(first.measurements, 2);
    let written = read(&request.instances);

    let index = IdentityIndex::load(&IdentityIndex::path_for(&request.instances)).unwrap();
    assert_eq!(index.known_runs().len(), 2);
    assert_eq!(index.known_samples().len(), 3);

    let second = assembler.add_study(&request, &JsonOutput).unwrap();
    assert_eq!(second.triples_added, 0);
    assert_eq!(second.warnings.already_indexed, 3);
    assert_eq!(second.warnings.join_mismatch, 0);
    assert_eq!(second.rows.processed, 0);
    assert_eq!(second.instance_triples, first.instance_triples);
    assert_eq!(read(&request.instances), written);
}

#[test]
fn second_study_extends_the_instance_graph() {
    let workspace = Workspace::new();
    workspace.write("studies/s1/sample_metadata.csv", METADATA);
    workspace.write(
        "studies/s2/sample_metadata.csv",
        "RunAccession,SampleAccession,CellLine,ProcessType\nR9,S9,CHO-K1,Perfusion\n",
    );
    let config = ResolvedConfig::default();
    let ns = &config.namespaces;
    let assembler = GraphAssembler::new(&config);
    let instances = workspace.path("mcbo-instances.ttl");

    let first = assembler
        .add_study(
            &AddStudyRequest {
                study_dir: workspace.path("studies/s1"),
                instances: instances.clone(),
            },
            &JsonOutput,
        )
        .unwrap();
    let second = assembler
        .add_study(
            &AddStudyRequest {
                study_dir: workspace.path("studies/s2"),
                instances: instances.clone(),
            },
            &JsonOutput,
        )
        .unwrap();

    assert!(second.triples_added > 0);
    assert_eq!(
        second.instance_triples,
        first.instance_triples + second.triples_added
    );
    let graph = read_turtle(instances.as_std_path(), "instances").unwrap();
    assert!(graph.has_link(
        &ns.mcbo("run_R9"),
        RDF_TYPE,
        &ns.mcbo(class::PERFUSION_CULTURE_PROCESS),
    ));
    let index = IdentityIndex::load(&IdentityIndex::path_for(&instances)).unwrap();
    assert_eq!(
        index.studies.keys().cloned().collect::<Vec<_>>(),
        vec!["s1", "s2"]
    );
}

#[test]
fn index_without_instance_graph_is_discarded() {
    let workspace = Workspace::new();
    workspace.write("studies/s1/sample_metadata.csv", METADATA);
    let config = ResolvedConfig::default();
    let assembler = GraphAssembler::new(&config);
    let request = AddStudyRequest {
        study_dir: workspace.path("studies/s1"),
        instances: workspace.path("mcbo-instances.ttl"),
    };

    let first = assembler.add_study(&request, &JsonOutput).unwrap();
    fs::remove_file(&request.instances).unwrap();

    let again = assembler.add_study(&request, &JsonOutput).unwrap();
    assert_eq!(again.warnings.already_indexed, 0);
    assert_eq!(again.triples_added, first.triples_added);
    assert_eq!(again.rows.processed, 3);
}

#[test]
fn corrupt_index_is_reported() {
    let workspace = Workspace::new();
    workspace.write("studies/s1/sample_metadata.csv", METADATA);
    let config = ResolvedConfig::default();
    let assembler = GraphAssembler::new(&config);
    let request = AddStudyRequest {
        study_dir: workspace.path("studies/s1"),
        instances: workspace.path("mcbo-instances.ttl"),
    };
    assembler.add_study(&request, &JsonOutput).unwrap();
    fs::write(IdentityIndex::path_for(&request.instances), "{ not json").unwrap();

    let err = assembler.add_study(&request, &JsonOutput).unwrap_err();
    assert_matches!(err, GraphError::IndexParse { .. });
}

#[test]
fn merge_is_the_union_of_schema_and_instances() {
    let workspace = Workspace::new();
    workspace.write("sample_metadata.csv", METADATA);
    fs::create_dir_all(workspace.path("out")).unwrap();
    let config = ResolvedConfig::default();
    let assembler = GraphAssembler::new(&config);
    let built = assembler
        .bootstrap(
            &workspace.bootstrap_request(ExpressionSource::None),
            &JsonOutput,
        )
        .unwrap();

    let request = MergeRequest {
        schema: workspace.path("schema.ttl"),
        instances: workspace.path("out/mcbo-instances.ttl"),
        output: workspace.path("merged.ttl"),
    };
    let merged = assembler.merge(&request, &JsonOutput).unwrap();
    assert_eq!(merged.instance_triples, built.instance_triples);
    assert_eq!(merged.output_triples, SCHEMA_TRIPLES + built.instance_triples);
    assert_eq!(merged.triples_added, built.instance_triples);

    let written = read_turtle(request.output.as_std_path(), "merged").unwrap();
    assert_eq!(written.len(), merged.output_triples);
    assert_eq!(read(&request.output), read(&workspace.path("out/graph.ttl")));
}

#[test]
fn merge_requires_both_inputs() {
    let workspace = Workspace::new();
    let config = ResolvedConfig::default();
    let request = MergeRequest {
        schema: workspace.path("schema.ttl"),
        instances: workspace.path("absent.ttl"),
        output: workspace.path("merged.ttl"),
    };
    let err = GraphAssembler::new(&config)
        .merge(&request, &JsonOutput)
        .unwrap_err();
    assert_matches!(err, GraphError::MissingInput(_));
}

fn build_request(workspace: &Workspace) -> BuildRequest {
    BuildRequest {
        studies_dir: workspace.path("studies"),
        schema: workspace.path("schema.ttl"),
        instances: workspace.path("mcbo-instances.ttl"),
        output: workspace.path("graph.ttl"),
    }
}

#[test]
fn build_keeps_the_first_process_type_across_studies() {
    let workspace = Workspace::new();
    workspace.write(
        "studies/a/sample_metadata.csv",
        "RunAccession,SampleAccession,CellLine,ProcessType\nR1,S_a,CHO,Batch\n",
    );
    workspace.write(
        "studies/b/sample_metadata.csv",
        "RunAccession,SampleAccession,CellLine,ProcessType\nR1,S_b,CHO,Perfusion\n",
    );
    let config = ResolvedConfig::default();
    let ns = &config.namespaces;
    let request = build_request(&workspace);

    let summary = GraphAssembler::new(&config)
        .build(&request, &JsonOutput)
        .unwrap();
    assert_eq!(summary.rows.processed, 1);
    assert_eq!(summary.rows.skipped, 1);
    assert_eq!(summary.warnings.row_validation, 1);
    assert_eq!(summary.process_types.get("Perfusion"), None);

    let instances = read_turtle(request.instances.as_std_path(), "instances").unwrap();
    assert_eq!(
        instances.objects(&ns.mcbo("run_R1"), RDF_TYPE),
        vec![&Term::iri(ns.mcbo(class::BATCH_CULTURE_PROCESS))]
    );
    assert!(instances.objects(&ns.mcbo("sample_S_b"), RDF_TYPE).is_empty());
}

#[test]
fn build_counts_shared_measurements_once() {
    let workspace = Workspace::new();
    for (study, run) in [("a", "RA"), ("b", "RB")] {
        workspace.write(
            &format!("studies/{study}/sample_metadata.csv"),
            &format!("RunAccession,SampleAccession,CellLine,ProcessType\n{run},S1,CHO,Batch\n"),
        );
        workspace.write(
            &format!("studies/{study}/expression_matrix.csv"),
            "SampleAccession,GAPDH\nS1,4\n",
        );
    }
    let config = ResolvedConfig::default();
    let request = build_request(&workspace);

    let summary = GraphAssembler::new(&config)
        .build(&request, &JsonOutput)
        .unwrap();
    let instances = read_turtle(request.instances.as_std_path(), "instances").unwrap();
    let measurements = instances
        .instances_of(&config.namespaces.mcbo(class::GENE_EXPRESSION_MEASUREMENT))
        .len();
    assert_eq!(measurements, 1);
    assert_eq!(summary.measurements, measurements);
}
