use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::builder::{BuildState, EntityBuilder};
use crate::config::ResolvedConfig;
use crate::error::GraphError;
use crate::expression::{ExpressionIntegrator, ExpressionMatrix};
use crate::graph::Graph;
use crate::metadata::MetadataTable;
use crate::report::RunSummary;
use crate::store::{
    IdentityIndex, INSTANCES_FILE, StudyFiles, find_study_files, list_studies, require_dir,
    require_file, write_text_atomic,
};
use crate::turtle::{read_turtle, to_turtle};
use crate::vocab::class;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Bootstrap,
    Build,
    AddStudy,
    Merge,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Bootstrap => write!(f, "bootstrap"),
            Mode::Build => write!(f, "build"),
            Mode::AddStudy => write!(f, "add-study"),
            Mode::Merge => write!(f, "merge"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExpressionSource {
    #[default]
    None,
    Matrix(Utf8PathBuf),
    Directory(Utf8PathBuf),
}

impl ExpressionSource {
    pub fn from_options(
        matrix: Option<Utf8PathBuf>,
        directory: Option<Utf8PathBuf>,
    ) -> Result<Self, GraphError> {
        match (matrix, directory) {
            (Some(_), Some(_)) => Err(GraphError::ConflictingOptions(
                "use either an expression matrix or an expression directory, not both"
                    .to_string(),
            )),
            (Some(matrix), None) => Ok(ExpressionSource::Matrix(matrix)),
            (None, Some(directory)) => Ok(ExpressionSource::Directory(directory)),
            (None, None) => Ok(ExpressionSource::None),
        }
    }

    fn require(&self) -> Result<(), GraphError> {
        match self {
            ExpressionSource::None => Ok(()),
            ExpressionSource::Matrix(path) => require_file(path),
            ExpressionSource::Directory(path) => require_dir(path),
        }
    }

    fn load(&self) -> Result<Vec<ExpressionMatrix>, GraphError> {
        match self {
            ExpressionSource::None => Ok(Vec::new()),
            ExpressionSource::Matrix(path) => {
                Ok(vec![ExpressionMatrix::read(path.as_std_path())?])
            }
            ExpressionSource::Directory(path) => ExpressionMatrix::read_dir(path.as_std_path()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapRequest {
    pub metadata: Utf8PathBuf,
    pub schema: Utf8PathBuf,
    pub output: Utf8PathBuf,
    /// Defaults to `mcbo-instances.ttl` next to `output`.
    pub instances: Option<Utf8PathBuf>,
    pub expression: ExpressionSource,
}

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub studies_dir: Utf8PathBuf,
    pub schema: Utf8PathBuf,
    pub instances: Utf8PathBuf,
    pub output: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct AddStudyRequest {
    pub study_dir: Utf8PathBuf,
    pub instances: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub schema: Utf8PathBuf,
    pub instances: Utf8PathBuf,
    pub output: Utf8PathBuf,
}

/// Runs the four assembly modes with one resolved configuration.
pub struct GraphAssembler<'a> {
    config: &'a ResolvedConfig,
}

impl<'a> GraphAssembler<'a> {
    pub fn new(config: &'a ResolvedConfig) -> Self {
        Self { config }
    }

    /// One metadata file, optional expression, unioned with the schema.
    pub fn bootstrap(
        &self,
        request: &BootstrapRequest,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, GraphError> {
        let started = Instant::now();
        require_file(&request.metadata)?;
        require_file(&request.schema)?;
        request.expression.require()?;

        phase(sink, format!("phase=Read; metadata {}", request.metadata));
        let table = MetadataTable::read(request.metadata.as_std_path())?;
        let matrices = request.expression.load()?;
        let schema = read_turtle(request.schema.as_std_path(), "schema")?;

        phase(sink, format!("phase=Build; {} rows", table.rows.len()));
        let state = EntityBuilder::new(self.config).build(&table, BuildState::new());
        let scope = state.samples.clone();
        let integrator = ExpressionIntegrator::new(self.config);
        let state = matrices.iter().fold(state, |state, matrix| {
            phase(sink, format!("phase=Expression; {}", matrix.source.display()));
            integrator.integrate(matrix, &scope, state)
        });

        let instances_path = request
            .instances
            .clone()
            .unwrap_or_else(|| sibling(&request.output, INSTANCES_FILE));
        let output = self.write_evaluation_graph(
            &state.graph,
            &schema,
            &instances_path,
            &request.output,
            sink,
        )?;

        let mut summary = self.summarize(Mode::Bootstrap, &state, &output);
        summary.outputs = vec![instances_path.to_string(), request.output.to_string()];
        finish(sink, &summary, started);
        Ok(summary)
    }

    /// Every study under a directory, each expression matrix scoped to its own study.
    pub fn build(
        &self,
        request: &BuildRequest,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, GraphError> {
        let started = Instant::now();
        require_file(&request.schema)?;
        let studies = list_studies(&request.studies_dir)?;
        if studies.is_empty() {
            tracing::warn!(dir = %request.studies_dir, "no study directories with metadata");
        }

        let schema = read_turtle(request.schema.as_std_path(), "schema")?;
        let builder = EntityBuilder::new(self.config);
        let integrator = ExpressionIntegrator::new(self.config);

        let none = BTreeSet::new();
        let mut state = BuildState::new();
        for study in &studies {
            phase(sink, format!("phase=Build; study {}", study.name));
            let seed = BuildState::with_runs(state.runs.clone());
            let study_state =
                self.build_study(&builder, &integrator, study, &none, &none, seed)?;
            tracing::debug!(
                study = %study.name,
                rows = study_state.tally.rows_processed,
                triples = study_state.graph.len(),
                "study built"
            );
            state.absorb(study_state);
        }

        let output = self.write_evaluation_graph(
            &state.graph,
            &schema,
            &request.instances,
            &request.output,
            sink,
        )?;

        let mut summary = self.summarize(Mode::Build, &state, &output);
        summary.studies = studies.iter().map(|study| study.name.clone()).collect();
        summary.outputs = vec![request.instances.to_string(), request.output.to_string()];
        finish(sink, &summary, started);
        Ok(summary)
    }

    /// Appends one study to a persisted instance graph.
    ///
    /// Runs recorded in the identity index from earlier invocations are skipped, so
    /// adding the same study again leaves the instance graph unchanged.
    pub fn add_study(
        &self,
        request: &AddStudyRequest,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, GraphError> {
        let started = Instant::now();
        let study = find_study_files(&request.study_dir)?.ok_or_else(|| {
            GraphError::MissingInput(request.study_dir.join("sample_metadata.csv").into())
        })?;

        let index_path = IdentityIndex::path_for(&request.instances);
        let (mut instances, mut index) = if request.instances.is_file() {
            phase(sink, format!("phase=Read; instances {}", request.instances));
            (
                read_turtle(request.instances.as_std_path(), "instances")?,
                IdentityIndex::load(&index_path)?,
            )
        } else {
            if index_path.is_file() {
                tracing::warn!(index = %index_path, "instance graph missing, discarding index");
            }
            (Graph::new(), IdentityIndex::default())
        };

        phase(sink, format!("phase=Build; study {}", study.name));
        let builder = EntityBuilder::new(self.config);
        let integrator = ExpressionIntegrator::new(self.config);
        let state = self.build_study(
            &builder,
            &integrator,
            &study,
            &index.known_runs(),
            &index.known_samples(),
            BuildState::new(),
        )?;

        let before = instances.len();
        let added = instances.union_with(&state.graph);
        tracing::debug!(before, added, "instance graph extended");

        phase(sink, format!("phase=Write; {}", request.instances));
        write_text_atomic(
            &request.instances,
            &to_turtle(&instances, &self.config.namespaces.prefixes()),
        )?;
        let new_runs = state.runs.keys().cloned().collect::<Vec<_>>();
        if !new_runs.is_empty() {
            index.record(&study.name, new_runs, state.samples.iter().cloned());
        }
        index.save(&index_path)?;

        let mut summary = self.summarize(Mode::AddStudy, &state, &instances);
        summary.studies = vec![study.name.clone()];
        summary.instance_nodes = instances.subject_count();
        summary.instance_triples = instances.len();
        summary.genes = instances
            .instances_of(&self.config.namespaces.mcbo(class::GENE))
            .len();
        summary.triples_added = added;
        summary.outputs = vec![request.instances.to_string(), index_path.to_string()];
        finish(sink, &summary, started);
        Ok(summary)
    }

    /// Set union of a schema graph and an instance graph.
    pub fn merge(
        &self,
        request: &MergeRequest,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, GraphError> {
        let started = Instant::now();
        require_file(&request.schema)?;
        require_file(&request.instances)?;

        phase(sink, "phase=Read; schema and instances".to_string());
        let schema = read_turtle(request.schema.as_std_path(), "schema")?;
        let instances = read_turtle(request.instances.as_std_path(), "instances")?;

        let mut merged = schema;
        let added = merged.union_with(&instances);
        phase(sink, format!("phase=Write; {}", request.output));
        write_text_atomic(
            &request.output,
            &to_turtle(&merged, &self.config.namespaces.prefixes()),
        )?;

        let state = BuildState {
            graph: instances,
            ..BuildState::default()
        };
        let mut summary = self.summarize(Mode::Merge, &state, &merged);
        summary.triples_added = added;
        summary.outputs = vec![request.output.to_string()];
        finish(sink, &summary, started);
        Ok(summary)
    }

    /// Writes the instance graph and its union with `schema`; returns the union.
    fn write_evaluation_graph(
        &self,
        instances: &Graph,
        schema: &Graph,
        instances_path: &Utf8Path,
        output_path: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> Result<Graph, GraphError> {
        let prefixes = self.config.namespaces.prefixes();
        let mut merged = schema.clone();
        merged.union_with(instances);

        phase(sink, format!("phase=Write; {instances_path}"));
        write_text_atomic(instances_path, &to_turtle(instances, &prefixes))?;
        phase(sink, format!("phase=Write; {output_path}"));
        write_text_atomic(output_path, &to_turtle(&merged, &prefixes))?;
        Ok(merged)
    }

    fn summarize(&self, mode: Mode, state: &BuildState, output: &Graph) -> RunSummary {
        let ns = &self.config.namespaces;
        let mut summary = RunSummary::from_tally(&mode.to_string(), &state.tally);
        summary.genes = state.graph.instances_of(&ns.mcbo(class::GENE)).len();
        summary.measurements = state
            .graph
            .instances_of(&ns.mcbo(class::GENE_EXPRESSION_MEASUREMENT))
            .len();
        summary.instance_nodes = state.graph.subject_count();
        summary.instance_triples = state.graph.len();
        summary.triples_added = state.graph.len();
        summary.output_triples = output.len();
        summary
    }

    fn build_study(
        &self,
        builder: &EntityBuilder<'_>,
        integrator: &ExpressionIntegrator<'_>,
        study: &StudyFiles,
        known_runs: &BTreeSet<String>,
        indexed_samples: &BTreeSet<String>,
        seed: BuildState,
    ) -> Result<BuildState, GraphError> {
        let table = MetadataTable::read(study.metadata.as_std_path())?;
        let matrix = study
            .matrix
            .as_ref()
            .map(|path| ExpressionMatrix::read(path.as_std_path()))
            .transpose()?;

        let state = builder.build_with_guard(&table, known_runs, seed);
        Ok(match matrix {
            Some(matrix) => integrate_new_samples(integrator, matrix, indexed_samples, state),
            None => state,
        })
    }
}

/// Drops matrix rows for samples materialized by an earlier invocation, then joins the
/// rest against the samples of `state`.
fn integrate_new_samples(
    integrator: &ExpressionIntegrator<'_>,
    mut matrix: ExpressionMatrix,
    indexed_samples: &BTreeSet<String>,
    state: BuildState,
) -> BuildState {
    let total = matrix.rows.len();
    matrix
        .rows
        .retain(|row| !indexed_samples.contains(&row.sample));
    if matrix.rows.len() < total {
        tracing::debug!(
            skipped = total - matrix.rows.len(),
            "matrix rows for indexed samples skipped"
        );
    }
    let scope = state.samples.clone();
    integrator.integrate(&matrix, &scope, state)
}

fn sibling(path: &Utf8Path, file_name: &str) -> Utf8PathBuf {
    match path.parent() {
        Some(parent) => parent.join(file_name),
        None => Utf8PathBuf::from(file_name),
    }
}

fn phase(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}

fn finish(sink: &dyn ProgressSink, summary: &RunSummary, started: Instant) {
    sink.event(ProgressEvent {
        message: format!(
            "phase=Done; {} rows processed, {} skipped, {} triples",
            summary.rows.processed, summary.rows.skipped, summary.output_triples
        ),
        elapsed: Some(started.elapsed()),
    });
}
