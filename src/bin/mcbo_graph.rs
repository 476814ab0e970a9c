use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use mcbo_graph::app::{
    AddStudyRequest, BootstrapRequest, BuildRequest, ExpressionSource, GraphAssembler,
    MergeRequest, ProgressSink,
};
use mcbo_graph::config::ConfigLoader;
use mcbo_graph::error::GraphError;
use mcbo_graph::output::{JsonOutput, LogSink, OutputMode, TextOutput};
use mcbo_graph::report::RunSummary;
use mcbo_graph::store::{DEFAULT_SCHEMA_PATH, DataLayout};

#[derive(Parser)]
#[command(name = "mcbo-graph")]
#[command(about = "Build MCBO instance graphs from bioprocess metadata and expression matrices")]
#[command(version)]
struct Cli {
    /// Print the run summary as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// JSON configuration file (default: ./mcbo-graph.json when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build instances from one metadata CSV and merge with the schema")]
    Bootstrap(BootstrapArgs),
    #[command(about = "Build instances from every study directory and merge with the schema")]
    Build(BuildArgs),
    #[command(about = "Append one study to a persisted instance graph")]
    AddStudy(AddStudyArgs),
    #[command(about = "Union the schema with an existing instance graph")]
    Merge(MergeArgs),
}

#[derive(Args)]
struct DataDirArgs {
    #[arg(long, default_value = "data")]
    data_dir: Utf8PathBuf,
}

#[derive(Args)]
struct BootstrapArgs {
    #[command(flatten)]
    data: DataDirArgs,

    /// Metadata CSV (default: <data-dir>/sample_metadata.csv).
    #[arg(long)]
    csv: Option<Utf8PathBuf>,

    #[arg(long, default_value = DEFAULT_SCHEMA_PATH)]
    ontology: Utf8PathBuf,

    /// Evaluation graph (default: <data-dir>/graph.ttl).
    #[arg(long)]
    output: Option<Utf8PathBuf>,

    /// Instance graph (default: <data-dir>/mcbo-instances.ttl).
    #[arg(long)]
    instances: Option<Utf8PathBuf>,

    #[arg(long)]
    expression_matrix: Option<Utf8PathBuf>,

    /// Directory of per-study matrices (*.csv).
    #[arg(long)]
    expression_dir: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct BuildArgs {
    #[command(flatten)]
    data: DataDirArgs,

    /// Default: <data-dir>/studies.
    #[arg(long)]
    studies_dir: Option<Utf8PathBuf>,

    #[arg(long, default_value = DEFAULT_SCHEMA_PATH)]
    ontology: Utf8PathBuf,

    #[arg(long)]
    instances: Option<Utf8PathBuf>,

    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct AddStudyArgs {
    #[command(flatten)]
    data: DataDirArgs,

    #[arg(long)]
    study_dir: Utf8PathBuf,

    #[arg(long)]
    instances: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct MergeArgs {
    #[command(flatten)]
    data: DataDirArgs,

    #[arg(long, default_value = DEFAULT_SCHEMA_PATH)]
    ontology: Utf8PathBuf,

    #[arg(long)]
    instances: Option<Utf8PathBuf>,

    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<GraphError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GraphError) -> u8 {
    match error {
        GraphError::MissingInput(_) => 2,
        GraphError::TableRead { .. }
        | GraphError::TurtleParse { .. }
        | GraphError::IndexParse { .. }
        | GraphError::EmptyMatrix(_)
        | GraphError::ConfigRead(_)
        | GraphError::ConfigParse(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let assembler = GraphAssembler::new(&config);
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &LogSink,
    };

    let summary = match cli.command {
        Commands::Bootstrap(args) => {
            let layout = DataLayout::new(args.data.data_dir);
            let request = BootstrapRequest {
                metadata: args.csv.unwrap_or_else(|| layout.metadata_path()),
                schema: args.ontology,
                output: args.output.unwrap_or_else(|| layout.graph_path()),
                instances: Some(args.instances.unwrap_or_else(|| layout.instances_path())),
                expression: ExpressionSource::from_options(
                    args.expression_matrix,
                    args.expression_dir,
                )?,
            };
            assembler.bootstrap(&request, sink)?
        }
        Commands::Build(args) => {
            let layout = DataLayout::new(args.data.data_dir);
            let request = BuildRequest {
                studies_dir: args.studies_dir.unwrap_or_else(|| layout.studies_dir()),
                schema: args.ontology,
                instances: args.instances.unwrap_or_else(|| layout.instances_path()),
                output: args.output.unwrap_or_else(|| layout.graph_path()),
            };
            assembler.build(&request, sink)?
        }
        Commands::AddStudy(args) => {
            let layout = DataLayout::new(args.data.data_dir);
            let request = AddStudyRequest {
                study_dir: args.study_dir,
                instances: args.instances.unwrap_or_else(|| layout.instances_path()),
            };
            assembler.add_study(&request, sink)?
        }
        Commands::Merge(args) => {
            let layout = DataLayout::new(args.data.data_dir);
            let request = MergeRequest {
                schema: args.ontology,
                instances: args.instances.unwrap_or_else(|| layout.instances_path()),
                output: args.output.unwrap_or_else(|| layout.graph_path()),
            };
            assembler.merge(&request, sink)?
        }
    };

    print_summary(output_mode, &summary)
}

fn print_summary(mode: OutputMode, summary: &RunSummary) -> miette::Result<()> {
    match mode {
        OutputMode::Json => JsonOutput::print_summary(summary).into_diagnostic(),
        OutputMode::Text => TextOutput::print_summary(summary).into_diagnostic(),
    }
}
