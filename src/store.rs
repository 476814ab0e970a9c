use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tempfile::Builder;
use tracing::debug;

use crate::error::GraphError;

pub const DEFAULT_SCHEMA_PATH: &str = "ontology/mcbo.owl.ttl";
pub const GRAPH_FILE: &str = "graph.ttl";
pub const INSTANCES_FILE: &str = "mcbo-instances.ttl";
pub const METADATA_FILES: [&str; 3] = ["sample_metadata.csv", "metadata.csv", "samples.csv"];
pub const MATRIX_FILES: [&str; 4] = [
    "expression_matrix.csv",
    "expression.csv",
    "counts.csv",
    "tpm.csv",
];

/// Conventional file locations under a data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: Utf8PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn graph_path(&self) -> Utf8PathBuf {
        self.root.join(GRAPH_FILE)
    }

    pub fn instances_path(&self) -> Utf8PathBuf {
        self.root.join(INSTANCES_FILE)
    }

    pub fn studies_dir(&self) -> Utf8PathBuf {
        self.root.join("studies")
    }

    pub fn expression_dir(&self) -> Utf8PathBuf {
        self.root.join("expression")
    }

    pub fn metadata_path(&self) -> Utf8PathBuf {
        self.root.join(METADATA_FILES[0])
    }
}

/// Input files of one study directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyFiles {
    pub name: String,
    pub dir: Utf8PathBuf,
    pub metadata: Utf8PathBuf,
    pub matrix: Option<Utf8PathBuf>,
}

/// Looks up the metadata file and optional matrix of a study. `None` when the directory
/// has no metadata file.
pub fn find_study_files(dir: &Utf8Path) -> Result<Option<StudyFiles>, GraphError> {
    require_dir(dir)?;
    let first_existing = |names: &[&str]| {
        names
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    };
    let Some(metadata) = first_existing(&METADATA_FILES[..]) else {
        return Ok(None);
    };
    let name = dir
        .file_name()
        .map(str::to_string)
        .unwrap_or_else(|| dir.to_string());
    Ok(Some(StudyFiles {
        name,
        dir: dir.to_path_buf(),
        metadata,
        matrix: first_existing(&MATRIX_FILES[..]),
    }))
}

/// Immediate subdirectories of `studies_dir` that hold a metadata file, by name.
pub fn list_studies(studies_dir: &Utf8Path) -> Result<Vec<StudyFiles>, GraphError> {
    require_dir(studies_dir)?;
    let entries = studies_dir
        .read_dir_utf8()
        .map_err(|err| GraphError::Filesystem(format!("read {studies_dir}: {err}")))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| GraphError::Filesystem(err.to_string()))?;
        if entry.path().is_dir() {
            dirs.push(entry.path().to_path_buf());
        }
    }
    dirs.sort();

    let mut studies = Vec::new();
    for dir in dirs {
        match find_study_files(&dir)? {
            Some(study) => studies.push(study),
            None => debug!(dir = %dir, "no metadata file, not a study"),
        }
    }
    Ok(studies)
}

pub fn require_file(path: &Utf8Path) -> Result<(), GraphError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(GraphError::MissingInput(path.as_std_path().to_path_buf()))
    }
}

pub fn require_dir(path: &Utf8Path) -> Result<(), GraphError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(GraphError::MissingInput(path.as_std_path().to_path_buf()))
    }
}

/// Writes `content` to a temp file next to `path`, then moves it into place.
pub fn write_text_atomic(path: &Utf8Path, content: &str) -> Result<(), GraphError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| GraphError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix(".mcbo-graph")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| GraphError::Filesystem(err.to_string()))?;
    temp.write_all(content.as_bytes())
        .map_err(|err| GraphError::Filesystem(err.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| GraphError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| GraphError::Filesystem(format!("write {path}: {err}")))?;
    Ok(())
}

/// Run and sample ids already materialized into a persisted instance graph, per study.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityIndex {
    #[serde(default)]
    pub studies: BTreeMap<String, IndexedStudy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedStudy {
    pub runs: BTreeSet<String>,
    pub samples: BTreeSet<String>,
    pub added_at: String,
}

impl IdentityIndex {
    /// `<instances>.index.json`, next to the instance graph it describes.
    pub fn path_for(instances: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{instances}.index.json"))
    }

    pub fn load(path: &Utf8Path) -> Result<Self, GraphError> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| GraphError::Filesystem(format!("read {path}: {err}")))?;
        serde_json::from_str(&content).map_err(|err| GraphError::IndexParse {
            path: path.as_std_path().to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), GraphError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|err| GraphError::Filesystem(err.to_string()))?;
        write_text_atomic(path, &format!("{content}\n"))
    }

    pub fn known_runs(&self) -> BTreeSet<String> {
        self.studies
            .values()
            .flat_map(|study| study.runs.iter().cloned())
            .collect()
    }

    pub fn known_samples(&self) -> BTreeSet<String> {
        self.studies
            .values()
            .flat_map(|study| study.samples.iter().cloned())
            .collect()
    }

    /// Adds ids to the study's entry; the timestamp marks the latest addition.
    pub fn record(
        &mut self,
        study: &str,
        runs: impl IntoIterator<Item = String>,
        samples: impl IntoIterator<Item = String>,
    ) {
        let entry = self.studies.entry(study.to_string()).or_default();
        entry.runs.extend(runs);
        entry.samples.extend(samples);
        entry.added_at = chrono::Utc::now().to_rfc3339();
    }
}
