use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Mount point of the result server, used to build path references.
pub const RESULTS_PREFIX: &str = "/results";

/// A file received from a client, held in memory for the request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub input_filename: String,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Received,
    Saving,
    Invoking,
    EngineSucceeded,
    EngineFailed,
}

impl Job {
    pub fn advance(&mut self, state: State) {
        tracing::debug!(from = ?self.state, to = ?state, "job state change");
        self.state = state;
    }
}

pub enum FileType {
    MusicXml,
    Midi,
    MuseScore,
}

impl FileType {
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::MusicXml => "mxl",
            FileType::Midi => "mid",
            FileType::MuseScore => "mscz",
        }
    }
}

/// Artifact paths the engine is expected to write. They are predicted from
/// the input name and not checked for existence.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct OutputFileSet {
    pub xml: String,
    pub midi: String,
    pub musescore: String,
}

impl OutputFileSet {
    pub fn predict(id: Uuid, input_filename: &str) -> Self {
        let base_name = base_name(input_filename);

        OutputFileSet {
            xml: build_path(id, base_name, FileType::MusicXml),
            midi: build_path(id, base_name, FileType::Midi),
            musescore: build_path(id, base_name, FileType::MuseScore),
        }
    }
}

/// Input name with its final extension removed; `a.b.pdf` becomes `a.b`.
pub fn base_name(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(filename)
}

pub fn build_path(id: Uuid, base_name: &str, file_type: FileType) -> String {
    format!("{RESULTS_PREFIX}/{id}/{base_name}.{}", file_type.extension())
}
