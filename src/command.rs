use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// What an engine run left behind once it exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    /// Exit code, `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl EngineOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs the recognition engine against one input, writing into `output_dir`.
///
/// `Err` means the engine could not be run at all; an engine that ran and
/// failed is reported through a non-zero [`EngineOutput::exit_code`].
#[async_trait]
pub trait EngineRunner: Send + Sync {
    async fn run(&self, input: &Path, output_dir: &Path) -> io::Result<EngineOutput>;
}

/// Spawns the engine executable as a child process.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    executable: PathBuf,
}

impl ProcessEngine {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        ProcessEngine {
            executable: executable.into(),
        }
    }
}

pub fn build_arguments(input: &Path, output_dir: &Path) -> Vec<OsString> {
    vec![
        "-batch".into(),
        "-run".into(),
        input.into(),
        "-export".into(),
        "-output".into(),
        output_dir.into(),
    ]
}

#[async_trait]
impl EngineRunner for ProcessEngine {
    async fn run(&self, input: &Path, output_dir: &Path) -> io::Result<EngineOutput> {
        let arguments = build_arguments(input, output_dir);

        tracing::info!(
            executable = %self.executable.display(),
            arguments = ?arguments,
            "running engine"
        );

        // The child is killed if this future is dropped before it exits.
        let output = Command::new(&self.executable)
            .args(arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(EngineOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
