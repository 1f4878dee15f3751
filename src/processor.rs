use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::command::{EngineOutput, EngineRunner};
use crate::config::Config;
use crate::error::JobError;
use crate::models::{Job, OutputFileSet, State, Upload};
use crate::storage::Storage;
use crate::validation::validate_filename;

/// Turns one upload into one engine run and predicts where its output lands.
pub struct Orchestrator {
    storage: Storage,
    engine: Arc<dyn EngineRunner>,
    allowed_extensions: Vec<String>,
    engine_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(config: &Config, engine: Arc<dyn EngineRunner>) -> Self {
        Orchestrator {
            storage: Storage::new(&config.upload_dir, &config.output_dir),
            engine,
            allowed_extensions: config.allowed_extensions(),
            engine_timeout: config.engine_timeout(),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn process(&self, upload: Upload) -> Result<OutputFileSet, JobError> {
        let filename = validate_filename(&upload.filename, &self.allowed_extensions)?;

        let id = Uuid::new_v4();
        let span = info_span!("job", job_id = %id);

        self.run_job(id, filename, upload.bytes).instrument(span).await
    }

    async fn run_job(
        &self,
        id: Uuid,
        filename: String,
        bytes: Vec<u8>,
    ) -> Result<OutputFileSet, JobError> {
        let dirs = self
            .storage
            .allocate(id)
            .await
            .map_err(JobError::DirectoryCreation)?;

        let mut job = Job {
            id,
            input_path: dirs.input_dir.join(&filename),
            input_filename: filename,
            output_dir: dirs.output_dir,
            state: State::Received,
        };

        job.advance(State::Saving);
        fs::write(&job.input_path, &bytes).await?;

        info!(
            input = %job.input_path.display(),
            output = %job.output_dir.display(),
            size = bytes.len(),
            "upload saved"
        );

        job.advance(State::Invoking);
        let output = self.invoke(&job).await?;

        if !output.success() {
            job.advance(State::EngineFailed);
            warn!(
                exit_code = output.exit_code,
                stdout = %output.stdout,
                stderr = %output.stderr,
                "engine failed"
            );
            return Err(JobError::EngineExecution {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        job.advance(State::EngineSucceeded);
        info!(stdout = %output.stdout, stderr = %output.stderr, "engine finished");

        Ok(OutputFileSet::predict(job.id, &job.input_filename))
    }

    async fn invoke(&self, job: &Job) -> Result<EngineOutput, JobError> {
        let run = self.engine.run(&job.input_path, &job.output_dir);

        let output = match self.engine_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                warn!(seconds = limit.as_secs(), "engine timed out, killed");
                JobError::EngineTimeout(limit)
            })?,
            None => run.await,
        };

        Ok(output?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::fake::FakeEngine;
    use crate::command::ProcessEngine;
    use crate::validation::ValidationError;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        Config::with_roots(dir.path().join("uploads"), dir.path().join("output"))
    }

    fn orchestrator(dir: &TempDir, engine: Arc<dyn EngineRunner>) -> Orchestrator {
        let orchestrator = Orchestrator::new(&config_in(dir), engine);
        orchestrator.storage().ensure_roots().unwrap();
        orchestrator
    }

    fn upload(filename: &str) -> Upload {
        Upload {
            filename: filename.to_owned(),
            bytes: b"%PDF-1.4 score".to_vec(),
        }
    }

    fn job_id(files: &OutputFileSet) -> Uuid {
        files.xml.split('/').nth(2).unwrap().parse().unwrap()
    }

    #[actix_web::test]
    async fn success_predicts_paths_and_runs_engine_once() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::succeeding());
        let orchestrator = orchestrator(&dir, engine.clone());

        let files = orchestrator.process(upload("song.png")).await.unwrap();
        let id = job_id(&files);

        assert_eq!(files, OutputFileSet::predict(id, "song.png"));
        assert_eq!(files.midi, format!("/results/{id}/song.mid"));

        let input = dir.path().join("uploads").join(id.to_string()).join("song.png");
        let output_dir = dir.path().join("output").join(id.to_string());
        assert_eq!(std::fs::read(&input).unwrap(), b"%PDF-1.4 score");
        assert_eq!(engine.calls(), vec![(input, output_dir.clone())]);
        assert!(output_dir.join("song.mscz").is_file());
    }

    #[actix_web::test]
    async fn identical_uploads_get_distinct_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::succeeding());
        let orchestrator = orchestrator(&dir, engine.clone());

        let first = orchestrator.process(upload("score.pdf")).await.unwrap();
        let second = orchestrator.process(upload("score.pdf")).await.unwrap();

        assert_ne!(job_id(&first), job_id(&second));

        let inputs: Vec<PathBuf> = engine.calls().into_iter().map(|(input, _)| input).collect();
        assert_eq!(inputs.len(), 2);
        assert_ne!(inputs[0], inputs[1]);
        assert!(inputs.iter().all(|input| input.is_file()));
    }

    #[actix_web::test]
    async fn rejected_uploads_leave_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::succeeding());
        let orchestrator = orchestrator(&dir, engine.clone());

        for (name, expected) in [
            ("notes.txt", ValidationError::DisallowedType),
            ("noextension", ValidationError::DisallowedType),
            ("", ValidationError::EmptyFilename),
        ] {
            match orchestrator.process(upload(name)).await {
                Err(JobError::Validation(err)) => assert_eq!(err, expected),
                other => panic!("unexpected result for {name:?}: {other:?}"),
            }
        }

        assert!(engine.calls().is_empty());
        assert_eq!(std::fs::read_dir(dir.path().join("uploads")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(dir.path().join("output")).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn engine_failure_reports_stderr_not_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::failing(1, "loading book", "FATAL: no sheet detected"));
        let orchestrator = orchestrator(&dir, engine);

        match orchestrator.process(upload("page.jpg")).await {
            Err(JobError::EngineExecution { exit_code, stderr }) => {
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "FATAL: no sheet detected");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[actix_web::test]
    async fn hung_engine_is_cut_off_by_the_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = orchestrator(
            &dir,
            Arc::new(FakeEngine::hanging(Duration::from_secs(30))),
        );
        orchestrator.engine_timeout = Some(Duration::from_millis(50));

        let result = orchestrator.process(upload("page.jpg")).await;
        assert!(matches!(result, Err(JobError::EngineTimeout(_))));
    }

    #[actix_web::test]
    async fn unusable_output_root_is_a_directory_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("uploads")).unwrap();
        std::fs::write(dir.path().join("output"), b"in the way").unwrap();
        let orchestrator = Orchestrator::new(&config_in(&dir), Arc::new(FakeEngine::succeeding()));

        let result = orchestrator.process(upload("page.png")).await;
        assert!(matches!(result, Err(JobError::DirectoryCreation(_))));
    }

    #[actix_web::test]
    async fn missing_engine_is_unexpected() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(
            &dir,
            Arc::new(ProcessEngine::new("/nonexistent/omr-engine")),
        );

        let result = orchestrator.process(upload("page.png")).await;
        assert!(matches!(result, Err(JobError::Unexpected(_))));
    }
}
