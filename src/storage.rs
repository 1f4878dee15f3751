use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Owns the intake and results roots and the per-job directories under them.
#[derive(Debug, Clone)]
pub struct Storage {
    upload_root: PathBuf,
    output_root: PathBuf,
}

/// Directories allocated to a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDirs {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Storage {
    pub fn new(upload_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Storage {
            upload_root: upload_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Creates both roots if they are missing. Safe to call repeatedly.
    pub fn ensure_roots(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.upload_root)?;
        std::fs::create_dir_all(&self.output_root)?;
        Ok(())
    }

    pub fn job_dirs(&self, id: Uuid) -> JobDirs {
        let key = id.to_string();
        JobDirs {
            input_dir: self.upload_root.join(&key),
            output_dir: self.output_root.join(&key),
        }
    }

    pub async fn allocate(&self, id: Uuid) -> io::Result<JobDirs> {
        let dirs = self.job_dirs(id);
        fs::create_dir_all(&dirs.input_dir).await?;
        fs::create_dir_all(&dirs.output_dir).await?;
        Ok(dirs)
    }

    /// Maps a request path to a file under the results root.
    ///
    /// Returns `None` for anything that is not a plain relative path, for
    /// files that do not exist, and for files whose canonical location lies
    /// outside the root (symlinks included).
    pub fn resolve_result(&self, relative: &str) -> Option<PathBuf> {
        let relative = confine(relative)?;

        let root = self.output_root.canonicalize().ok()?;
        let candidate = root.join(relative).canonicalize().ok()?;

        if candidate.starts_with(&root) && candidate.is_file() {
            Some(candidate)
        } else {
            None
        }
    }
}

/// Rebuilds `relative` from plain name segments only.
fn confine(relative: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();

    for segment in relative.split('/').filter(|segment| !segment.is_empty()) {
        if segment.contains('\\') || segment.contains('\0') {
            return None;
        }

        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => path.push(name),
            _ => return None,
        }
    }

    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}
