use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "png", "jpg", "jpeg"];

#[derive(Parser, Clone, Debug, PartialEq)]
#[command(author, version, about = "Sheet music recognition over HTTP")]
pub struct Config {
    #[arg(
        long = "engine",
        env = "OMR_ENGINE",
        help = "Path to the OMR engine executable",
        default_value = "/usr/bin/audiveris"
    )]
    pub engine: PathBuf,

    #[arg(
        long = "upload-dir",
        env = "OMR_UPLOAD_DIR",
        help = "Directory receiving uploaded scores",
        default_value = "uploads"
    )]
    pub upload_dir: PathBuf,

    #[arg(
        long = "output-dir",
        env = "OMR_OUTPUT_DIR",
        help = "Directory receiving engine output, served under /results",
        default_value = "output"
    )]
    pub output_dir: PathBuf,

    #[arg(
        long = "allowed-extensions",
        env = "OMR_ALLOWED_EXTENSIONS",
        help = "Comma separated list of accepted upload extensions",
        value_delimiter = ',',
        default_value = "pdf,png,jpg,jpeg"
    )]
    pub allowed_extensions: Vec<String>,

    #[arg(long = "host", env = "OMR_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long = "port", env = "PORT", default_value = "5000")]
    pub port: u16,

    #[arg(
        long = "engine-timeout",
        env = "OMR_ENGINE_TIMEOUT",
        help = "Kill the engine after this many seconds (unbounded when unset)"
    )]
    pub engine_timeout: Option<u64>,

    #[arg(
        long = "max-upload-size",
        env = "OMR_MAX_UPLOAD_SIZE",
        help = "Largest accepted upload in bytes",
        default_value = "52428800"
    )]
    pub max_upload_size: usize,
}

impl Config {
    /// Configuration rooted somewhere other than the working directory, with
    /// every other option at its default.
    #[cfg(test)]
    pub fn with_roots(upload_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            engine: PathBuf::from("/usr/bin/audiveris"),
            upload_dir,
            output_dir,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            host: "0.0.0.0".to_owned(),
            port: 5000,
            engine_timeout: None,
            max_upload_size: 50 * 1024 * 1024,
        }
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine_timeout.map(Duration::from_secs)
    }

    /// Allow-set normalised to lowercase without leading dots. An empty list
    /// falls back to the defaults.
    pub fn allowed_extensions(&self) -> Vec<String> {
        let extensions: Vec<String> = self
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        if extensions.is_empty() {
            DEFAULT_ALLOWED_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
        } else {
            extensions
        }
    }
}
