use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "tracker.yaml";
pub const DEFAULT_DATABASE: &str = "tracker.sqlite3";
pub const DEFAULT_RESULTS_DIR: &str = "results";

#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// SQLite file holding ingested result sets.
    pub database: Option<PathBuf>,
    /// Directory with one `YYYYMMDD.json` scan file per day.
    pub results_dir: Option<PathBuf>,
}

impl Config {
    pub fn database(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| DEFAULT_DATABASE.into())
    }

    pub fn results_dir(&self) -> PathBuf {
        self.results_dir.clone().unwrap_or_else(|| DEFAULT_RESULTS_DIR.into())
    }
}

/// Load the given file, or `./tracker.yaml` when present. An explicitly
/// named file must exist and parse.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(Config::default()); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&s).with_context(|| format!("parsing {}", path.display()))
}
