//! Loading scan output files into the database on first request.

use crate::Db;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracker_core::{Ingest, ResultDate, ResultSet, ScanRecord};

/// `<dir>/<YYYYMMDD>.json`
pub fn result_file(dir: &Path, date: ResultDate) -> PathBuf {
    dir.join(format!("{date}.json"))
}

/// Most recent date with a scan output file in `dir`.
pub fn latest_result_date(dir: &Path) -> Result<Option<ResultDate>> {
    let mut latest = None;
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(date) = path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<ResultDate>().ok()) else {
            debug!(path = %path.display(), "skipping file without a date name");
            continue;
        };
        latest = latest.max(Some(date));
    }
    Ok(latest)
}

/// Reads the day's scan file (a JSON array of records) and stores it in one
/// transaction.
pub struct DirIngester<'a> {
    db: &'a Db,
    dir: PathBuf,
}

impl<'a> DirIngester<'a> {
    pub fn new(db: &'a Db, dir: impl Into<PathBuf>) -> Self {
        DirIngester { db, dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Ingest for DirIngester<'_> {
    fn ingest(&self, date: ResultDate) -> Result<Option<ResultSet>> {
        let path = result_file(&self.dir, date);
        if !path.exists() {
            debug!(path = %path.display(), "no scan output for date");
            return Ok(None);
        }
        let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let scans: Vec<ScanRecord> =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        let rs = self.db.insert_result_set(date, &scans)?;
        info!(%date, records = scans.len(), path = %path.display(), "loaded scan output");
        Ok(Some(rs))
    }
}
