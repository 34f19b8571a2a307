//! On-disk layout under the output directory.

use crate::{EventLogError, EventLogFile};
use std::path::{Path, PathBuf};

pub const LOGS_DIR: &str = "logs";
pub const CSV_DIR: &str = "output";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    logs_dir: PathBuf,
    csv_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            logs_dir: root.join(LOGS_DIR),
            csv_dir: root.join(CSV_DIR),
            root,
        }
    }

    /// Create the root, `logs/` and `output/` directories and make sure the root is writable.
    pub fn prepare(&self) -> Result<(), EventLogError> {
        for dir in [&self.root, &self.logs_dir, &self.csv_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                EventLogError::Config(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        let readonly = std::fs::metadata(&self.root)?.permissions().readonly();
        if readonly {
            return Err(EventLogError::Config(format!(
                "output directory is not writable: {}",
                self.root.display()
            )));
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn csv_dir(&self) -> &Path {
        &self.csv_dir
    }

    /// `extract_usage_<YYYYMMDD>.log`
    pub fn log_file_name(stamp: &str) -> String {
        format!("extract_usage_{stamp}.log")
    }

    pub fn log_file(&self, stamp: &str) -> PathBuf {
        self.logs_dir.join(Self::log_file_name(stamp))
    }

    pub fn csv_path(&self, file: &EventLogFile) -> PathBuf {
        self.csv_dir.join(file.csv_file_name())
    }
}
