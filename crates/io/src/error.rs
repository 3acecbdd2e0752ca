use std::path::{Path, PathBuf};

use tally_recon::ReconError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("cannot open '{}': {message}", path.display())]
    Open { path: PathBuf, message: String },

    #[error("'{}' contains no sheets", path.display())]
    NoSheets { path: PathBuf },

    #[error("'{}': unsupported file type", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("cannot write '{}': {message}", path.display())]
    Write { path: PathBuf, message: String },

    #[error(transparent)]
    Recon(#[from] ReconError),
}

impl WorkbookError {
    pub(crate) fn open(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Open {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn write(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}
