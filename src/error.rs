// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Failures while turning (year, quarter, questionnaire) into a readable file.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("invalid archive URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("cannot read archive from {origin}: {source}")]
    Archive {
        origin: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cache I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no member matching '{pattern}' under {dir:?}")]
    MemberNotFound { pattern: String, dir: PathBuf },
}

impl AcquisitionError {
    /// Connection problems, timeouts, 5xx and 429 are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            AcquisitionError::Network { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request() || source.is_body()
            }
            AcquisitionError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("questionnaire extracts share no canonical column to join on")]
    EmptyJoinKeys,

    #[error("required column '{column}' is absent after harmonization")]
    MissingColumn { column: String },

    #[error("cannot parse {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path:?} has no header row")]
    EmptyFile { path: PathBuf },

    #[error("building respondent batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Non-numeric residue in a code column. Reported as a warning, never fatal:
/// offending values are coerced to missing.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("column '{column}': {residue} of {total} non-blank values are not numeric")]
pub struct RecodeError {
    pub column: String,
    pub residue: usize,
    pub total: usize,
}

impl RecodeError {
    pub fn share(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.residue as f64 / self.total as f64
        }
    }
}

/// Problems with the static reference files; fatal at startup.
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("cannot read reference file {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("reference file {path:?} lacks column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("reference file {path:?} row {row}: {reason}")]
    InvalidRow {
        path: PathBuf,
        row: usize,
        reason: String,
    },
}

/// Anything that makes a single quarter unusable. Caught by the panel
/// assembler, logged, and skipped.
#[derive(Error, Debug)]
pub enum QuarterError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("quarter worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
