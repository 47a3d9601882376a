//! Hard failures of the emission pass.
//!
//! Anything that can be recovered locally (missing imports, dependency cycles,
//! empty fragments) is reported through `tracing` instead and never shows up here.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("shader source {} is {size} bytes, over the {limit} byte limit", path.display())]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        limit: usize,
    },

    #[error("failed to read shader source {}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader source {} is not valid UTF-8", path.display())]
    InvalidUtf8 { path: PathBuf },

    #[error("define substitution grew the code past the {limit} byte limit")]
    SubstitutionOverflow { limit: usize },

    #[error("data section exceeds {limit} bytes")]
    DataSectionOverflow { limit: u64 },

    /// `message` already names the declaration and lists the offending source.
    #[error("{message}")]
    InvalidWgsl { name: String, message: String },
}
