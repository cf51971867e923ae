//! Error types for loading and saving models.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while reading model files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed XML in {path} at byte {position}: {source}")]
    Xml {
        path: PathBuf,
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Malformed XML in {path} at byte {position}: {message}")]
    Structure {
        path: PathBuf,
        position: usize,
        message: String,
    },

    #[error("Not a model file: {0}")]
    NotAModel(PathBuf),
}

/// Errors raised while persisting model files.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to stage {path}: {message}")]
    Stage { path: PathBuf, message: String },
}
