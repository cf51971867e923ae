//! Error types for fraglink operations.
//!
//! [`RepairError`] covers the conditions that make a model unrepairable as a
//! whole. [`FraglinkError`] is the umbrella type returned by the public API
//! and by the CLI.

use std::io;

use thiserror::Error;

use fraglink_xml::{LoadError, SaveError};

/// Model-level invariant violations found while planning repairs.
///
/// These are fatal for the model being repaired. Individual dangling links
/// are not errors; they are reported and classify the model as broken.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error(
        "Ambiguous fragment name `{name}` in `{reference}`: matches {}",
        .candidates.join(", ")
    )]
    AmbiguousFragment {
        name: String,
        reference: String,
        candidates: Vec<String>,
    },

    #[error("Unknown fragment `{name}` referenced by `{reference}`")]
    UnknownFragment { name: String, reference: String },

    #[error("Invalid link pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// The main error type for fraglink operations.
#[derive(Debug, Error)]
pub enum FraglinkError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Save error: {0}")]
    Save(#[from] SaveError),

    #[error("Repair error: {0}")]
    Repair(#[from] RepairError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Git error: {0}")]
    Git(String),

    #[error(
        "Worktree is dirty, commit or stash changes and try again: {}",
        .0.join(", ")
    )]
    DirtyWorktree(Vec<String>),
}
