//! Command-line argument definitions for the fraglink CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the models to check, whether to write
//! repairs and commit them, configuration file selection, and logging
//! verbosity.

use std::path::PathBuf;

use clap::Parser;

/// Repair merge-tool corrupted links between Capella model fragments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Root files of the models to check, relative to the working directory.
    ///
    /// Defaults to every tracked model file in the repository below the
    /// working directory.
    #[arg(short, long = "model", value_name = "FILE")]
    pub models: Vec<PathBuf>,

    /// Write repaired fragments back to disk
    #[arg(long)]
    pub fix: bool,

    /// Leave repaired fragments unstaged and do not commit them
    #[arg(long)]
    pub no_commit: bool,

    /// Commit message for repaired models (overrides the configuration)
    #[arg(long)]
    pub commit_message: Option<String>,

    /// Directory inside the repository to work from
    #[arg(short = 'C', long, value_name = "DIR")]
    pub repo: Option<PathBuf>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["fraglink"]);
        assert!(args.models.is_empty());
        assert!(!args.fix);
        assert!(!args.no_commit);
        assert_eq!(args.log_level, "warn");
    }

    #[test]
    fn test_repeated_models() {
        let args = Args::parse_from([
            "fraglink",
            "--fix",
            "-m",
            "a/a.aird",
            "--model",
            "b/b.aird",
            "-C",
            "repo",
        ]);
        assert_eq!(args.models, vec![PathBuf::from("a/a.aird"), PathBuf::from("b/b.aird")]);
        assert!(args.fix);
        assert_eq!(args.repo, Some(PathBuf::from("repo")));
    }
}
