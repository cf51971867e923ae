//! CLI logic for the fraglink repair tool.
//!
//! [`run`] checks every selected model of a git repository, optionally
//! writes and commits the repairs, and reports a [`RunOutcome`] that maps to
//! the process exit code.

pub mod error_adapter;
pub mod git;

mod args;
mod config;

pub use args::Args;

use std::{env, path::Path};

use log::{error, info, warn};

use fraglink::{
    FraglinkError, LinkFixer, LogReporter, ModelFixResult, WorktreeSink, config::AppConfig,
};

use git::{IndexSink, ModelRepository};

/// Exit code for runs aborted by an error.
pub const FATAL_EXIT_CODE: i32 = 3;

const RULE: &str = "********************************************************************************";

/// Overall result of a run, worst model first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunOutcome {
    /// Every model is fine.
    Clean,
    /// Repairs were found (and applied with `--fix`); a human should review them.
    FixedNeedsReview,
    /// At least one model has links that cannot be repaired.
    Broken,
}

impl RunOutcome {
    pub fn from_flags(changes: bool, broken: bool) -> Self {
        match (changes, broken) {
            (_, true) => Self::Broken,
            (true, false) => Self::FixedNeedsReview,
            (false, false) => Self::Clean,
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::FixedNeedsReview => 1,
            Self::Broken => 2,
        }
    }

    /// The framed, coloured message printed at the end of a run.
    pub fn banner(self) -> String {
        let (color, text) = match self {
            Self::Clean => ("\x1b[92m", "It looks like your model is fine!"),
            Self::FixedNeedsReview => (
                "\x1b[93m",
                "The model was broken, but some automatic fixes have been applied.\n\
                 Please verify that these changes are correct before pushing them.\n\
                 Contact your tools team if you need further assistance.",
            ),
            Self::Broken => (
                "\x1b[91m",
                "The model is broken, in a way we can't fix automatically!\n\
                 Please contact your tools team to get assistance in repairing it.",
            ),
        };
        format!("{color}{RULE}\x1b[m\n\n{text}\n\n{color}{RULE}\x1b[m")
    }
}

/// Run the fraglink CLI application
///
/// Checks each selected model, saves repairs with `--fix` (staged, unless
/// `--no-commit`), and commits once at the end when anything was staged.
///
/// # Errors
///
/// Returns `FraglinkError` for:
/// - A dirty worktree
/// - Configuration or git errors
/// - Models that cannot be loaded, repaired or written
pub fn run(args: &Args) -> Result<RunOutcome, FraglinkError> {
    let base = match &args.repo {
        Some(dir) => dir.clone(),
        None => env::current_dir()?,
    };

    let app_config = config::load_config(args.config.as_ref())?;
    let repo = ModelRepository::discover(&base)?;

    let dirty = repo.unstaged_changes()?;
    if !dirty.is_empty() {
        return Err(FraglinkError::DirtyWorktree(dirty));
    }

    let models = repo.tracked_models(&base, app_config.git().model_suffix(), &args.models)?;
    if models.is_empty() {
        warn!(base = base.display().to_string(); "No tracked models found");
    }

    let fixer = LinkFixer::new(app_config.repair())?;
    let mut changes = false;
    let mut broken = false;
    let mut staged = false;

    for model_path in &models {
        let result = check_model(&fixer, &repo, model_path, args)?;
        changes |= result.has_changes();
        broken |= result.is_broken();
        staged |= result.has_changes() && args.fix && !args.no_commit;
    }

    if changes {
        if !args.fix {
            info!("Not committing changes without --fix");
        } else if args.no_commit {
            info!("Not committing changes (--no-commit)");
        } else if staged {
            repo.commit(commit_message(args, &app_config))?;
        }
    }

    Ok(RunOutcome::from_flags(changes, broken))
}

fn check_model(
    fixer: &LinkFixer,
    repo: &ModelRepository,
    model_path: &Path,
    args: &Args,
) -> Result<ModelFixResult, FraglinkError> {
    let display = model_path
        .strip_prefix(repo.workdir())
        .unwrap_or(model_path)
        .display()
        .to_string();
    info!(model = display; "Loading model");

    let mut model = fixer.load(model_path)?;
    let report = fixer.fix(&mut model, &mut LogReporter)?;

    match report.result {
        ModelFixResult::NoChanges => info!(model = display; "Model is clean, not saving"),
        ModelFixResult::Fixed => info!(model = display; "Model was fixed"),
        ModelFixResult::PartiallyFixed => {
            warn!(model = display, dangling = report.stats.dangling_links; "Model was partially fixed")
        }
        ModelFixResult::Broken => {
            error!(model = display, dangling = report.stats.dangling_links; "No fixes available for model")
        }
    }

    if report.result.has_changes() {
        if !args.fix {
            info!(model = display; "Not saving model without --fix");
        } else if args.no_commit {
            fixer.save(&mut model, &mut WorktreeSink)?;
        } else {
            fixer.save(&mut model, &mut IndexSink::new(repo))?;
        }
    }

    Ok(report.result)
}

fn commit_message<'a>(args: &'a Args, config: &'a AppConfig) -> &'a str {
    args.commit_message
        .as_deref()
        .unwrap_or_else(|| config.git().commit_message())
}
