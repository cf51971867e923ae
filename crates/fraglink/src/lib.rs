//! Fraglink - Repairs cross-fragment links in Capella models.
//!
//! Merging a Capella model with git can leave links between fragments
//! prefixed with `index:/` or `commit:/`. Fraglink loads a model, rewrites
//! every link to its canonical relative form, and saves the fragments that
//! changed.

pub mod config;
pub mod matcher;
pub mod path;
pub mod repair;
pub mod report;

mod error;
mod fix;

pub use fraglink_core::{Model, ModelIndex, ModelLookup};
pub use fraglink_xml::{FileSink, WorktreeSink};

pub use error::{FraglinkError, RepairError};
pub use fix::{ModelFixResult, ModelReport, RepairPlan, fix_model, plan_repairs};
pub use report::{LogReporter, RepairEvent, RepairReporter};

use std::path::{Path, PathBuf};

use log::{debug, info, trace};

use config::RepairConfig;
use matcher::LinkMatcher;

/// Loads, repairs and saves Capella models.
///
/// # Examples
///
/// ```rust,no_run
/// use fraglink::{LinkFixer, LogReporter, ModelFixResult, WorktreeSink, config::RepairConfig};
///
/// let fixer = LinkFixer::new(&RepairConfig::default())
///     .expect("Failed to build fixer");
///
/// let mut model = fixer.load("models/demo/demo.aird")
///     .expect("Failed to load model");
///
/// let report = fixer.fix(&mut model, &mut LogReporter)
///     .expect("Model cannot be repaired");
///
/// if report.result.has_changes() {
///     fixer.save(&mut model, &mut WorktreeSink)
///         .expect("Failed to save model");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LinkFixer {
    matcher: LinkMatcher,
}

impl LinkFixer {
    /// Create a fixer recognizing the prefixes and schemes in `config`.
    ///
    /// # Errors
    ///
    /// Returns `FraglinkError::Repair` if the link pattern cannot be built.
    pub fn new(config: &RepairConfig) -> Result<Self, FraglinkError> {
        let matcher = LinkMatcher::from_config(config)?;
        trace!(matcher:?; "Link matcher built");
        Ok(Self { matcher })
    }

    /// Load a model from its root `.aird` file.
    ///
    /// # Errors
    ///
    /// Returns `FraglinkError::Load` if any fragment cannot be read or parsed.
    pub fn load(&self, root_file: impl AsRef<Path>) -> Result<Model, FraglinkError> {
        let model = fraglink_xml::load_model(root_file)?;
        debug!(fragments = model.fragment_count(); "Model ready for repair");
        Ok(model)
    }

    /// Repair every link of `model` in memory.
    ///
    /// # Errors
    ///
    /// Returns `FraglinkError::Repair` if a fragment reference is unknown or
    /// ambiguous. The model is unchanged in that case.
    pub fn fix(
        &self,
        model: &mut Model,
        reporter: &mut dyn RepairReporter,
    ) -> Result<ModelReport, FraglinkError> {
        info!(root = model.root_dir().display().to_string(); "Repairing model");
        Ok(fix_model(model, &self.matcher, reporter)?)
    }

    /// Write every modified fragment of `model` through `sink`.
    ///
    /// # Errors
    ///
    /// Returns `FraglinkError::Save` if a fragment cannot be written.
    pub fn save(
        &self,
        model: &mut Model,
        sink: &mut dyn FileSink,
    ) -> Result<Vec<PathBuf>, FraglinkError> {
        Ok(fraglink_xml::save_model(model, sink)?)
    }
}
