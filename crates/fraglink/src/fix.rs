//! Repairing a whole model.
//!
//! Repairs happen in two phases. [`plan_repairs`] walks every element and
//! collects the edits into a [`RepairPlan`] without touching the model;
//! [`RepairPlan::apply`] then performs all edits, followed by all deletions.
//! A model that fails planning is therefore never partially modified.

use std::fmt;

use log::{debug, info};

use fraglink_core::{ElementId, Model, ModelIndex, ModelLookup};

use crate::{
    error::RepairError,
    matcher::LinkMatcher,
    repair::{Edit, ElementRepair, RepairContext, RepairStats, repair_element},
    report::RepairReporter,
};

/// Outcome of repairing one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFixResult {
    /// Nothing needed to change.
    NoChanges,
    /// Every problem was repaired.
    Fixed,
    /// Some problems were repaired, but dangling links remain.
    PartiallyFixed,
    /// Dangling links remain and nothing could be repaired.
    Broken,
}

impl ModelFixResult {
    /// Classifies a model by whether it changed and whether links remain broken.
    pub fn from_flags(dirty: bool, broken: bool) -> Self {
        match (dirty, broken) {
            (false, false) => Self::NoChanges,
            (true, false) => Self::Fixed,
            (true, true) => Self::PartiallyFixed,
            (false, true) => Self::Broken,
        }
    }

    /// Whether the model was modified and needs saving.
    pub fn has_changes(self) -> bool {
        matches!(self, Self::Fixed | Self::PartiallyFixed)
    }

    /// Whether dangling links remain.
    pub fn is_broken(self) -> bool {
        matches!(self, Self::Broken | Self::PartiallyFixed)
    }
}

impl fmt::Display for ModelFixResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChanges => write!(f, "no changes"),
            Self::Fixed => write!(f, "fixed"),
            Self::PartiallyFixed => write!(f, "partially fixed"),
            Self::Broken => write!(f, "broken"),
        }
    }
}

/// Result and counters of one repaired model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelReport {
    pub result: ModelFixResult,
    pub stats: RepairStats,
}

/// Edits and deletions computed for a model, not yet applied.
#[derive(Debug, Default, Clone)]
pub struct RepairPlan {
    edits: Vec<(ElementId, Edit)>,
    deletions: Vec<ElementId>,
    broken: bool,
    stats: RepairStats,
}

impl RepairPlan {
    fn absorb(&mut self, id: ElementId, repair: ElementRepair) {
        self.edits
            .extend(repair.edits.into_iter().map(|edit| (id, edit)));
        if repair.delete {
            self.deletions.push(id);
        }
        self.broken |= repair.broken;
        self.stats += repair.stats;
    }

    /// Whether applying the plan changes the model.
    pub fn is_dirty(&self) -> bool {
        !self.edits.is_empty() || !self.deletions.is_empty()
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn result(&self) -> ModelFixResult {
        ModelFixResult::from_flags(self.is_dirty(), self.broken)
    }

    pub fn edits(&self) -> &[(ElementId, Edit)] {
        &self.edits
    }

    pub fn deletions(&self) -> &[ElementId] {
        &self.deletions
    }

    pub fn stats(&self) -> &RepairStats {
        &self.stats
    }

    /// Applies all edits, then all deletions.
    pub fn apply(self, model: &mut Model) -> ModelReport {
        let result = self.result();
        let mut stats = self.stats;

        for (id, edit) in self.edits {
            match edit {
                Edit::SetText(text) => model.set_text(id, text),
                Edit::SetAttribute { name, value } => model.set_attribute(id, &name, value),
            };
        }

        for id in self.deletions {
            if model.remove_element(id) {
                stats.elements_deleted += 1;
            }
        }

        debug!(
            result:% = result,
            rewritten = stats.links_rewritten,
            deleted = stats.elements_deleted;
            "Applied repair plan"
        );
        ModelReport { result, stats }
    }
}

/// Computes the repairs for every attached element of `model`.
///
/// # Errors
///
/// Returns the first [`RepairError`]; no plan is produced in that case.
pub fn plan_repairs(
    model: &Model,
    lookup: &dyn ModelLookup,
    matcher: &LinkMatcher,
    reporter: &mut dyn RepairReporter,
) -> Result<RepairPlan, RepairError> {
    let ctx = RepairContext::new(model, lookup, matcher);
    let mut plan = RepairPlan::default();

    for id in model.iter_all() {
        if lookup.fragment_of(id).is_none() {
            continue;
        }
        plan.stats.elements_visited += 1;
        let repair = repair_element(&ctx, id, reporter)?;
        plan.absorb(id, repair);
    }

    Ok(plan)
}

/// Plans and applies the repairs for `model`.
///
/// # Errors
///
/// Returns [`RepairError`] if the model cannot be repaired; the model is left
/// unchanged in that case.
pub fn fix_model(
    model: &mut Model,
    matcher: &LinkMatcher,
    reporter: &mut dyn RepairReporter,
) -> Result<ModelReport, RepairError> {
    let plan = {
        let index = ModelIndex::new(model);
        plan_repairs(model, &index, matcher, reporter)?
    };

    let report = plan.apply(model);
    info!(
        result:% = report.result,
        elements = report.stats.elements_visited,
        links = report.stats.links_inspected,
        dangling = report.stats.dangling_links;
        "Model repaired"
    );
    Ok(report)
}
