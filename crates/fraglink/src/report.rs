//! Diagnostics produced while repairing a model.
//!
//! Repairs never log directly. They emit [`RepairEvent`]s to a
//! [`RepairReporter`], which lets the CLI log them and tests collect them.

use std::fmt;

use log::{debug, error, info, warn};

/// Why an element is removed from its fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionReason {
    /// A `semanticResources` entry without text.
    EmptyResource,
    /// A `semanticResources` entry naming its own fragment.
    SelfReference,
    /// A representation descriptor whose target lives in another repository.
    ForeignRepresentation,
}

impl fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyResource => write!(f, "empty semantic resource"),
            Self::SelfReference => write!(f, "semantic resource references its own fragment"),
            Self::ForeignRepresentation => write!(f, "representation outside the working tree"),
        }
    }
}

/// One observation made while planning repairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairEvent {
    /// A link whose reference id does not exist anywhere in the model.
    DanglingLink {
        fragment: String,
        tag: String,
        attribute: String,
        link: String,
    },

    /// A link path carrying a merge-tool prefix.
    SpuriousPrefix {
        fragment: String,
        prefix: String,
        link: String,
    },

    /// An attribute value that will be replaced.
    LinkRewritten {
        fragment: String,
        attribute: String,
        old: String,
        new: String,
    },

    /// A `semanticResources` text that will be replaced.
    SemanticResourceRewritten {
        fragment: String,
        old: String,
        new: String,
    },

    ElementScheduledForDeletion {
        fragment: String,
        tag: String,
        reason: DeletionReason,
    },
}

/// Receives [`RepairEvent`]s.
pub trait RepairReporter {
    fn report(&mut self, event: RepairEvent);
}

impl RepairReporter for Vec<RepairEvent> {
    fn report(&mut self, event: RepairEvent) {
        self.push(event);
    }
}

/// Forwards events to the `log` facade.
///
/// Dangling links are errors, everything else is informational.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl RepairReporter for LogReporter {
    fn report(&mut self, event: RepairEvent) {
        match event {
            RepairEvent::DanglingLink {
                fragment,
                tag,
                attribute,
                link,
            } => {
                error!(fragment, tag, attribute; "Dangling link: {link}");
            }
            RepairEvent::SpuriousPrefix {
                fragment,
                prefix,
                link,
            } => {
                warn!(fragment, prefix; "Merge tool prefix in link: {link}");
            }
            RepairEvent::LinkRewritten {
                fragment,
                attribute,
                old,
                new,
            } => {
                debug!(fragment, attribute, old, new; "Rewriting link");
            }
            RepairEvent::SemanticResourceRewritten { fragment, old, new } => {
                debug!(fragment, old, new; "Rewriting semantic resource");
            }
            RepairEvent::ElementScheduledForDeletion {
                fragment,
                tag,
                reason,
            } => {
                info!(fragment, tag, reason:%; "Deleting element");
            }
        }
    }
}
