//! Repairing the links of a single element.
//!
//! [`repair_element`] only inspects the model. It returns the edits the
//! element needs as an [`ElementRepair`]; applying them is left to
//! [`RepairPlan`](crate::RepairPlan).

use std::ops::AddAssign;

use log::trace;

use fraglink_core::{Element, ElementId, FragmentId, FragmentKind, ID_ATTRIBUTES, Model, ModelLookup};

use crate::{
    error::RepairError,
    matcher::{LinkMatcher, LinkToken, split_links},
    path::{find_fragment_by_name, relative_link_path},
    report::{DeletionReason, RepairEvent, RepairReporter},
};

/// Tag of the `.aird` entries listing the model's semantic fragments.
pub const SEMANTIC_RESOURCES: &str = "semanticResources";

/// Tag of representation descriptors in visual fragments.
pub const REPRESENTATION_DESCRIPTORS: &str = "ownedRepresentationDescriptors";

/// Links in this attribute are never type-qualified.
const HREF: &str = "href";

/// Counters collected while repairing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairStats {
    pub elements_visited: usize,
    pub links_inspected: usize,
    pub links_rewritten: usize,
    pub spurious_prefixes: usize,
    pub dangling_links: usize,
    pub elements_deleted: usize,
}

impl AddAssign for RepairStats {
    fn add_assign(&mut self, other: Self) {
        self.elements_visited += other.elements_visited;
        self.links_inspected += other.links_inspected;
        self.links_rewritten += other.links_rewritten;
        self.spurious_prefixes += other.spurious_prefixes;
        self.dangling_links += other.dangling_links;
        self.elements_deleted += other.elements_deleted;
    }
}

/// A change to one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    SetText(String),
    SetAttribute { name: String, value: String },
}

/// Everything [`repair_element`] decided about one element.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ElementRepair {
    pub edits: Vec<Edit>,
    pub delete: bool,
    pub broken: bool,
    pub stats: RepairStats,
}

impl ElementRepair {
    /// Whether applying this repair changes the model.
    pub fn changed(&self) -> bool {
        self.delete || !self.edits.is_empty()
    }
}

/// Read-only inputs shared by every element repair of one model.
pub struct RepairContext<'a> {
    model: &'a Model,
    lookup: &'a dyn ModelLookup,
    matcher: &'a LinkMatcher,
}

impl<'a> RepairContext<'a> {
    pub fn new(model: &'a Model, lookup: &'a dyn ModelLookup, matcher: &'a LinkMatcher) -> Self {
        Self {
            model,
            lookup,
            matcher,
        }
    }
}

/// Computes the repair for one element.
///
/// Detached elements yield an empty repair.
///
/// # Errors
///
/// Returns [`RepairError`] if a `semanticResources` entry names no fragment or
/// more than one.
pub fn repair_element(
    ctx: &RepairContext<'_>,
    id: ElementId,
    reporter: &mut dyn RepairReporter,
) -> Result<ElementRepair, RepairError> {
    let mut repair = ElementRepair::default();
    let Some(source) = ctx.lookup.fragment_of(id) else {
        return Ok(repair);
    };
    let element = ctx.model.element(id);

    if element.tag() == SEMANTIC_RESOURCES {
        repair_semantic_resource(ctx, element, source, &mut repair, reporter)?;
        if repair.delete {
            return Ok(repair);
        }
    }

    let fragment = ctx.model.fragment(source).path();
    for attr in element.attributes() {
        let Some(links) = split_links(attr.value()) else {
            trace!(attribute = attr.name(); "Not a link list");
            continue;
        };
        if links.is_empty() {
            continue;
        }

        let mut rebuilt = Vec::with_capacity(links.len());
        for link in &links {
            repair.stats.links_inspected += 1;

            if let Some(prefix) = ctx.matcher.spurious_prefix(link.path()) {
                repair.stats.spurious_prefixes += 1;
                reporter.report(RepairEvent::SpuriousPrefix {
                    fragment: fragment.to_string(),
                    prefix: prefix.to_string(),
                    link: link.to_string(),
                });
            }

            let resolved = ctx
                .lookup
                .follow_link(link.reference_id())
                .and_then(|target| create_link(ctx, source, target, link, attr.name() != HREF));
            match resolved {
                Some(new_link) => rebuilt.push(new_link),
                None if is_foreign_representation(ctx, element, source, link) => {
                    schedule_deletion(
                        &mut repair,
                        reporter,
                        fragment,
                        element.tag(),
                        DeletionReason::ForeignRepresentation,
                    );
                    return Ok(repair);
                }
                None => {
                    repair.broken = true;
                    repair.stats.dangling_links += 1;
                    reporter.report(RepairEvent::DanglingLink {
                        fragment: fragment.to_string(),
                        tag: element.tag().to_string(),
                        attribute: attr.name().to_string(),
                        link: link.to_string(),
                    });
                    rebuilt.push(link.to_string());
                }
            }
        }

        let new_value = rebuilt.join(" ");
        if new_value != attr.value().trim() {
            repair.stats.links_rewritten += 1;
            reporter.report(RepairEvent::LinkRewritten {
                fragment: fragment.to_string(),
                attribute: attr.name().to_string(),
                old: attr.value().to_string(),
                new: new_value.clone(),
            });
            repair.edits.push(Edit::SetAttribute {
                name: attr.name().to_string(),
                value: new_value,
            });
        }
    }

    Ok(repair)
}

fn repair_semantic_resource(
    ctx: &RepairContext<'_>,
    element: &Element,
    source: FragmentId,
    repair: &mut ElementRepair,
    reporter: &mut dyn RepairReporter,
) -> Result<(), RepairError> {
    let fragment = ctx.model.fragment(source).path();
    let text = element.text().unwrap_or_default().trim();

    if text.is_empty() {
        schedule_deletion(repair, reporter, fragment, SEMANTIC_RESOURCES, DeletionReason::EmptyResource);
        return Ok(());
    }

    repair.stats.links_inspected += 1;
    for corrupted in ctx.matcher.find_corrupted(text) {
        repair.stats.spurious_prefixes += 1;
        reporter.report(RepairEvent::SpuriousPrefix {
            fragment: fragment.to_string(),
            prefix: corrupted.prefix.to_string(),
            link: text.to_string(),
        });
    }

    let target = find_fragment_by_name(ctx.model, text)?;
    if target == source {
        schedule_deletion(repair, reporter, fragment, SEMANTIC_RESOURCES, DeletionReason::SelfReference);
        return Ok(());
    }

    let new_text = relative_link_path(ctx.model, source, target);
    if new_text != text {
        repair.stats.links_rewritten += 1;
        reporter.report(RepairEvent::SemanticResourceRewritten {
            fragment: fragment.to_string(),
            old: text.to_string(),
            new: new_text.clone(),
        });
        repair.edits.push(Edit::SetText(new_text));
    }
    Ok(())
}

fn schedule_deletion(
    repair: &mut ElementRepair,
    reporter: &mut dyn RepairReporter,
    fragment: &str,
    tag: &str,
    reason: DeletionReason,
) {
    repair.delete = true;
    reporter.report(RepairEvent::ElementScheduledForDeletion {
        fragment: fragment.to_string(),
        tag: tag.to_string(),
        reason,
    });
}

/// Builds the canonical link from `source` to the element `target`.
///
/// Returns `None` if `target` is no longer part of the model.
pub fn create_link(
    ctx: &RepairContext<'_>,
    source: FragmentId,
    target: ElementId,
    original: &LinkToken<'_>,
    qualify: bool,
) -> Option<String> {
    let target_fragment = ctx.lookup.fragment_of(target)?;
    let element = ctx.model.element(target);
    let reference_id = ID_ATTRIBUTES
        .iter()
        .find_map(|attr| element.attribute(attr))
        .unwrap_or_else(|| original.reference_id());

    let link = format!("{}#{reference_id}", relative_link_path(ctx.model, source, target_fragment));
    match element.xtype() {
        Some(xtype) if qualify && target_fragment != source => Some(format!("{xtype} {link}")),
        _ => Some(link),
    }
}

/// A representation descriptor in a visual fragment that points into
/// another repository cannot be repaired locally and is dropped instead.
fn is_foreign_representation(
    ctx: &RepairContext<'_>,
    element: &Element,
    source: FragmentId,
    link: &LinkToken<'_>,
) -> bool {
    element.tag() == REPRESENTATION_DESCRIPTORS
        && ctx.model.fragment(source).kind() == FragmentKind::Visual
        && ctx.matcher.is_foreign(link.path())
}
