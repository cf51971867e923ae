//! Fragment and reference lookups.
//!
//! The repair logic never walks the model to answer "which fragment owns
//! this element" or "what does this reference id point to". It asks a
//! [`ModelLookup`] instead. [`ModelIndex`] answers from a loaded [`Model`];
//! tests can substitute their own implementation.

use std::collections::HashMap;

use log::{trace, warn};

use crate::model::{ElementId, FragmentId, Model};

/// Attributes holding an element's identity, in order of precedence.
pub const ID_ATTRIBUTES: &[&str] = &["id", "uid", "xmi:id"];

/// Capability to locate elements within a model.
pub trait ModelLookup {
    /// Returns the fragment owning `element`, or `None` if it belongs to no
    /// known fragment.
    fn fragment_of(&self, element: ElementId) -> Option<FragmentId>;

    /// Follows a reference id to its target element, or `None` if the
    /// reference is dangling.
    fn follow_link(&self, reference_id: &str) -> Option<ElementId>;
}

/// Id index over all attached elements of a [`Model`].
///
/// # Examples
///
/// ```
/// use fraglink_core::{Attribute, Fragment, FragmentKind, Model, ModelIndex, ModelLookup};
///
/// let mut model = Model::new(".");
/// let frag = model.add_fragment(Fragment::new("a.capella", FragmentKind::Semantic));
/// let root = model.push_element(frag, None, "Project", vec![Attribute::new("id", "p1")]);
///
/// let index = ModelIndex::new(&model);
/// assert_eq!(index.follow_link("p1"), Some(root));
/// assert_eq!(index.fragment_of(root), Some(frag));
/// assert_eq!(index.follow_link("missing"), None);
/// ```
#[derive(Debug)]
pub struct ModelIndex<'m> {
    model: &'m Model,
    ids: HashMap<&'m str, ElementId>,
}

impl<'m> ModelIndex<'m> {
    /// Indexes every attached element by its [`ID_ATTRIBUTES`].
    ///
    /// When two elements share an id, the first one in document order wins.
    pub fn new(model: &'m Model) -> Self {
        let mut ids = HashMap::new();

        for element_id in model.iter_all() {
            let element = model.element(element_id);
            for attr in ID_ATTRIBUTES {
                let Some(value) = element.attribute(attr) else {
                    continue;
                };
                if let Some(existing) = ids.insert(value, element_id) {
                    warn!(id = value, first:% = existing, second:% = element_id; "Duplicate element id");
                    ids.insert(value, existing);
                }
            }
        }

        trace!(ids = ids.len(); "Indexed model elements");
        Self { model, ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl ModelLookup for ModelIndex<'_> {
    fn fragment_of(&self, element: ElementId) -> Option<FragmentId> {
        let element = self.model.element(element);
        (!element.is_detached()).then(|| element.fragment())
    }

    fn follow_link(&self, reference_id: &str) -> Option<ElementId> {
        self.ids.get(reference_id).copied()
    }
}
