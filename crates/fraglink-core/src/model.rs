//! Arena-backed representation of a multi-fragment model.
//!
//! A [`Model`] owns a flat set of [`Fragment`]s (one per file) and every
//! [`Element`] of every fragment. Elements are addressed by [`ElementId`] and
//! never move once created; removing an element only detaches it from its
//! parent.
//!
//! Values read from disk keep their original escaped form next to the
//! decoded one, so untouched parts of a fragment can be written back exactly
//! as they were read.

use std::{
    fmt,
    path::{Path, PathBuf},
};

/// File suffixes that identify a model fragment.
pub const FRAGMENT_SUFFIXES: &[&str] = &[
    "aird",
    "airdfragment",
    "capella",
    "capellafragment",
    "melodymodeller",
    "melodyfragment",
];

/// Index of a [`Fragment`] inside its [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId(usize);

impl FragmentId {
    /// Returns the position of the fragment in the model.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fragment#{}", self.0)
    }
}

/// Index of an [`Element`] inside its [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl ElementId {
    /// Returns the position of the element in the model arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Whether a fragment holds semantic model content or diagram data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    /// Semantic content (`.capella`, `.capellafragment`, ...).
    Semantic,
    /// Diagrams and representations (`.aird`, `.airdfragment`).
    Visual,
}

impl FragmentKind {
    /// Derives the kind from a file name, or `None` for non-fragment files.
    ///
    /// # Examples
    ///
    /// ```
    /// use fraglink_core::FragmentKind;
    ///
    /// assert_eq!(FragmentKind::from_file_name("x.aird"), Some(FragmentKind::Visual));
    /// assert_eq!(FragmentKind::from_file_name("x.capellafragment"), Some(FragmentKind::Semantic));
    /// assert_eq!(FragmentKind::from_file_name("x.afm"), None);
    /// ```
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, suffix) = name.rsplit_once('.')?;
        match suffix {
            "aird" | "airdfragment" => Some(Self::Visual),
            "capella" | "capellafragment" | "melodymodeller" | "melodyfragment" => {
                Some(Self::Semantic)
            }
            _ => None,
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semantic => write!(f, "semantic"),
            Self::Visual => write!(f, "visual"),
        }
    }
}

/// One file of a model.
#[derive(Debug, Clone)]
pub struct Fragment {
    name: String,
    path: String,
    kind: FragmentKind,
    nodes: Vec<Node>,
    modified: bool,
}

impl Fragment {
    /// Creates an empty fragment.
    ///
    /// # Arguments
    ///
    /// * `path` - Location relative to the model root, `/`-separated.
    /// * `kind` - Semantic or visual content.
    pub fn new(path: impl Into<String>, kind: FragmentKind) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            name,
            path,
            kind,
            nodes: Vec::new(),
            modified: false,
        }
    }

    /// The file name, e.g. `other.capellafragment`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The path relative to the model root, e.g. `fragments/other.capellafragment`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The directory part of [`Fragment::path`], empty for the model root directory.
    pub fn directory(&self) -> &str {
        self.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    /// Document-level nodes: declaration, comments and the root element.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The document element, if the fragment has been populated.
    pub fn root(&self) -> Option<ElementId> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(id) => Some(*id),
            _ => None,
        })
    }

    /// Whether any element of this fragment changed since loading.
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

/// An attribute of an [`Element`], in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    value: String,
    raw: Option<String>,
}

impl Attribute {
    /// Creates an attribute with no recorded on-disk form.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            raw: None,
        }
    }

    /// Creates an attribute that remembers its escaped on-disk form.
    pub fn with_raw(
        name: impl Into<String>,
        value: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            raw: Some(raw.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The decoded value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The escaped value as read from disk, unless it has been changed since.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

/// A run of character data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    value: String,
    raw: Option<String>,
}

impl TextNode {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            raw: None,
        }
    }

    pub fn with_raw(value: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            raw: Some(raw.into()),
        }
    }

    /// The decoded text.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The escaped text as read from disk, unless it has been changed since.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Whether the text is only indentation.
    pub fn is_whitespace(&self) -> bool {
        self.value.chars().all(char::is_whitespace)
    }
}

/// A child of an element or of a fragment's document.
///
/// Non-element variants hold the raw content between their delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(ElementId),
    Text(TextNode),
    Comment(String),
    CData(String),
    ProcessingInstruction(String),
    Declaration(String),
    DocType(String),
}

/// A node of a fragment's content tree.
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attributes: Vec<Attribute>,
    content: Vec<Node>,
    parent: Option<ElementId>,
    fragment: FragmentId,
    self_closing: bool,
    raw_start: Option<String>,
    detached: bool,
}

impl Element {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns the decoded value of the named attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    pub fn content(&self) -> &[Node] {
        &self.content
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// The fragment this element was created in.
    pub fn fragment(&self) -> FragmentId {
        self.fragment
    }

    /// Text preceding the first child node, if any.
    pub fn text(&self) -> Option<&str> {
        match self.content.first() {
            Some(Node::Text(text)) => Some(text.value()),
            _ => None,
        }
    }

    /// The element's model type, used to qualify cross-fragment links.
    ///
    /// This is the `xsi:type` attribute, or the tag itself for namespaced
    /// document elements.
    pub fn xtype(&self) -> Option<&str> {
        self.attribute("xsi:type")
            .or_else(|| self.tag.contains(':').then_some(self.tag.as_str()))
    }

    /// Whether the element was written as `<tag/>` on disk.
    pub fn is_self_closing(&self) -> bool {
        self.self_closing
    }

    /// The original start tag content (without `<` and `>`), until changed.
    pub fn raw_start(&self) -> Option<&str> {
        self.raw_start.as_deref()
    }

    /// Whether the element has been removed from its tree.
    pub fn is_detached(&self) -> bool {
        self.detached
    }
}

/// An in-memory model: every fragment and every element.
#[derive(Debug, Clone)]
pub struct Model {
    root_dir: PathBuf,
    fragments: Vec<Fragment>,
    elements: Vec<Element>,
}

impl Model {
    /// Creates an empty model whose fragment paths are relative to `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            fragments: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn add_fragment(&mut self, fragment: Fragment) -> FragmentId {
        self.fragments.push(fragment);
        FragmentId(self.fragments.len() - 1)
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this model.
    pub fn fragment(&self, id: FragmentId) -> &Fragment {
        &self.fragments[id.0]
    }

    pub fn fragments(&self) -> impl Iterator<Item = (FragmentId, &Fragment)> {
        self.fragments
            .iter()
            .enumerate()
            .map(|(idx, fragment)| (FragmentId(idx), fragment))
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this model.
    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    /// Appends a new element to `parent`, or to the fragment's document when
    /// `parent` is `None`.
    pub fn push_element(
        &mut self,
        fragment: FragmentId,
        parent: Option<ElementId>,
        tag: impl Into<String>,
        attributes: Vec<Attribute>,
    ) -> ElementId {
        let id = ElementId(self.elements.len());
        self.elements.push(Element {
            tag: tag.into(),
            attributes,
            content: Vec::new(),
            parent,
            fragment,
            self_closing: false,
            raw_start: None,
            detached: false,
        });
        self.push_node(fragment, parent, Node::Element(id));
        id
    }

    /// Appends a node to `parent`, or to the fragment's document when
    /// `parent` is `None`. Elements are added with [`Model::push_element`].
    pub fn push_node(&mut self, fragment: FragmentId, parent: Option<ElementId>, node: Node) {
        match parent {
            Some(parent) => self.elements[parent.0].content.push(node),
            None => self.fragments[fragment.0].nodes.push(node),
        }
    }

    /// Records how an element was written on disk.
    pub fn set_source_form(&mut self, id: ElementId, raw_start: Option<String>, self_closing: bool) {
        let element = &mut self.elements[id.0];
        element.raw_start = raw_start;
        element.self_closing = self_closing;
    }

    /// All attached elements of one fragment in document order.
    pub fn descendants(&self, fragment: FragmentId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self.fragments[fragment.0]
            .nodes
            .iter()
            .rev()
            .filter_map(element_of)
            .collect();

        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.elements[id.0].content.iter().rev().filter_map(element_of));
        }

        out
    }

    /// All attached elements of all fragments, fragment by fragment in
    /// document order.
    pub fn iter_all(&self) -> Vec<ElementId> {
        (0..self.fragments.len())
            .flat_map(|idx| self.descendants(FragmentId(idx)))
            .collect()
    }

    /// Sets an attribute value, appending the attribute if it is missing.
    ///
    /// Returns `false` when the value was already equal.
    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        let element = &mut self.elements[id.0];

        match element.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) if attr.value == value => return false,
            Some(attr) => {
                attr.value = value;
                attr.raw = None;
            }
            None => element.attributes.push(Attribute::new(name, value)),
        }

        element.raw_start = None;
        let fragment = element.fragment;
        self.fragments[fragment.0].modified = true;
        true
    }

    /// Replaces the text preceding the element's first child.
    ///
    /// Returns `false` when the text was already equal.
    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) -> bool {
        let text = text.into();
        let element = &mut self.elements[id.0];

        match element.content.first_mut() {
            Some(Node::Text(node)) if node.value == text => return false,
            Some(Node::Text(node)) => *node = TextNode::new(text),
            _ => element.content.insert(0, Node::Text(TextNode::new(text))),
        }

        // `<tag/>` cannot carry text
        element.self_closing = false;
        let fragment = element.fragment;
        self.fragments[fragment.0].modified = true;
        true
    }

    /// Detaches an element (and with it its subtree) from the tree.
    ///
    /// The indentation preceding the element is removed along with it.
    /// Returns `false` if the element was already detached.
    pub fn remove_element(&mut self, id: ElementId) -> bool {
        let element = &self.elements[id.0];
        if element.detached {
            return false;
        }

        let fragment = element.fragment;
        let parent = element.parent;
        let siblings = match parent {
            Some(parent) => &mut self.elements[parent.0].content,
            None => &mut self.fragments[fragment.0].nodes,
        };

        let Some(pos) = siblings
            .iter()
            .position(|node| matches!(node, Node::Element(child) if *child == id))
        else {
            return false;
        };

        siblings.remove(pos);
        if pos > 0 && matches!(&siblings[pos - 1], Node::Text(text) if text.is_whitespace()) {
            siblings.remove(pos - 1);
        }

        self.elements[id.0].detached = true;
        self.fragments[fragment.0].modified = true;
        true
    }

    /// Fragments changed since loading (or since the last [`Model::clear_modified`]).
    pub fn modified_fragments(&self) -> impl Iterator<Item = (FragmentId, &Fragment)> {
        self.fragments().filter(|(_, fragment)| fragment.modified)
    }

    /// Marks all fragments as unchanged, typically after saving.
    pub fn clear_modified(&mut self) {
        for fragment in &mut self.fragments {
            fragment.modified = false;
        }
    }
}

fn element_of(node: &Node) -> Option<ElementId> {
    match node {
        Node::Element(id) => Some(*id),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indented_model() -> (Model, FragmentId, ElementId, Vec<ElementId>) {
        let mut model = Model::new("/models/demo");
        let frag = model.add_fragment(Fragment::new("demo.capella", FragmentKind::Semantic));
        let root = model.push_element(frag, None, "Project", vec![]);
        let mut children = Vec::new();
        for name in ["a", "b", "c"] {
            model.push_node(frag, Some(root), Node::Text(TextNode::new("\n  ")));
            children.push(model.push_element(
                frag,
                Some(root),
                "ownedPart",
                vec![Attribute::new("name", name)],
            ));
        }
        model.push_node(frag, Some(root), Node::Text(TextNode::new("\n")));
        (model, frag, root, children)
    }

    #[test]
    fn test_fragment_name_and_directory() {
        let fragment = Fragment::new("fragments/sub/x.capellafragment", FragmentKind::Semantic);
        assert_eq!(fragment.name(), "x.capellafragment");
        assert_eq!(fragment.directory(), "fragments/sub");

        let root = Fragment::new("x.aird", FragmentKind::Visual);
        assert_eq!(root.name(), "x.aird");
        assert_eq!(root.directory(), "");
    }

    #[test]
    fn test_descendants_in_document_order() {
        let (mut model, frag, root, children) = indented_model();
        let grandchild = model.push_element(frag, Some(children[0]), "ownedFunction", vec![]);

        let order = model.descendants(frag);
        assert_eq!(
            order,
            vec![root, children[0], grandchild, children[1], children[2]]
        );
    }

    #[test]
    fn test_iter_all_spans_fragments() {
        let (mut model, _, _, _) = indented_model();
        let other = model.add_fragment(Fragment::new("other.capella", FragmentKind::Semantic));
        let other_root = model.push_element(other, None, "Library", vec![]);

        let all = model.iter_all();
        assert_eq!(all.len(), 5);
        assert_eq!(all.last(), Some(&other_root));
    }

    #[test]
    fn test_set_attribute_marks_fragment_modified() {
        let (mut model, frag, _, children) = indented_model();
        assert!(!model.fragment(frag).is_modified());

        assert!(!model.set_attribute(children[0], "name", "a"));
        assert!(!model.fragment(frag).is_modified());

        assert!(model.set_attribute(children[0], "name", "renamed"));
        assert!(model.fragment(frag).is_modified());
        assert_eq!(model.element(children[0]).attribute("name"), Some("renamed"));
    }

    #[test]
    fn test_set_attribute_drops_raw_forms() {
        let mut model = Model::new(".");
        let frag = model.add_fragment(Fragment::new("a.capella", FragmentKind::Semantic));
        let el = model.push_element(
            frag,
            None,
            "Project",
            vec![Attribute::with_raw("name", "a&b", "a&amp;b")],
        );
        model.set_source_form(el, Some("Project name=\"a&amp;b\"".into()), true);

        model.set_attribute(el, "name", "c");
        let element = model.element(el);
        assert_eq!(element.attributes()[0].raw(), None);
        assert_eq!(element.raw_start(), None);
        assert!(element.is_self_closing());
    }

    #[test]
    fn test_set_text_replaces_leading_text() {
        let mut model = Model::new(".");
        let frag = model.add_fragment(Fragment::new("a.aird", FragmentKind::Visual));
        let el = model.push_element(frag, None, "semanticResources", vec![]);
        assert_eq!(model.element(el).text(), None);

        assert!(model.set_text(el, "a.capella"));
        assert_eq!(model.element(el).text(), Some("a.capella"));
        assert!(!model.set_text(el, "a.capella"));
        assert!(model.set_text(el, "b.capella"));
        assert_eq!(model.element(el).content().len(), 1);
    }

    #[test]
    fn test_remove_element_takes_preceding_indentation() {
        let (mut model, frag, root, children) = indented_model();

        assert!(model.remove_element(children[2]));
        assert!(!model.remove_element(children[2]));

        let content = model.element(root).content();
        assert_eq!(content.len(), 5);
        assert!(matches!(content.last(), Some(Node::Text(t)) if t.value() == "\n"));
        assert!(model.element(children[2]).is_detached());
        assert!(!model.descendants(frag).contains(&children[2]));
        assert!(model.fragment(frag).is_modified());
    }

    #[test]
    fn test_remove_subtree_hides_descendants() {
        let (mut model, frag, _, children) = indented_model();
        let grandchild = model.push_element(frag, Some(children[1]), "ownedFunction", vec![]);

        model.remove_element(children[1]);
        let remaining = model.descendants(frag);
        assert!(!remaining.contains(&children[1]));
        assert!(!remaining.contains(&grandchild));
    }

    #[test]
    fn test_xtype() {
        let mut model = Model::new(".");
        let frag = model.add_fragment(Fragment::new("a.capella", FragmentKind::Semantic));
        let root = model.push_element(
            frag,
            None,
            "org.polarsys.capella.core.data.capellamodeller:Project",
            vec![],
        );
        let typed = model.push_element(
            frag,
            Some(root),
            "ownedParts",
            vec![Attribute::new("xsi:type", "org.polarsys.capella.core.data.cs:Part")],
        );
        let untyped = model.push_element(frag, Some(root), "ownedParts", vec![]);

        assert_eq!(
            model.element(root).xtype(),
            Some("org.polarsys.capella.core.data.capellamodeller:Project")
        );
        assert_eq!(
            model.element(typed).xtype(),
            Some("org.polarsys.capella.core.data.cs:Part")
        );
        assert_eq!(model.element(untyped).xtype(), None);
    }

    #[test]
    fn test_modified_fragments_and_clear() {
        let (mut model, frag, _, children) = indented_model();
        let other = model.add_fragment(Fragment::new("other.capella", FragmentKind::Semantic));
        model.push_element(other, None, "Library", vec![]);

        model.set_attribute(children[0], "name", "x");
        let modified: Vec<_> = model.modified_fragments().map(|(id, _)| id).collect();
        assert_eq!(modified, vec![frag]);

        model.clear_modified();
        assert_eq!(model.modified_fragments().count(), 0);
    }

    mod proptest_tests {
        use std::collections::HashSet;

        use proptest::{prelude::*, sample::Index};

        use super::*;

        /// Builds a tree where each new element hangs below a random earlier
        /// one, removes some elements, then checks which ones are visited.
        fn check_traversal(parents: &[Index], removals: &[Index]) -> Result<(), TestCaseError> {
            let mut model = Model::new(".");
            let frag = model.add_fragment(Fragment::new("a.capella", FragmentKind::Semantic));
            let mut ids = vec![model.push_element(frag, None, "Project", vec![])];
            let mut parent_of: Vec<Option<usize>> = vec![None];

            for index in parents {
                let parent = index.index(ids.len());
                let parent_id = ids[parent];
                ids.push(model.push_element(frag, Some(parent_id), "ownedPart", vec![]));
                parent_of.push(Some(parent));
            }

            let mut removed = vec![false; ids.len()];
            for index in removals {
                let pos = index.index(ids.len());
                model.remove_element(ids[pos]);
                removed[pos] = true;
            }

            let hidden = |mut pos: usize| loop {
                if removed[pos] {
                    return true;
                }
                match parent_of[pos] {
                    Some(parent) => pos = parent,
                    None => return false,
                }
            };

            let visited = model.iter_all();
            let unique: HashSet<ElementId> = visited.iter().copied().collect();
            prop_assert_eq!(unique.len(), visited.len(), "element visited twice");

            for (pos, id) in ids.iter().enumerate() {
                prop_assert_eq!(unique.contains(id), !hidden(pos), "element {}", id);
            }
            Ok(())
        }

        proptest! {
            #[test]
            fn iter_all_visits_attached_elements_once(
                parents in prop::collection::vec(any::<Index>(), 0..24),
                removals in prop::collection::vec(any::<Index>(), 0..4),
            ) {
                check_traversal(&parents, &removals)?;
            }
        }
    }
}
