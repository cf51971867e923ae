//! Reading model files into a [`Model`].

use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    fs,
    path::{Path, PathBuf},
    str,
};

use log::{debug, info, trace};
use percent_encoding::percent_decode_str;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use walkdir::{DirEntry, WalkDir};

use fraglink_core::{Attribute, ElementId, Fragment, FragmentId, FragmentKind, Model, Node, TextNode};

use crate::error::LoadError;

const SEMANTIC_RESOURCES: &str = "semanticResources";

/// Loads a model from its root file.
///
/// Starting at the root file, every fragment the model references is
/// loaded: `semanticResources` entries and the path part of links in
/// attribute values. A reference is resolved relative to the fragment that
/// holds it; failing that (for instance behind a spurious `index:/` prefix)
/// every fragment file with the same name is loaded.
///
/// Candidate files live below the root file's directory. Hidden directories
/// are skipped, and so is any subdirectory holding its own file with the
/// root suffix, which belongs to a different model.
///
/// # Errors
///
/// Returns [`LoadError::NotAModel`] if the root file has no fragment suffix,
/// and I/O or XML errors for any fragment that cannot be read.
pub fn load_model(root_file: impl AsRef<Path>) -> Result<Model, LoadError> {
    let root_file = root_file.as_ref();
    let root_name = root_file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| LoadError::NotAModel(root_file.to_path_buf()))?;
    if FragmentKind::from_file_name(root_name).is_none() {
        return Err(LoadError::NotAModel(root_file.to_path_buf()));
    }
    let root_suffix = suffix_of(root_name);

    let root_dir = match root_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };

    info!(root = root_file.display().to_string(); "Loading model");

    let files = FragmentFiles::discover(&root_dir, root_suffix)?;
    let mut model = Model::new(&root_dir);

    let mut seen: HashSet<String> = HashSet::from([root_name.to_string()]);
    let mut pending = VecDeque::from([(root_name.to_string(), root_file.to_path_buf())]);

    while let Some((relative, path)) = pending.pop_front() {
        let fragment = load_file(&mut model, relative, &path)?;
        let directory = model.fragment(fragment).directory().to_string();

        for reference in fragment_references(&model, fragment) {
            for (relative, path) in files.resolve(&directory, &reference) {
                if seen.insert(relative.clone()) {
                    pending.push_back((relative, path));
                }
            }
        }
    }

    info!(
        root = root_file.display().to_string(),
        fragments = model.fragment_count();
        "Model loaded"
    );

    Ok(model)
}

/// Fragment files that may belong to a model, keyed by their path relative
/// to the model root.
#[derive(Debug, Default)]
struct FragmentFiles {
    by_path: BTreeMap<String, PathBuf>,
    by_name: BTreeMap<String, Vec<String>>,
}

impl FragmentFiles {
    fn discover(root_dir: &Path, root_suffix: Option<&str>) -> Result<Self, LoadError> {
        let mut files = Self::default();

        for entry in WalkDir::new(root_dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !(is_hidden(entry)
                        || (entry.file_type().is_dir()
                            && holds_model_root(entry.path(), root_suffix)))
            })
        {
            let entry = entry.map_err(|err| LoadError::Io {
                path: err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root_dir.to_path_buf()),
                source: err.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if FragmentKind::from_file_name(name).is_none() || suffix_of(name) == root_suffix {
                continue;
            }
            let Some(relative) = relative_path(root_dir, entry.path()) else {
                continue;
            };

            files
                .by_name
                .entry(name.to_string())
                .or_default()
                .push(relative.clone());
            files.by_path.insert(relative, entry.path().to_path_buf());
        }

        debug!(candidates = files.by_path.len(); "Discovered fragment files");
        Ok(files)
    }

    /// Files a reference found in a fragment under `directory` points at.
    fn resolve(&self, directory: &str, reference: &str) -> Vec<(String, PathBuf)> {
        let Some(path) = reference_path(reference) else {
            return Vec::new();
        };
        let name = path.rsplit('/').next().unwrap_or_default();
        if FragmentKind::from_file_name(name).is_none() {
            return Vec::new();
        }

        if let Some(joined) = join_relative(directory, &path) {
            if let Some(file) = self.by_path.get(&joined) {
                return vec![(joined, file.clone())];
            }
        }

        let matches: Vec<_> = self
            .by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|relative| {
                self.by_path
                    .get(relative)
                    .map(|file| (relative.clone(), file.clone()))
            })
            .collect();
        if matches.is_empty() {
            trace!(reference = reference; "Reference names no fragment file");
        }
        matches
    }
}

/// Path parts of `semanticResources` entries and of `path#id` links in
/// attribute values.
fn fragment_references(model: &Model, fragment: FragmentId) -> Vec<String> {
    let mut references = Vec::new();
    for id in model.descendants(fragment) {
        let element = model.element(id);
        if element.tag() == SEMANTIC_RESOURCES {
            if let Some(text) = element.text() {
                references.push(text.trim().to_string());
            }
        }
        for attribute in element.attributes() {
            references.extend(
                attribute
                    .value()
                    .split_whitespace()
                    .filter_map(|token| token.split_once('#'))
                    .map(|(path, _)| path)
                    .filter(|path| !path.is_empty())
                    .map(str::to_string),
            );
        }
    }
    references
}

/// The decoded file path of a reference, without any `scheme:/` prefix.
///
/// References into repositories (`cdo://`, `http://`) have no local path.
fn reference_path(reference: &str) -> Option<String> {
    if reference.is_empty() || reference.contains("://") {
        return None;
    }
    let path = reference
        .rsplit_once(":/")
        .map_or(reference, |(_, rest)| rest);
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    Some(decoded.into_owned())
}

/// Lexically joins `path` onto `directory`, or `None` if it escapes the root.
fn join_relative(directory: &str, path: &str) -> Option<String> {
    let mut parts: Vec<&str> = directory.split('/').filter(|s| !s.is_empty()).collect();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            segment => parts.push(segment),
        }
    }
    Some(parts.join("/"))
}

fn suffix_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, suffix)| suffix)
}

/// Whether `dir` directly contains a file with the root suffix.
fn holds_model_root(dir: &Path, root_suffix: Option<&str>) -> bool {
    let Some(root_suffix) = root_suffix else {
        return false;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        entry.file_type().is_ok_and(|kind| kind.is_file())
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| suffix_of(name) == Some(root_suffix))
    })
}

/// Parses XML source into an existing, empty fragment of `model`.
///
/// `path` is only used for error messages.
///
/// # Errors
///
/// Returns [`LoadError::Xml`] or [`LoadError::Structure`] if the source is
/// not well-formed.
pub fn parse_fragment(
    model: &mut Model,
    fragment: FragmentId,
    source: &str,
    path: &Path,
) -> Result<(), LoadError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut reader = Reader::from_str(source);
    let mut open: Vec<ElementId> = Vec::new();

    loop {
        let position = reader.buffer_position();
        let structure = |message: String| LoadError::Structure {
            path: path.to_path_buf(),
            position,
            message,
        };
        let event = reader.read_event().map_err(|source| LoadError::Xml {
            path: path.to_path_buf(),
            position,
            source,
        })?;
        let parent = open.last().copied();

        match event {
            Event::Start(start) => {
                let id = push_element(model, fragment, parent, &start, false).map_err(structure)?;
                open.push(id);
            }
            Event::Empty(start) => {
                push_element(model, fragment, parent, &start, true).map_err(structure)?;
            }
            Event::End(_) => {
                if open.pop().is_none() {
                    return Err(structure("closing tag without matching start".to_string()));
                }
            }
            Event::Text(text) => {
                let raw = utf8(&text).map_err(structure)?;
                let value = text
                    .unescape()
                    .map_err(|err| structure(err.to_string()))?;
                model.push_node(fragment, parent, Node::Text(TextNode::with_raw(value, raw)));
            }
            Event::CData(data) => {
                let raw = utf8(&data).map_err(structure)?;
                model.push_node(fragment, parent, Node::CData(raw.to_string()));
            }
            Event::Comment(comment) => {
                let raw = utf8(&comment).map_err(structure)?;
                model.push_node(fragment, parent, Node::Comment(raw.to_string()));
            }
            Event::Decl(decl) => {
                let raw = utf8(&decl).map_err(structure)?;
                model.push_node(fragment, parent, Node::Declaration(raw.to_string()));
            }
            Event::PI(pi) => {
                let raw = utf8(&pi).map_err(structure)?;
                model.push_node(fragment, parent, Node::ProcessingInstruction(raw.to_string()));
            }
            Event::DocType(doctype) => {
                let raw = utf8(&doctype).map_err(structure)?;
                model.push_node(fragment, parent, Node::DocType(raw.to_string()));
            }
            Event::Eof => break,
        }
    }

    if !open.is_empty() {
        return Err(LoadError::Structure {
            path: path.to_path_buf(),
            position: source.len(),
            message: format!("{} unclosed element(s) at end of file", open.len()),
        });
    }

    Ok(())
}

fn load_file(model: &mut Model, relative: String, path: &Path) -> Result<FragmentId, LoadError> {
    let Some(kind) = FragmentKind::from_file_name(&relative) else {
        return Err(LoadError::NotAModel(path.to_path_buf()));
    };

    let source = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let fragment = model.add_fragment(Fragment::new(relative, kind));
    parse_fragment(model, fragment, &source, path)?;

    debug!(
        fragment = model.fragment(fragment).path(),
        kind:% = kind;
        "Loaded fragment"
    );
    Ok(fragment)
}

fn push_element(
    model: &mut Model,
    fragment: FragmentId,
    parent: Option<ElementId>,
    start: &BytesStart<'_>,
    self_closing: bool,
) -> Result<ElementId, String> {
    let name = start.name();
    let tag = utf8(name.as_ref())?;

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let name = utf8(attr.key.as_ref())?;
        let raw = utf8(&attr.value)?;
        let value = attr.unescape_value().map_err(|err| err.to_string())?;
        attributes.push(Attribute::with_raw(name, value, raw));
    }

    let raw_start = utf8(start)?.to_string();
    let id = model.push_element(fragment, parent, tag, attributes);
    model.set_source_form(id, Some(raw_start), self_closing);

    trace!(tag = tag, element:% = id; "Parsed element");
    Ok(id)
}

fn utf8(bytes: &[u8]) -> Result<&str, String> {
    str::from_utf8(bytes).map_err(|err| format!("invalid UTF-8: {err}"))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// `path` relative to `base`, `/`-separated.
fn relative_path(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|component| component.as_os_str().to_str())
        .collect();
    Some(parts?.join("/"))
}
