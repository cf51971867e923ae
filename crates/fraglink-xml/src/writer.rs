//! Serializing fragments back to XML.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};

use fraglink_core::{Element, ElementId, FragmentId, Model, Node};

use crate::error::SaveError;

/// Destination for serialized fragment files.
pub trait FileSink {
    /// Writes `contents` to `path`, replacing the file.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError`] if the file cannot be written (or, for sinks
    /// that do so, staged).
    fn write_file(&mut self, path: &Path, contents: &[u8]) -> Result<(), SaveError>;
}

/// Writes files to the working tree only.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorktreeSink;

impl FileSink for WorktreeSink {
    fn write_file(&mut self, path: &Path, contents: &[u8]) -> Result<(), SaveError> {
        fs::write(path, contents).map_err(|source| SaveError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Writes every modified fragment of `model` through `sink`.
///
/// Unmodified fragments are not touched. On success all fragments are
/// marked unmodified and the written paths are returned.
///
/// # Errors
///
/// Returns the first [`SaveError`] reported by the sink.
pub fn save_model(model: &mut Model, sink: &mut dyn FileSink) -> Result<Vec<PathBuf>, SaveError> {
    let pending: Vec<(PathBuf, String)> = model
        .modified_fragments()
        .map(|(id, fragment)| {
            (
                model.root_dir().join(fragment.path()),
                write_fragment(model, id),
            )
        })
        .collect();

    let mut written = Vec::with_capacity(pending.len());
    for (path, contents) in pending {
        sink.write_file(&path, contents.as_bytes())?;
        debug!(path = path.display().to_string(); "Wrote fragment");
        written.push(path);
    }

    model.clear_modified();
    info!(files = written.len(); "Model saved");
    Ok(written)
}

/// Serializes one fragment to XML.
pub fn write_fragment(model: &Model, fragment: FragmentId) -> String {
    let mut out = String::new();
    for node in model.fragment(fragment).nodes() {
        write_node(model, node, &mut out);
    }
    out
}

fn write_node(model: &Model, node: &Node, out: &mut String) {
    match node {
        Node::Element(id) => write_element(model, *id, out),
        Node::Text(text) => match text.raw() {
            Some(raw) => out.push_str(raw),
            None => escape_text(text.value(), out),
        },
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::CData(data) => {
            out.push_str("<![CDATA[");
            out.push_str(data);
            out.push_str("]]>");
        }
        Node::ProcessingInstruction(content) | Node::Declaration(content) => {
            out.push_str("<?");
            out.push_str(content);
            out.push_str("?>");
        }
        Node::DocType(content) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(content);
            out.push('>');
        }
    }
}

fn write_element(model: &Model, id: ElementId, out: &mut String) {
    let element = model.element(id);

    out.push('<');
    match element.raw_start() {
        Some(raw) => out.push_str(raw),
        None => write_start_tag(element, out),
    }

    if element.is_self_closing() && element.content().is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for node in element.content() {
        write_node(model, node, out);
    }
    out.push_str("</");
    out.push_str(element.tag());
    out.push('>');
}

fn write_start_tag(element: &Element, out: &mut String) {
    out.push_str(element.tag());
    for attr in element.attributes() {
        out.push(' ');
        out.push_str(attr.name());
        out.push_str("=\"");
        match attr.raw() {
            Some(raw) if !raw.contains('"') => out.push_str(raw),
            _ => escape_attribute(attr.value(), out),
        }
        out.push('"');
    }
}

/// Escapes an attribute value the way EMF's XMI serializer does.
fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            '\t' => out.push_str("&#x9;"),
            c => out.push(c),
        }
    }
}

fn escape_text(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}
