//! Fragment lookup and relative link paths.
//!
//! Paths inside links are `/`-separated and percent-encoded, so a fragment
//! named `Logical Architecture.capellafragment` is referenced as
//! `Logical%20Architecture.capellafragment`.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use fraglink_core::{FragmentId, Model};

use crate::error::RepairError;

/// Characters left as-is when encoding a link path.
const LINK_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Percent-encodes a `/`-separated path for use in a link.
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, LINK_PATH).to_string()
}

/// The decoded file name of the last segment of `path`.
///
/// Any prefix (a merge-tool marker, a directory) is ignored.
pub fn decode_fragment_name(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    percent_decode_str(name).decode_utf8_lossy().into_owned()
}

/// `to` relative to the directory `from_dir`, both relative to the model root.
pub fn relative_path(from_dir: &str, to: &str) -> String {
    let from: Vec<&str> = segments(from_dir).collect();
    let to: Vec<&str> = segments(to).collect();

    let common = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts = vec![".."; from.len() - common];
    parts.extend(&to[common..]);
    parts.join("/")
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// The encoded link path from fragment `source` to fragment `target`.
///
/// Empty when both are the same fragment.
pub fn relative_link_path(model: &Model, source: FragmentId, target: FragmentId) -> String {
    if source == target {
        return String::new();
    }
    let from = model.fragment(source).directory();
    let to = model.fragment(target).path();
    encode_path(&relative_path(from, to))
}

/// Resolves a fragment reference by the file name of its last segment.
///
/// Directories in `reference` are ignored, so any corrupted prefix in front
/// of the name does not matter.
///
/// # Errors
///
/// Returns [`RepairError::UnknownFragment`] if no fragment has that name and
/// [`RepairError::AmbiguousFragment`] if more than one does.
pub fn find_fragment_by_name(model: &Model, reference: &str) -> Result<FragmentId, RepairError> {
    let name = decode_fragment_name(reference);
    let mut candidates = model
        .fragments()
        .filter(|(_, fragment)| fragment.name() == name);

    match (candidates.next(), candidates.next()) {
        (Some((id, _)), None) => Ok(id),
        (None, _) => Err(RepairError::UnknownFragment {
            name,
            reference: reference.to_string(),
        }),
        (Some(first), Some(second)) => {
            let candidates = [first, second]
                .into_iter()
                .chain(candidates)
                .map(|(_, fragment)| fragment.path().to_string())
                .collect();
            Err(RepairError::AmbiguousFragment {
                name,
                reference: reference.to_string(),
                candidates,
            })
        }
    }
}
