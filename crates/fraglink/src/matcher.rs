//! Recognizing links inside attribute values.
//!
//! A link value is a whitespace-separated list of tokens. Each link is
//! `path#id`, optionally preceded by a type qualifier token without a `#`:
//!
//! ```text
//! #local-id
//! fragments/LA.capellafragment#9f8e7d6c-5b4a-4392-8170-6f5e4d3c2b1a
//! org.polarsys.capella.core.data.la:LogicalFunction LA.capellafragment#9f8e...
//! ```
//!
//! [`LinkMatcher`] additionally knows which path prefixes a merge tool
//! produces, e.g. `index:/LA.capellafragment#9f8e...`.

use std::{fmt, ops::Range};

use regex::Regex;

use fraglink_core::FRAGMENT_SUFFIXES;

use crate::{config::RepairConfig, error::RepairError};

/// One link inside a link-list value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkToken<'a> {
    qualifier: Option<&'a str>,
    text: &'a str,
    hash: usize,
}

impl<'a> LinkToken<'a> {
    /// The type qualifier preceding the link, if any.
    pub fn qualifier(&self) -> Option<&'a str> {
        self.qualifier
    }

    /// The `path#id` part of the link.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// The fragment path, empty for same-fragment links.
    pub fn path(&self) -> &'a str {
        &self.text[..self.hash]
    }

    pub fn reference_id(&self) -> &'a str {
        &self.text[self.hash + 1..]
    }
}

impl fmt::Display for LinkToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.qualifier {
            Some(qualifier) => write!(f, "{qualifier} {}", self.text),
            None => f.write_str(self.text),
        }
    }
}

/// Splits `value` into link tokens.
///
/// Returns `None` when the value is not a link list: a qualifier that is not
/// followed by a link, or a `#` token whose id contains characters no element
/// id uses (which is how free text such as `color:#ff0000` is told apart).
/// An empty or all-whitespace value yields an empty list.
pub fn split_links(value: &str) -> Option<Vec<LinkToken<'_>>> {
    let mut links = Vec::new();
    let mut qualifier = None;

    for part in value.split_whitespace() {
        let Some(hash) = part.find('#') else {
            if qualifier.replace(part).is_some() {
                return None;
            }
            continue;
        };

        if !is_reference_id(&part[hash + 1..]) {
            return None;
        }
        links.push(LinkToken {
            qualifier: qualifier.take(),
            text: part,
            hash,
        });
    }

    qualifier.is_none().then_some(links)
}

fn is_reference_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// A corrupted link found by [`LinkMatcher::find_corrupted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptedLink<'a> {
    /// The spurious prefix, e.g. `index:/`.
    pub prefix: &'a str,
    /// The fragment path following the prefix.
    pub path: &'a str,
    /// The reference id after `#`, if present.
    pub reference_id: Option<&'a str>,
    /// Byte range of the whole match in the scanned value.
    pub span: Range<usize>,
}

/// Detects merge-tool prefixes and repository links.
///
/// There are two entry points. [`LinkMatcher::spurious_prefix`] checks the
/// path part of one token already split by [`split_links`], which is how
/// attribute links are read. [`LinkMatcher::find_corrupted`] scans raw text
/// that is not a `path#id` token list, such as a `semanticResources` entry,
/// for the whole `prefix` + fragment file name shape.
#[derive(Debug, Clone)]
pub struct LinkMatcher {
    spurious_prefixes: Vec<String>,
    repository_schemes: Vec<String>,
    corrupted: Option<Regex>,
}

impl LinkMatcher {
    /// Builds a matcher for the given prefixes and schemes.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Pattern`] if the combined pattern cannot be
    /// compiled.
    pub fn new(
        spurious_prefixes: &[impl AsRef<str>],
        repository_schemes: &[impl AsRef<str>],
    ) -> Result<Self, RepairError> {
        let spurious_prefixes: Vec<String> = spurious_prefixes
            .iter()
            .map(|p| p.as_ref().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let repository_schemes = repository_schemes
            .iter()
            .map(|s| s.as_ref().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let corrupted = if spurious_prefixes.is_empty() {
            None
        } else {
            let prefixes = spurious_prefixes
                .iter()
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");
            // Longest suffix first, so `capellafragment` is not cut short at `capella`.
            let mut suffixes = FRAGMENT_SUFFIXES.to_vec();
            suffixes.sort_by_key(|suffix| std::cmp::Reverse(suffix.len()));
            let pattern = format!(
                r"(?P<prefix>{prefixes})(?P<path>[^\s#]*\.(?:{suffixes}))(?:#(?P<id>[0-9A-Fa-f]{{8}}-[0-9A-Fa-f]{{4}}-[0-9A-Fa-f]{{4}}-[0-9A-Fa-f]{{4}}-[0-9A-Fa-f]{{12}}|_[A-Za-z0-9_-]+))?",
                suffixes = suffixes.join("|"),
            );
            Some(Regex::new(&pattern)?)
        };

        Ok(Self {
            spurious_prefixes,
            repository_schemes,
            corrupted,
        })
    }

    pub fn from_config(config: &RepairConfig) -> Result<Self, RepairError> {
        Self::new(config.spurious_prefixes(), config.repository_schemes())
    }

    /// The merge-tool prefix `path` starts with, if any.
    pub fn spurious_prefix<'p>(&self, path: &'p str) -> Option<&'p str> {
        self.spurious_prefixes
            .iter()
            .find(|prefix| path.starts_with(prefix.as_str()))
            .map(|prefix| &path[..prefix.len()])
    }

    /// Whether `path` points outside the working tree: either a merge-tool
    /// prefix or a remote repository scheme.
    pub fn is_foreign(&self, path: &str) -> bool {
        self.spurious_prefix(path).is_some()
            || self
                .repository_schemes
                .iter()
                .any(|scheme| path.starts_with(scheme.as_str()))
    }

    /// Every corrupted link inside `value`, in order of appearance.
    pub fn find_corrupted<'v>(&self, value: &'v str) -> Vec<CorruptedLink<'v>> {
        let Some(corrupted) = &self.corrupted else {
            return Vec::new();
        };
        corrupted
            .captures_iter(value)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some(CorruptedLink {
                    prefix: caps.name("prefix")?.as_str(),
                    path: caps.name("path")?.as_str(),
                    reference_id: caps.name("id").map(|m| m.as_str()),
                    span: whole.range(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "9f8e7d6c-5b4a-4392-8170-6f5e4d3c2b1a";

    fn default_matcher() -> LinkMatcher {
        LinkMatcher::from_config(&RepairConfig::default()).unwrap()
    }

    #[test]
    fn test_split_plain_links() {
        let value = format!("#{UUID} fragments/LA.capellafragment#_abc");
        let links = split_links(&value).unwrap();

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].path(), "");
        assert_eq!(links[0].reference_id(), UUID);
        assert_eq!(links[1].path(), "fragments/LA.capellafragment");
        assert_eq!(links[1].reference_id(), "_abc");
        assert_eq!(links[1].qualifier(), None);
    }

    #[test]
    fn test_split_attaches_qualifier_to_next_link() {
        let value = format!("ns:Type a.capella#{UUID} #x");
        let links = split_links(&value).unwrap();

        assert_eq!(links[0].qualifier(), Some("ns:Type"));
        assert_eq!(links[0].to_string(), format!("ns:Type a.capella#{UUID}"));
        assert_eq!(links[1].qualifier(), None);
        assert_eq!(links[1].to_string(), "#x");
    }

    #[test]
    fn test_split_rejects_non_link_values() {
        assert_eq!(split_links("Logical Architecture"), None);
        assert_eq!(split_links("ns:Type"), None);
        assert_eq!(split_links("see #"), None);
        assert_eq!(split_links("<span style=\"color:#ff0000\">x</span>"), None);
    }

    #[test]
    fn test_split_empty_values() {
        assert_eq!(split_links(""), Some(vec![]));
        assert_eq!(split_links("  \n "), Some(vec![]));
    }

    #[test]
    fn test_spurious_prefix() {
        let matcher = default_matcher();

        assert_eq!(matcher.spurious_prefix("index:/LA.capellafragment"), Some("index:/"));
        assert_eq!(matcher.spurious_prefix("commit:/x.aird"), Some("commit:/"));
        assert_eq!(matcher.spurious_prefix("fragments/LA.capellafragment"), None);
        assert_eq!(matcher.spurious_prefix(""), None);
    }

    #[test]
    fn test_is_foreign() {
        let matcher = default_matcher();

        assert!(matcher.is_foreign("index:/LA.capellafragment"));
        assert!(matcher.is_foreign("cdo://repo/project.capella"));
        assert!(!matcher.is_foreign("../LA.capellafragment"));
    }

    #[test]
    fn test_find_corrupted_reports_spans() {
        let matcher = default_matcher();
        let value = format!("ns:Type index:/fragments/LA.capellafragment#{UUID} #local");

        let found = matcher.find_corrupted(&value);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].prefix, "index:/");
        assert_eq!(found[0].path, "fragments/LA.capellafragment");
        assert_eq!(found[0].reference_id, Some(UUID));
        assert_eq!(&value[found[0].span.clone()], &value[8..value.len() - 7]);
    }

    #[test]
    fn test_find_corrupted_without_id() {
        let matcher = default_matcher();

        let found = matcher.find_corrupted("commit:/Logical%20Architecture.capellafragment");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reference_id, None);
        assert!(matcher.find_corrupted("fragments/LA.capellafragment#x").is_empty());
        assert!(matcher.find_corrupted("index:/notes.txt").is_empty());
    }

    #[test]
    fn test_custom_prefixes_are_escaped() {
        let matcher = LinkMatcher::new(&["merge+tool:/"], &[] as &[&str]).unwrap();

        assert_eq!(matcher.find_corrupted("merge+tool:/a.capella#_x").len(), 1);
        assert!(matcher.find_corrupted("mergeetool:/a.capella#_x").is_empty());
        assert!(!matcher.is_foreign("cdo://x"));
    }

    #[test]
    fn test_no_prefixes_matches_nothing() {
        let matcher = LinkMatcher::new(&[] as &[&str], &["cdo://"]).unwrap();

        assert!(matcher.find_corrupted("index:/a.capella#_x").is_empty());
        assert_eq!(matcher.spurious_prefix("index:/a.capella"), None);
    }
}
