//! Error adapter for converting FraglinkError to miette diagnostics.
//!
//! This module provides the bridge between the library's standard error types
//! and miette's rich diagnostic formatting used in the CLI.
//!
//! Malformed XML is reported against the offending file, with the byte
//! position labeled in a source snippet. Every other error is rendered as a
//! plain diagnostic with an error code and, where one helps, a hint.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, NamedSource, SourceSpan};

use fraglink::{FraglinkError, RepairError};
use fraglink_xml::{LoadError, SaveError};

/// Adapter for an XML error located in a model file.
pub struct SourceAdapter<'a> {
    err: &'a FraglinkError,
    message: String,
    src: NamedSource<String>,
    span: SourceSpan,
}

impl<'a> SourceAdapter<'a> {
    /// Create an adapter pointing at `position` in the file `path` with contents `src`.
    pub fn new(
        err: &'a FraglinkError,
        message: String,
        path: &Path,
        src: String,
        position: usize,
    ) -> Self {
        let offset = position.min(src.len());
        let len = usize::from(offset < src.len());
        Self {
            err,
            message,
            src: NamedSource::new(path.display().to_string(), src),
            span: SourceSpan::new(offset.into(), len),
        }
    }
}

impl fmt::Debug for SourceAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceAdapter")
            .field("err", &self.err)
            .field("span", &self.span)
            .finish()
    }
}

impl fmt::Display for SourceAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.err, f)
    }
}

impl std::error::Error for SourceAdapter<'_> {}

impl MietteDiagnostic for SourceAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("fraglink::xml"))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(
            "the file is not well-formed XML; resolve leftover merge conflicts first",
        ))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::new_primary_with_span(
            Some(self.message.clone()),
            self.span,
        ))))
    }
}

/// Adapter for [`FraglinkError`] variants without a source location.
pub struct ErrorAdapter<'a>(pub &'a FraglinkError);

impl fmt::Debug for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            FraglinkError::Io(_) => "fraglink::io",
            FraglinkError::Load(_) => "fraglink::load",
            FraglinkError::Save(SaveError::Stage { .. }) => "fraglink::stage",
            FraglinkError::Save(_) => "fraglink::save",
            FraglinkError::Repair(RepairError::AmbiguousFragment { .. }) => {
                "fraglink::ambiguous_fragment"
            }
            FraglinkError::Repair(RepairError::UnknownFragment { .. }) => {
                "fraglink::unknown_fragment"
            }
            FraglinkError::Repair(_) => "fraglink::repair",
            FraglinkError::Config(_) => "fraglink::config",
            FraglinkError::Git(_) => "fraglink::git",
            FraglinkError::DirtyWorktree(_) => "fraglink::dirty_worktree",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match &self.0 {
            FraglinkError::Repair(RepairError::AmbiguousFragment { .. }) => {
                "fragment file names must be unique within a model; rename one of the candidates"
            }
            FraglinkError::Repair(RepairError::UnknownFragment { .. }) => {
                "the model lists a fragment that does not exist; restore it or remove the entry"
            }
            FraglinkError::DirtyWorktree(_) => "run `git stash` or commit your changes first",
            _ => return None,
        };
        Some(Box::new(help))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        None
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        None
    }
}

/// A reportable error that can be rendered by miette.
#[derive(Debug)]
pub enum Reportable<'a> {
    /// An error located in a model file.
    Source(SourceAdapter<'a>),
    /// A simple error without source location.
    Error(ErrorAdapter<'a>),
}

impl fmt::Display for Reportable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reportable::Source(s) => fmt::Display::fmt(s, f),
            Reportable::Error(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Reportable<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reportable::Source(_) => None,
            Reportable::Error(e) => e.source(),
        }
    }
}

impl MietteDiagnostic for Reportable<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Source(s) => s.code(),
            Reportable::Error(e) => e.code(),
        }
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            Reportable::Source(s) => s.help(),
            Reportable::Error(e) => e.help(),
        }
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        match self {
            Reportable::Source(s) => s.source_code(),
            Reportable::Error(e) => e.source_code(),
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        match self {
            Reportable::Source(s) => s.labels(),
            Reportable::Error(e) => e.labels(),
        }
    }
}

/// Convert a [`FraglinkError`] into a list of reportable errors.
///
/// XML errors become a [`Reportable::Source`] when the offending file can
/// still be read. Every other error yields a single [`Reportable::Error`].
pub fn to_reportables(err: &FraglinkError) -> Vec<Reportable<'_>> {
    let Some((path, position, message)) = xml_location(err) else {
        return vec![Reportable::Error(ErrorAdapter(err))];
    };
    match fs::read_to_string(&path) {
        Ok(src) => vec![Reportable::Source(SourceAdapter::new(
            err, message, &path, src, position,
        ))],
        Err(_) => vec![Reportable::Error(ErrorAdapter(err))],
    }
}

fn xml_location(err: &FraglinkError) -> Option<(PathBuf, usize, String)> {
    match err {
        FraglinkError::Load(LoadError::Xml {
            path,
            position,
            source,
        }) => Some((path.clone(), *position, source.to_string())),
        FraglinkError::Load(LoadError::Structure {
            path,
            position,
            message,
        }) => Some((path.clone(), *position, message.clone())),
        _ => None,
    }
}
