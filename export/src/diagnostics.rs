//! Implements diagnostics that are emitted in cases where the exported
//! graph exhibits problems the export can recover from.
//!
//! Every diagnostic is logged once when it is recorded, and kept so that
//! callers (and tests) can inspect what went wrong after the fact.
use std::fmt;

use tracing::error;

use crate::graph::NodeId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A target-scoped attribute was seen outside of any target.
    NoActiveTarget { attr: String },

    /// A directory-scoped attribute was seen before any directory exists.
    NoActiveDirectory { attr: String },

    /// A target boundary annotation without directory and name arguments.
    MalformedTarget { macro_name: String },

    UnknownSemantic { name: String },

    /// An excluded node has no induced attributes, even after visiting it.
    MissingExcludedInduced { node: NodeId },

    /// An excluded node is still being visited, so its induced attributes
    /// can't be known yet.
    ExclusionCycle { node: NodeId },

    /// An overlay attribute was dropped because the tree already had it.
    AttrOverwritten { attr: String },

    /// A second non-test target replaced the main target of a macro bucket.
    MainTargetOverwritten {
        macro_name: String,
        old: String,
        new: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Path of the graph node, or directory, the diagnostic relates to.
    pub path: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::NoActiveTarget { attr } => write!(
                f,
                "attempt to add target attribute '{}' while there is no active target",
                attr
            ),
            DiagnosticKind::NoActiveDirectory { attr } => write!(
                f,
                "attempt to add directory attribute '{}' while there is no active directory",
                attr
            ),
            DiagnosticKind::MalformedTarget { macro_name } => write!(
                f,
                "target semantic '{}' needs a directory and a name",
                macro_name
            ),
            DiagnosticKind::UnknownSemantic { name } => {
                write!(f, "skip unknown semantic '{}'", name)
            }
            DiagnosticKind::MissingExcludedInduced { node } => {
                write!(f, "not found induced for excluded node id {}", node)
            }
            DiagnosticKind::ExclusionCycle { node } => write!(
                f,
                "excluded node id {} is still being visited, skipping it",
                node
            ),
            DiagnosticKind::AttrOverwritten { attr } => {
                write!(f, "overwrite dict element {}", attr)
            }
            DiagnosticKind::MainTargetOverwritten {
                macro_name,
                old,
                new,
            } => write!(
                f,
                "main target {} of {} overwritten by {}",
                old, macro_name, new
            ),
        }
    }
}

/// Collects the diagnostics of one export.
#[derive(Debug, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn report(&mut self, kind: DiagnosticKind, path: impl Into<String>) {
        let diagnostic = Diagnostic {
            kind,
            path: path.into(),
        };
        error!(path = %diagnostic.path, "{}", diagnostic);
        self.0.push(diagnostic);
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }
}
