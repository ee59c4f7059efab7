//! Walks a semantic build graph and turns its annotations into ordered,
//! finalized attribute trees per directory and target, ready for a
//! template-based project generator.
mod diagnostics;
mod errors;
mod exporter;
mod visitor;

pub mod attrs;
pub mod config;
pub mod graph;
pub mod project;
pub mod traverse;
pub mod value;

#[cfg(test)]
mod tests;

// Re-export the public interface used by renderers.
pub use crate::attrs::{AttrGroup, AttrKind, Attrs};
pub use crate::config::ExportConfig;
pub use crate::diagnostics::{Diagnostic, DiagnosticKind};
pub use crate::errors::Error;
pub use crate::exporter::{Exporter, DEBUG_ATTRS_ATTR, DEBUG_SEMS_ATTR};
pub use crate::graph::{DepKind, NodeId, SemGraph, SemKind, Semantic};
pub use crate::project::{Project, Subdir, Target};
pub use crate::value::{AttrMap, Value};
pub use crate::visitor::{EXCLUDES_ATTR, TESTDEP_ATTR};
