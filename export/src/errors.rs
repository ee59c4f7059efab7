use thiserror::Error;

use crate::graph::NodeId;

/// Hard failures of the exporter.
///
/// Anomalies inside the graph (bad annotations, unresolvable exclusions,
/// overwritten attributes) are not errors, they are reported as
/// [Diagnostic](crate::Diagnostic)s and the export continues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot {0} because the project was not yet loaded")]
    ProjectNotLoaded(&'static str),

    #[error("node {0} is already in the graph")]
    DuplicateNode(NodeId),

    #[error("node {0} is not in the graph")]
    UnknownNode(NodeId),

    #[error("invalid export config: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
