//! The in-memory semantic graph the exporter walks.
//!
//! Ingestion (reading the graph from its on-disk form, classifying
//! annotation names) happens elsewhere; this module only holds the result.
use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::Error;

/// Stable node id, as assigned by the graph producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification of a semantic annotation, decided at ingestion time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SemKind {
    RootAttr,
    DirectoryAttr,
    TargetAttr,
    InducedAttr,
    /// Starts a new target. The annotation name is the macro, the
    /// arguments are `[module_dir, name, macro_args...]`.
    TargetBoundary,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Semantic {
    pub kind: SemKind,
    pub name: String,
    pub args: Vec<String>,
}

impl Semantic {
    pub fn new<I, S>(kind: SemKind, name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SemNode {
    pub id: NodeId,
    /// Source path of the node, used in diagnostics.
    pub path: String,
    pub sems: Vec<Semantic>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepKind {
    /// Immediate reliance of one target on another.
    Direct,
    Indirect,
}

#[derive(Clone, Debug)]
pub struct SemDep {
    pub kind: DepKind,
    /// Nodes whose induced attributes must not propagate across this edge.
    pub excludes: Vec<NodeId>,
}

/// A dependency edge as seen by visitors.
#[derive(Clone, Copy, Debug)]
pub struct Dep<'a> {
    pub from: &'a SemNode,
    pub to: &'a SemNode,
    pub data: &'a SemDep,
}

impl Dep<'_> {
    pub fn is_direct(&self) -> bool {
        self.data.kind == DepKind::Direct
    }
}

/// A directed graph of semantic nodes, keyed by [NodeId].
#[derive(Default)]
pub struct SemGraph {
    // Edges point from the depending node to its dependency.
    graph: DiGraph<SemNode, SemDep>,

    // A lookup table from node id to node index.
    id_to_node_ix: HashMap<NodeId, NodeIndex>,

    start_nodes: Vec<NodeId>,
}

impl SemGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(
        &mut self,
        id: NodeId,
        path: impl Into<String>,
        sems: Vec<Semantic>,
    ) -> Result<(), Error> {
        if self.id_to_node_ix.contains_key(&id) {
            return Err(Error::DuplicateNode(id));
        }
        let ix = self.graph.add_node(SemNode {
            id,
            path: path.into(),
            sems,
        });
        self.id_to_node_ix.insert(id, ix);
        Ok(())
    }

    pub fn add_dep(
        &mut self,
        from: NodeId,
        to: NodeId,
        kind: DepKind,
        excludes: Vec<NodeId>,
    ) -> Result<(), Error> {
        let from_ix = self.lookup(from)?;
        let to_ix = self.lookup(to)?;
        self.graph
            .add_edge(from_ix, to_ix, SemDep { kind, excludes });
        Ok(())
    }

    /// Registers a node the traversal starts from. Start nodes are walked
    /// in registration order.
    pub fn add_start_node(&mut self, id: NodeId) -> Result<(), Error> {
        self.lookup(id)?;
        self.start_nodes.push(id);
        Ok(())
    }

    pub fn start_nodes(&self) -> &[NodeId] {
        &self.start_nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&SemNode> {
        self.id_to_node_ix.get(&id).map(|ix| &self.graph[*ix])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn lookup(&self, id: NodeId) -> Result<NodeIndex, Error> {
        self.id_to_node_ix
            .get(&id)
            .copied()
            .ok_or(Error::UnknownNode(id))
    }

    pub(crate) fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_to_node_ix.get(&id).copied()
    }

    pub(crate) fn node_at(&self, ix: NodeIndex) -> &SemNode {
        &self.graph[ix]
    }

    /// Outgoing dependencies of a node, last declared first, so popping
    /// from the back yields them in declaration order.
    pub(crate) fn pending_deps(&self, ix: NodeIndex) -> Vec<EdgeIndex> {
        // petgraph yields outgoing edges newest first.
        self.graph.edges(ix).map(|edge| edge.id()).collect()
    }

    /// Returns the target index of an edge together with the [Dep] view
    /// of it.
    pub(crate) fn dep(&self, edge: EdgeIndex) -> (NodeIndex, Dep<'_>) {
        let (from, to) = self
            .graph
            .edge_endpoints(edge)
            .expect("edge index from this graph");
        (
            to,
            Dep {
                from: &self.graph[from],
                to: &self.graph[to],
                data: &self.graph[edge],
            },
        )
    }
}
