//! Depth-first traversal of a [SemGraph], reporting to a [GraphVisitor].
//!
//! Every node is entered at most once per visitor: the set of entered
//! nodes lives in the visitor, so a visitor may re-enter [iterate_all]
//! from one of its callbacks (to force a visit of some other node) without
//! visiting anything twice.
use std::collections::HashSet;

use petgraph::graph::{EdgeIndex, NodeIndex};
use tracing::{trace, warn};

use crate::graph::{Dep, NodeId, SemGraph, SemKind, SemNode, Semantic};
use crate::project::TargetId;

/// Tracks which nodes a visitor has entered and which of those are
/// finished.
#[derive(Debug, Default)]
pub struct Visited {
    done: HashSet<NodeId>,
    in_progress: HashSet<NodeId>,
}

impl Visited {
    /// Marks a node as entered. Returns false if it was entered before.
    fn enter(&mut self, id: NodeId) -> bool {
        if self.done.contains(&id) {
            return false;
        }
        self.in_progress.insert(id)
    }

    fn finish(&mut self, id: NodeId) {
        self.in_progress.remove(&id);
        self.done.insert(id);
    }

    pub fn is_done(&self, id: NodeId) -> bool {
        self.done.contains(&id)
    }

    /// Entered, but not yet finished, i.e. somewhere on a visit stack.
    pub fn is_in_progress(&self, id: NodeId) -> bool {
        self.in_progress.contains(&id)
    }
}

struct Frame {
    node: NodeIndex,
    /// The edge this node was entered through.
    via: Option<EdgeIndex>,
    pending: Vec<EdgeIndex>,
    target: Option<TargetId>,
}

/// The visit stack of one [iterate_all] call.
#[derive(Default)]
pub struct VisitState {
    frames: Vec<Frame>,
}

impl VisitState {
    /// Number of nodes on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Makes `target` the current target for the top node and everything
    /// below it.
    pub fn set_target(&mut self, target: TargetId) {
        if let Some(frame) = self.frames.last_mut() {
            frame.target = Some(target);
        }
    }

    /// The target set by the nearest node on the stack, if any.
    pub fn current_target(&self) -> Option<TargetId> {
        self.frames.iter().rev().find_map(|frame| frame.target)
    }
}

/// Implemented by types that wish to walk a [SemGraph].
///
/// All callbacks are optional. Target boundaries are reported when a node
/// is entered, all other semantics when it is left, so attributes of a
/// node see the target it opened.
pub trait GraphVisitor {
    fn visited(&mut self) -> &mut Visited;

    /// Called for every [SemKind::TargetBoundary] semantic of a node, on
    /// entering it.
    fn on_target_semantic(&mut self, _state: &mut VisitState, _node: &SemNode, _sem: &Semantic) {}

    /// Called for every other semantic of a node, after all of its
    /// dependencies have been processed.
    fn on_node_semantic_post_order(
        &mut self,
        _state: &mut VisitState,
        _node: &SemNode,
        _sem: &Semantic,
    ) {
    }

    /// Called when leaving a dependency edge, with `dep.from` on top of the
    /// stack. This also happens for edges to nodes that were already
    /// visited, which are not entered again.
    fn on_left(&mut self, _graph: &SemGraph, _state: &mut VisitState, _dep: Dep<'_>) {}
}

fn enter<V: GraphVisitor + ?Sized>(
    graph: &SemGraph,
    state: &mut VisitState,
    visitor: &mut V,
    node: NodeIndex,
    via: Option<EdgeIndex>,
) {
    let sem_node = graph.node_at(node);
    trace!(node.id = %sem_node.id, node.path = %sem_node.path, "entering node");

    state.frames.push(Frame {
        node,
        via,
        pending: graph.pending_deps(node),
        target: None,
    });

    for sem in sem_node
        .sems
        .iter()
        .filter(|sem| sem.kind == SemKind::TargetBoundary)
    {
        visitor.on_target_semantic(state, sem_node, sem);
    }
}

/// Walks the graph depth-first from each of `start_nodes`, in order.
///
/// Start nodes that were already visited are skipped.
pub fn iterate_all<V: GraphVisitor + ?Sized>(
    graph: &SemGraph,
    start_nodes: &[NodeId],
    visitor: &mut V,
) {
    for &start in start_nodes {
        let Some(start_ix) = graph.index_of(start) else {
            warn!(node.id = %start, "start node is not in the graph");
            continue;
        };
        if !visitor.visited().enter(start) {
            continue;
        }

        let mut state = VisitState::default();
        enter(graph, &mut state, visitor, start_ix, None);

        while let Some(frame) = state.frames.last_mut() {
            if let Some(edge) = frame.pending.pop() {
                let (to, dep) = graph.dep(edge);
                if visitor.visited().enter(dep.to.id) {
                    enter(graph, &mut state, visitor, to, Some(edge));
                } else {
                    visitor.on_left(graph, &mut state, dep);
                }
                continue;
            }

            // All dependencies are done, leave the node.
            let (node, via) = (frame.node, frame.via);
            let sem_node = graph.node_at(node);
            for sem in sem_node
                .sems
                .iter()
                .filter(|sem| sem.kind != SemKind::TargetBoundary)
            {
                visitor.on_node_semantic_post_order(&mut state, sem_node, sem);
            }
            visitor.visited().finish(sem_node.id);
            state.frames.pop();

            if let Some(edge) = via {
                visitor.on_left(graph, &mut state, graph.dep(edge).1);
            }
        }
    }
}
