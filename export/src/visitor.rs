//! The export visitor: turns the semantics found while walking the graph
//! into a [Project], and propagates induced attributes along direct
//! dependencies.
use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::attrs::{AttrGroup, Attrs};
use crate::config::ExportConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::graph::{Dep, NodeId, SemGraph, SemKind, SemNode, Semantic};
use crate::project::{Project, ProjectBuilder, TargetId};
use crate::traverse::{iterate_all, GraphVisitor, VisitState, Visited};
use crate::value::{append_unique, AttrMap, Value};

/// Key of the exclusion map injected into propagated induced attributes.
pub const EXCLUDES_ATTR: &str = "excludes";

/// Key of the test module directory injected into induced attributes
/// propagated from a test target.
pub const TESTDEP_ATTR: &str = "testdep";

pub struct ExportVisitor<'c> {
    config: &'c ExportConfig,
    builder: ProjectBuilder,
    visited: Visited,

    /// Targets opened by graph nodes.
    node_targets: HashMap<NodeId, TargetId>,

    /// Induced attributes of graph nodes, exported to their dependents.
    induced: HashMap<NodeId, Attrs>,

    diagnostics: Diagnostics,
}

impl<'c> ExportVisitor<'c> {
    pub fn new(config: &'c ExportConfig) -> Self {
        Self {
            config,
            builder: ProjectBuilder::default(),
            visited: Visited::default(),
            node_targets: HashMap::new(),
            induced: HashMap::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Consumes the visitor, dropping the traversal-scoped indices.
    pub fn finish(self) -> (Project, Diagnostics) {
        (self.builder.finish(), self.diagnostics)
    }

    /// Splits a module directory into the directory the target belongs to
    /// and, for test modules, the stripped test suffix.
    fn split_test_dir<'a>(&self, mod_dir: &'a str) -> (&'a str, Option<String>) {
        for suffix in &self.config.test_suffixes {
            if mod_dir != suffix.as_str() {
                if let Some(dir) = mod_dir.strip_suffix(suffix.as_str()) {
                    return (dir, Some(suffix.clone()));
                }
            }
        }
        (mod_dir, None)
    }

    fn store_induced(&mut self, node: &SemNode, sem: &Semantic) {
        let kind = self.config.attr_kind(AttrGroup::Induced, &sem.name);
        self.induced
            .entry(node.id)
            .or_insert_with(|| Attrs::new(AttrGroup::Induced, format!("induced by {}", node.id)))
            .set_attr(&sem.name, kind, &sem.args, &node.path);
    }

    /// Collects the induced attributes of all nodes excluded on `dep` into
    /// one map of attribute name to list of values, visiting excluded
    /// nodes that were not visited yet.
    #[instrument(level = "debug", skip_all, fields(dep.from = %dep.from.id, dep.to = %dep.to.id))]
    fn resolve_excludes(&mut self, graph: &SemGraph, dep: Dep<'_>) -> AttrMap {
        let mut excludes = AttrMap::new();
        if dep.data.excludes.is_empty() {
            return excludes;
        }

        let mut unvisited = vec![];
        for &id in &dep.data.excludes {
            if self.induced.contains_key(&id) {
                continue;
            }
            if self.visited.is_in_progress(id) {
                self.diagnostics
                    .report(DiagnosticKind::ExclusionCycle { node: id }, &dep.to.path);
            } else if !self.visited.is_done(id) {
                unvisited.push(id);
            }
        }
        if !unvisited.is_empty() {
            debug!(nodes = ?unvisited, "visiting excluded nodes");
            iterate_all(graph, &unvisited, self);
        }

        for &id in &dep.data.excludes {
            match self.induced.get(&id) {
                Some(attrs) => {
                    for (name, value) in attrs.map().iter() {
                        if let Value::List(list) =
                            excludes.get_or_insert_with(name, || Value::List(vec![]))
                        {
                            append_unique(list, value.clone());
                        }
                    }
                }
                None if self.visited.is_in_progress(id) => {
                    // already reported as a cycle above
                }
                None => self.diagnostics.report(
                    DiagnosticKind::MissingExcludedInduced { node: id },
                    &dep.to.path,
                ),
            }
        }

        excludes
    }
}

impl GraphVisitor for ExportVisitor<'_> {
    fn visited(&mut self) -> &mut Visited {
        &mut self.visited
    }

    fn on_target_semantic(&mut self, state: &mut VisitState, node: &SemNode, sem: &Semantic) {
        let [mod_dir, name, macro_args @ ..] = sem.args.as_slice() else {
            self.diagnostics.report(
                DiagnosticKind::MalformedTarget {
                    macro_name: sem.name.clone(),
                },
                &node.path,
            );
            return;
        };

        let (dir, test_mod_dir) = self.split_test_dir(mod_dir);
        let id = self.builder.create_target(
            dir,
            &sem.name,
            name,
            macro_args.to_vec(),
            test_mod_dir,
        );
        self.builder.target_mut(id).attrs.record_sem(&sem.name, &sem.args);
        debug!(name = %name, dir = %dir, node.id = %node.id, "created target");

        state.set_target(id);
        self.node_targets.insert(node.id, id);
    }

    fn on_node_semantic_post_order(
        &mut self,
        state: &mut VisitState,
        node: &SemNode,
        sem: &Semantic,
    ) {
        match sem.kind {
            SemKind::RootAttr => {
                let kind = self.config.attr_kind(AttrGroup::Root, &sem.name);
                self.builder
                    .root_mut()
                    .set_attr(&sem.name, kind, &sem.args, &node.path);
            }
            SemKind::DirectoryAttr => match state.current_target() {
                Some(target) => {
                    let kind = self.config.attr_kind(AttrGroup::Directory, &sem.name);
                    self.builder
                        .subdir_mut(target.subdir)
                        .attrs
                        .set_attr(&sem.name, kind, &sem.args, &node.path);
                }
                None => self.diagnostics.report(
                    DiagnosticKind::NoActiveDirectory {
                        attr: sem.name.clone(),
                    },
                    &node.path,
                ),
            },
            SemKind::TargetAttr => match state.current_target() {
                Some(target) => {
                    let kind = self.config.attr_kind(AttrGroup::Target, &sem.name);
                    self.builder
                        .target_mut(target)
                        .attrs
                        .set_attr(&sem.name, kind, &sem.args, &node.path);
                }
                None => self.diagnostics.report(
                    DiagnosticKind::NoActiveTarget {
                        attr: sem.name.clone(),
                    },
                    &node.path,
                ),
            },
            SemKind::InducedAttr => self.store_induced(node, sem),
            SemKind::Unknown => self.diagnostics.report(
                DiagnosticKind::UnknownSemantic {
                    name: sem.name.clone(),
                },
                &node.path,
            ),
            // handled on entering the node
            SemKind::TargetBoundary => {}
        }
    }

    /// Propagates the induced attributes of `dep.to` to the current target.
    ///
    /// For example, with `prog` depending on `lib1` (excluding `ex1`), and
    /// all of them inducing `consumer-classpath` and `consumer-jar`, `prog`
    /// ends up with:
    ///
    /// ```text
    /// consumer = [
    ///   { classpath = "lib1"; jar = "lib1.jar";
    ///     excludes = { consumer = [ { classpath = "ex1"; jar = "ex1.jar"; } ]; }; }
    /// ]
    /// ```
    fn on_left(&mut self, graph: &SemGraph, state: &mut VisitState, dep: Dep<'_>) {
        if !dep.is_direct() {
            return;
        }

        let current = state.current_target();
        let to_target = self.node_targets.get(&dep.to.id).copied();

        // Attributes meant to cross module boundaries are not handed to
        // targets of the same directory (e.g. a test and its library).
        if let (Some(current), Some(to_target)) = (current, to_target) {
            if current.subdir == to_target.subdir {
                return;
            }
        }

        let Some(induced) = self.induced.get(&dep.to.id) else {
            return;
        };
        let induced = induced.map().clone();

        // Excluded nodes are visited even if nothing receives the result,
        // so their targets still end up in the project.
        let excludes = self.resolve_excludes(graph, dep);

        let Some(current) = current else {
            self.diagnostics.report(
                DiagnosticKind::NoActiveTarget {
                    attr: induced.keys().collect::<Vec<_>>().join(", "),
                },
                &dep.to.path,
            );
            return;
        };

        let test_mod_dir =
            to_target.and_then(|to_target| self.builder.target(to_target).test_mod_dir.clone());

        let attrs = &mut self.builder.target_mut(current).attrs;
        for (name, value) in induced {
            let value = match value {
                Value::Map(mut map) if !excludes.is_empty() || test_mod_dir.is_some() => {
                    if !excludes.is_empty() {
                        map.insert_if_absent(EXCLUDES_ATTR, excludes.clone());
                    }
                    if let Some(test_mod_dir) = &test_mod_dir {
                        map.insert_if_absent(TESTDEP_ATTR, test_mod_dir.as_str());
                    }
                    Value::Map(map)
                }
                value => value,
            };
            attrs.append_to_list(&name, value);
        }
    }
}
