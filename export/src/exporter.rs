//! The exporter ties traversal and finalization together: it walks a
//! [SemGraph] into a [Project], then finalizes the attribute trees that
//! renderers consume.
use std::io;

use tracing::{debug, instrument};

use crate::attrs::{merge_tree, AttrGroup, AttrKind};
use crate::config::ExportConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::graph::{NodeId, SemGraph};
use crate::project::{Project, Subdir, Target};
use crate::traverse::iterate_all;
use crate::value::{AttrMap, Value};
use crate::visitor::ExportVisitor;
use crate::Error;

/// Debug attribute holding the raw annotations of an entity.
pub const DEBUG_SEMS_ATTR: &str = "dump_sems";

/// Debug attribute holding the dumped attribute tree of an entity.
pub const DEBUG_ATTRS_ATTR: &str = "dump_attrs";

/// Which debug attributes finalization embeds.
#[derive(Clone, Copy, Default)]
struct Embed {
    sems: bool,
    attrs: bool,
}

pub struct Exporter {
    config: ExportConfig,
    project: Option<Project>,
    diagnostics: Diagnostics,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            project: None,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Looks up the configured kind of an attribute.
    pub fn attr_kind(&self, group: AttrGroup, name: &str) -> AttrKind {
        self.config.attr_kind(group, name)
    }

    /// Walks `graph` from `start_nodes` and builds the project, replacing
    /// the result of any previous analysis.
    #[instrument(skip_all, fields(graph.nodes = graph.node_count(), start_nodes = start_nodes.len()))]
    pub fn analyze(&mut self, graph: &SemGraph, start_nodes: &[NodeId]) {
        let mut visitor = ExportVisitor::new(&self.config);
        iterate_all(graph, start_nodes, &mut visitor);
        let (project, diagnostics) = visitor.finish();

        debug!(
            subdirs = project.subdirs.len(),
            diagnostics = diagnostics.as_slice().len(),
            "analyzed graph"
        );
        self.project = Some(project);
        self.diagnostics = diagnostics;
    }

    /// Like [Exporter::analyze], starting from the graph's own start nodes.
    pub fn analyze_graph(&mut self, graph: &SemGraph) {
        self.analyze(graph, graph.start_nodes())
    }

    pub fn project(&self) -> Result<&Project, Error> {
        self.project
            .as_ref()
            .ok_or(Error::ProjectNotLoaded("access the project"))
    }

    /// Everything reported so far, by the last analysis and the
    /// finalization passes that followed it.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.as_slice()
    }

    /// Directories in discovery order, with their targets.
    pub fn subdirs_targets(&self) -> Result<Vec<(&str, &[Target])>, Error> {
        let project = self
            .project
            .as_ref()
            .ok_or(Error::ProjectNotLoaded("list targets"))?;
        Ok(project
            .non_empty_subdirs()
            .map(|subdir| (subdir.path.as_str(), subdir.targets.as_slice()))
            .collect())
    }

    fn embed(&self) -> Embed {
        Embed {
            sems: self.config.debug.debug_sems,
            attrs: self.config.debug.debug_attrs,
        }
    }

    /// Adds the project-wide attributes to the root tree and returns it.
    /// Calling this again returns the same tree.
    pub fn finalize_root_attrs(&mut self) -> Result<&AttrMap, Error> {
        let embed = self.embed();
        self.finalize_root(embed)
    }

    #[instrument(skip_all)]
    fn finalize_root(&mut self, embed: Embed) -> Result<&AttrMap, Error> {
        let config = &self.config;
        let project = self
            .project
            .as_mut()
            .ok_or(Error::ProjectNotLoaded("finalize root attributes"))?;

        if project.root.map().contains_key("projectName") {
            return Ok(project.root.map());
        }

        let subdirs: Vec<Value> = project
            .non_empty_subdirs()
            .map(|subdir| Value::from(subdir.path.as_str()))
            .collect();

        let sems_dump = project.root.sems_dump().to_owned();
        let root = project.root.map_mut();
        // annotations on the root take precedence
        root.insert_if_absent("subdirs", subdirs);
        root.insert_if_absent("projectRoot", config.project_root.display().to_string());
        if let Some(export_root) = &config.export_root {
            root.insert_if_absent("exportRoot", export_root.display().to_string());
        }
        root.insert("projectName", config.project_name.as_str());
        if !config.add_attrs_dir.is_empty() {
            root.insert("add_attrs_dir", config.add_attrs_dir.clone());
        }
        if !config.add_attrs_target.is_empty() {
            root.insert("add_attrs_target", config.add_attrs_target.clone());
        }
        if embed.attrs {
            let dump = root.to_string();
            root.insert(DEBUG_ATTRS_ATTR, dump);
        }
        if embed.sems {
            root.insert(DEBUG_SEMS_ATTR, sems_dump);
        }

        Ok(project.root.map())
    }

    /// Groups the targets of every directory whose path starts with one of
    /// `prefixes` (every directory if there are none) into macro buckets.
    ///
    /// Returns a map of directory path to its buckets, which are keyed by
    /// macro name. Directories are only finalized once.
    pub fn finalize_subdirs_attrs(&mut self, prefixes: &[String]) -> Result<AttrMap, Error> {
        let embed = self.embed();
        self.finalize_subdirs(prefixes, embed)
    }

    #[instrument(skip_all, fields(prefixes = ?prefixes))]
    fn finalize_subdirs(&mut self, prefixes: &[String], embed: Embed) -> Result<AttrMap, Error> {
        let config = &self.config;
        let diagnostics = &mut self.diagnostics;
        let project = self
            .project
            .as_mut()
            .ok_or(Error::ProjectNotLoaded("finalize directory attributes"))?;

        let mut out = AttrMap::new();
        for subdir in project.subdirs.iter_mut() {
            if subdir.targets.is_empty() || !matches_prefixes(&subdir.path, prefixes) {
                continue;
            }
            if subdir.buckets.is_empty() {
                finalize_subdir(config, subdir, embed, diagnostics);
            }
            out.insert(subdir.path.as_str(), subdir.buckets.clone());
        }

        Ok(out)
    }

    /// Returns the `{ root, subdirs }` forest for dumping, limited to
    /// the configured dump prefixes, without debug attributes.
    pub fn finalize_attrs_for_dump(&mut self) -> Result<AttrMap, Error> {
        let prefixes = self.config.dump.dump_path_prefixes.clone();

        let mut root = self.finalize_root(Embed::default())?.clone();
        strip_debug_attrs(&mut root);

        let mut subdirs = self.finalize_subdirs(&prefixes, Embed::default())?;
        for (_, buckets) in subdirs.iter_mut() {
            if let Value::Map(buckets) = buckets {
                for (_, bucket) in buckets.iter_mut() {
                    if let Value::Map(bucket) = bucket {
                        strip_debug_attrs(bucket);
                    }
                }
            }
        }

        Ok(AttrMap::from_iter([("root", root), ("subdirs", subdirs)]))
    }

    /// Writes the raw annotations of the root, every directory and every
    /// target, each under a `--- ROOT`, `--- DIR <path>` or
    /// `--- TARGET <name>` header. The root is left out when dumping is
    /// limited to some path prefixes.
    pub fn dump_sems(&self, w: &mut impl io::Write) -> Result<(), Error> {
        let project = self
            .project
            .as_ref()
            .ok_or(Error::ProjectNotLoaded("dump sems"))?;
        let prefixes = &self.config.dump.dump_path_prefixes;

        if prefixes.is_empty() {
            write!(w, "--- ROOT\n{}", project.root.sems_dump())?;
        }
        for subdir in project
            .non_empty_subdirs()
            .filter(|subdir| matches_prefixes(&subdir.path, prefixes))
        {
            write!(w, "--- DIR {}\n{}", subdir.path, subdir.attrs.sems_dump())?;
            for target in &subdir.targets {
                write!(w, "--- TARGET {}\n{}", target.name, target.attrs.sems_dump())?;
            }
        }

        Ok(())
    }

    /// Writes the dump forest as pretty-printed JSON.
    pub fn dump_attrs(&mut self, w: &mut impl io::Write) -> Result<(), Error> {
        let forest = self.finalize_attrs_for_dump()?;
        serde_json::to_writer_pretty(&mut *w, &forest).map_err(io::Error::from)?;
        writeln!(w)?;
        Ok(())
    }
}

fn matches_prefixes(path: &str, prefixes: &[String]) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
}

fn strip_debug_attrs(map: &mut AttrMap) {
    map.remove(DEBUG_ATTRS_ATTR);
    map.remove(DEBUG_SEMS_ATTR);
}

fn report_conflicts(conflicts: Vec<String>, path: &str, diagnostics: &mut Diagnostics) {
    for attr in conflicts {
        diagnostics.report(DiagnosticKind::AttrOverwritten { attr }, path);
    }
}

/// Builds the macro buckets of one directory.
fn finalize_subdir(
    config: &ExportConfig,
    subdir: &mut Subdir,
    embed: Embed,
    diagnostics: &mut Diagnostics,
) {
    let Subdir {
        path,
        targets,
        attrs,
        buckets,
    } = subdir;

    for target in targets.iter_mut() {
        let conflicts = merge_tree(target.attrs.map_mut(), &config.add_attrs_target);
        report_conflicts(conflicts, path, diagnostics);

        if !buckets.contains_key(&target.macro_name) {
            let mut seed = AttrMap::new();
            seed.insert("projectRoot", config.project_root.display().to_string());
            if let Some(export_root) = &config.export_root {
                seed.insert("exportRoot", export_root.display().to_string());
            }
            seed.insert("hasTest", false);
            seed.insert("extra_targets", Value::List(vec![]));

            let conflicts = merge_tree(&mut seed, attrs.map());
            report_conflicts(conflicts, path, diagnostics);
            let conflicts = merge_tree(&mut seed, &config.add_attrs_dir);
            report_conflicts(conflicts, path, diagnostics);

            buckets.insert(target.macro_name.as_str(), seed);
        }

        let Some(Value::Map(bucket)) = buckets.get_mut(&target.macro_name) else {
            unreachable!("bucket was just seeded")
        };
        let tree = Value::Map(target.attrs.map().clone());

        if target.is_test() {
            bucket.insert("hasTest", true);
            if let Value::List(extra) =
                bucket.get_or_insert_with("extra_targets", || Value::List(vec![]))
            {
                extra.push(tree);
            }
            continue;
        }

        let old = bucket.insert("target", tree);
        if let Some(old) = old {
            let old = old
                .as_map()
                .and_then(|old| old.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            diagnostics.report(
                DiagnosticKind::MainTargetOverwritten {
                    macro_name: target.macro_name.clone(),
                    old,
                    new: target.name.clone(),
                },
                path.as_str(),
            );
        }
    }

    for (macro_name, bucket) in buckets.iter_mut() {
        let Value::Map(bucket) = bucket else {
            continue;
        };
        if embed.attrs {
            let dump = bucket.to_string();
            bucket.insert(DEBUG_ATTRS_ATTR, dump);
        }
        if embed.sems {
            let sems_dump = targets
                .iter()
                .find(|target| target.macro_name == macro_name)
                .map(|target| target.attrs.sems_dump())
                .unwrap_or_default();
            bucket.insert(DEBUG_SEMS_ATTR, sems_dump);
        }
    }

    debug!(subdir = %path, buckets = buckets.len(), "finalized directory");
}
