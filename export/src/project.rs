//! The project tree produced by a traversal: directories, their targets,
//! and the attribute stores owned by each of them.
use std::collections::HashMap;

use crate::attrs::{AttrGroup, Attrs};
use crate::value::{AttrMap, Value};

/// Addresses a target inside a [Project] being built.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetId {
    pub subdir: usize,
    pub target: usize,
}

/// One buildable unit.
#[derive(Clone, Debug)]
pub struct Target {
    pub name: String,
    /// The build macro (rule) the target was declared with.
    pub macro_name: String,
    pub macro_args: Vec<String>,
    /// For test targets, the directory suffix that was stripped to find
    /// the directory the target belongs to.
    pub test_mod_dir: Option<String>,
    pub attrs: Attrs,
}

impl Target {
    pub fn is_test(&self) -> bool {
        self.test_mod_dir.is_some()
    }
}

/// One source directory and the targets discovered in it.
#[derive(Clone, Debug)]
pub struct Subdir {
    pub path: String,
    /// In discovery order.
    pub targets: Vec<Target>,
    /// Directory-scoped attributes.
    pub attrs: Attrs,
    /// Finalized macro buckets, empty until finalization.
    pub(crate) buckets: AttrMap,
}

#[derive(Debug)]
pub struct Project {
    /// In discovery order.
    pub subdirs: Vec<Subdir>,
    pub root: Attrs,
}

impl Project {
    pub fn subdir(&self, path: &str) -> Option<&Subdir> {
        self.subdirs.iter().find(|subdir| subdir.path == path)
    }

    /// Looks up a target by directory and name.
    pub fn target(&self, path: &str, name: &str) -> Option<&Target> {
        self.subdir(path)?
            .targets
            .iter()
            .find(|target| target.name == name)
    }

    /// Directories that have at least one target.
    pub fn non_empty_subdirs(&self) -> impl Iterator<Item = &Subdir> {
        self.subdirs
            .iter()
            .filter(|subdir| !subdir.targets.is_empty())
    }
}

/// Incrementally builds a [Project] while the graph is walked.
pub struct ProjectBuilder {
    project: Project,
    subdir_ix: HashMap<String, usize>,
}

impl Default for ProjectBuilder {
    fn default() -> Self {
        Self {
            project: Project {
                subdirs: vec![],
                root: Attrs::new(AttrGroup::Root, "root"),
            },
            subdir_ix: HashMap::new(),
        }
    }
}

impl ProjectBuilder {
    /// Creates a target in `dir`, creating the directory on first use.
    pub fn create_target(
        &mut self,
        dir: &str,
        macro_name: &str,
        name: &str,
        macro_args: Vec<String>,
        test_mod_dir: Option<String>,
    ) -> TargetId {
        let subdir = match self.subdir_ix.get(dir) {
            Some(ix) => *ix,
            None => {
                self.project.subdirs.push(Subdir {
                    path: dir.to_owned(),
                    targets: vec![],
                    attrs: Attrs::new(AttrGroup::Directory, format!("dir {}", dir)),
                    buckets: AttrMap::new(),
                });
                let ix = self.project.subdirs.len() - 1;
                self.subdir_ix.insert(dir.to_owned(), ix);
                ix
            }
        };

        let mut attrs = Attrs::new(
            AttrGroup::Target,
            format!("target {} {}", macro_name, name),
        );
        let map = attrs.map_mut();
        map.insert("name", name);
        map.insert("macro", macro_name);
        map.insert(
            "macroArgs",
            Value::List(macro_args.iter().map(|arg| Value::from(arg.as_str())).collect()),
        );
        map.insert("isTest", test_mod_dir.is_some());

        let targets = &mut self.project.subdirs[subdir].targets;
        targets.push(Target {
            name: name.to_owned(),
            macro_name: macro_name.to_owned(),
            macro_args,
            test_mod_dir,
            attrs,
        });

        TargetId {
            subdir,
            target: targets.len() - 1,
        }
    }

    pub fn target(&self, id: TargetId) -> &Target {
        &self.project.subdirs[id.subdir].targets[id.target]
    }

    pub fn target_mut(&mut self, id: TargetId) -> &mut Target {
        &mut self.project.subdirs[id.subdir].targets[id.target]
    }

    pub fn subdir_mut(&mut self, ix: usize) -> &mut Subdir {
        &mut self.project.subdirs[ix]
    }

    pub fn root_mut(&mut self) -> &mut Attrs {
        &mut self.project.root
    }

    pub fn finish(self) -> Project {
        self.project
    }
}
