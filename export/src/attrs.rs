//! Attribute stores: the per-entity attribute trees built up from
//! semantic annotations during traversal.
use std::fmt::Write;

use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::value::{append_flattened, append_unique, AttrMap, Value};

/// Separates the components of a nested attribute name, e.g.
/// `consumer-jar` addresses `jar` inside the `consumer` map.
pub const ATTR_DIVIDER: char = '-';

/// The entity an attribute store belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrGroup {
    Root,
    Directory,
    Target,
    Induced,
}

/// How the string arguments of an annotation are shaped into a [Value].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrKind {
    /// Not listed in the typing table.
    #[default]
    Unknown,
    Str,
    Bool,
    Flag,
    List,
    Set,
    SortedSet,
    Dict,
}

impl AttrKind {
    /// Shapes annotation arguments into a value of this kind.
    pub fn make_value(self, args: &[String]) -> Value {
        match self {
            AttrKind::Str => Value::Str(args.first().cloned().unwrap_or_default()),
            AttrKind::Bool => Value::Bool(args.first().is_some_and(|arg| parse_bool(arg))),
            AttrKind::Flag => Value::Bool(true),
            AttrKind::List | AttrKind::Set | AttrKind::SortedSet => {
                Value::List(args.iter().map(|arg| Value::from(arg.as_str())).collect())
            }
            AttrKind::Dict => Value::Map(
                args.iter()
                    .map(|arg| match arg.split_once('=') {
                        Some((k, v)) => (k, v),
                        None => (arg.as_str(), ""),
                    })
                    .collect(),
            ),
            AttrKind::Unknown => match args {
                [single] => Value::from(single.as_str()),
                _ => Value::List(args.iter().map(|arg| Value::from(arg.as_str())).collect()),
            },
        }
    }

    fn is_list(self) -> bool {
        matches!(self, AttrKind::List | AttrKind::Set | AttrKind::SortedSet)
    }
}

fn parse_bool(arg: &str) -> bool {
    matches!(
        arg.to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}

/// An attribute tree owned by exactly one entity (the root, a directory, a
/// target, or the induced cache of a graph node), together with a dump of
/// the raw annotations that produced it.
#[derive(Clone, Debug)]
pub struct Attrs {
    group: AttrGroup,
    name: String,
    map: AttrMap,
    sems_dump: String,
}

impl Attrs {
    pub fn new(group: AttrGroup, name: impl Into<String>) -> Self {
        Self {
            group,
            name: name.into(),
            map: AttrMap::new(),
            sems_dump: String::new(),
        }
    }

    pub fn group(&self) -> AttrGroup {
        self.group
    }

    /// A human-readable name of the owner, e.g. `dir lib` or
    /// `induced by 42`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn map(&self) -> &AttrMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut AttrMap {
        &mut self.map
    }

    pub fn sems_dump(&self) -> &str {
        &self.sems_dump
    }

    /// Appends a raw annotation to the sems dump.
    pub fn record_sem(&mut self, name: &str, args: &[String]) {
        // writing into a String can't fail
        let _ = writeln!(self.sems_dump, "{} {:?}", name, args);
    }

    /// Sets (or merges into) the attribute `name` from annotation arguments.
    ///
    /// List kinds append to an existing list, everything else replaces the
    /// previous value. Attributes of [AttrKind::Unknown] keep the shape of
    /// their first occurrence: once a list, later occurrences append to it,
    /// while a single-argument (string) value is replaced by the next one.
    pub fn set_attr(&mut self, name: &str, kind: AttrKind, args: &[String], node_path: &str) {
        self.record_sem(name, args);

        let (parents, leaf) = match name.rsplit_once(ATTR_DIVIDER) {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, name),
        };

        let mut map = &mut self.map;
        for component in parents.into_iter().flat_map(|p| p.split(ATTR_DIVIDER)) {
            let entry = map.get_or_insert_with(component, || Value::Map(AttrMap::new()));
            if !entry.is_map() {
                warn!(
                    attr = name,
                    node.path = node_path,
                    "replacing {} value of '{}' by a map",
                    entry.type_of(),
                    component
                );
                *entry = Value::Map(AttrMap::new());
            }
            map = match entry.as_map_mut() {
                Some(nested) => nested,
                None => unreachable!("entry was just made a map"),
            };
        }

        let value = kind.make_value(args);
        match map.get_mut(leaf) {
            Some(Value::List(list)) if kind.is_list() || kind == AttrKind::Unknown => match kind {
                AttrKind::Set => {
                    append_unique(list, value);
                }
                AttrKind::SortedSet => {
                    append_unique(list, value);
                    list.sort_by_cached_key(Value::to_string);
                }
                _ => append_flattened(list, value),
            },
            Some(existing) => {
                debug!(
                    attr = name,
                    node.path = node_path,
                    "replacing attribute value {}",
                    existing
                );
                *existing = value;
            }
            None => {
                let value = match (kind, value) {
                    (AttrKind::Set | AttrKind::SortedSet, Value::List(items)) => {
                        let mut list = vec![];
                        append_unique(&mut list, Value::List(items));
                        if kind == AttrKind::SortedSet {
                            list.sort_by_cached_key(Value::to_string);
                        }
                        Value::List(list)
                    }
                    (_, value) => value,
                };
                map.insert(leaf, value);
            }
        }
    }

    /// Appends `value` to the list attribute `name` (created if missing),
    /// skipping elements that are already present. Returns the number of
    /// appended elements.
    pub fn append_to_list(&mut self, name: &str, value: Value) -> usize {
        let entry = self
            .map
            .get_or_insert_with(name, || Value::List(Vec::new()));
        if let Value::List(list) = entry {
            return append_unique(list, value);
        }

        error!(
            attr = name,
            owner = %self.name,
            "cannot append to {} attribute, replacing it by a list",
            entry.type_of()
        );
        let mut list = vec![];
        let added = append_unique(&mut list, value);
        *entry = Value::List(list);
        added
    }
}

/// Merges `tree` into `attrs`, recursing into nested maps.
///
/// A leaf of `tree` whose key already exists in `attrs` is dropped: the
/// destination wins. Returns the dotted paths of the dropped keys, each of
/// which is also logged.
pub fn merge_tree(attrs: &mut AttrMap, tree: &AttrMap) -> Vec<String> {
    let mut conflicts = vec![];
    merge_tree_at(attrs, tree, "", &mut conflicts);
    conflicts
}

fn merge_tree_at(attrs: &mut AttrMap, tree: &AttrMap, prefix: &str, conflicts: &mut Vec<String>) {
    for (name, value) in tree.iter() {
        let path = if prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{}", prefix, name)
        };

        match (value, attrs.get_mut(name)) {
            (Value::Map(subtree), Some(Value::Map(existing))) => {
                merge_tree_at(existing, subtree, &path, conflicts)
            }
            (Value::Map(subtree), None) => {
                let mut nested = AttrMap::new();
                merge_tree_at(&mut nested, subtree, &path, conflicts);
                attrs.insert(name, nested);
            }
            (_, Some(_)) => {
                error!(attr = %path, "attribute already set, keeping the existing value");
                conflicts.push(path);
            }
            (_, None) => {
                attrs.insert(name, value.clone());
            }
        }
    }
}
