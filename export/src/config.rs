//! Export configuration: the policy data that drives an export.
//!
//! Configs are deserialized with serde. Every field has a default, so an
//! empty JSON object is a valid (if not very useful) config.
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::attrs::{AttrGroup, AttrKind};
use crate::value::AttrMap;
use crate::Error;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub project_name: String,

    /// Root of the source tree the graph was produced from.
    pub project_root: PathBuf,

    /// Where generated files end up, if known.
    pub export_root: Option<PathBuf>,

    /// Directory suffixes marking test modules, e.g. `ut` or `test`.
    /// A target in `a/b/ut` belongs to `a/b/` and is a test target.
    pub test_suffixes: Vec<String>,

    /// Attribute typing table: group, then attribute name, to kind.
    pub attr_types: BTreeMap<AttrGroup, BTreeMap<String, AttrKind>>,

    /// Default attributes merged into every macro bucket of a directory.
    pub add_attrs_dir: AttrMap,

    /// Default attributes merged into every target.
    pub add_attrs_target: AttrMap,

    pub dump: DumpOpts,

    pub debug: DebugOpts,
}

impl ExportConfig {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, Error> {
        Ok(serde_json::from_value(value)?)
    }

    /// Looks up the kind of an attribute in the typing table.
    pub fn attr_kind(&self, group: AttrGroup, name: &str) -> AttrKind {
        self.attr_types
            .get(&group)
            .and_then(|attrs| attrs.get(name))
            .copied()
            .unwrap_or_default()
    }
}

/// Options for dumping sems and attributes, for testing and debugging.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DumpOpts {
    pub dump_sems: bool,

    /// Only dump directories starting with one of these prefixes.
    /// Everything (including the root) is dumped when empty.
    pub dump_path_prefixes: Vec<String>,
}

/// Options for embedding debug dumps into the rendered attributes.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebugOpts {
    /// Add a `dump_sems` attribute with the raw annotations.
    pub debug_sems: bool,

    /// Add a `dump_attrs` attribute with the dumped attribute tree.
    pub debug_attrs: bool,
}
