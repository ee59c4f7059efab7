use expect_test::expect;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{
    AttrMap, DepKind, Diagnostic, DiagnosticKind, Error, ExportConfig, Exporter, NodeId,
    SemGraph, SemKind, Semantic, Value,
};

fn target(macro_name: &str, dir: &str, name: &str) -> Semantic {
    Semantic::new(SemKind::TargetBoundary, macro_name, [dir, name])
}

fn sem(kind: SemKind, name: &str, args: &[&str]) -> Semantic {
    Semantic::new(kind, name, args.iter().copied())
}

fn strs(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::from(*s)).collect())
}

fn dep(graph: &mut SemGraph, from: u32, to: u32) {
    graph
        .add_dep(NodeId(from), NodeId(to), DepKind::Direct, vec![])
        .expect("nodes must exist");
}

fn analyze(config: ExportConfig, graph: &SemGraph, start: &[u32]) -> Exporter {
    let start: Vec<NodeId> = start.iter().copied().map(NodeId).collect();
    let mut exporter = Exporter::new(config);
    exporter.analyze(graph, &start);
    exporter
}

fn kinds(diagnostics: &[Diagnostic]) -> Vec<DiagnosticKind> {
    diagnostics.iter().map(|d| d.kind.clone()).collect()
}

/// `prog` depends on `lib`, which induces a classpath and owns its
/// directory, and declares a root attribute.
fn prog_lib_graph() -> SemGraph {
    let mut graph = SemGraph::new();
    graph
        .add_node(
            NodeId(1),
            "prog",
            vec![
                Semantic::new(
                    SemKind::TargetBoundary,
                    "PROGRAM",
                    ["prog", "prog", "arg1"],
                ),
                sem(SemKind::TargetAttr, "srcs", &["main.cpp"]),
                sem(SemKind::RootAttr, "languages", &["cpp"]),
            ],
        )
        .unwrap();
    graph
        .add_node(
            NodeId(2),
            "lib",
            vec![
                target("LIBRARY", "lib", "lib"),
                sem(SemKind::DirectoryAttr, "owner", &["team"]),
                sem(SemKind::InducedAttr, "classpath", &["lib.jar"]),
            ],
        )
        .unwrap();
    dep(&mut graph, 1, 2);
    graph.add_start_node(NodeId(1)).unwrap();
    graph
}

#[test]
fn induced_attrs_reach_direct_dependents() {
    let mut exporter = Exporter::new(ExportConfig::default());
    exporter.analyze_graph(&prog_lib_graph());
    let project = exporter.project().expect("project must be loaded");

    let prog = project.target("prog", "prog").expect("prog must exist");
    assert_eq!(
        r#"{ name = "prog"; macro = "PROGRAM"; macroArgs = [ "arg1" ]; isTest = false; classpath = [ "lib.jar" ]; srcs = "main.cpp"; }"#,
        prog.attrs.map().to_string()
    );

    // the library's own trees are unaffected
    let lib = project.target("lib", "lib").expect("lib must exist");
    assert_eq!(None, lib.attrs.map().get("classpath"));
    assert_eq!(
        r#"{ owner = "team"; }"#,
        project.subdir("lib").unwrap().attrs.map().to_string()
    );
    assert!(project.subdir("prog").unwrap().attrs.map().is_empty());

    assert!(exporter.diagnostics().is_empty());
}

#[test]
fn only_direct_deps_propagate_and_duplicates_are_dropped() {
    let mut graph = SemGraph::new();
    graph
        .add_node(NodeId(1), "prog", vec![target("PROGRAM", "prog", "prog")])
        .unwrap();
    graph
        .add_node(
            NodeId(2),
            "lib1",
            vec![
                target("LIBRARY", "lib1", "lib1"),
                sem(SemKind::InducedAttr, "classpath", &["lib1.jar"]),
            ],
        )
        .unwrap();
    graph
        .add_node(
            NodeId(3),
            "lib2",
            vec![
                target("LIBRARY", "lib2", "lib2"),
                sem(SemKind::InducedAttr, "classpath", &["lib2.jar"]),
            ],
        )
        .unwrap();
    dep(&mut graph, 1, 2);
    dep(&mut graph, 1, 2);
    graph
        .add_dep(NodeId(1), NodeId(3), DepKind::Indirect, vec![])
        .unwrap();

    let exporter = analyze(ExportConfig::default(), &graph, &[1]);
    let project = exporter.project().unwrap();

    assert_eq!(
        Some(&strs(&["lib1.jar"])),
        project
            .target("prog", "prog")
            .unwrap()
            .attrs
            .map()
            .get("classpath")
    );
    // visited, but not propagated
    assert!(project.target("lib2", "lib2").is_some());
}

#[test]
fn same_directory_deps_do_not_propagate() {
    let mut graph = SemGraph::new();
    graph
        .add_node(NodeId(1), "lib/ut", vec![target("UNITTEST", "lib/ut", "lib-ut")])
        .unwrap();
    graph
        .add_node(
            NodeId(2),
            "lib",
            vec![
                target("LIBRARY", "lib/", "lib"),
                sem(SemKind::InducedAttr, "classpath", &["lib.jar"]),
            ],
        )
        .unwrap();
    dep(&mut graph, 1, 2);

    let config = ExportConfig {
        test_suffixes: vec!["ut".into()],
        ..Default::default()
    };
    let exporter = analyze(config, &graph, &[1]);
    let project = exporter.project().unwrap();

    assert_eq!(
        vec!["lib/"],
        project.subdirs.iter().map(|s| s.path.as_str()).collect::<Vec<_>>()
    );
    let ut = project.target("lib/", "lib-ut").expect("test must be in lib/");
    assert!(ut.is_test());
    assert_eq!(None, ut.attrs.map().get("classpath"));
}

#[rstest]
#[case::stripped("a/b/test", "a/b/", Some("test"))]
#[case::whole_dir_is_suffix("test", "test", None)]
#[case::no_suffix("a/b", "a/b", None)]
fn test_suffix_stripping(
    #[case] mod_dir: &str,
    #[case] expected_dir: &str,
    #[case] expected_test_dir: Option<&str>,
) {
    let mut graph = SemGraph::new();
    graph
        .add_node(NodeId(1), mod_dir, vec![target("UNITTEST", mod_dir, "t")])
        .unwrap();

    let config = ExportConfig {
        test_suffixes: vec!["test".into()],
        ..Default::default()
    };
    let exporter = analyze(config, &graph, &[1]);
    let project = exporter.project().unwrap();

    let t = project
        .target(expected_dir, "t")
        .expect("target must be in the stripped directory");
    assert_eq!(expected_test_dir, t.test_mod_dir.as_deref());
    assert_eq!(
        Some(&Value::from(expected_test_dir.is_some())),
        t.attrs.map().get("isTest")
    );
}

fn java_lib(graph: &mut SemGraph, id: u32, name: &str) {
    graph
        .add_node(
            NodeId(id),
            name,
            vec![
                target("JAVA_LIBRARY", name, name),
                sem(SemKind::InducedAttr, "consumer-classpath", &[name]),
                sem(
                    SemKind::InducedAttr,
                    "consumer-jar",
                    &[format!("{}.jar", name).as_str()],
                ),
            ],
        )
        .unwrap();
}

#[test]
fn exclusions_are_folded_into_map_attrs() {
    let mut graph = SemGraph::new();
    graph
        .add_node(NodeId(1), "prog", vec![target("JAVA_PROGRAM", "prog", "prog")])
        .unwrap();
    java_lib(&mut graph, 2, "lib1");
    java_lib(&mut graph, 3, "ex1");
    graph
        .add_dep(NodeId(1), NodeId(2), DepKind::Direct, vec![NodeId(3)])
        .unwrap();

    let exporter = analyze(ExportConfig::default(), &graph, &[1]);
    let project = exporter.project().unwrap();

    assert_eq!(
        r#"[ { classpath = "lib1"; jar = "lib1.jar"; excludes = { consumer = [ { classpath = "ex1"; jar = "ex1.jar"; } ]; }; } ]"#,
        project
            .target("prog", "prog")
            .unwrap()
            .attrs
            .map()
            .get("consumer")
            .expect("consumer must be propagated")
            .to_string()
    );

    // the excluded node was visited on demand
    assert_eq!(
        vec!["prog", "lib1", "ex1"],
        project.subdirs.iter().map(|s| s.path.as_str()).collect::<Vec<_>>()
    );
    assert!(exporter.diagnostics().is_empty());
}

#[test]
fn unresolvable_exclusions_are_reported_and_skipped() {
    let mut graph = SemGraph::new();
    graph
        .add_node(NodeId(1), "prog", vec![target("JAVA_PROGRAM", "prog", "prog")])
        .unwrap();
    java_lib(&mut graph, 2, "lib1");
    graph.add_node(NodeId(4), "plain", vec![]).unwrap();
    // excluding the node that is currently being visited, and a node
    // without induced attributes
    graph
        .add_dep(
            NodeId(1),
            NodeId(2),
            DepKind::Direct,
            vec![NodeId(1), NodeId(4)],
        )
        .unwrap();

    let exporter = analyze(ExportConfig::default(), &graph, &[1]);

    assert_eq!(
        vec![
            Diagnostic {
                kind: DiagnosticKind::ExclusionCycle { node: NodeId(1) },
                path: "lib1".into(),
            },
            Diagnostic {
                kind: DiagnosticKind::MissingExcludedInduced { node: NodeId(4) },
                path: "lib1".into(),
            },
        ],
        exporter.diagnostics()
    );

    // propagation still happened, without exclusions
    assert_eq!(
        r#"[ { classpath = "lib1"; jar = "lib1.jar"; } ]"#,
        exporter
            .project()
            .unwrap()
            .target("prog", "prog")
            .unwrap()
            .attrs
            .map()
            .get("consumer")
            .unwrap()
            .to_string()
    );
}

#[test]
fn excluded_nodes_are_visited_without_an_active_target() {
    let mut graph = SemGraph::new();
    graph.add_node(NodeId(1), "root", vec![]).unwrap();
    java_lib(&mut graph, 2, "lib1");
    java_lib(&mut graph, 3, "ex1");
    graph
        .add_dep(NodeId(1), NodeId(2), DepKind::Direct, vec![NodeId(3)])
        .unwrap();

    let exporter = analyze(ExportConfig::default(), &graph, &[1]);

    assert_eq!(
        vec!["lib1", "ex1"],
        exporter
            .project()
            .unwrap()
            .subdirs
            .iter()
            .map(|s| s.path.as_str())
            .collect::<Vec<_>>()
    );
    assert_eq!(
        vec![Diagnostic {
            kind: DiagnosticKind::NoActiveTarget {
                attr: "consumer".into()
            },
            path: "lib1".into(),
        }],
        exporter.diagnostics()
    );
}

#[test]
fn identical_excluded_values_are_folded_once() {
    let mut graph = SemGraph::new();
    graph
        .add_node(NodeId(1), "prog", vec![target("JAVA_PROGRAM", "prog", "prog")])
        .unwrap();
    java_lib(&mut graph, 2, "lib1");
    for (id, name) in [(3, "ex1"), (4, "ex2")] {
        graph
            .add_node(
                NodeId(id),
                name,
                vec![
                    target("JAVA_LIBRARY", name, name),
                    sem(SemKind::InducedAttr, "consumer-classpath", &["shared"]),
                ],
            )
            .unwrap();
    }
    graph
        .add_dep(
            NodeId(1),
            NodeId(2),
            DepKind::Direct,
            vec![NodeId(3), NodeId(4)],
        )
        .unwrap();

    let exporter = analyze(ExportConfig::default(), &graph, &[1]);

    assert_eq!(
        r#"[ { classpath = "lib1"; jar = "lib1.jar"; excludes = { consumer = [ { classpath = "shared"; } ]; }; } ]"#,
        exporter
            .project()
            .unwrap()
            .target("prog", "prog")
            .unwrap()
            .attrs
            .map()
            .get("consumer")
            .unwrap()
            .to_string()
    );
    assert!(exporter.diagnostics().is_empty());
}

#[test]
fn induced_lists_follow_declaration_order() {
    let graph = || {
        let mut graph = SemGraph::new();
        graph
            .add_node(NodeId(1), "prog", vec![target("JAVA_PROGRAM", "prog", "prog")])
            .unwrap();
        java_lib(&mut graph, 2, "lib1");
        java_lib(&mut graph, 3, "lib2");
        java_lib(&mut graph, 4, "lib3");
        dep(&mut graph, 1, 3);
        dep(&mut graph, 1, 2);
        dep(&mut graph, 1, 4);
        graph
    };
    let consumer = |exporter: &Exporter| {
        exporter
            .project()
            .unwrap()
            .target("prog", "prog")
            .unwrap()
            .attrs
            .map()
            .get("consumer")
            .unwrap()
            .to_string()
    };

    let first = analyze(ExportConfig::default(), &graph(), &[1]);
    let second = analyze(ExportConfig::default(), &graph(), &[1]);

    assert_eq!(
        concat!(
            r#"[ { classpath = "lib2"; jar = "lib2.jar"; } "#,
            r#"{ classpath = "lib1"; jar = "lib1.jar"; } "#,
            r#"{ classpath = "lib3"; jar = "lib3.jar"; } ]"#,
        ),
        consumer(&first)
    );
    assert_eq!(consumer(&first), consumer(&second));
    assert_eq!(
        vec!["prog", "lib2", "lib1", "lib3"],
        first
            .project()
            .unwrap()
            .subdirs
            .iter()
            .map(|s| s.path.as_str())
            .collect::<Vec<_>>()
    );
}

#[test]
fn deps_on_test_targets_carry_the_test_dir() {
    let mut graph = SemGraph::new();
    graph
        .add_node(NodeId(1), "suite", vec![target("TEST_SUITE", "suite", "suite")])
        .unwrap();
    graph
        .add_node(
            NodeId(2),
            "lib/test",
            vec![
                target("UNITTEST", "lib/test", "lib-test"),
                sem(SemKind::InducedAttr, "run-cmd", &["lib-test"]),
                sem(SemKind::InducedAttr, "tag", &["slow"]),
            ],
        )
        .unwrap();
    dep(&mut graph, 1, 2);

    let config = ExportConfig {
        test_suffixes: vec!["test".into()],
        ..Default::default()
    };
    let exporter = analyze(config, &graph, &[1]);
    let suite = exporter.project().unwrap().target("suite", "suite").unwrap();

    assert_eq!(
        r#"[ { cmd = "lib-test"; testdep = "test"; } ]"#,
        suite.attrs.map().get("run").unwrap().to_string()
    );
    // only maps are augmented
    assert_eq!(Some(&strs(&["slow"])), suite.attrs.map().get("tag"));
}

#[test]
fn structural_misuse_is_reported() {
    let mut graph = SemGraph::new();
    graph
        .add_node(
            NodeId(1),
            "n1",
            vec![
                sem(SemKind::TargetAttr, "srcs", &["x"]),
                sem(SemKind::DirectoryAttr, "owner", &["t"]),
                sem(SemKind::Unknown, "FOO", &[]),
                sem(SemKind::TargetBoundary, "PROGRAM", &["onlydir"]),
            ],
        )
        .unwrap();

    let exporter = analyze(ExportConfig::default(), &graph, &[1]);

    assert_eq!(
        vec![
            DiagnosticKind::MalformedTarget {
                macro_name: "PROGRAM".into()
            },
            DiagnosticKind::NoActiveTarget {
                attr: "srcs".into()
            },
            DiagnosticKind::NoActiveDirectory {
                attr: "owner".into()
            },
            DiagnosticKind::UnknownSemantic { name: "FOO".into() },
        ],
        kinds(exporter.diagnostics())
    );
    assert!(exporter.project().unwrap().subdirs.is_empty());
}

/// A library, its test and a tool, all living in `lib`.
fn bucket_graph(extra_tool: bool) -> SemGraph {
    let mut graph = SemGraph::new();
    graph
        .add_node(NodeId(1), "lib/ut", vec![target("LIBRARY", "lib/ut", "lib-ut")])
        .unwrap();
    graph
        .add_node(
            NodeId(2),
            "lib",
            vec![
                target("LIBRARY", "lib", "lib"),
                sem(SemKind::TargetAttr, "srcs", &["a.cpp", "b.cpp"]),
                sem(SemKind::DirectoryAttr, "owner", &["team"]),
            ],
        )
        .unwrap();
    graph
        .add_node(NodeId(3), "lib/tool", vec![target("PROGRAM", "lib", "tool")])
        .unwrap();
    dep(&mut graph, 1, 2);
    graph.add_start_node(NodeId(1)).unwrap();
    graph.add_start_node(NodeId(3)).unwrap();

    if extra_tool {
        graph
            .add_node(NodeId(4), "lib/tool2", vec![target("PROGRAM", "lib", "tool2")])
            .unwrap();
        graph.add_start_node(NodeId(4)).unwrap();
    }

    graph
}

fn bucket_config() -> ExportConfig {
    ExportConfig {
        project_root: "/src".into(),
        test_suffixes: vec!["/ut".into()],
        ..Default::default()
    }
}

#[test]
fn targets_are_grouped_into_macro_buckets() {
    let mut exporter = Exporter::new(bucket_config());
    exporter.analyze_graph(&bucket_graph(false));

    let subdirs = exporter.finalize_subdirs_attrs(&[]).unwrap();
    assert_eq!(vec!["lib"], subdirs.keys().collect::<Vec<_>>());

    let buckets = subdirs.get("lib").and_then(Value::as_map).unwrap();
    assert_eq!(vec!["LIBRARY", "PROGRAM"], buckets.keys().collect::<Vec<_>>());

    assert_eq!(
        concat!(
            r#"{ projectRoot = "/src"; hasTest = true; "#,
            r#"extra_targets = [ { name = "lib-ut"; macro = "LIBRARY"; macroArgs = [ ]; isTest = true; } ]; "#,
            r#"owner = "team"; "#,
            r#"target = { name = "lib"; macro = "LIBRARY"; macroArgs = [ ]; isTest = false; srcs = [ "a.cpp" "b.cpp" ]; }; }"#,
        ),
        buckets.get("LIBRARY").unwrap().to_string()
    );

    let program = buckets.get("PROGRAM").and_then(Value::as_map).unwrap();
    assert_eq!(Some(false), program.get("hasTest").and_then(Value::as_bool));
    assert_eq!(Some(&Value::List(vec![])), program.get("extra_targets"));
    assert_eq!(
        Some("tool"),
        program
            .get("target")
            .and_then(Value::as_map)
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str)
    );
}

#[test]
fn conflicts_are_reported_without_abort() {
    let config = ExportConfig {
        add_attrs_dir: AttrMap::from_iter([("owner", "nobody"), ("lang", "cpp")]),
        ..bucket_config()
    };
    let mut exporter = Exporter::new(config);
    exporter.analyze_graph(&bucket_graph(true));

    let subdirs = exporter.finalize_subdirs_attrs(&[]).unwrap();
    let buckets = subdirs.get("lib").and_then(Value::as_map).unwrap();

    let overwritten = DiagnosticKind::AttrOverwritten {
        attr: "owner".into(),
    };
    assert_eq!(
        vec![
            overwritten.clone(),
            overwritten,
            DiagnosticKind::MainTargetOverwritten {
                macro_name: "PROGRAM".into(),
                old: "tool".into(),
                new: "tool2".into(),
            },
        ],
        kinds(exporter.diagnostics())
    );

    // the directory's own attribute wins over the overlay, the rest of the
    // overlay still applies, and the last main target wins
    let library = buckets.get("LIBRARY").and_then(Value::as_map).unwrap();
    assert_eq!(Some(&Value::from("team")), library.get("owner"));
    assert_eq!(Some(&Value::from("cpp")), library.get("lang"));
    let program = buckets.get("PROGRAM").and_then(Value::as_map).unwrap();
    assert_eq!(
        Some("tool2"),
        program
            .get("target")
            .and_then(Value::as_map)
            .and_then(|t| t.get("name"))
            .and_then(Value::as_str)
    );
}

#[test]
fn target_overlay_is_merged_into_targets() {
    let config = ExportConfig {
        add_attrs_target: AttrMap::from_iter([("lang", "cpp")]),
        ..bucket_config()
    };
    let mut exporter = Exporter::new(config);
    exporter.analyze_graph(&bucket_graph(false));
    exporter.finalize_subdirs_attrs(&[]).unwrap();

    for (_, targets) in exporter.subdirs_targets().unwrap() {
        for target in targets {
            assert_eq!(Some(&Value::from("cpp")), target.attrs.map().get("lang"));
        }
    }
    assert!(exporter.diagnostics().is_empty());
}

#[test]
fn finalization_is_idempotent() {
    let config = ExportConfig {
        project_name: "demo".into(),
        add_attrs_dir: AttrMap::from_iter([("owner", "nobody")]),
        ..bucket_config()
    };
    let mut exporter = Exporter::new(config);
    exporter.analyze_graph(&bucket_graph(true));

    let root = exporter.finalize_root_attrs().unwrap().to_string();
    let subdirs = exporter.finalize_subdirs_attrs(&[]).unwrap().to_string();
    let reported = exporter.diagnostics().len();

    assert_eq!(root, exporter.finalize_root_attrs().unwrap().to_string());
    assert_eq!(
        subdirs,
        exporter.finalize_subdirs_attrs(&[]).unwrap().to_string()
    );
    assert_eq!(reported, exporter.diagnostics().len());
}

#[test]
fn root_attrs() {
    let config = ExportConfig {
        project_name: "demo".into(),
        project_root: "/src".into(),
        export_root: Some("/out".into()),
        add_attrs_target: AttrMap::from_iter([("lang", "cpp")]),
        ..Default::default()
    };
    let mut exporter = Exporter::new(config);
    exporter.analyze_graph(&prog_lib_graph());

    assert_eq!(
        concat!(
            r#"{ languages = "cpp"; subdirs = [ "prog" "lib" ]; projectRoot = "/src"; "#,
            r#"exportRoot = "/out"; projectName = "demo"; add_attrs_target = { lang = "cpp"; }; }"#,
        ),
        exporter.finalize_root_attrs().unwrap().to_string()
    );
}

#[test]
fn debug_attrs_are_embedded() {
    let mut config = ExportConfig::default();
    config.debug.debug_sems = true;
    config.debug.debug_attrs = true;
    let mut exporter = Exporter::new(config);
    exporter.analyze_graph(&prog_lib_graph());

    let root = exporter.finalize_root_attrs().unwrap().clone();
    assert_eq!(
        Some(&Value::from("languages [\"cpp\"]\n")),
        root.get(crate::DEBUG_SEMS_ATTR)
    );

    let subdirs = exporter.finalize_subdirs_attrs(&[]).unwrap();
    let library = subdirs
        .get("lib")
        .and_then(Value::as_map)
        .and_then(|buckets| buckets.get("LIBRARY"))
        .and_then(Value::as_map)
        .unwrap();
    assert_eq!(
        Some(&Value::from("LIBRARY [\"lib\", \"lib\"]\n")),
        library.get(crate::DEBUG_SEMS_ATTR)
    );
    assert!(library
        .get(crate::DEBUG_ATTRS_ATTR)
        .and_then(Value::as_str)
        .is_some_and(|dump| dump.starts_with("{ projectRoot = ")));
}

#[test]
fn dumping_sems_does_not_embed_them() {
    let mut config = ExportConfig::default();
    config.dump.dump_sems = true;
    let mut exporter = Exporter::new(config);
    exporter.analyze_graph(&prog_lib_graph());
    assert!(exporter.config().dump.dump_sems);

    let root = exporter.finalize_root_attrs().unwrap().clone();
    assert_eq!(None, root.get(crate::DEBUG_SEMS_ATTR));

    let subdirs = exporter.finalize_subdirs_attrs(&[]).unwrap();
    let library = subdirs
        .get("lib")
        .and_then(Value::as_map)
        .and_then(|buckets| buckets.get("LIBRARY"))
        .and_then(Value::as_map)
        .unwrap();
    assert_eq!(None, library.get(crate::DEBUG_SEMS_ATTR));

    let mut out: Vec<u8> = vec![];
    exporter.dump_sems(&mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().starts_with("--- ROOT\n"));
}

#[test]
fn root_annotations_win_over_project_defaults() {
    let mut graph = SemGraph::new();
    graph
        .add_node(
            NodeId(1),
            "prog",
            vec![
                target("PROGRAM", "prog", "prog"),
                sem(SemKind::RootAttr, "projectRoot", &["/mine"]),
            ],
        )
        .unwrap();

    let config = ExportConfig {
        project_name: "demo".into(),
        project_root: "/src".into(),
        ..Default::default()
    };
    let mut exporter = analyze(config, &graph, &[1]);

    assert_eq!(
        r#"{ projectRoot = "/mine"; subdirs = [ "prog" ]; projectName = "demo"; }"#,
        exporter.finalize_root_attrs().unwrap().to_string()
    );
}

#[test]
fn prefix_filtered_finalization() {
    let mut exporter = Exporter::new(ExportConfig::default());
    exporter.analyze_graph(&prog_lib_graph());

    let only_lib = exporter.finalize_subdirs_attrs(&["li".into()]).unwrap();
    assert_eq!(vec!["lib"], only_lib.keys().collect::<Vec<_>>());

    let all = exporter.finalize_subdirs_attrs(&[]).unwrap();
    assert_eq!(vec!["prog", "lib"], all.keys().collect::<Vec<_>>());
    assert_eq!(only_lib.get("lib"), all.get("lib"));
}

#[test]
fn dump_sems() {
    let mut exporter = Exporter::new(ExportConfig::default());
    exporter.analyze_graph(&prog_lib_graph());

    let mut out = vec![];
    exporter.dump_sems(&mut out).unwrap();

    expect![[r#"
        --- ROOT
        languages ["cpp"]
        --- DIR prog
        --- TARGET prog
        PROGRAM ["prog", "prog", "arg1"]
        srcs ["main.cpp"]
        --- DIR lib
        owner ["team"]
        --- TARGET lib
        LIBRARY ["lib", "lib"]
    "#]]
    .assert_eq(&String::from_utf8(out).unwrap());
}

#[test]
fn dump_sems_with_prefixes_skips_root() {
    let mut config = ExportConfig::default();
    config.dump.dump_path_prefixes = vec!["lib".into()];
    let mut exporter = Exporter::new(config);
    exporter.analyze_graph(&prog_lib_graph());

    let mut out = vec![];
    exporter.dump_sems(&mut out).unwrap();

    assert_eq!(
        "--- DIR lib\nowner [\"team\"]\n--- TARGET lib\nLIBRARY [\"lib\", \"lib\"]\n",
        String::from_utf8(out).unwrap()
    );
}

#[test]
fn dump_attrs_leaves_out_debug_attrs() {
    let mut config = ExportConfig::default();
    config.debug.debug_attrs = true;
    config.dump.dump_path_prefixes = vec!["lib".into()];
    let mut exporter = Exporter::new(config);
    exporter.analyze_graph(&prog_lib_graph());

    let mut out = vec![];
    exporter.dump_attrs(&mut out).unwrap();
    let forest: serde_json::Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(
        serde_json::json!("team"),
        forest["subdirs"]["lib"]["LIBRARY"]["owner"]
    );
    assert!(forest["subdirs"].get("prog").is_none());
    assert!(forest["subdirs"]["lib"]["LIBRARY"].get("dump_attrs").is_none());
    assert!(forest["root"].get("dump_attrs").is_none());
    assert_eq!(serde_json::json!(["prog", "lib"]), forest["root"]["subdirs"]);
}

#[test]
fn output_is_deterministic() {
    let dump = || {
        let mut config = ExportConfig::default();
        config.debug.debug_attrs = true;
        let mut exporter = Exporter::new(config);
        exporter.analyze_graph(&bucket_graph(true));
        let mut out: Vec<u8> = vec![];
        exporter.dump_attrs(&mut out).unwrap();
        out
    };

    assert_eq!(dump(), dump());
}

#[test]
fn use_before_analysis_fails() {
    let mut exporter = Exporter::new(ExportConfig::default());

    assert!(matches!(
        exporter.finalize_root_attrs(),
        Err(Error::ProjectNotLoaded(_))
    ));
    assert!(matches!(
        exporter.finalize_subdirs_attrs(&[]),
        Err(Error::ProjectNotLoaded(_))
    ));
    assert!(matches!(
        exporter.dump_sems(&mut Vec::<u8>::new()),
        Err(Error::ProjectNotLoaded(_))
    ));
    assert!(matches!(
        exporter.subdirs_targets(),
        Err(Error::ProjectNotLoaded(_))
    ));
}
