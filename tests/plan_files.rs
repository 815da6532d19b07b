// tests/plan_files.rs

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use opgraph::cli::CliArgs;
use opgraph::config::{default_config_path, load_and_validate};
use opgraph::errors::OpGraphError;
use opgraph::exec::RunParams;
use opgraph::{build_executor, run};
use opgraph_test_utils::builders::{OpConfigBuilder, PlanFileBuilder};
use opgraph_test_utils::{init_tracing, pool_dispatcher};
use tempfile::NamedTempFile;

const DIAMOND: &str = r#"
[config]
workers = 2

[[op]]
name = "init"
writes = ["x", "y"]

[[op]]
name = "left"
reads = ["x"]
writes = ["x1"]
duration_ms = 5

[[op]]
name = "right"
reads = ["y"]
writes = ["y1"]
duration_ms = 5

[[op]]
name = "join"
reads = ["x1", "y1"]
"#;

fn plan_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn plan_file_builds_expected_graph() {
    let file = plan_file(DIAMOND);
    let plan = load_and_validate(file.path()).unwrap();
    assert_eq!(plan.config.workers, 2);

    let executor = build_executor(&plan, false).unwrap();
    assert_eq!(executor.len(), 4);
    assert_eq!(executor.source(), &[0]);
    assert_eq!(executor.sink(), &[3]);
    assert_eq!(executor.node_def(3).unwrap().in_edges, vec![1, 2]);
    assert_eq!(executor.operation(3).unwrap().name(), "join");
}

#[test]
fn simulated_plan_executes_on_pool_and_inline() {
    init_tracing();

    let plan = load_and_validate(plan_file(DIAMOND).path()).unwrap();
    let executor = build_executor(&plan, false).unwrap();

    executor.execute(Arc::new(RunParams::new(0)), None).unwrap();

    let (_rt, pool) = pool_dispatcher(plan.config.workers);
    executor
        .execute(Arc::new(RunParams::new(1)), Some(pool))
        .unwrap();
}

#[test]
fn simulated_failure_names_the_operation() {
    init_tracing();

    let plan = PlanFileBuilder::new()
        .with_op(OpConfigBuilder::new("produce").writes("x").build())
        .with_op(OpConfigBuilder::new("broken").reads("x").writes("y").fail(true).build())
        .with_op(OpConfigBuilder::new("consume").reads("y").build())
        .build();
    let executor = build_executor(&plan, false).unwrap();

    let (_rt, pool) = pool_dispatcher(2);
    let err = executor
        .execute(Arc::new(RunParams::new(0)), Some(pool))
        .unwrap_err();

    assert_eq!(err.failed_node(), Some(1));
    let msg = err.to_string();
    assert!(msg.contains("'broken'"), "{msg}");
    assert!(msg.contains("simulated failure"), "{msg}");
}

#[test]
fn op_without_buffer_lists_fails_graph_build() {
    let plan = PlanFileBuilder::new()
        .with_op(OpConfigBuilder::new("a").writes("x").build())
        .with_op(OpConfigBuilder::new("mystery").unknown_uses().build())
        .build();

    match build_executor(&plan, false) {
        Err(OpGraphError::MissingBufferUses { node, name }) => {
            assert_eq!(node, 1);
            assert_eq!(name, "mystery");
        }
        Err(e) => panic!("expected MissingBufferUses, got {e:?}"),
        Ok(_) => panic!("expected error, got Ok"),
    }
}

#[test]
fn empty_lists_count_as_complete_information() {
    let plan = PlanFileBuilder::new()
        .with_op(OpConfigBuilder::new("noop").build())
        .with_op(OpConfigBuilder::new("a").writes("x").build())
        .build();

    let executor = build_executor(&plan, false).unwrap();
    assert_eq!(executor.source(), &[0, 1]);
    assert_eq!(executor.sink(), &[0, 1]);
}

#[test]
fn transitive_reduction_drops_implied_edges() {
    // Read then write by different ops: 0 -> 1 (RAW), 0 -> 2 (WAW), 1 -> 2 (WAR).
    let plan = PlanFileBuilder::new()
        .transitive_reduction(true)
        .with_op(OpConfigBuilder::new("w").writes("x").build())
        .with_op(OpConfigBuilder::new("r").reads("x").build())
        .with_op(OpConfigBuilder::new("w2").writes("x").build())
        .build();

    let full = build_executor(&plan, false).unwrap();
    assert_eq!(full.graph().edge_count(), 3);

    let reduced = build_executor(&plan, plan.config.transitive_reduction).unwrap();
    assert_eq!(reduced.graph().edge_count(), 2);
    assert_eq!(reduced.node_def(2).unwrap().in_edges, vec![1]);
    assert!(reduced.graph().is_reachable(0, 2));
}

#[test]
fn invalid_plans_are_rejected() {
    let cases = [
        ("[config]\nworkers = 1\n", "at least one [[op]]"),
        (
            "[[op]]\nname = \"a\"\nreads = []\n[[op]]\nname = \"a\"\nreads = []\n",
            "duplicate op name",
        ),
        ("[[op]]\nname = \"\"\nreads = []\n", "empty name"),
    ];

    for (contents, expected) in cases {
        match load_and_validate(plan_file(contents).path()) {
            Err(OpGraphError::ConfigError(msg)) => {
                assert!(msg.contains(expected), "{msg} should mention {expected}")
            }
            Err(e) => panic!("expected ConfigError, got {e:?}"),
            Ok(_) => panic!("expected error for {contents:?}"),
        }
    }
}

#[test]
fn malformed_toml_and_missing_file_are_reported() {
    let err = load_and_validate(plan_file("[[op]\nname = 1").path()).unwrap_err();
    assert!(matches!(err, OpGraphError::TomlError(_)), "{err:?}");

    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join(default_config_path())).unwrap_err();
    assert!(matches!(err, OpGraphError::IoError(_)), "{err:?}");
}

#[test]
fn cli_run_executes_plan_several_times() {
    init_tracing();

    let file = plan_file(DIAMOND);
    let path = file.path().to_str().unwrap();

    let args = CliArgs::parse_from(["opgraph", "--config", path, "--runs", "3"]);
    run(args).unwrap();

    let args = CliArgs::parse_from(["opgraph", "--config", path, "--inline"]);
    run(args).unwrap();

    let args = CliArgs::parse_from(["opgraph", "--config", path, "--dry-run"]);
    run(args).unwrap();
}

#[test]
fn cli_run_reports_failure() {
    init_tracing();

    let file = plan_file(
        r#"
[[op]]
name = "only"
writes = ["x"]
fail = true
"#,
    );
    let path = file.path().to_str().unwrap();

    let args = CliArgs::parse_from(["opgraph", "--config", path, "--workers", "0"]);
    let err = run(args).unwrap_err();
    let err = err.downcast::<OpGraphError>().unwrap();
    assert_eq!(err.failed_node(), Some(0));
}

#[test]
fn bundled_demo_plan_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("plans/diamond.toml");
    let plan = load_and_validate(&path).unwrap();
    let executor = build_executor(&plan, plan.config.transitive_reduction).unwrap();

    assert_eq!(executor.source(), &[0, 4]);
    assert_eq!(executor.sink(), &[3, 4]);
    assert_eq!(executor.node_def(3).unwrap().in_edges, vec![1, 2]);
}
