// tests/failure_handling.rs

use std::sync::Arc;

use opgraph::dag::DependencyGraph;
use opgraph::engine::Executor;
use opgraph::errors::OpGraphError;
use opgraph::exec::{Dispatcher, Task};
use opgraph_test_utils::recording::{ExecutionLog, RecordingOperation};
use opgraph_test_utils::{init_tracing, pool_dispatcher};

/// Five independent operations; 1 and 3 fail.
fn two_independent_failures() -> Executor<ExecutionLog> {
    Executor::new(vec![
        RecordingOperation::new(0).writes("a").boxed(),
        RecordingOperation::new(1).writes("b").delay_ms(20).failing().boxed(),
        RecordingOperation::new(2).writes("c").boxed(),
        RecordingOperation::new(3).writes("d").failing().boxed(),
        RecordingOperation::new(4).writes("e").boxed(),
    ])
    .unwrap()
}

fn expect_failure(err: OpGraphError) -> (usize, Vec<usize>, usize) {
    match err {
        OpGraphError::OperationFailed {
            node,
            also_failed,
            skipped,
            ..
        } => (node, also_failed, skipped),
        other => panic!("expected OperationFailed, got {other:?}"),
    }
}

#[test]
fn lowest_failing_node_is_reported_inline() {
    init_tracing();

    let executor = two_independent_failures();
    let log = ExecutionLog::new();
    let err = executor.execute(Arc::clone(&log), None).unwrap_err();

    assert_eq!(expect_failure(err), (1, vec![3], 0));
    assert_eq!(log.started_set(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn lowest_failing_node_is_reported_on_pool() {
    init_tracing();

    // Node 3 fails well before node 1; the report must not depend on timing.
    let executor = two_independent_failures();
    let (_rt, pool) = pool_dispatcher(4);
    let log = ExecutionLog::new();
    let err = executor.execute(Arc::clone(&log), Some(pool)).unwrap_err();

    assert_eq!(expect_failure(err), (1, vec![3], 0));
    assert_eq!(log.started_set(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn failure_starves_only_descendants() {
    init_tracing();

    // 0 -> 1 -> 2 chain on "x"; 3 -> 4 chain on "y"; 5 depends on both chains.
    let executor = Executor::new(vec![
        RecordingOperation::new(0).writes("x").failing().boxed(),
        RecordingOperation::new(1).reads("x").writes("x").boxed(),
        RecordingOperation::new(2).reads("x").boxed(),
        RecordingOperation::new(3).writes("y").boxed(),
        RecordingOperation::new(4).reads("y").writes("y").boxed(),
        RecordingOperation::new(5).reads("x").reads("y").boxed(),
    ])
    .unwrap();

    for pool in [None, Some(pool_dispatcher(2))] {
        let log = ExecutionLog::new();
        let dispatcher = pool.as_ref().map(|(_, d)| Arc::clone(d));
        let err = executor.execute(Arc::clone(&log), dispatcher).unwrap_err();

        assert_eq!(expect_failure(err), (0, vec![], 3));
        assert_eq!(log.started_set(), vec![0, 3, 4]);
        log.assert_respects(executor.graph());
    }
}

#[test]
fn shared_descendant_of_two_failures_is_skipped_once() {
    init_tracing();

    let executor = Executor::new(vec![
        RecordingOperation::new(0).writes("x").failing().boxed(),
        RecordingOperation::new(1).writes("y").failing().boxed(),
        RecordingOperation::new(2).reads("x").reads("y").boxed(),
    ])
    .unwrap();

    let (_rt, pool) = pool_dispatcher(2);
    let log = ExecutionLog::new();
    let err = executor.execute(Arc::clone(&log), Some(pool)).unwrap_err();

    assert_eq!(expect_failure(err), (0, vec![1], 1));
    assert_eq!(log.started_set(), vec![0, 1]);
}

#[test]
fn panicking_operation_is_reported_as_failure() {
    init_tracing();

    let executor = Executor::new(vec![
        RecordingOperation::new(0).writes("x").boxed(),
        RecordingOperation::new(1).named("boom").reads("x").panicking().boxed(),
        RecordingOperation::new(2).reads("x").boxed(),
    ])
    .unwrap();

    let (_rt, pool) = pool_dispatcher(2);
    let err = executor
        .execute(ExecutionLog::new(), Some(pool))
        .unwrap_err();

    match err {
        OpGraphError::OperationFailed { node, name, cause, .. } => {
            assert_eq!(node, 1);
            assert_eq!(name, "boom");
            assert!(cause.to_string().contains("panicked"));
        }
        other => panic!("expected OperationFailed, got {other:?}"),
    }
}

#[test]
fn dropped_tasks_fail_their_node_instead_of_hanging() {
    init_tracing();

    let executor = Executor::new(vec![
        RecordingOperation::new(0).writes("a").boxed(),
        RecordingOperation::new(1).writes("b").boxed(),
        RecordingOperation::new(2).writes("c").boxed(),
    ])
    .unwrap();

    let dropping: Arc<dyn Dispatcher> = Arc::new(|task: Task| drop(task));
    let log = ExecutionLog::new();
    let err = executor.execute(Arc::clone(&log), Some(dropping)).unwrap_err();

    match err {
        OpGraphError::OperationFailed {
            node,
            cause,
            also_failed,
            ..
        } => {
            assert_eq!(node, 1);
            assert_eq!(also_failed, vec![2]);
            assert!(cause.to_string().contains("dispatcher dropped"));
        }
        other => panic!("expected OperationFailed, got {other:?}"),
    }
    // The first ready node always runs on the calling thread.
    assert_eq!(log.started(), vec![0]);
}

#[test]
fn missing_buffer_uses_is_a_construction_error() {
    let result = Executor::new(vec![
        RecordingOperation::new(0).writes("x").boxed(),
        RecordingOperation::new(1).named("opaque").unknown_uses().boxed(),
    ]);

    match result {
        Err(OpGraphError::MissingBufferUses { node, name }) => {
            assert_eq!(node, 1);
            assert_eq!(name, "opaque");
        }
        Err(e) => panic!("expected MissingBufferUses, got {e:?}"),
        Ok(_) => panic!("expected error, got Ok"),
    }
}

#[test]
fn explicit_graph_must_match_operation_count() {
    let graph = DependencyGraph::from_node_edges(3, [(0, 1)]).unwrap();
    let result = Executor::from_parts(vec![RecordingOperation::new(0).boxed()], graph);

    assert!(matches!(
        result,
        Err(OpGraphError::GraphMismatch {
            operations: 1,
            nodes: 3
        })
    ));
}

#[test]
fn explicit_graph_drives_execution() {
    init_tracing();

    // Buffers say nothing; the explicit edges order 2 -> 0 -> 1.
    let graph = DependencyGraph::from_node_edges(3, [(2, 0), (0, 1)]).unwrap();
    let executor = Executor::from_parts(
        vec![
            RecordingOperation::new(0).boxed(),
            RecordingOperation::new(1).boxed(),
            RecordingOperation::new(2).boxed(),
        ],
        graph,
    )
    .unwrap();

    let log = ExecutionLog::new();
    executor.execute(Arc::clone(&log), None).unwrap();
    assert_eq!(log.started(), vec![2, 0, 1]);

    let (_rt, pool) = pool_dispatcher(2);
    let log = ExecutionLog::new();
    executor.execute(Arc::clone(&log), Some(pool)).unwrap();
    assert_eq!(log.started(), vec![2, 0, 1]);
}
