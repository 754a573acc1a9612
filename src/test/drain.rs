use crate::engine::ExitCause;
use crate::run::{DrainPolicy, LifeError, RunContext, RunState, instantiate};

use super::support::{FakeEngine, Op, SimStep, root_only_graph, test_ctx, unique_temp_dir};

#[test]
fn drain_of_a_quiescent_graph_settles_without_simulating() {
    let engine = FakeEngine::with_drain_counts(&[0]);
    let log = engine.log.clone();
    let mut running =
        instantiate(root_only_graph(), engine, test_ctx("drain-idempotent")).expect("instantiate");

    let passes = running.do_drain().expect("drain");
    assert_eq!(passes, 1);
    assert_eq!(running.state(), RunState::Drained);
    assert_eq!(log.count(|op| matches!(op, Op::Simulate(_))), 0);
    // The barrier is still created and torn down for the pass.
    assert_eq!(log.count(|op| matches!(op, Op::CreateBarrier(_))), 1);
    assert_eq!(log.count(|op| matches!(op, Op::CleanupBarrier(_))), 1);
}

#[test]
fn monotonic_graph_needs_one_simulating_pass_plus_a_clean_check() {
    let engine = FakeEngine::with_drain_counts(&[2, 0]);
    let log = engine.log.clone();
    let mut running =
        instantiate(root_only_graph(), engine, test_ctx("drain-monotonic")).expect("instantiate");

    let passes = running.do_drain().expect("drain");
    assert_eq!(passes, 2);
    assert_eq!(log.count(|op| matches!(op, Op::Simulate(_))), 1);
    let ops = log.snapshot();
    assert!(ops.contains(&Op::SetBarrierCount(0, 2)));
    assert!(ops.contains(&Op::StartDrain {
        target: 0,
        recursive: true,
    }));
}

#[test]
fn drain_loops_while_quiescence_regresses_between_passes() {
    // Pass 1 leaves two components unready, pass 2 one (a previously
    // quiescent component went busy again), pass 3 settles cleanly.
    let engine = FakeEngine::with_drain_counts(&[2, 1, 0]);
    let log = engine.log.clone();
    let mut running = instantiate(root_only_graph(), engine, test_ctx("drain-nonmonotonic"))
        .expect("instantiate");

    let passes = running.do_drain().expect("drain");
    assert_eq!(passes, 3);
    assert_eq!(log.count(|op| matches!(op, Op::Simulate(_))), 2);
    assert_eq!(log.count(|op| matches!(op, Op::CreateBarrier(_))), 3);
    assert_eq!(log.count(|op| matches!(op, Op::CleanupBarrier(_))), 3);
    assert_eq!(running.state(), RunState::Drained);
}

#[test]
fn drain_that_never_settles_is_reported_as_stalled() {
    let mut engine = FakeEngine::new();
    engine.default_drain_count = 1;
    let ctx = RunContext::new(unique_temp_dir("drain-stall")).with_drain_policy(DrainPolicy {
        max_passes: 3,
        ..DrainPolicy::default()
    });
    let mut running = instantiate(root_only_graph(), engine, ctx).expect("instantiate");

    let err = running.do_drain().expect_err("must stall");
    assert!(matches!(err, LifeError::DrainStalled { passes: 3 }));
    assert_eq!(running.state(), RunState::Running);
}

#[test]
fn drain_gives_up_when_the_deadline_expires() {
    let mut engine = FakeEngine::with_drain_counts(&[3]);
    engine.sim_script =
        [SimStep::Partial(0), SimStep::Partial(0), SimStep::Partial(0)].into();
    let log = engine.log.clone();
    let ctx = RunContext::new(unique_temp_dir("drain-deadline")).with_drain_policy(DrainPolicy {
        deadline_ticks: Some(100),
        slice_ticks: 40,
        ..DrainPolicy::default()
    });
    let mut running = instantiate(root_only_graph(), engine, ctx).expect("instantiate");

    let err = running.do_drain().expect_err("must hit deadline");
    assert!(matches!(
        err,
        LifeError::DrainDeadline {
            deadline: 100,
            remaining: 3,
        }
    ));
    // Two full slices and one clipped to the deadline.
    assert_eq!(
        log.snapshot()
            .iter()
            .filter_map(|op| match op {
                Op::Simulate(budget) => *budget,
                _ => None,
            })
            .collect::<Vec<_>>(),
        vec![40, 40, 20]
    );
    // The failed pass still tears its barrier down.
    assert_eq!(log.count(|op| matches!(op, Op::CleanupBarrier(_))), 1);
}

#[test]
fn cancelled_token_aborts_the_wait_before_simulating() {
    let engine = FakeEngine::with_drain_counts(&[2]);
    let log = engine.log.clone();
    let ctx = RunContext::new(unique_temp_dir("drain-cancel"));
    let token = ctx.cancel_token();
    let mut running = instantiate(root_only_graph(), engine, ctx).expect("instantiate");

    token.cancel();
    let err = running.do_drain().expect_err("must cancel");
    assert!(matches!(err, LifeError::DrainCancelled { tick: 0 }));
    assert_eq!(log.count(|op| matches!(op, Op::Simulate(_))), 0);
}

#[test]
fn unrelated_engine_exit_leaves_the_drain_incomplete() {
    let mut engine = FakeEngine::with_drain_counts(&[2]);
    engine.sim_script = [SimStep::Exit(ExitCause::Other("user interrupt".to_string()))].into();
    let mut running = instantiate(root_only_graph(), engine, test_ctx("drain-interrupted"))
        .expect("instantiate");

    let err = running.do_drain().expect_err("must be interrupted");
    assert!(matches!(
        err,
        LifeError::DrainInterrupted {
            cause: ExitCause::Other(_),
            ..
        }
    ));
    assert_eq!(running.state(), RunState::Running);
}

#[test]
fn resume_transitions_back_to_running_through_the_root() {
    let engine = FakeEngine::with_drain_counts(&[0]);
    let log = engine.log.clone();
    let mut running =
        instantiate(root_only_graph(), engine, test_ctx("drain-resume")).expect("instantiate");

    running.do_drain().expect("drain");
    running.resume().expect("resume");
    assert_eq!(running.state(), RunState::Running);
    assert!(log.snapshot().contains(&Op::Resume {
        target: 0,
        recursive: true,
    }));
}
