//! Frame scheduler and deferred operation tests.

use harbor_core::{
    clock::FrameDelta,
    error::TaskError,
    task::{CancelSource, CancelToken, Completion, FrameScheduler, TaskStatus, Timebase},
};
use std::cell::Cell;
use std::rc::Rc;

const FRAME: FrameDelta = FrameDelta::uniform(0.25);

#[test]
fn operations_join_on_the_next_tick() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();

    let promise = spawner.next_frame(&CancelToken::none());
    assert_eq!(scheduler.pending_count(), 1);
    assert_eq!(scheduler.live_count(), 0);
    assert!(promise.is_pending());

    let report = scheduler.tick(FRAME);
    assert_eq!(report.merged, 1);
    assert_eq!(report.finished, 1);
    assert_eq!(promise.status(), TaskStatus::Resolved);
    assert_eq!(scheduler.live_count(), 0);
}

#[test]
fn delay_counts_scaled_time() {
    let mut scheduler = FrameScheduler::new();
    let promise = scheduler.spawner().delay(1.0, Timebase::Scaled, &CancelToken::none());

    for _ in 0..3 {
        scheduler.tick(FRAME);
        assert!(promise.is_pending());
    }
    scheduler.tick(FRAME);
    assert_eq!(promise.try_take(), Some(Completion::Resolved(())));
}

#[test]
fn paused_frames_only_advance_unscaled_delays() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();
    let scaled = spawner.delay(0.5, Timebase::Scaled, &CancelToken::none());
    let unscaled = spawner.delay(0.5, Timebase::Unscaled, &CancelToken::none());

    let paused = FrameDelta::new(0.0, 0.25);
    scheduler.tick(paused);
    scheduler.tick(paused);

    assert!(scaled.is_pending());
    assert_eq!(unscaled.status(), TaskStatus::Resolved);
}

#[test]
fn non_positive_delay_completes_without_scheduling() {
    let scheduler = FrameScheduler::new();
    let promise = scheduler.spawner().delay(0.0, Timebase::Scaled, &CancelToken::none());
    assert_eq!(promise.status(), TaskStatus::Resolved);
    assert_eq!(scheduler.pending_count(), 0);
}

#[test]
fn delay_frames_has_a_minimum_of_one() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();
    let zero = spawner.delay_frames(0, &CancelToken::none());
    let three = spawner.delay_frames(3, &CancelToken::none());

    scheduler.tick(FRAME);
    assert_eq!(zero.status(), TaskStatus::Resolved);
    assert!(three.is_pending());
    scheduler.tick(FRAME);
    scheduler.tick(FRAME);
    assert_eq!(three.status(), TaskStatus::Resolved);
}

#[test]
fn wait_until_and_wait_while_follow_the_predicate() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();
    let flag = Rc::new(Cell::new(false));

    let f = Rc::clone(&flag);
    let until = spawner.wait_until(move || f.get(), &CancelToken::none());
    let f = Rc::clone(&flag);
    let while_false = spawner.wait_while(move || !f.get(), &CancelToken::none());

    scheduler.tick(FRAME);
    assert!(until.is_pending());
    assert!(while_false.is_pending());

    flag.set(true);
    scheduler.tick(FRAME);
    assert_eq!(until.status(), TaskStatus::Resolved);
    assert_eq!(while_false.status(), TaskStatus::Resolved);
}

#[test]
fn cancelled_wait_completes_as_cancelled_on_next_tick() {
    let mut scheduler = FrameScheduler::new();
    let source = CancelSource::new();
    let calls = Rc::new(Cell::new(0));

    let c = Rc::clone(&calls);
    let promise = scheduler.spawner().wait_until(
        move || {
            c.set(c.get() + 1);
            false
        },
        &source.token(),
    );

    scheduler.tick(FRAME);
    assert_eq!(calls.get(), 1);

    source.cancel();
    let report = scheduler.tick(FRAME);
    assert_eq!(report.cancelled, 1);
    assert_eq!(calls.get(), 1, "predicate must not run after cancellation");
    assert_eq!(promise.try_take(), Some(Completion::Cancelled));
    assert_eq!(scheduler.live_count(), 0);
}

#[test]
fn cancelled_before_first_tick_never_steps() {
    let mut scheduler = FrameScheduler::new();
    let source = CancelSource::new();
    let ran = Rc::new(Cell::new(false));

    let r = Rc::clone(&ran);
    let promise = scheduler.spawner().wait_until(
        move || {
            r.set(true);
            true
        },
        &source.token(),
    );
    source.cancel();
    scheduler.tick(FRAME);

    assert!(!ran.get());
    assert_eq!(promise.status(), TaskStatus::Cancelled);
}

#[test]
fn predicate_errors_and_panics_fail_the_promise() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();

    let failing = spawner.try_wait_until(|| Err("navmesh missing".to_string()), &CancelToken::none());
    let panicking = spawner.wait_until(|| panic!("boom"), &CancelToken::none());
    let healthy = spawner.next_frame(&CancelToken::none());

    scheduler.tick(FRAME);

    assert_eq!(
        failing.try_take(),
        Some(Completion::Failed(TaskError::PredicateFailed("navmesh missing".into())))
    );
    assert_eq!(
        panicking.try_take(),
        Some(Completion::Failed(TaskError::PredicatePanicked("boom".into())))
    );
    assert_eq!(healthy.status(), TaskStatus::Resolved);
}

#[test]
fn operations_scheduled_during_a_tick_run_next_tick() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();
    let inner = Rc::new(Cell::new(None));

    let s = spawner.clone();
    let slot = Rc::clone(&inner);
    let _outer = spawner.wait_until(
        move || {
            slot.set(Some(s.next_frame(&CancelToken::none())));
            true
        },
        &CancelToken::none(),
    );

    let report = scheduler.tick(FRAME);
    assert_eq!(report.finished, 1);
    assert_eq!(scheduler.pending_count(), 1);

    let inner = inner.take().expect("scheduled from predicate");
    assert!(inner.is_pending());
    scheduler.tick(FRAME);
    assert_eq!(inner.status(), TaskStatus::Resolved);
}

#[test]
fn worker_result_arrives_on_a_later_tick() {
    let mut scheduler = FrameScheduler::new();
    let promise = scheduler.spawner().run_on_worker(|| (1..=10u64).sum::<u64>());

    for _ in 0..1000 {
        scheduler.tick(FRAME);
        if promise.is_finished() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    assert_eq!(promise.try_take(), Some(Completion::Resolved(55)));
}

#[test]
fn worker_panic_fails_the_promise() {
    let mut scheduler = FrameScheduler::new();
    let promise = scheduler.spawner().run_on_worker(|| -> u32 { panic!("worker blew up") });

    for _ in 0..1000 {
        scheduler.tick(FRAME);
        if promise.is_finished() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    assert_eq!(promise.try_take(), Some(Completion::Failed(TaskError::WorkerPanicked)));
}

#[test]
fn when_all_collects_values_in_input_order() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();
    let slow = spawner.delay(0.5, Timebase::Scaled, &CancelToken::none());
    let fast = spawner.next_frame(&CancelToken::none());

    let all = spawner.when_all(vec![slow, fast]);
    scheduler.tick(FRAME);
    assert!(all.is_pending());
    scheduler.tick(FRAME);
    scheduler.tick(FRAME);
    assert_eq!(all.try_take(), Some(Completion::Resolved(vec![(), ()])));
}

#[test]
fn when_all_propagates_cancellation() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();
    let source = CancelSource::new();
    let doomed = spawner.delay(10.0, Timebase::Scaled, &source.token());
    let fine = spawner.next_frame(&CancelToken::none());

    let all = spawner.when_all(vec![doomed, fine]);
    source.cancel();
    scheduler.tick(FRAME);
    scheduler.tick(FRAME);
    assert_eq!(all.status(), TaskStatus::Cancelled);
}

#[test]
fn when_any_reports_first_finisher() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();
    let slow = spawner.delay(5.0, Timebase::Scaled, &CancelToken::none());
    let fast = spawner.delay(0.25, Timebase::Scaled, &CancelToken::none());

    let any = spawner.when_any(&[slow, fast]);
    scheduler.tick(FRAME);
    scheduler.tick(FRAME);
    assert_eq!(any.try_take(), Some(Completion::Resolved(1)));
}

#[test]
fn timeout_fails_a_promise_that_never_finishes() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();
    let never = spawner.wait_until(|| false, &CancelToken::none());

    let guarded = spawner.with_timeout(never, 1.0);
    for _ in 0..5 {
        scheduler.tick(FRAME);
    }
    assert_eq!(
        guarded.try_take(),
        Some(Completion::Failed(TaskError::Timeout { seconds: 1.0 }))
    );
}

#[test]
fn timeout_passes_through_an_early_result() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();
    let quick = spawner.next_frame(&CancelToken::none());

    let guarded = spawner.with_timeout(quick, 10.0);
    scheduler.tick(FRAME);
    scheduler.tick(FRAME);
    assert_eq!(guarded.try_take(), Some(Completion::Resolved(())));
}

#[test]
fn cancel_all_drains_live_and_pending() {
    let mut scheduler = FrameScheduler::new();
    let spawner = scheduler.spawner();
    let live = spawner.delay(10.0, Timebase::Scaled, &CancelToken::none());
    scheduler.tick(FRAME);
    let pending = spawner.next_frame(&CancelToken::none());

    scheduler.cancel_all();
    assert_eq!(live.status(), TaskStatus::Cancelled);
    assert_eq!(pending.status(), TaskStatus::Cancelled);
    assert_eq!(scheduler.live_count() + scheduler.pending_count(), 0);
}
