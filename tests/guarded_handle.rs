//! Cancel/register races on the guarded handle and single resolution of
//! pending results.

use cancel_bridge::sync::{GuardedHandle, Job, Registration, pending_result};
use cancel_bridge::test_utils::{RecordingJob, init_test_logging};
use futures_lite::future::block_on;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;

fn init_test(name: &str) {
    init_test_logging();
    cancel_bridge::test_phase!(name);
}

#[test]
fn racing_cancel_and_register_always_cancels_job_once() {
    init_test("racing_cancel_and_register_always_cancels_job_once");
    for round in 0..2_000 {
        let handle = Arc::new(GuardedHandle::new());
        let job = RecordingJob::new();
        let cancels = job.counter();
        let job: Arc<dyn Job> = Arc::new(job);
        let barrier = Arc::new(Barrier::new(2));

        let canceller = {
            let handle = Arc::clone(&handle);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                handle.request_cancel()
            })
        };
        barrier.wait();
        let registration = handle.register(&job);
        let first_cancel = canceller.join().expect("canceller");

        assert!(first_cancel, "round {round}: first cancel request");
        assert_ne!(registration, Registration::Duplicate);
        let count = cancels.load(Ordering::SeqCst);
        assert_eq!(count, 1, "round {round}: job cancelled exactly once");
    }
    cancel_bridge::test_complete!("racing_cancel_and_register_always_cancels_job_once");
}

#[test]
fn many_cancellers_cancel_job_once() {
    init_test("many_cancellers_cancel_job_once");
    let handle = Arc::new(GuardedHandle::new());
    let job = RecordingJob::new();
    let cancels = job.counter();
    let job: Arc<dyn Job> = Arc::new(job);
    assert_eq!(handle.register(&job), Registration::Armed);

    let winners: usize = (0..8)
        .map(|_| {
            let handle = Arc::clone(&handle);
            thread::spawn(move || handle.request_cancel())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|t| usize::from(t.join().expect("canceller")))
        .sum();

    cancel_bridge::assert_with_log!(winners == 1, "one winning request", 1, winners);
    assert_eq!(cancels.load(Ordering::SeqCst), 1);
    cancel_bridge::test_complete!("many_cancellers_cancel_job_once");
}

#[test]
fn pending_result_resolves_once_across_threads() {
    init_test("pending_result_resolves_once_across_threads");
    let (resolver, pending) = pending_result::<usize>();
    let barrier = Arc::new(Barrier::new(4));
    let attempts: Vec<_> = (0..4)
        .map(|i| {
            let resolver = resolver.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                resolver.resolve(i).is_ok()
            })
        })
        .collect();
    drop(resolver);

    let accepted = attempts
        .into_iter()
        .map(|t| t.join().expect("resolver thread"))
        .filter(|ok| *ok)
        .count();
    let value = block_on(pending).expect("resolved");

    cancel_bridge::assert_with_log!(accepted == 1, "single accepted resolution", 1, accepted);
    assert!(value < 4);
    cancel_bridge::test_complete!("pending_result_resolves_once_across_threads");
}

#[test]
fn later_resolutions_are_handed_back() {
    init_test("later_resolutions_are_handed_back");
    let (resolver, pending) = pending_result::<&'static str>();
    assert_eq!(resolver.resolve("first"), Ok(()));
    assert_eq!(resolver.resolve("second"), Err("second"));
    assert!(resolver.is_resolved());
    assert_eq!(block_on(pending), Ok("first"));
    cancel_bridge::test_complete!("later_resolutions_are_handed_back");
}

#[test]
fn dropping_every_resolver_abandons_the_result() {
    init_test("dropping_every_resolver_abandons_the_result");
    let (resolver, pending) = pending_result::<u8>();
    let other = resolver.clone();
    drop(resolver);
    let waiter = thread::spawn(move || block_on(pending));
    drop(other);
    let out = waiter.join().expect("waiter");
    assert!(out.is_err());
    cancel_bridge::test_complete!("dropping_every_resolver_abandons_the_result");
}
