//! Lifecycle runner on real threads.

use cancel_bridge::runtime::spawn;
use cancel_bridge::test_utils::init_test_logging;
use cancel_bridge::{
    BridgeConfig, CancelKind, Cx, Error, FileTransport, Priority, RunnerState, Session, TaskRunner,
    ThreadSpawner,
};
use futures_lite::future::block_on;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn init_test(name: &str) {
    init_test_logging();
    cancel_bridge::test_phase!(name);
}

type Log = Arc<Mutex<Vec<CancelKind>>>;

fn waiting_runner(
    log: &Log,
) -> TaskRunner<ThreadSpawner, impl Fn(Cx) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>> {
    let log = Arc::clone(log);
    TaskRunner::new(ThreadSpawner::new("lifecycle-test"), move |cx: Cx| {
        let log = Arc::clone(&log);
        Box::pin(async move {
            let reason = cx.cancelled().await;
            log.lock().push(reason.kind);
        }) as std::pin::Pin<Box<dyn Future<Output = ()> + Send>>
    })
}

#[test]
fn unmount_twice_cancels_once() {
    init_test("unmount_twice_cancels_once");
    let log: Log = Arc::default();
    let runner = waiting_runner(&log);

    let handle = runner.on_mount().expect("spawn").expect("started");
    assert_eq!(runner.state(), RunnerState::Running);
    assert!(runner.on_unmount());
    assert!(!runner.on_unmount());
    block_on(handle.join()).expect("task completes");

    let seen = log.lock().clone();
    cancel_bridge::assert_with_log!(
        seen == vec![CancelKind::Unmounted],
        "single unmount cancellation",
        vec![CancelKind::Unmounted],
        seen
    );
    assert_eq!(runner.state(), RunnerState::Cancelled);
    cancel_bridge::test_complete!("unmount_twice_cancels_once");
}

#[test]
fn remount_starts_a_fresh_task() {
    init_test("remount_starts_a_fresh_task");
    let log: Log = Arc::default();
    let runner = waiting_runner(&log);

    let first = runner.on_mount().expect("spawn").expect("started");
    assert!(runner.on_mount().expect("spawn").is_none(), "already running");
    runner.on_unmount();
    let second = runner.on_mount().expect("spawn").expect("started again");

    assert_ne!(first.task_id(), second.task_id());
    assert!(first.is_cancel_requested());
    assert!(!second.is_cancel_requested());
    assert_eq!(runner.current_task(), Some(second.task_id()));

    block_on(first.join()).expect("first task completes");
    // The stale task finishing must not touch the new task's state.
    assert_eq!(runner.state(), RunnerState::Running);

    drop(runner);
    block_on(second.join()).expect("second task completes");
    assert_eq!(log.lock().len(), 2);
    cancel_bridge::test_complete!("remount_starts_a_fresh_task");
}

#[test]
fn unmount_cancels_in_flight_request() {
    init_test("unmount_cancels_in_flight_request");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("slow.txt");
    std::fs::write(&path, "never delivered").expect("write fixture");
    let url = format!("file://{}", path.display());

    let outcome: Arc<Mutex<Option<Result<usize, Error>>>> = Arc::default();
    let session = Session::new(FileTransport::new().with_latency(Duration::from_secs(10)));
    let runner = {
        let outcome = Arc::clone(&outcome);
        TaskRunner::new(ThreadSpawner::default(), move |cx: Cx| {
            let outcome = Arc::clone(&outcome);
            let fetch = session.data(&cx, &url);
            async move {
                let result = fetch.await.map(|(body, _)| body.len());
                *outcome.lock() = Some(result);
            }
        })
    };

    let handle = runner.on_mount().expect("spawn").expect("started");
    std::thread::sleep(Duration::from_millis(50));
    runner.on_unmount();
    block_on(handle.join()).expect("task completes");

    let result = outcome.lock().take().expect("task recorded an outcome");
    let err = result.unwrap_err();
    cancel_bridge::assert_with_log!(
        err.cancel_reason().map(|r| r.kind) == Some(CancelKind::Unmounted),
        "cancelled by unmount",
        CancelKind::Unmounted,
        err
    );
    cancel_bridge::test_complete!("unmount_cancels_in_flight_request");
}

#[test]
fn spawned_task_runs_at_requested_priority() {
    init_test("spawned_task_runs_at_requested_priority");
    let config = BridgeConfig::default().with_thread_name_prefix("prio");
    let spawner = ThreadSpawner::from_config(&config);
    let seen: Arc<Mutex<Option<(Priority, Option<String>)>>> = Arc::default();
    let handle = {
        let seen = Arc::clone(&seen);
        spawn(&spawner, Priority::Background, move |cx| async move {
            let name = std::thread::current().name().map(str::to_string);
            *seen.lock() = Some((cx.priority(), name));
        })
        .expect("spawn")
    };
    let id = handle.task_id();
    block_on(handle.join()).expect("join");

    let (priority, name) = seen.lock().take().expect("task ran");
    assert_eq!(priority, Priority::Background);
    let name = name.expect("named thread");
    assert!(name.starts_with("prio-"), "{name}");
    assert!(name.ends_with(&id.to_string()), "{name}");
    cancel_bridge::test_complete!("spawned_task_runs_at_requested_priority");
}
