//! Worker lifecycle against real processes
//!
//! Launches, inspects, and stops actual child processes through the system
//! adapters: detached spawn, pid file plus identity record, SIGTERM with a
//! grace period, SIGKILL escalation, and the command-line fallback.

#![cfg(unix)]

use pixstar_supervisor_core::application::{Launcher, StatusService, Terminator};
use pixstar_supervisor_core::domain::{
    LaunchOutcome, LaunchSpec, StopOutcome, TerminationSignal, WorkerIdentity, WorkerStatus,
};
use pixstar_supervisor_core::port::id_provider::UuidProvider;
use pixstar_supervisor_core::port::time_provider::SystemTimeProvider;
use pixstar_supervisor_core::port::{HandleStore, ProcessControl};
use pixstar_supervisor_infra_system::{DetachedSpawner, FileHandleStore, SystemProcessControl};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

const PID_FILE: &str = "immich-pixstar.pid";

fn launcher(store: Arc<FileHandleStore>) -> Launcher {
    Launcher::new(
        store,
        Arc::new(DetachedSpawner),
        Arc::new(SystemProcessControl::new()),
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
    )
}

fn terminator(store: Arc<FileHandleStore>) -> Terminator {
    Terminator::new(store, Arc::new(SystemProcessControl::new()))
        .with_grace_period(Duration::from_millis(500))
        .with_fallback_pattern("")
}

fn started_pid(outcome: LaunchOutcome) -> u32 {
    match outcome {
        LaunchOutcome::Started(identity) => identity.pid,
        other => panic!("expected a started worker, got {:?}", other),
    }
}

/// Pattern no other process on the machine will carry
fn unique_sleep_arg() -> String {
    let suffix = uuid::Uuid::new_v4().as_u128() % 1_000_000_000;
    format!("299.{:09}", suffix)
}

fn spawn_sleep(arg: &str) -> Child {
    Command::new("sleep")
        .arg(arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("sleep should spawn")
}

/// Wait for a child owned by this test; returns false on timeout
fn reaped_within(child: &mut Child, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if child.try_wait().unwrap().is_some() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

fn wait_for_exit(control: &SystemProcessControl, pid: u32) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if !control.is_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

fn store_in(dir: &Path) -> Arc<FileHandleStore> {
    Arc::new(FileHandleStore::new(dir.join(PID_FILE)))
}

#[tokio::test]
async fn test_start_status_stop_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());

    let spec = LaunchSpec::new("sleep", dir.path()).with_args(["300"]);
    let pid = started_pid(launcher(store.clone()).launch(&spec).unwrap());

    // Pid file holds exactly the decimal pid
    let content = std::fs::read_to_string(dir.path().join(PID_FILE)).unwrap();
    assert_eq!(content, pid.to_string());

    let status = StatusService::new(store.clone(), Arc::new(SystemProcessControl::new()))
        .status()
        .unwrap();
    assert_eq!(status, WorkerStatus::Running { pid, verified: true });

    let outcome = terminator(store.clone()).stop().await.unwrap();
    assert_eq!(outcome, StopOutcome::Stopped { pid });

    assert!(!dir.path().join(PID_FILE).exists());
    assert!(!store.identity_path().exists());
    assert!(wait_for_exit(&SystemProcessControl::new(), pid));

    println!("✅ start → status → stop removes the handle and the worker");
}

#[tokio::test]
async fn test_worker_ignoring_sigterm_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());

    let spec = LaunchSpec::new("sh", dir.path())
        .with_args(["-c", "trap '' TERM; while :; do sleep 1; done"]);
    let pid = started_pid(launcher(store.clone()).launch(&spec).unwrap());

    // Give the shell time to install its trap
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    let outcome = terminator(store.clone()).stop().await.unwrap();

    assert_eq!(outcome, StopOutcome::Killed { pid });
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(!dir.path().join(PID_FILE).exists());
    assert!(wait_for_exit(&SystemProcessControl::new(), pid));
}

#[tokio::test]
async fn test_dead_pid_is_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();

    let mut child = spawn_sleep("0");
    let pid = child.id();
    child.wait().unwrap();

    std::fs::write(dir.path().join(PID_FILE), pid.to_string()).unwrap();

    let outcome = terminator(store_in(dir.path())).stop().await.unwrap();

    assert_eq!(outcome, StopOutcome::AlreadyStopped { pid });
    assert!(!dir.path().join(PID_FILE).exists());
}

#[tokio::test]
async fn test_corrupt_pid_file_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(PID_FILE), "not-a-pid\n").unwrap();

    let outcome = terminator(store_in(dir.path())).stop().await.unwrap();

    assert_eq!(
        outcome,
        StopOutcome::CorruptHandle {
            content: "not-a-pid".to_string()
        }
    );
    assert!(!dir.path().join(PID_FILE).exists());
}

#[tokio::test]
async fn test_recycled_pid_is_not_signaled() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());
    let control = SystemProcessControl::new();

    let mut child = spawn_sleep("300");
    let pid = child.id();
    let actual_start = control
        .inspect(pid)
        .and_then(|info| info.start_time)
        .expect("start time of a live child");

    // Identity recorded for an earlier process that held the same pid
    store
        .write(&WorkerIdentity {
            pid,
            start_time: Some(actual_start.saturating_sub(1_000)),
            session_token: "earlier-session".to_string(),
            launched_at: 0,
            command: vec!["python".to_string(), "main.py".to_string()],
        })
        .unwrap();

    let outcome = terminator(store.clone()).stop().await.unwrap();

    assert!(matches!(outcome, StopOutcome::StaleHandle { pid: p, .. } if p == pid));
    assert!(!dir.path().join(PID_FILE).exists());
    assert!(control.is_alive(pid), "unrelated process must survive");

    child.kill().unwrap();
    child.wait().unwrap();
}

#[tokio::test]
async fn test_process_without_session_token_is_not_signaled() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());

    let mut child = spawn_sleep("300");
    let pid = child.id();

    // Worker died before its start time was captured; the pid was then reused
    store
        .write(&WorkerIdentity {
            pid,
            start_time: None,
            session_token: "worker-session".to_string(),
            launched_at: 0,
            command: vec!["python".to_string(), "main.py".to_string()],
        })
        .unwrap();

    let outcome = terminator(store.clone()).stop().await.unwrap();

    assert!(matches!(outcome, StopOutcome::StaleHandle { pid: p, .. } if p == pid));
    assert!(!dir.path().join(PID_FILE).exists());
    assert_eq!(child.try_wait().unwrap(), None, "unrelated process must survive");

    child.kill().unwrap();
    child.wait().unwrap();
}

#[tokio::test]
async fn test_fallback_terminates_matching_process() {
    let dir = tempfile::tempdir().unwrap();
    let arg = unique_sleep_arg();
    let mut child = spawn_sleep(&arg);
    let pid = child.id();

    // The command line is only visible once the child has exec'd
    tokio::time::sleep(Duration::from_millis(200)).await;

    let outcome = terminator(store_in(dir.path()))
        .with_fallback_pattern(format!("sleep {}", arg))
        .stop()
        .await
        .unwrap();

    assert_eq!(outcome, StopOutcome::FallbackMatched { pids: vec![pid] });
    assert!(reaped_within(&mut child, Duration::from_secs(5)));
}

#[tokio::test]
async fn test_fallback_without_match() {
    let dir = tempfile::tempdir().unwrap();

    let outcome = terminator(store_in(dir.path()))
        .with_fallback_pattern(format!("no-such-worker-{}", uuid::Uuid::new_v4()))
        .stop()
        .await
        .unwrap();

    assert_eq!(outcome, StopOutcome::NothingToStop);
}

#[tokio::test]
async fn test_restart_replaces_handle() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());
    let spec = LaunchSpec::new("sleep", dir.path()).with_args(["300"]);

    let first = started_pid(launcher(store.clone()).launch(&spec).unwrap());
    let second = started_pid(launcher(store.clone()).launch(&spec).unwrap());
    assert_ne!(first, second);

    let content = std::fs::read_to_string(dir.path().join(PID_FILE)).unwrap();
    assert_eq!(content, second.to_string());

    // Single-instance mode refuses while the recorded worker lives
    let outcome = launcher(store.clone())
        .with_single_instance(true)
        .launch(&spec)
        .unwrap();
    assert_eq!(outcome, LaunchOutcome::AlreadyRunning { pid: second });

    assert_eq!(
        terminator(store.clone()).stop().await.unwrap(),
        StopOutcome::Stopped { pid: second }
    );

    // The replaced worker is no longer tracked; clean it up directly
    let control = SystemProcessControl::new();
    control
        .signal(first, TerminationSignal::Forced)
        .unwrap();
    assert!(wait_for_exit(&control, first));
}
