//! Start/stop ordering, failure propagation and concurrent shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use keystone_core::{
    BoxError, ComponentRepository, Descriptor, Lifecycle, Managed, Release, RepositoryError,
    Status, StopOutcome,
};
use rstest::rstest;

type Journal = Arc<Mutex<Vec<String>>>;

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().expect("journal").clone()
}

struct Service {
    name: &'static str,
    journal: Journal,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: bool,
    fail_stop: bool,
}

impl Service {
    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: Arc::clone(journal),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            fail_start: false,
            fail_stop: false,
        }
    }

    fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Lifecycle for Service {
    fn start(&self) -> Result<(), BoxError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().expect("journal").push(format!("start {}", self.name));
        if self.fail_start {
            return Err(format!("{} cannot connect", self.name).into());
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.journal.lock().expect("journal").push(format!("stop {}", self.name));
        if self.fail_stop {
            return Err(format!("{} already broken", self.name).into());
        }
        Ok(())
    }

    fn label(&self) -> String {
        self.name.to_owned()
    }
}

struct Cache {
    journal: Journal,
}

impl Release for Cache {
    fn release(&self) -> Result<(), BoxError> {
        self.journal.lock().expect("journal").push("release cache".into());
        Ok(())
    }
}

fn register_all(repo: &ComponentRepository, services: &[Arc<Service>]) {
    for service in services {
        repo.register_infrastructure(service.name, Managed::new(service.clone()).with_lifecycle())
            .expect("register");
    }
}

// ---------------------------------------------------------------------------
// 1. Ordering
// ---------------------------------------------------------------------------

#[test]
fn start_and_stop_follow_registration_order() {
    let log = journal();
    let repo = ComponentRepository::new();
    let l1 = Arc::new(Service::new("L1", &log));
    let l2 = Arc::new(Service::new("L2", &log));

    repo.register_component(
        Descriptor::new::<Service>("L1"),
        Managed::new(l1.clone()).with_lifecycle(),
    )
    .expect("L1");
    repo.register_infrastructure("", Managed::new(Arc::new(Cache { journal: log.clone() })).with_release())
        .expect("cache");
    repo.register_lifecycle(l2.clone()).expect("L2");
    let hook_log = log.clone();
    repo.register_stop_hook("pool", move || {
        hook_log.lock().expect("journal").push("close pool".into());
        Ok(())
    })
    .expect("hook");

    repo.start().expect("start");
    assert!(repo.is_running());
    let outcome = repo.stop();
    assert!(outcome.ran());

    assert_eq!(
        entries(&log),
        vec!["start L1", "start L2", "stop L1", "release cache", "stop L2", "close pool"]
    );
    assert_eq!(repo.status(), Status::Stopped);
}

// ---------------------------------------------------------------------------
// 2. Startup failure
// ---------------------------------------------------------------------------

#[test]
fn start_aborts_at_first_failure_without_unwinding() {
    let log = journal();
    let repo = ComponentRepository::new();
    let l1 = Arc::new(Service::new("L1", &log));
    let l2 = Arc::new(Service::new("L2", &log).failing_start());
    let l3 = Arc::new(Service::new("L3", &log));
    register_all(&repo, &[l1.clone(), l2.clone(), l3.clone()]);

    let err = repo.start().unwrap_err();
    match &err {
        RepositoryError::StartupFailure { entry, position, source } => {
            assert_eq!(entry, "L2");
            assert_eq!(*position, 1);
            assert!(source.to_string().contains("cannot connect"));
        }
        other => panic!("expected StartupFailure, got {other}"),
    }

    assert_eq!(l1.starts(), 1);
    assert_eq!(l2.starts(), 1);
    assert_eq!(l3.starts(), 0);
    assert_eq!(l1.stops(), 0, "already-started entries are not stopped");
    assert_eq!(repo.status(), Status::Failed);
}

#[test]
fn failed_start_cannot_be_retried() {
    let log = journal();
    let repo = ComponentRepository::new();
    register_all(&repo, &[Arc::new(Service::new("L1", &log).failing_start())]);
    repo.start().unwrap_err();

    assert!(matches!(
        repo.start(),
        Err(RepositoryError::InvalidState { actual: Status::Failed, .. })
    ));
    assert!(matches!(repo.stop(), StopOutcome::Skipped { status: Status::Failed }));
    assert_eq!(entries(&log), vec!["start L1"]);
}

// ---------------------------------------------------------------------------
// 3. Shutdown
// ---------------------------------------------------------------------------

#[test]
fn stop_failure_does_not_abort_sequence() {
    let log = journal();
    let repo = ComponentRepository::new();
    let l1 = Arc::new(Service::new("L1", &log));
    let l2 = Arc::new(Service::new("L2", &log).failing_stop());
    let l3 = Arc::new(Service::new("L3", &log));
    register_all(&repo, &[l1.clone(), l2.clone(), l3.clone()]);
    repo.start().expect("start");

    let outcome = repo.stop();
    match &outcome {
        StopOutcome::Stopped { attempted, failures } => {
            assert_eq!(*attempted, 3);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].entry, "L2");
        }
        other => panic!("expected Stopped, got {other:?}"),
    }
    assert_eq!((l1.stops(), l2.stops(), l3.stops()), (1, 1, 1));
    assert_eq!(repo.status(), Status::Stopped);
}

#[test]
fn repeated_stop_is_a_no_op() {
    let log = journal();
    let repo = ComponentRepository::new();
    let l1 = Arc::new(Service::new("L1", &log));
    register_all(&repo, &[l1.clone()]);
    repo.start().expect("start");

    assert!(repo.stop().ran());
    for _ in 0..3 {
        assert!(matches!(repo.stop(), StopOutcome::Skipped { status: Status::Stopped }));
    }
    assert_eq!(l1.stops(), 1);
}

#[rstest]
#[case(2)]
#[case(8)]
#[case(32)]
fn concurrent_stop_runs_each_entry_once(#[case] callers: usize) {
    let log = journal();
    let repo = Arc::new(ComponentRepository::new());
    let services: Vec<_> = ["L1", "L2", "L3"]
        .into_iter()
        .map(|name| Arc::new(Service::new(name, &log)))
        .collect();
    register_all(&repo, &services);
    repo.start().expect("start");

    let barrier = Arc::new(Barrier::new(callers));
    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let repo = Arc::clone(&repo);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                repo.stop().ran()
            })
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().expect("join"))
        .filter(|ran| *ran)
        .count();

    assert_eq!(winners, 1);
    for service in &services {
        assert_eq!(service.stops(), 1, "{} stopped more than once", service.name);
    }
    assert_eq!(repo.status(), Status::Stopped);
}

/// Blocks inside `start` until the test lets it continue.
struct Gate {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl Lifecycle for Gate {
    fn start(&self) -> Result<(), BoxError> {
        self.entered.lock().expect("gate").send(())?;
        self.release.lock().expect("gate").recv()?;
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

#[test]
fn stop_during_start_skips_remaining_entries() {
    let log = journal();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let repo = Arc::new(ComponentRepository::new());
    repo.register_lifecycle(Arc::new(Gate {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    }))
    .expect("gate");
    let late = Arc::new(Service::new("L2", &log));
    register_all(&repo, &[late.clone()]);

    let starter = {
        let repo = Arc::clone(&repo);
        thread::spawn(move || repo.start())
    };
    entered_rx.recv().expect("gate entered");
    assert_eq!(repo.status(), Status::Starting);

    assert!(repo.stop().ran());
    assert_eq!(repo.status(), Status::Stopped);
    release_tx.send(()).expect("release gate");

    let err = starter.join().expect("join").unwrap_err();
    assert!(
        matches!(
            err,
            RepositoryError::InvalidState {
                expected: Status::Starting,
                actual: Status::Stopped
            }
        ),
        "got: {err}"
    );
    assert_eq!(late.starts(), 0, "entry started after shutdown");
    assert_eq!(late.stops(), 1);
    assert_eq!(repo.status(), Status::Stopped);
}

#[test]
fn stop_without_start_still_releases() {
    let log = journal();
    let repo = ComponentRepository::new();
    repo.register_infrastructure("", Managed::new(Arc::new(Cache { journal: log.clone() })).with_release())
        .expect("cache");
    assert!(repo.stop().ran());
    assert_eq!(entries(&log), vec!["release cache"]);
    assert!(repo.start().is_err());
}

#[test]
fn concurrent_lookups_during_run() {
    let repo = Arc::new(ComponentRepository::new());
    for n in 0..64 {
        repo.register_infrastructure(format!("c{n}"), Managed::new(Arc::new(n as u64)))
            .expect("register");
    }
    repo.start().expect("start");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                (0..64u64).all(|n| {
                    repo.lookup::<u64>(&format!("c{n}"))
                        .map(|v| *v == n)
                        .unwrap_or(false)
                })
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().expect("join"));
    }
}
