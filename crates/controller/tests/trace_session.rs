use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use controller::{Controller, ControllerScheduler, PublishedEvent, SelectionController};
use engine::{spawn_engine_worker, Engine, SqliteEngine};
use remote::{arg, forward_calls, to_value, MessagePort, PortRegistry, RemoteTarget};
use serde_json::Value;
use shared::{
    actions::Action,
    domain::{EngineId, SliceDetails, TimeSpan},
    error::RemoteError,
    protocol::methods,
    state::{State, VIEWER_ROUTE},
};
use tokio::{sync::mpsc, time::timeout};

const WAIT: Duration = Duration::from_secs(10);

struct RecordingFrontend {
    updates: mpsc::UnboundedSender<State>,
    ports: PortRegistry,
    trace_dir: PathBuf,
}

#[async_trait]
impl RemoteTarget for RecordingFrontend {
    async fn handle_call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError> {
        match method {
            methods::UPDATE_STATE => {
                let state: State = arg(&args, 0, method)?;
                let _ = self.updates.send(state);
                Ok(Value::Null)
            }
            methods::CREATE_ENGINE_PORT => {
                let port = spawn_engine_worker(self.trace_dir.clone());
                to_value(&self.ports.transfer(port))
            }
            other => Err(RemoteError::unknown_method(other)),
        }
    }
}

async fn build_trace_file(path: &Path) -> Vec<u8> {
    let database_url = format!("sqlite://{}", path.to_string_lossy().replace('\\', "/"));
    let engine = SqliteEngine::open(&database_url).await.expect("trace db");
    for statement in [
        "CREATE TABLE sched (ts INTEGER, dur INTEGER, cpu INTEGER, utid INTEGER, end_state TEXT, priority INTEGER)",
        "CREATE TABLE slices (ts INTEGER, dur INTEGER, name TEXT)",
        "CREATE TABLE thread (utid INTEGER, upid INTEGER)",
        "INSERT INTO sched VALUES (2000000000, 400, 0, 1, 'S', 120), (6500000000, 900, 3, 2, 'R', 98)",
        "INSERT INTO slices VALUES (1500000000, 10, 'measure'), (4000000000, 20, 'draw')",
        "INSERT INTO thread VALUES (1, 10), (2, 10), (3, 11)",
    ] {
        sqlx::query(statement)
            .execute(engine.pool())
            .await
            .expect("populate");
    }
    engine.close().await;
    std::fs::read(path).expect("trace bytes")
}

struct Session {
    controller: Controller,
    updates: mpsc::UnboundedReceiver<State>,
    _trace_dir: tempfile::TempDir,
}

fn start_session() -> Session {
    let trace_dir = tempfile::tempdir().expect("trace dir");
    let ports = PortRegistry::default();
    let controller = Controller::new(ports.clone());

    let (updates_tx, updates) = mpsc::unbounded_channel();
    let (caller, callee) = MessagePort::pair();
    forward_calls(
        callee,
        Arc::new(RecordingFrontend {
            updates: updates_tx,
            ports: ports.clone(),
            trace_dir: trace_dir.path().to_path_buf(),
        }),
    );
    controller.init(ports.transfer(caller)).expect("init");

    Session {
        controller,
        updates,
        _trace_dir: trace_dir,
    }
}

/// Waits for the first pushed state that satisfies `done`.
async fn wait_for_state(
    updates: &mut mpsc::UnboundedReceiver<State>,
    done: impl Fn(&State) -> bool,
) -> State {
    timeout(WAIT, async {
        loop {
            let state = updates.recv().await.expect("frontend alive");
            if done(&state) {
                return state;
            }
        }
    })
    .await
    .expect("expected state pushed in time")
}

#[tokio::test]
async fn loading_a_blob_brings_up_an_engine_and_trace_bounds() {
    let mut session = start_session();
    let source_dir = tempfile::tempdir().expect("source dir");
    let blob = build_trace_file(&source_dir.path().join("trace.db")).await;

    let engine_id = session
        .controller
        .load_trace_from_blob("trace.db".into(), blob)
        .expect("load accepted");
    assert_eq!(engine_id, EngineId(0));

    let opened = wait_for_state(&mut session.updates, |state| {
        state.engine(engine_id).is_some()
    })
    .await;
    assert_eq!(opened.route.as_deref(), Some(VIEWER_ROUTE));
    assert!(!opened.engines[&engine_id].ready);
    assert_eq!(opened.engines[&engine_id].source.display_name(), "trace.db");

    let loaded = wait_for_state(&mut session.updates, |state| state.trace_time.is_some()).await;
    assert!(loaded.engines[&engine_id].ready);
    assert_eq!(loaded.trace_time, Some(TimeSpan::new(1.5, 6.5)));
    assert_eq!(loaded.visible_window, loaded.trace_time);

    let engine = session.controller.engine(engine_id).expect("registered");
    assert_eq!(engine.get_number_of_cpus().await.expect("cpus"), 2);
    assert_eq!(engine.get_number_of_processes().await.expect("processes"), 2);
}

#[tokio::test]
async fn selecting_a_slice_publishes_its_details() {
    let mut session = start_session();
    let source_dir = tempfile::tempdir().expect("source dir");
    let blob = build_trace_file(&source_dir.path().join("trace.db")).await;

    let engine_id = session
        .controller
        .load_trace_from_blob("trace.db".into(), blob)
        .expect("load accepted");
    wait_for_state(&mut session.updates, |state| {
        state.engine(engine_id).is_some_and(|engine| engine.ready)
    })
    .await;

    let globals = session.controller.globals();
    let mut events = globals.subscribe();
    let mut scheduler = ControllerScheduler::new(&globals);
    scheduler.add(SelectionController::new(
        globals.clone(),
        session.controller.engine(engine_id).expect("registered"),
    ));
    tokio::spawn(scheduler.run());

    session
        .controller
        .dispatch(Action::SelectSlice { ts: 6_500_000_000 })
        .expect("select");

    let event = timeout(WAIT, events.recv())
        .await
        .expect("details in time")
        .expect("event");
    assert_eq!(
        event,
        PublishedEvent::SliceDetails(SliceDetails {
            ts: 6_500_000_000,
            dur: 900,
            priority: 98,
            end_state: "R".into(),
        })
    );
}

#[tokio::test]
async fn a_corrupt_blob_is_reported_as_a_failed_engine() {
    let mut session = start_session();
    let engine_id = session
        .controller
        .load_trace_from_blob("junk.bin".into(), b"definitely not sqlite".to_vec())
        .expect("load accepted");

    let opened = wait_for_state(&mut session.updates, |state| {
        state.engine(engine_id).is_some()
    })
    .await;
    assert!(!opened.engines[&engine_id].ready);
    assert_eq!(opened.engines[&engine_id].load_error, None);

    let failed = wait_for_state(&mut session.updates, |state| {
        state
            .engine(engine_id)
            .is_some_and(|engine| engine.load_error.is_some())
    })
    .await;
    assert!(!failed.engines[&engine_id].ready);
    assert!(failed.trace_time.is_none());
    assert!(session.controller.engine(engine_id).is_err());
    assert!(session.controller.state().ready_engines().next().is_none());
}
