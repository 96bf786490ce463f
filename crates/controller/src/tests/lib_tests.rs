use super::*;
use engine::spawn_engine_worker;
use remote::{forward_calls, MessagePort};
use serde_json::json;
use shared::{error::ErrorCode, state::VIEWER_ROUTE};
use std::{path::PathBuf, time::Duration};
use tokio::{sync::mpsc, time::timeout};

const WAIT: Duration = Duration::from_secs(5);

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

/// Serves a recording frontend and returns the parked port for it plus its update feed.
fn frontend_port(ports: &PortRegistry) -> (PortId, mpsc::UnboundedReceiver<State>) {
    let (updates, rx) = mpsc::unbounded_channel();
    let (caller, callee) = MessagePort::pair();
    forward_calls(
        callee,
        Arc::new(RecordingFrontend {
            updates,
            ports: ports.clone(),
            trace_dir: std::env::temp_dir().join("controller-lib-tests"),
        }),
    );
    (ports.transfer(caller), rx)
}

fn attached_controller() -> (Controller, mpsc::UnboundedReceiver<State>) {
    let ports = PortRegistry::default();
    let controller = Controller::new(ports.clone());
    let (port_id, rx) = frontend_port(&ports);
    controller.init(port_id).expect("init");
    (controller, rx)
}

async fn next_update(rx: &mut mpsc::UnboundedReceiver<State>) -> State {
    timeout(WAIT, rx.recv())
        .await
        .expect("timely update")
        .expect("frontend alive")
}

#[tokio::test]
async fn dispatch_before_init_fails_fast() {
    let controller = Controller::new(PortRegistry::default());
    let err = controller
        .dispatch(Action::Navigate { route: "/".into() })
        .expect_err("uninitialized");
    assert!(matches!(err, ControllerError::NotInitialized));
    assert_eq!(*controller.state(), create_empty_state());
    assert!(!controller.is_initialized());
}

#[tokio::test]
async fn blob_loading_before_init_fails_fast() {
    let controller = Controller::new(PortRegistry::default());
    let err = controller
        .load_trace_from_blob("trace.db".into(), vec![1, 2, 3])
        .expect_err("uninitialized");
    assert!(matches!(err, ControllerError::NotInitialized));
    assert!(controller.state().engines.is_empty());
}

#[tokio::test]
async fn init_attaches_exactly_once() {
    let ports = PortRegistry::default();
    let controller = Controller::new(ports.clone());
    let (first, _rx) = frontend_port(&ports);
    let state = controller.init(first).expect("init");
    assert_eq!(state, create_empty_state());
    assert!(controller.is_initialized());

    let (second, _rx2) = frontend_port(&ports);
    assert!(matches!(
        controller.init(second),
        Err(ControllerError::AlreadyInitialized)
    ));
}

#[tokio::test]
async fn init_with_unclaimed_port_fails() {
    let controller = Controller::new(PortRegistry::default());
    let err = controller.init(PortId::new()).expect_err("no such port");
    assert!(matches!(err, ControllerError::Transport(_)));
    assert!(!controller.is_initialized());
}

#[tokio::test]
async fn pushes_reach_frontend_in_dispatch_order() {
    let (controller, mut rx) = attached_controller();
    for route in ["/a", "/b", "/c"] {
        controller
            .dispatch(Action::Navigate {
                route: route.into(),
            })
            .expect("dispatch");
    }

    let mut routes = Vec::new();
    for _ in 0..3 {
        routes.push(next_update(&mut rx).await.route);
    }
    assert_eq!(
        routes,
        vec![
            Some("/a".to_string()),
            Some("/b".to_string()),
            Some("/c".to_string())
        ]
    );
    assert_eq!(controller.state().route.as_deref(), Some("/c"));
}

#[tokio::test]
async fn pushed_state_matches_canonical_state() {
    let (controller, mut rx) = attached_controller();
    controller
        .dispatch(Action::OpenTrace {
            url: "https://example.com/bar".into(),
        })
        .expect("dispatch");
    let pushed = next_update(&mut rx).await;
    assert_eq!(pushed, *controller.state());
    assert_eq!(pushed.route.as_deref(), Some(VIEWER_ROUTE));
    assert_eq!(pushed.next_id, 1);
}

#[tokio::test]
async fn globals_observe_each_reduction() {
    let (controller, _rx) = attached_controller();
    let globals = controller.globals();
    let mut watch = globals.watch();

    controller
        .dispatch(Action::SelectSlice { ts: 99 })
        .expect("dispatch");
    timeout(WAIT, watch.changed())
        .await
        .expect("timely")
        .expect("changed");
    assert_eq!(globals.state().selected_slice.map(|s| s.ts), Some(99));
}

#[tokio::test]
async fn unknown_engine_lookup_is_an_error() {
    let (controller, _rx) = attached_controller();
    assert!(matches!(
        controller.engine(EngineId(4)),
        Err(ControllerError::UnknownEngine(EngineId(4)))
    ));
    assert!(controller.engines().is_empty());
}

#[tokio::test]
async fn rpc_surface_routes_frontend_calls() {
    let ports = PortRegistry::default();
    let controller = Controller::new(ports.clone());
    let (caller, callee) = MessagePort::pair();
    forward_calls(callee, Arc::new(controller.clone()));
    let remote = Remote::new(caller);

    let err = remote
        .send::<Value>(
            methods::DISPATCH,
            vec![json!({"type": "NAVIGATE", "payload": {"route": "/x"}})],
        )
        .await
        .expect_err("not initialized");
    assert_eq!(
        err.remote_error().map(|e| e.code),
        Some(ErrorCode::NotInitialized)
    );

    let (port_id, mut rx) = frontend_port(&ports);
    let initial: State = remote
        .send(methods::INIT, vec![json!(port_id)])
        .await
        .expect("init");
    assert_eq!(initial, create_empty_state());

    remote
        .send::<()>(
            methods::DISPATCH,
            vec![json!({"type": "NAVIGATE", "payload": {"route": "/x"}})],
        )
        .await
        .expect("dispatch");
    assert_eq!(next_update(&mut rx).await.route.as_deref(), Some("/x"));

    let err = remote
        .send::<()>(methods::DISPATCH, vec![json!({"type": "TELEPORT"})])
        .await
        .expect_err("unknown action kind");
    assert_eq!(
        err.remote_error().map(|e| e.code),
        Some(ErrorCode::InvalidArguments)
    );
    assert_eq!(controller.state().route.as_deref(), Some("/x"));
}
