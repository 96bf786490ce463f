use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use controller::{Controller, ControllerScheduler, PublishedEvent, SelectionController};
use engine::Engine as _;
use remote::{forward_calls, MessagePort, PortRegistry, Remote};
use serde_json::json;
use shared::{actions::Action, domain::EngineId, protocol::methods, state::State};
use tokio::time::timeout;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod frontend;

use frontend::HeadlessFrontend;

#[derive(Parser, Debug)]
#[command(about = "Open a processed trace and print what the viewer would show")]
struct Cli {
    /// SQLite database holding the processed trace tables.
    #[arg(long)]
    trace: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Select the scheduling slice starting at this timestamp (ns) and print its details.
    #[arg(long)]
    select_ts: Option<i64>,
    #[arg(long)]
    route: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::load_settings(cli.config.as_deref());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let trace_dir = config::prepare_trace_dir(&settings.trace_dir)?;
    let ports = PortRegistry::default();

    let controller = Controller::new(ports.clone());
    let (controller_port, controller_side) = MessagePort::pair();
    forward_calls(controller_side, Arc::new(controller.clone()));
    let to_controller = Remote::new(controller_port);

    let (frontend, mut states) = HeadlessFrontend::new(ports.clone(), trace_dir);
    let (frontend_port, frontend_side) = MessagePort::pair();
    forward_calls(frontend_side, Arc::new(frontend));

    let initial: State = to_controller
        .send(methods::INIT, vec![json!(ports.transfer(frontend_port))])
        .await
        .context("failed to initialize controller")?;
    info!(next_id = initial.next_id, "viewer: controller attached");

    let blob = tokio::fs::read(&cli.trace)
        .await
        .with_context(|| format!("failed to read trace '{}'", cli.trace.display()))?;
    let name = cli
        .trace
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".into());
    let engine_id: EngineId = to_controller
        .send(
            methods::LOAD_TRACE_FROM_BLOB,
            vec![json!(name), json!(STANDARD.encode(&blob))],
        )
        .await
        .context("failed to start trace load")?;

    let load_error = timeout(
        settings.load_timeout(),
        states.wait_for(|state| {
            state
                .engine(engine_id)
                .is_some_and(|engine| engine.ready || engine.load_error.is_some())
        }),
    )
    .await
    .with_context(|| format!("trace '{name}' did not load in time"))?
    .map(|state| {
        state
            .engine(engine_id)
            .and_then(|engine| engine.load_error.clone())
    })
    .context("frontend went away before the trace loaded")?;
    if let Some(load_error) = load_error {
        bail!("trace '{name}' failed to load: {load_error}");
    }

    let engine = controller.engine(engine_id)?;
    let bounds = engine.get_trace_time_bounds().await?;
    println!("trace {name} (engine {})", engine_id.0);
    if bounds.is_valid() {
        println!(
            "  time: {:.6}s .. {:.6}s ({:.6}s)",
            bounds.start,
            bounds.end,
            bounds.duration()
        );
    } else {
        println!("  time: no timed events");
    }
    match engine.get_number_of_cpus().await {
        Ok(cpus) => println!("  cpus: {cpus}"),
        Err(error) => warn!(%error, "viewer: cpu count unavailable"),
    }
    match engine.get_number_of_processes().await {
        Ok(processes) => println!("  processes: {processes}"),
        Err(error) => warn!(%error, "viewer: process count unavailable"),
    }

    if let Some(ts) = cli.select_ts {
        let globals = controller.globals();
        let mut events = globals.subscribe();
        let mut scheduler = ControllerScheduler::new(&globals);
        scheduler.add(SelectionController::new(globals.clone(), engine));
        tokio::spawn(scheduler.run());

        to_controller
            .send::<()>(methods::DISPATCH, vec![json!(Action::SelectSlice { ts })])
            .await
            .context("failed to select slice")?;

        match timeout(settings.selection_timeout(), events.recv()).await {
            Ok(Ok(PublishedEvent::SliceDetails(details))) => {
                println!(
                    "  slice @{}: dur={} priority={} end_state={}",
                    details.ts, details.dur, details.priority, details.end_state
                );
            }
            Ok(Err(error)) => bail!("selection results stopped: {error}"),
            Err(_) => println!("  slice @{ts}: no scheduling slice starts here"),
        }
    }

    if let Some(route) = cli.route {
        to_controller
            .send::<()>(methods::DISPATCH, vec![json!(Action::Navigate { route })])
            .await
            .context("failed to navigate")?;
    }

    let state = controller.state();
    println!("  route: {}", state.route.as_deref().unwrap_or("/"));
    Ok(())
}
