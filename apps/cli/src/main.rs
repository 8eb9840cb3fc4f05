use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use clap::Parser;
use client_core::{
    load_settings, load_settings_from, ClientSettings, SubmitOutcome, WorkflowController,
    WorkflowError, WorkflowEvent, WorkflowState,
};
use shared::error::ErrorKind;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod intents;
mod view;

use intents::{parse_line, Intent, HELP};
use view::{render_notification, render_state};

#[derive(Parser, Debug)]
#[command(name = "fortune-card", about = "Peek into your fortune and get a shareable card")]
struct Args {
    /// Settings file; defaults to ./fortune.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    api_base_url: Option<String>,
    #[arg(long)]
    download_dir: Option<PathBuf>,
    /// Run a single pipeline for this handle and exit.
    #[arg(long)]
    handle: Option<String>,
    /// With --handle, also save the hosted card locally.
    #[arg(long, requires = "handle")]
    download: bool,
    /// Print snapshots as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let settings = resolve_settings(&args)?;
    let controller = WorkflowController::from_settings(&settings)?;

    match args.handle.as_deref() {
        Some(handle) => run_once(&controller, handle, args.download, args.json).await,
        None => run_interactive(controller, args.json).await,
    }
}

fn resolve_settings(args: &Args) -> Result<ClientSettings> {
    let mut settings = match &args.config {
        Some(path) => load_settings_from(path)?,
        None => load_settings(),
    };
    if let Some(url) = &args.api_base_url {
        settings.api_base_url = url.clone();
    }
    if let Some(dir) = &args.download_dir {
        settings.download_dir = dir.clone();
    }
    Ok(settings.normalized())
}

fn print_state(state: &WorkflowState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
    } else {
        println!("{}", render_state(state));
    }
    Ok(())
}

/// One-shot mode has no notification printer, so validation is reported with its toast text.
fn submit_error(err: WorkflowError) -> anyhow::Error {
    match err {
        WorkflowError::Validation(_) => anyhow!(ErrorKind::Validation.user_message()),
        other => other.into(),
    }
}

async fn run_once(
    controller: &Arc<WorkflowController>,
    handle: &str,
    download: bool,
    json: bool,
) -> Result<()> {
    let outcome = controller.submit(handle).await.map_err(submit_error)?;

    match outcome {
        SubmitOutcome::Ready(state) => {
            print_state(&state, json)?;
            println!("share: {}", controller.share().await?);
            if download {
                let path = controller.download().await?;
                println!("saved: {}", path.display());
            }
            Ok(())
        }
        SubmitOutcome::Failed(state) => {
            print_state(&state, json)?;
            let message = state
                .last_error
                .map(|kind| kind.user_message())
                .unwrap_or("fortune pipeline failed");
            Err(anyhow!(message))
        }
        SubmitOutcome::Superseded { run } => Err(anyhow!("run {run} was superseded")),
    }
}

fn spawn_event_printer(mut events: broadcast::Receiver<WorkflowEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(WorkflowEvent::Notification(notification)) => {
                    eprintln!("{}", render_notification(&notification));
                }
                Ok(WorkflowEvent::PhaseChanged(state)) => {
                    debug!(run = %state.run, phase = %state.phase, "phase changed");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "event printer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn run_interactive(controller: Arc<WorkflowController>, json: bool) -> Result<()> {
    spawn_event_printer(controller.subscribe());
    println!("Have a peek into your fortune. Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let intent = match parse_line(&line) {
            Ok(Some(intent)) => intent,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        debug!(intent = intent.name(), "dispatching intent");

        match intent {
            Intent::Submit { handle } => {
                // Runs in the background so `reset` stays available mid-flight.
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    match controller.submit(&handle).await {
                        Ok(SubmitOutcome::Ready(state)) | Ok(SubmitOutcome::Failed(state)) => {
                            if let Err(err) = print_state(&state, json) {
                                eprintln!("{err}");
                            }
                        }
                        Ok(SubmitOutcome::Superseded { .. }) => {}
                        Err(WorkflowError::Validation(_)) => {}
                        Err(err) => eprintln!("{err}"),
                    }
                });
            }
            Intent::Download => {
                let controller = Arc::clone(&controller);
                tokio::spawn(async move {
                    match controller.download().await {
                        Ok(path) => println!("saved: {}", path.display()),
                        Err(WorkflowError::Download(_)) | Err(WorkflowError::Superseded) => {}
                        Err(err) => eprintln!("{err}"),
                    }
                });
            }
            Intent::Share => match controller.share().await {
                Ok(intent) => println!("open to share: {intent}"),
                Err(err) => eprintln!("{err}"),
            },
            Intent::Reset => {
                let state = controller.reset().await;
                print_state(&state, json)?;
            }
            Intent::State => print_state(&controller.snapshot().await, json)?,
            Intent::Help => println!("{HELP}"),
            Intent::Quit => break,
        }
    }

    Ok(())
}
