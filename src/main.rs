//! Buzzdeck binary entrypoint: a headless round runner that wires the
//! settings store, the controller client, and the session runtime together,
//! then logs the live ranking until the round finishes or the process is
//! asked to stop.

use std::{env, path::PathBuf, sync::Arc};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use buzzdeck::config::ConfigService;
use buzzdeck::controller::ControllerClient;
use buzzdeck::controller::events::EventChannel;
use buzzdeck::flow;
use buzzdeck::session::SessionPhase;
use buzzdeck::session::audio::TracingAudio;
use buzzdeck::session::runtime;
use buzzdeck::store::{FileBackend, SettingsStore};

/// Controller address used when none was persisted or given in the
/// environment; the device announces itself over mDNS under this name.
const DEFAULT_CONTROLLER_URL: &str = "http://esp32.local";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let data_dir = env::var("BUZZDECK_DATA_DIR").unwrap_or_else(|_| "data".into());
    let capacity = env::var("BUZZDECK_STORE_CAPACITY")
        .ok()
        .and_then(|value| value.parse::<usize>().ok());

    let backend = FileBackend::new(PathBuf::from(&data_dir), capacity)
        .context("opening settings directory")?;
    let store = SettingsStore::new(Arc::new(backend));

    let controller_url = env::var("BUZZDECK_CONTROLLER_URL")
        .ok()
        .or_else(|| store.load_controller_url())
        .unwrap_or_else(|| DEFAULT_CONTROLLER_URL.into());
    store.save_controller_url(&controller_url);

    let config = ConfigService::load(store);
    let controller =
        ControllerClient::new(&controller_url).context("building controller client")?;

    // The one blocking step: an unreachable controller aborts the run before
    // any round starts.
    let snapshot = config.snapshot().await;
    let health = flow::apply_controller_config(&controller, &snapshot)
        .await
        .context("applying configuration to the controller")?;
    info!(ip = %health.ip, url = %controller_url, "controller reachable");

    let handle = runtime::spawn(controller.clone(), config, Arc::new(TracingAudio)).await;
    let channel = EventChannel::open(controller, Arc::new(handle.push_sink()));

    handle.enter_ready();
    handle.start();

    let mut views = handle.views();
    loop {
        tokio::select! {
            _ = shutdown_signal() => {
                info!("shutdown requested");
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow().clone();
                info!(phase = ?view.phase, time_left = view.time_left, "session update");
                if view.phase == SessionPhase::Finished {
                    let podium: Vec<&str> =
                        view.ranking.iter().map(|team| team.name.as_str()).collect();
                    info!(?podium, question = view.question_number, "round finished");
                    break;
                }
            }
        }
    }

    channel.close();
    handle.shutdown();
    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
