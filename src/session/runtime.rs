//! Session driver: one task serializing user intents, countdown ticks,
//! inbound push events, and roster edits, so `phase`, `time_left`, and the
//! press order have a single writer and need no locking.
//!
//! Network side effects are fire-and-forget: the local transition never waits
//! on the controller, and command failures are logged, not surfaced.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::config::{SharedConfig, Team};
use crate::controller::events::PushEvent;
use crate::controller::{ControllerClient, ControllerResult};

use super::audio::{AudioSink, buzz_cue};
use super::display::display_order;
use super::{Intent, Session, SessionPhase};

/// Countdown granularity.
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Read-only snapshot published after every state change.
#[derive(Debug, Clone)]
pub struct SessionView {
    /// Current phase.
    pub phase: SessionPhase,
    /// Seconds left on the countdown.
    pub time_left: u32,
    /// 1-based number of the question on stage.
    pub question_number: u32,
    /// Teams in display order (see [`display_order`]).
    pub ranking: Vec<Team>,
}

enum Command {
    Intent(Intent),
    Shutdown,
}

/// Handle to a spawned session task.
///
/// Cloneable senders fan user intents and push events into the task; views
/// come back through a watch channel. Dropping the handle stops the task.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedSender<PushEvent>,
    views: watch::Receiver<SessionView>,
}

impl SessionHandle {
    /// Leave the idle splash and show the configured stage.
    pub fn enter_ready(&self) {
        self.send(Intent::EnterReady);
    }

    /// Start the countdown for the current question.
    pub fn start(&self) {
        self.send(Intent::Start);
    }

    /// End the running round before the countdown expires.
    pub fn finish_early(&self) {
        self.send(Intent::FinishEarly);
    }

    /// Abandon the session state and return to the first question.
    pub fn reset(&self) {
        self.send(Intent::Reset);
    }

    /// Move from the results to the next question.
    pub fn next_round(&self) {
        self.send(Intent::NextRound);
    }

    /// Sink for inbound push events; hand this to the event channel.
    pub fn push_sink(&self) -> mpsc::UnboundedSender<PushEvent> {
        self.events.clone()
    }

    /// Subscribe to session view snapshots.
    pub fn views(&self) -> watch::Receiver<SessionView> {
        self.views.clone()
    }

    /// Stop the session task.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    fn send(&self, intent: Intent) {
        let _ = self.commands.send(Command::Intent(intent));
    }
}

/// Spawn the session task and return its handle.
pub async fn spawn(
    controller: ControllerClient,
    config: SharedConfig,
    audio: Arc<dyn AudioSink>,
) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let session = Session::new();
    let initial = build_view(&session, &config).await;
    let (view_tx, view_rx) = watch::channel(initial);

    tokio::spawn(run_session(
        session, controller, config, audio, command_rx, event_rx, view_tx,
    ));

    SessionHandle {
        commands: command_tx,
        events: event_tx,
        views: view_rx,
    }
}

async fn run_session(
    mut session: Session,
    controller: ControllerClient,
    config: SharedConfig,
    audio: Arc<dyn AudioSink>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<PushEvent>,
    views: watch::Sender<SessionView>,
) {
    let mut roster = config.roster_watcher();
    let mut ticker = interval(TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut events_open = true;

    loop {
        tokio::select! {
            maybe_command = commands.recv() => match maybe_command {
                Some(Command::Intent(intent)) => {
                    handle_intent(
                        &mut session,
                        intent,
                        &controller,
                        &config,
                        audio.as_ref(),
                        &mut ticker,
                    )
                    .await;
                    publish(&views, &session, &config).await;
                }
                Some(Command::Shutdown) | None => break,
            },
            maybe_event = events.recv(), if events_open => match maybe_event {
                Some(event) => {
                    handle_push(&mut session, event, &config, audio.as_ref()).await;
                    publish(&views, &session, &config).await;
                }
                None => events_open = false,
            },
            _ = ticker.tick(), if session.phase() == SessionPhase::Running => {
                if session.tick() {
                    info!("countdown reached zero; round finished");
                }
                publish(&views, &session, &config).await;
            }
            _ = roster.changed() => {
                if matches!(session.phase(), SessionPhase::Running | SessionPhase::Finished) {
                    let snapshot = config.snapshot().await;
                    warn!("roster edited mid-round; invalidating the round");
                    session.invalidate_round(snapshot.question_timeout_seconds);
                    publish(&views, &session, &config).await;
                }
            }
        }
    }
    debug!("session task stopped");
}

async fn handle_intent(
    session: &mut Session,
    intent: Intent,
    controller: &ControllerClient,
    config: &SharedConfig,
    audio: &dyn AudioSink,
    ticker: &mut Interval,
) {
    // A fresh snapshot at every transition; mid-round config edits only take
    // effect at the next one.
    let snapshot = config.snapshot().await;
    match session.apply(intent, snapshot.question_timeout_seconds) {
        Ok(next) => {
            match intent {
                Intent::Start => {
                    let client = controller.clone();
                    spawn_command("start", async move { client.start().await });
                    if snapshot.buzzer_sound_enabled {
                        audio.arm();
                    }
                    // A full second elapses before the first decrement.
                    ticker.reset();
                }
                Intent::Reset => {
                    let client = controller.clone();
                    spawn_command("reset", async move { client.reset().await });
                    config.set_question_number(1).await;
                }
                Intent::NextRound => {
                    config
                        .set_question_number(snapshot.current_question_number + 1)
                        .await;
                }
                Intent::EnterReady | Intent::FinishEarly => {}
            }
            debug!(?intent, phase = ?next, "applied session intent");
        }
        Err(err) => debug!(%err, "ignored session intent"),
    }
}

async fn handle_push(
    session: &mut Session,
    event: PushEvent,
    config: &SharedConfig,
    audio: &dyn AudioSink,
) {
    match event {
        PushEvent::Buzz(notice) => {
            if session.record_buzz(notice.team_index) {
                let snapshot = config.snapshot().await;
                if let Some(cue) = buzz_cue(&snapshot, notice.team_index) {
                    audio.play(cue);
                }
            }
        }
        PushEvent::Result(notice) => {
            info!(top3 = ?notice.top3, "round result received");
            session.apply_result(&notice.top3);
        }
    }
}

fn spawn_command<F>(command: &'static str, call: F)
where
    F: Future<Output = ControllerResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = call.await {
            warn!(command, error = %err, "controller command failed");
        }
    });
}

async fn publish(views: &watch::Sender<SessionView>, session: &Session, config: &SharedConfig) {
    let _ = views.send(build_view(session, config).await);
}

async fn build_view(session: &Session, config: &SharedConfig) -> SessionView {
    let snapshot = config.snapshot().await;
    let ranking = display_order(session.phase(), session.press_order(), &snapshot.teams)
        .into_iter()
        .cloned()
        .collect();
    SessionView {
        phase: session.phase(),
        time_left: session.time_left(),
        question_number: snapshot.current_question_number,
        ranking,
    }
}
