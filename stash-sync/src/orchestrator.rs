//! The sync orchestrator: one background loop that decides when cycles run.
//!
//! # Design
//!
//! All timing policy lives in the pure `ScheduleState` machine; this module
//! only feeds it events and executes the actions it returns. Four event
//! sources funnel into one `select!` loop:
//! - the store's change feed (debounced behind a quiet period)
//! - a fixed interval timer (first tick immediate, so starting the
//!   orchestrator runs an initial cycle)
//! - manual requests via [`Orchestrator::sync_now`]
//! - completion notices from the cycle task it spawned
//!
//! A cycle runs every enabled provider in sequence and folds the reports
//! into one [`SyncStatus`], persisted for the UI. Settings are re-read per
//! provider, so a settings block restored by the built-in provider's pull
//! can enable the gist provider within the same cycle.
//!
//! # Example
//!
//! ```ignore
//! let mut orchestrator = Orchestrator::new(store, providers, OrchestratorConfig::default());
//! orchestrator.start();
//! // ... on user request:
//! orchestrator.sync_now();
//! // ... at shutdown:
//! orchestrator.stop().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

use stash_core::{ScheduleAction, ScheduleEvent, ScheduleState, SyncTrigger};
use stash_store::LocalStore;
use stash_types::{SyncSettings, SyncStatus};

use crate::provider::SyncProvider;

/// Stand-in deadline while no quiet timer is armed. `select!` evaluates
/// the sleep argument even when the branch is disabled, so it must always
/// be a valid instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400);

/// Timing knobs for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Fixed period between timer-triggered cycles. Must be non-zero.
    pub interval: Duration,
    /// How long the change feed must stay quiet before a change-triggered
    /// cycle runs.
    pub quiet_period: Duration,
}

impl OrchestratorConfig {
    /// Timing from the persisted settings, with the documented quiet
    /// period. A zero interval falls back to the default.
    pub fn from_settings(settings: &SyncSettings) -> Self {
        let defaults = Self::default();
        let configured = settings.builtin.sync_period();
        Self {
            interval: if configured.is_zero() {
                defaults.interval
            } else {
                configured
            },
            quiet_period: defaults.quiet_period,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            quiet_period: Duration::from_secs(5),
        }
    }
}

enum Command {
    SyncNow,
    Stop,
}

/// Owns the background scheduling loop.
///
/// Construct, [`start`](Self::start), and keep it around; dropping without
/// [`stop`](Self::stop) aborts scheduling but lets an in-flight cycle
/// finish on the runtime.
pub struct Orchestrator {
    store: Arc<dyn LocalStore>,
    providers: Vec<Arc<dyn SyncProvider>>,
    config: OrchestratorConfig,
    commands: Option<mpsc::Sender<Command>>,
    task: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Build an orchestrator over `providers`, persisting status through
    /// `store`. Provider order is cycle order.
    pub fn new(
        store: Arc<dyn LocalStore>,
        providers: Vec<Arc<dyn SyncProvider>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            providers,
            config,
            commands: None,
            task: None,
        }
    }

    /// Spawn the scheduling loop. The first cycle runs immediately.
    /// Starting an already-running orchestrator is a no-op.
    pub fn start(&mut self) {
        if self.task.is_some() {
            tracing::warn!("sync orchestrator already running");
            return;
        }
        let (tx, rx) = mpsc::channel(8);
        self.commands = Some(tx);
        self.task = Some(tokio::spawn(run_loop(
            Arc::clone(&self.store),
            self.providers.clone(),
            self.config,
            rx,
        )));
        tracing::info!(
            interval = ?self.config.interval,
            quiet_period = ?self.config.quiet_period,
            "sync orchestrator started"
        );
    }

    /// Stop the scheduling loop and wait for it to exit. A cycle already
    /// in flight finishes in the background.
    pub async fn stop(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Stop).await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        tracing::info!("sync orchestrator stopped");
    }

    /// Ask for a cycle as soon as possible. Returns false when the
    /// orchestrator is not running or its queue is full.
    pub fn sync_now(&self) -> bool {
        match &self.commands {
            Some(commands) => commands.try_send(Command::SyncNow).is_ok(),
            None => false,
        }
    }

    /// Whether the scheduling loop is alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Run one cycle right now on the caller's task, bypassing the
    /// scheduling loop. For embedders that sync at their own moments.
    pub async fn run_once(&self) -> SyncStatus {
        run_cycle(self.store.as_ref(), &self.providers, SyncTrigger::Manual).await
    }
}

async fn run_loop(
    store: Arc<dyn LocalStore>,
    providers: Vec<Arc<dyn SyncProvider>>,
    config: OrchestratorConfig,
    mut commands: mpsc::Receiver<Command>,
) {
    let mut changes = store.subscribe();
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Completion notices from spawned cycle tasks. The machine allows one
    // cycle in flight, so capacity 1 never blocks the sender.
    let (done_tx, mut done_rx) = mpsc::channel::<()>(1);

    let mut state = ScheduleState::new();
    let mut quiet_deadline: Option<Instant> = None;
    let mut feed_open = true;

    loop {
        let quiet_at = quiet_deadline.unwrap_or_else(|| Instant::now() + FAR_FUTURE);

        let event = tokio::select! {
            _ = ticker.tick() => ScheduleEvent::IntervalTick,
            _ = sleep_until(quiet_at), if quiet_deadline.is_some() => {
                quiet_deadline = None;
                ScheduleEvent::QuietElapsed
            }
            change = changes.recv(), if feed_open => match change {
                Ok(_) => ScheduleEvent::LocalChange,
                // A lagged feed still means something changed.
                Err(broadcast::error::RecvError::Lagged(_)) => ScheduleEvent::LocalChange,
                Err(broadcast::error::RecvError::Closed) => {
                    feed_open = false;
                    continue;
                }
            },
            Some(()) = done_rx.recv() => ScheduleEvent::CycleFinished,
            command = commands.recv() => match command {
                Some(Command::SyncNow) => ScheduleEvent::ManualRequested,
                Some(Command::Stop) | None => break,
            },
        };

        let (next, actions) = state.clone().on_event(event);
        state = next;

        for action in actions {
            match action {
                ScheduleAction::ArmQuietTimer => {
                    quiet_deadline = Some(Instant::now() + config.quiet_period);
                }
                ScheduleAction::DisarmQuietTimer => {
                    quiet_deadline = None;
                }
                ScheduleAction::BeginCycle(trigger) => {
                    tracing::debug!(?trigger, "beginning sync cycle");
                    let store = Arc::clone(&store);
                    let providers = providers.clone();
                    let done = done_tx.clone();
                    tokio::spawn(async move {
                        run_cycle(store.as_ref(), &providers, trigger).await;
                        let _ = done.send(()).await;
                    });
                }
            }
        }
    }
}

/// Run every enabled provider once and persist the folded status.
///
/// Settings are re-read before each provider: a pull earlier in the cycle
/// may have restored a settings block that enables a later provider.
async fn run_cycle(
    store: &dyn LocalStore,
    providers: &[Arc<dyn SyncProvider>],
    trigger: SyncTrigger,
) -> SyncStatus {
    let mut pull_success = true;
    let mut push_success = true;
    let mut items_synced = 0;
    let mut items_merged = 0;
    let mut attempted = 0;

    for provider in providers {
        let settings = match store.read_settings().await {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(%error, "settings unreadable, using defaults for this cycle");
                SyncSettings::default()
            }
        };
        if !provider.enabled(&settings) {
            tracing::debug!(provider = provider.name(), "provider disabled, skipping");
            continue;
        }

        attempted += 1;
        let report = provider.perform_sync().await;
        pull_success &= report.pull_success();
        push_success &= report.push_success();
        items_synced += report.items_pushed();
        items_merged += report.items_merged();
    }

    tracing::info!(
        ?trigger,
        providers = attempted,
        pull_success,
        push_success,
        items_synced,
        items_merged,
        "sync cycle finished"
    );

    let status = SyncStatus::now(pull_success, push_success, items_synced, items_merged);
    if let Err(error) = store.write_status(&status).await {
        tracing::warn!(%error, "failed to persist sync status");
    }
    status
}
