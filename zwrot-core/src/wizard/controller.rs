use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{DEFAULT_HELPER_TIMEOUT_SECONDS, DEFAULT_POLL_INTERVAL_SECONDS};
use crate::error::HelperError;
use crate::helper::{ArtifactSet, HelperApi, LaunchOutcome, MergeOutcome, TriggerOutcome};
use crate::loader::Reload;
use crate::wizard::history::History;
use crate::wizard::state_machine::{
    RefreshAction, RefreshEvent, RefreshState, RefreshStateMachine, Transition,
};
use crate::wizard::step::WizardStep;

/// Tunables of the wizard controller.
#[derive(Debug, Clone)]
pub struct WizardSettings {
    /// Interval between refresh-job status polls
    pub poll_interval: Duration,

    /// Longest wait for a single helper answer
    pub request_timeout: Duration,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS),
            request_timeout: Duration::from_secs(DEFAULT_HELPER_TIMEOUT_SECONDS),
        }
    }
}

/// Feedback status of the portal launch button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStatus {
    Idle,
    Loading,
    Started,
    AlreadyRunning,
    Error,
}

/// Feedback status of a one-shot helper task (merge, clean-up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Idle,
    Loading,
    Done,
    Error,
}

impl TaskStatus {
    /// Running or already finished tasks are not started again.
    fn accepts_start(&self) -> bool {
        matches!(self, TaskStatus::Idle | TaskStatus::Error)
    }
}

/// Public view of the refresh job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshJobView {
    pub state: RefreshState,
    pub run_id: Option<Uuid>,
    pub message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub polls: u32,
}

/// Public view of the merge task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeView {
    pub status: TaskStatus,
    pub outcome: Option<MergeOutcome>,
}

/// Public view of the clean-up tasks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupView {
    pub drive_files: TaskStatus,
    pub desktop_folder: TaskStatus,
}

/// Everything the front-end needs to render the wizard chrome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardView {
    pub step: WizardStep,
    pub refresh: RefreshJobView,
    pub external_action: LaunchStatus,
    pub merge: MergeView,
    pub cleanup: CleanupView,
}

#[derive(Debug)]
struct RefreshJob {
    state: RefreshState,
    run_id: Option<Uuid>,
    message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    last_polled_at: Option<DateTime<Utc>>,
    polls: u32,
}

impl RefreshJob {
    fn new() -> Self {
        Self {
            state: RefreshStateMachine::initial_state(),
            run_id: None,
            message: None,
            started_at: None,
            last_polled_at: None,
            polls: 0,
        }
    }

    fn view(&self) -> RefreshJobView {
        RefreshJobView {
            state: self.state,
            run_id: self.run_id,
            message: self.message.clone(),
            started_at: self.started_at,
            last_polled_at: self.last_polled_at,
            polls: self.polls,
        }
    }

    /// Runs one transition and returns the action to execute.
    fn apply(&mut self, event: RefreshEvent) -> RefreshAction {
        let (next_state, action) = RefreshStateMachine::transition(self.state, event);
        if next_state != self.state {
            info!(
                run_id = ?self.run_id,
                "Refresh job: {} -> {} (action: {})",
                self.state,
                next_state,
                action
            );
        }
        self.state = next_state;
        action
    }
}

/// State shared with the background tasks.
struct Shared {
    step: RwLock<WizardStep>,
    refresh: Mutex<RefreshJob>,
    launch: Mutex<LaunchStatus>,
    merge: Mutex<MergeView>,
    cleanup: Mutex<CleanupView>,
    disposed: AtomicBool,
}

/// Owner of the wizard's current step and the refresh job.
///
/// Keeps the step in sync with the navigable history in both
/// directions and runs the refresh poll loop. Background tasks are
/// aborted by [`WizardController::dispose`] or when the controller is
/// dropped.
///
/// Helper calls run in spawned tasks, so a caller that stops waiting
/// (e.g. a disconnected HTTP client) never leaves a status in
/// `Triggered` or `Loading`.
///
/// Must be created inside a Tokio runtime.
pub struct WizardController {
    shared: Arc<Shared>,
    history: Arc<dyn History>,
    helper: Arc<dyn HelperApi>,
    reloader: Arc<dyn Reload>,
    settings: WizardSettings,
    listener: StdMutex<Option<JoinHandle<()>>>,
    poller: StdMutex<Option<JoinHandle<()>>>,
}

impl WizardController {
    /// Creates a new wizard controller.
    ///
    /// The initial step is derived from the history's current token
    /// (unknown or missing tokens start at `Home`). Installs the single
    /// history listener for this controller.
    ///
    /// # Arguments
    ///
    /// * `history` - Navigable history holding the step token
    /// * `helper` - Helper process client
    /// * `reloader` - Reloads invoice data after a successful refresh
    /// * `settings` - Poll interval and other tunables
    pub fn new(
        history: Arc<dyn History>,
        helper: Arc<dyn HelperApi>,
        reloader: Arc<dyn Reload>,
        settings: WizardSettings,
    ) -> Self {
        let initial = WizardStep::from_token(history.current_token().as_deref());
        info!("Wizard starting at step {}", initial);

        let shared = Arc::new(Shared {
            step: RwLock::new(initial),
            refresh: Mutex::new(RefreshJob::new()),
            launch: Mutex::new(LaunchStatus::Idle),
            merge: Mutex::new(MergeView {
                status: TaskStatus::Idle,
                outcome: None,
            }),
            cleanup: Mutex::new(CleanupView {
                drive_files: TaskStatus::Idle,
                desktop_folder: TaskStatus::Idle,
            }),
            disposed: AtomicBool::new(false),
        });

        // Subscribe before spawning so no change between now and the
        // task's first poll is lost.
        let changes = history.subscribe();
        let listener = tokio::spawn(follow_history(shared.clone(), history.clone(), changes));

        Self {
            shared,
            history,
            helper,
            reloader,
            settings,
            listener: StdMutex::new(Some(listener)),
            poller: StdMutex::new(None),
        }
    }

    /// Returns the current step.
    pub async fn current_step(&self) -> WizardStep {
        *self.shared.step.read().await
    }

    /// Moves to `to` and records it in the history.
    ///
    /// No ordering checks are made; any step is reachable from any step.
    pub async fn navigate(&self, to: WizardStep) -> WizardStep {
        if self.is_disposed() {
            warn!("Navigation to {} ignored: wizard disposed", to);
            return self.current_step().await;
        }

        let mut step = self.shared.step.write().await;
        *step = to;
        self.history.push(to.token());
        debug!("Navigated to {}", to);
        to
    }

    /// Moves to the following step.
    pub async fn next(&self) -> WizardStep {
        let current = self.current_step().await;
        self.navigate(current.next()).await
    }

    /// Moves to the preceding step.
    pub async fn previous(&self) -> WizardStep {
        let current = self.current_step().await;
        self.navigate(current.previous()).await
    }

    /// Starts a data refresh run on the helper and begins polling it.
    ///
    /// Ignored while a trigger is in flight or a poll loop is running.
    /// A refused, failed or timed-out trigger ends in `Failed` without
    /// polling. The run continues if the caller stops waiting.
    ///
    /// # Returns
    ///
    /// Returns the refresh job view after the trigger was handled.
    pub async fn trigger_refresh(&self) -> RefreshJobView {
        if self.is_disposed() {
            warn!("Refresh ignored: wizard disposed");
            return self.refresh_view().await;
        }

        let handled = {
            let mut job = self.shared.refresh.lock().await;
            if job.apply(RefreshEvent::TriggerRequested) != RefreshAction::SendTrigger {
                info!(run_id = ?job.run_id, "Refresh already in progress ({})", job.state);
                return job.view();
            }
            let run_id = Uuid::new_v4();
            job.run_id = Some(run_id);
            job.message = None;
            job.started_at = Some(Utc::now());
            job.last_polled_at = None;
            job.polls = 0;

            let run = RefreshRun {
                shared: self.shared.clone(),
                helper: self.helper.clone(),
                reloader: self.reloader.clone(),
                poll_interval: self.settings.poll_interval,
                request_timeout: self.settings.request_timeout,
                run_id,
            };
            let (handled_tx, handled_rx) = oneshot::channel();
            let handle = tokio::spawn(run.execute(handled_tx));
            if let Some(previous) = lock(&self.poller).replace(handle) {
                previous.abort();
            }
            handled_rx
        };

        match handled.await {
            Ok(view) => view,
            // The run was aborted by dispose before the helper answered
            Err(_) => self.refresh_view().await,
        }
    }

    /// Returns the refresh job view.
    pub async fn refresh_view(&self) -> RefreshJobView {
        self.shared.refresh.lock().await.view()
    }

    /// Asks the helper to open the insurer portal automation.
    ///
    /// Only updates the feedback status; step and refresh job are not
    /// affected. Ignored while a previous launch request is in flight.
    pub async fn launch_external_action(&self) -> LaunchStatus {
        {
            let mut status = self.shared.launch.lock().await;
            if *status == LaunchStatus::Loading || self.is_disposed() {
                return *status;
            }
            *status = LaunchStatus::Loading;
        }

        let shared = self.shared.clone();
        let helper = self.helper.clone();
        let limit = self.settings.request_timeout;
        let task = tokio::spawn(async move {
            let next = match bounded(limit, helper.launch_external_action()).await {
                Ok(LaunchOutcome::AlreadyRunning) => LaunchStatus::AlreadyRunning,
                Ok(LaunchOutcome::Started) => LaunchStatus::Started,
                Ok(LaunchOutcome::Other(message)) => {
                    debug!("Portal launch answered: {}", message);
                    LaunchStatus::Started
                }
                Err(e) => {
                    warn!("Portal launch failed: {}", e);
                    LaunchStatus::Error
                }
            };
            *shared.launch.lock().await = next;
            next
        });

        match task.await {
            Ok(next) => next,
            Err(e) => {
                error!("Portal launch task failed: {}", e);
                *self.shared.launch.lock().await = LaunchStatus::Error;
                LaunchStatus::Error
            }
        }
    }

    /// Merges the invoice PDFs via the helper.
    ///
    /// Ignored while a merge is running or after it succeeded.
    pub async fn merge_documents(&self) -> MergeView {
        {
            let mut merge = self.shared.merge.lock().await;
            if !merge.status.accepts_start() || self.is_disposed() {
                return merge.clone();
            }
            merge.status = TaskStatus::Loading;
        }

        let shared = self.shared.clone();
        let helper = self.helper.clone();
        let limit = self.settings.request_timeout;
        let task = tokio::spawn(async move {
            let (status, outcome) = match bounded(limit, helper.merge_documents()).await {
                Ok(outcome) if outcome.ok => {
                    info!(
                        "Merged {:?} file(s) into {:?}",
                        outcome.files, outcome.path
                    );
                    (TaskStatus::Done, Some(outcome))
                }
                Ok(outcome) => {
                    warn!("Merge refused: {:?}", outcome.message);
                    (TaskStatus::Error, Some(outcome))
                }
                Err(e) => {
                    warn!("Merge failed: {}", e);
                    (TaskStatus::Error, None)
                }
            };

            let mut merge = shared.merge.lock().await;
            merge.status = status;
            merge.outcome = outcome;
            merge.clone()
        });

        match task.await {
            Ok(view) => view,
            Err(e) => {
                error!("Merge task failed: {}", e);
                let mut merge = self.shared.merge.lock().await;
                merge.status = TaskStatus::Error;
                merge.clone()
            }
        }
    }

    /// Deletes one set of source files via the helper.
    ///
    /// Ignored while that set's deletion is running or after it
    /// succeeded.
    pub async fn delete_artifacts(&self, set: ArtifactSet) -> TaskStatus {
        {
            let mut cleanup = self.shared.cleanup.lock().await;
            let status = cleanup_slot(&mut cleanup, set);
            if !status.accepts_start() || self.is_disposed() {
                return *status;
            }
            *status = TaskStatus::Loading;
        }

        let shared = self.shared.clone();
        let helper = self.helper.clone();
        let limit = self.settings.request_timeout;
        let task = tokio::spawn(async move {
            let next = match bounded(limit, helper.delete_artifacts(set)).await {
                Ok(outcome) if outcome.ok => {
                    info!("Deleted {} item(s) from {}", outcome.deleted, set);
                    TaskStatus::Done
                }
                Ok(outcome) => {
                    warn!("Deleting {} refused: {:?}", set, outcome.message);
                    TaskStatus::Error
                }
                Err(e) => {
                    warn!("Deleting {} failed: {}", set, e);
                    TaskStatus::Error
                }
            };
            *cleanup_slot(&mut *shared.cleanup.lock().await, set) = next;
            next
        });

        match task.await {
            Ok(next) => next,
            Err(e) => {
                error!("Deleting {} task failed: {}", set, e);
                *cleanup_slot(&mut *self.shared.cleanup.lock().await, set) = TaskStatus::Error;
                TaskStatus::Error
            }
        }
    }

    /// Returns a snapshot of all wizard state.
    pub async fn view(&self) -> WizardView {
        WizardView {
            step: self.current_step().await,
            refresh: self.refresh_view().await,
            external_action: *self.shared.launch.lock().await,
            merge: self.shared.merge.lock().await.clone(),
            cleanup: self.shared.cleanup.lock().await.clone(),
        }
    }

    /// Stops the history listener and any running poll loop.
    ///
    /// Idempotent. Later operations are ignored.
    pub async fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.abort_tasks();

        let mut job = self.shared.refresh.lock().await;
        if job.state.is_busy() {
            info!(run_id = ?job.run_id, "Cancelling refresh run ({})", job.state);
        }
        job.apply(RefreshEvent::Disposed);
        info!("Wizard disposed");
    }

    /// Whether [`WizardController::dispose`] ran or the controller is being dropped.
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    fn abort_tasks(&self) {
        for slot in [&self.listener, &self.poller] {
            if let Some(handle) = lock(slot).take() {
                handle.abort();
            }
        }
    }
}

impl Drop for WizardController {
    fn drop(&mut self) {
        self.shared.disposed.store(true, Ordering::SeqCst);
        self.abort_tasks();
    }
}

fn lock<T>(slot: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn cleanup_slot(cleanup: &mut CleanupView, set: ArtifactSet) -> &mut TaskStatus {
    match set {
        ArtifactSet::DriveFiles => &mut cleanup.drive_files,
        ArtifactSet::DesktopFolder => &mut cleanup.desktop_folder,
    }
}

/// Waits for a helper call, giving up after `limit`.
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, HelperError>
where
    F: Future<Output = Result<T, HelperError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(HelperError::Timeout(limit)))
}

/// Re-derives the current step whenever the history moves on its own.
///
/// The notification payload is not used: the step is taken from the
/// history's current position, read while holding the step lock that
/// `navigate` also holds while pushing.
async fn follow_history(
    shared: Arc<Shared>,
    history: Arc<dyn History>,
    mut changes: broadcast::Receiver<Option<String>>,
) {
    loop {
        match changes.recv().await {
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!("History listener skipped {} change(s)", skipped);
            }
            Err(RecvError::Closed) => break,
        }

        let mut step = shared.step.write().await;
        *step = WizardStep::from_token(history.current_token().as_deref());
        debug!("History moved to {}", *step);
    }
}

/// One refresh run: the trigger round-trip followed by the poll loop.
///
/// Runs in its own task, owned by the controller's poller slot.
struct RefreshRun {
    shared: Arc<Shared>,
    helper: Arc<dyn HelperApi>,
    reloader: Arc<dyn Reload>,
    poll_interval: Duration,
    request_timeout: Duration,
    run_id: Uuid,
}

impl RefreshRun {
    /// Sends the trigger, reports the resulting view through `handled`
    /// and polls if the helper accepted.
    async fn execute(self, handled: oneshot::Sender<RefreshJobView>) {
        let run_id = self.run_id;

        let event = match bounded(self.request_timeout, self.helper.trigger_refresh()).await {
            Ok(TriggerOutcome::Triggered) => RefreshEvent::TriggerAccepted,
            Ok(TriggerOutcome::Rejected(message)) => {
                warn!(%run_id, "Refresh trigger rejected: {}", message);
                self.shared.refresh.lock().await.message = Some(message);
                RefreshEvent::TriggerRejected
            }
            Err(e) => {
                error!(%run_id, "Refresh trigger failed: {}", e);
                self.shared.refresh.lock().await.message = Some(e.to_string());
                RefreshEvent::TriggerRejected
            }
        };

        let action = {
            let mut job = self.shared.refresh.lock().await;
            let event = if self.shared.disposed.load(Ordering::SeqCst) {
                RefreshEvent::Disposed
            } else {
                event
            };
            let action = job.apply(event);
            // Nobody may be waiting any more.
            let _ = handled.send(job.view());
            action
        };

        if action == RefreshAction::ArmPoller {
            self.poll_until_complete().await;
        }
    }

    /// Polls the helper until the refresh run completes.
    ///
    /// The first poll happens one interval after the trigger. Polls run
    /// one at a time; a slow response delays the next tick instead of
    /// overlapping it.
    async fn poll_until_complete(&self) {
        let run_id = self.run_id;
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(%run_id, "Polling refresh status every {:?}", self.poll_interval);

        loop {
            ticker.tick().await;

            let event = match bounded(self.request_timeout, self.helper.workflow_status()).await {
                Ok(status) => RefreshEvent::StatusReceived(status),
                Err(e) => {
                    debug!(%run_id, "Status poll failed, retrying next tick: {}", e);
                    RefreshEvent::PollFailed
                }
            };

            let action = {
                let mut job = self.shared.refresh.lock().await;
                job.polls += 1;
                job.last_polled_at = Some(Utc::now());
                job.apply(event)
            };

            match action {
                RefreshAction::KeepPolling => continue,
                RefreshAction::StopAndReload => {
                    self.reloader.reload().await;
                    self.shared.refresh.lock().await.apply(RefreshEvent::ReloadFinished);
                    break;
                }
                _ => break,
            }
        }

        info!(%run_id, "Stopped polling refresh status");
    }
}
