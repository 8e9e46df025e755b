use serde::{Deserialize, Serialize};
use std::fmt;

use crate::helper::{Conclusion, JobStatus};

/// Refresh job state enumeration.
///
/// The state machine progresses through these states:
/// - Idle: nothing has been requested yet
/// - Triggered: the trigger request is in flight
/// - Polling: the helper accepted the trigger; status is polled
/// - Succeeded: the run finished and the data was reloaded (terminal)
/// - Failed: the trigger was refused or the run failed (terminal)
///
/// Terminal states accept a new trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    Idle,
    Triggered,
    Polling,
    Succeeded,
    Failed,
}

impl RefreshState {
    /// Whether a trigger or poll sequence is in progress.
    pub fn is_busy(&self) -> bool {
        matches!(self, RefreshState::Triggered | RefreshState::Polling)
    }
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshState::Idle => write!(f, "idle"),
            RefreshState::Triggered => write!(f, "triggered"),
            RefreshState::Polling => write!(f, "polling"),
            RefreshState::Succeeded => write!(f, "succeeded"),
            RefreshState::Failed => write!(f, "failed"),
        }
    }
}

/// Event fed into the refresh state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshEvent {
    /// User asked for a refresh
    TriggerRequested,

    /// Helper started the refresh run
    TriggerAccepted,

    /// Helper refused to start the run, or could not be reached
    TriggerRejected,

    /// A status poll answered
    StatusReceived(JobStatus),

    /// A status poll could not reach the helper
    PollFailed,

    /// Data reload after a successful run finished
    ReloadFinished,

    /// The controller is being torn down
    Disposed,
}

/// Action to take after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshAction {
    /// Send the trigger request
    SendTrigger,

    /// Start the status poll loop
    ArmPoller,

    /// Wait for the next poll tick
    KeepPolling,

    /// Stop polling and reload the invoice data
    StopAndReload,

    /// Stop polling
    StopPolling,

    /// No action required
    NoAction,
}

impl fmt::Display for RefreshAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshAction::SendTrigger => write!(f, "send_trigger"),
            RefreshAction::ArmPoller => write!(f, "arm_poller"),
            RefreshAction::KeepPolling => write!(f, "keep_polling"),
            RefreshAction::StopAndReload => write!(f, "stop_and_reload"),
            RefreshAction::StopPolling => write!(f, "stop_polling"),
            RefreshAction::NoAction => write!(f, "no_action"),
        }
    }
}

/// Trait for state transitions in the refresh job state machine.
pub trait Transition {
    /// Determines the next state and action for an event.
    ///
    /// # Arguments
    ///
    /// * `current_state` - The current refresh state
    /// * `event` - What just happened
    ///
    /// # Returns
    ///
    /// Returns a tuple of (next_state, action_to_take).
    fn transition(current_state: RefreshState, event: RefreshEvent) -> (RefreshState, RefreshAction);

    /// Gets the initial state of a new controller.
    fn initial_state() -> RefreshState {
        RefreshState::Idle
    }
}

/// Default implementation of the refresh job transitions.
///
/// - Idle/Succeeded/Failed -> Triggered on a trigger request
/// - Triggered/Polling ignore further trigger requests
/// - Triggered -> Polling when the helper accepts, -> Failed otherwise
/// - Polling stays put on pending status or a failed poll
/// - Polling -> Succeeded after a successful run and data reload
/// - Polling -> Failed after an unsuccessful run
/// - Any busy state -> Idle on disposal
pub struct RefreshStateMachine;

impl Transition for RefreshStateMachine {
    fn transition(current_state: RefreshState, event: RefreshEvent) -> (RefreshState, RefreshAction) {
        use RefreshAction::*;
        use RefreshEvent::*;
        use RefreshState::*;

        match (current_state, event) {
            (Idle | Succeeded | Failed, TriggerRequested) => (Triggered, SendTrigger),
            (Triggered | Polling, TriggerRequested) => (current_state, NoAction),

            (Triggered, TriggerAccepted) => (Polling, ArmPoller),
            (Triggered, TriggerRejected) => (Failed, NoAction),

            (Polling, StatusReceived(JobStatus::Pending)) => (Polling, KeepPolling),
            (Polling, PollFailed) => (Polling, KeepPolling),
            // Stays Polling until the reload has finished
            (Polling, StatusReceived(JobStatus::Completed(Conclusion::Success))) => {
                (Polling, StopAndReload)
            }
            (Polling, StatusReceived(JobStatus::Completed(Conclusion::Failure))) => {
                (Failed, StopPolling)
            }
            (Polling, ReloadFinished) => (Succeeded, NoAction),

            (Triggered | Polling, Disposed) => (Idle, StopPolling),

            // A stray poll result outside Polling ends that loop
            (_, StatusReceived(_) | PollFailed) => (current_state, StopPolling),
            _ => (current_state, NoAction),
        }
    }
}
