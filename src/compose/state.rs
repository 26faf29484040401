use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The states of one compose run.
///
/// Each run flows through:
/// IDLE → COMPOSER_OPEN → CONTENT_ENTERED → [LINK_APPENDED] → [ATTACHMENT_RESOLVED]
/// → SUBMITTED → CONFIRMED, or to ABORTED from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComposeState {
    Idle,
    ComposerOpen,
    ContentEntered,
    LinkAppended,
    AttachmentResolved,
    Submitted,
    Confirmed,
    Aborted,
}

impl ComposeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ComposeState::Confirmed | ComposeState::Aborted)
    }

    /// Label used for diagnostic bundles when reaching this state fails.
    pub fn goal_label(self) -> &'static str {
        match self {
            ComposeState::Idle => "idle",
            ComposeState::ComposerOpen => "composer_open",
            ComposeState::ContentEntered => "content_entry",
            ComposeState::LinkAppended => "link_append",
            ComposeState::AttachmentResolved => "attachment",
            ComposeState::Submitted => "submit",
            ComposeState::Confirmed => "processing",
            ComposeState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ComposeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeState::Idle => write!(f, "IDLE"),
            ComposeState::ComposerOpen => write!(f, "COMPOSER_OPEN"),
            ComposeState::ContentEntered => write!(f, "CONTENT_ENTERED"),
            ComposeState::LinkAppended => write!(f, "LINK_APPENDED"),
            ComposeState::AttachmentResolved => write!(f, "ATTACHMENT_RESOLVED"),
            ComposeState::Submitted => write!(f, "SUBMITTED"),
            ComposeState::Confirmed => write!(f, "CONFIRMED"),
            ComposeState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Whether the goal for the next planned state was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Reached,
    Exhausted,
}

/// The result of evaluating a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Advanced to the given state.
    Next(ComposeState),
    /// The run stopped; carries the state it was in when the step failed.
    Abort { from: ComposeState },
    /// The run was already terminal.
    Complete(ComposeState),
}

/// One pass of a record through the compose workflow.
///
/// The plan fixes which optional states apply. A retried record gets a fresh
/// run starting from `Idle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeRun {
    pub record_id: String,
    pub state: ComposeState,
    pub state_history: Vec<ComposeState>,
    plan: Vec<ComposeState>,
    pub started_at: DateTime<Utc>,
}

impl ComposeRun {
    pub fn new(record_id: &str, with_link: bool, with_attachment: bool) -> Self {
        let mut plan = vec![ComposeState::ComposerOpen, ComposeState::ContentEntered];
        if with_link {
            plan.push(ComposeState::LinkAppended);
        }
        if with_attachment {
            plan.push(ComposeState::AttachmentResolved);
        }
        plan.push(ComposeState::Submitted);
        plan.push(ComposeState::Confirmed);

        Self {
            record_id: record_id.to_string(),
            state: ComposeState::Idle,
            state_history: Vec::new(),
            plan,
            started_at: Utc::now(),
        }
    }

    /// The state the run is trying to reach next, if any.
    pub fn target(&self) -> Option<ComposeState> {
        if self.state.is_terminal() {
            return None;
        }
        let position = self.plan.iter().position(|s| *s == self.state);
        match position {
            Some(i) => self.plan.get(i + 1).copied(),
            None => self.plan.first().copied(),
        }
    }

    /// Every state this run went through, current state last.
    pub fn transitions(&self) -> Vec<ComposeState> {
        let mut all = self.state_history.clone();
        all.push(self.state);
        all
    }
}

/// Drives a [`ComposeRun`] through its plan.
pub struct ComposeMachine;

impl ComposeMachine {
    /// Applies the outcome of the step toward `run.target()`.
    ///
    /// - `Reached` moves to the target.
    /// - `Exhausted` aborts the run; there is no in-run retry, the whole
    ///   attempt is abandoned.
    /// - Terminal states always return `Complete`.
    pub fn next(run: &mut ComposeRun, outcome: StepOutcome) -> Transition {
        let Some(target) = run.target() else {
            return Transition::Complete(run.state);
        };

        let from = run.state;
        run.state_history.push(from);
        match outcome {
            StepOutcome::Reached => {
                run.state = target;
                Transition::Next(target)
            }
            StepOutcome::Exhausted => {
                run.state = ComposeState::Aborted;
                Transition::Abort { from }
            }
        }
    }
}

/// Summary produced when a compose run ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeReport {
    pub record_id: String,
    pub final_state: ComposeState,
    pub state_transitions: Vec<ComposeState>,
    /// Goal and the strategy that reached it, in order.
    pub confirmed_by: Vec<(String, String)>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl ComposeReport {
    pub fn from_run(run: &ComposeRun, confirmed_by: Vec<(String, String)>) -> Self {
        let now = Utc::now();
        Self {
            record_id: run.record_id.clone(),
            final_state: run.state,
            state_transitions: run.transitions(),
            confirmed_by,
            started_at: run.started_at,
            completed_at: now,
            duration_ms: (now - run.started_at).num_milliseconds(),
        }
    }
}
