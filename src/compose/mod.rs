//! The compose workflow: drives one record through the surface's compose
//! dialog, one cascade per state.

mod attachment;
mod flow;
mod processing;
pub mod state;

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cascade::{Cascade, CascadeExecutor, CascadeOutcome};
use crate::config::TimingConfig;
use crate::debug::DebugCollector;
use crate::error::PublishError;
use crate::record::PublishRecord;
use crate::surface::{Surface, SurfaceProfile};

pub use state::{ComposeMachine, ComposeReport, ComposeRun, ComposeState, StepOutcome};

/// What a record attaches, which decides the processing ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeKind {
    Text,
    Media,
    Document,
}

impl ComposeKind {
    pub fn of(record: &PublishRecord) -> Self {
        if record.document.is_some() {
            ComposeKind::Document
        } else if !record.media.is_empty() {
            ComposeKind::Media
        } else {
            ComposeKind::Text
        }
    }

    pub fn processing_ceiling(self, timing: &TimingConfig) -> Duration {
        Duration::from_secs(match self {
            ComposeKind::Text => timing.text_processing_secs,
            ComposeKind::Media => timing.media_processing_secs,
            ComposeKind::Document => timing.document_processing_secs,
        })
    }

    pub fn grace(self, timing: &TimingConfig) -> Duration {
        Duration::from_secs(match self {
            ComposeKind::Text => timing.text_grace_secs,
            ComposeKind::Media => timing.media_grace_secs,
            ComposeKind::Document => timing.document_grace_secs,
        })
    }
}

impl fmt::Display for ComposeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeKind::Text => write!(f, "text"),
            ComposeKind::Media => write!(f, "media"),
            ComposeKind::Document => write!(f, "document"),
        }
    }
}

/// Runs the compose state machine against one live surface.
pub struct Composer<'a> {
    surface: &'a dyn Surface,
    profile: &'a SurfaceProfile,
    timing: &'a TimingConfig,
    debug: &'a DebugCollector,
    executor: CascadeExecutor,
    observer: Option<&'a (dyn Fn(ComposeState) + Send + Sync)>,
}

impl<'a> Composer<'a> {
    pub fn new(
        surface: &'a dyn Surface,
        profile: &'a SurfaceProfile,
        timing: &'a TimingConfig,
        debug: &'a DebugCollector,
    ) -> Self {
        Self {
            surface,
            profile,
            timing,
            debug,
            executor: CascadeExecutor::new(timing.cascade()),
            observer: None,
        }
    }

    /// Reports every state the run starts driving, e.g. to a progress line.
    pub fn observed_by(mut self, observer: &'a (dyn Fn(ComposeState) + Send + Sync)) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Drives `record` from `Idle` to `Confirmed`.
    ///
    /// Any exhausted step aborts the whole run: diagnostics are captured, the
    /// run moves to `Aborted` and the classified error is returned. There is
    /// no partial progress to resume from.
    pub async fn publish(&self, record: &PublishRecord) -> Result<ComposeReport, PublishError> {
        let kind = ComposeKind::of(record);
        let mut run = ComposeRun::new(&record.id, record.link.is_some(), kind != ComposeKind::Text);
        let mut confirmed_by = Vec::new();
        info!(record_id = %record.id, %kind, "compose run started");

        while let Some(target) = run.target() {
            debug!(record_id = %record.id, state = %target, "driving state");
            if let Some(observe) = self.observer {
                observe(target);
            }
            match self.reach(target, record, kind).await {
                Ok(how) => {
                    let transition = ComposeMachine::next(&mut run, StepOutcome::Reached);
                    debug!(record_id = %record.id, ?transition, strategy = %how, "state reached");
                    confirmed_by.push((target.to_string(), how));
                }
                Err(err) => {
                    let bundle = self.debug.capture(self.surface, target.goal_label()).await;
                    let transition = ComposeMachine::next(&mut run, StepOutcome::Exhausted);
                    warn!(
                        record_id = %record.id,
                        target = %target,
                        ?transition,
                        error = %err,
                        "compose run aborted"
                    );
                    return Err(err.with_bundle(bundle));
                }
            }
        }

        info!(record_id = %record.id, "compose run confirmed");
        Ok(ComposeReport::from_run(&run, confirmed_by))
    }

    async fn reach(
        &self,
        target: ComposeState,
        record: &PublishRecord,
        kind: ComposeKind,
    ) -> Result<String, PublishError> {
        match target {
            ComposeState::ComposerOpen => self.open_composer().await,
            ComposeState::ContentEntered => self.enter_content(&record.body).await,
            ComposeState::LinkAppended => match &record.link {
                Some(link) => self.append_link(link).await,
                None => Ok("skipped".into()),
            },
            ComposeState::AttachmentResolved => self.attach(record).await,
            ComposeState::Submitted => self.submit().await,
            ComposeState::Confirmed => self.await_processing(kind).await.map(|o| o.to_string()),
            ComposeState::Idle | ComposeState::Aborted => Ok("none".into()),
        }
    }

    /// Runs a cascade, returning the confirming strategy or a summary of
    /// every failed attempt.
    async fn run(&self, cascade: &Cascade) -> Result<String, String> {
        match self.executor.execute(self.surface, cascade).await {
            CascadeOutcome::Confirmed { strategy, .. } => Ok(strategy),
            outcome @ CascadeOutcome::Exhausted { .. } => Err(format!(
                "{} exhausted ({})",
                cascade.goal,
                outcome.summary()
            )),
        }
    }

    fn secs(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }
}
