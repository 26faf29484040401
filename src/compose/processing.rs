use std::fmt;

use tokio::time::{Instant, sleep};
use tracing::debug;

use super::{ComposeKind, Composer};
use crate::cascade::oracle::{AnyVisible, NoneVisible};
use crate::error::PublishError;

/// How the post-submit wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// An indicator appeared and then cleared.
    Cleared,
    /// No indicator appeared; the grace period was waited out instead.
    Grace,
}

impl fmt::Display for ProcessingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingOutcome::Cleared => write!(f, "indicator-cleared"),
            ProcessingOutcome::Grace => write!(f, "grace-period"),
        }
    }
}

impl Composer<'_> {
    /// Waits for server-side processing after submission.
    ///
    /// The indicator must show up within the appearance window; if it never
    /// does, the kind's grace period is slept and the post is considered
    /// confirmed. Once seen, it must clear before the kind's ceiling.
    pub(super) async fn await_processing(
        &self,
        kind: ComposeKind,
    ) -> Result<ProcessingOutcome, PublishError> {
        let selectors = &self.profile.processing_selectors;
        let ceiling = kind.processing_ceiling(self.timing);
        let appear = ceiling.min(Self::secs(self.timing.indicator_appear_secs));
        let started = Instant::now();

        let seen = self
            .executor
            .confirm(self.surface, &AnyVisible::new(selectors), appear)
            .await;
        if !seen {
            let grace = kind.grace(self.timing);
            debug!(%kind, grace_secs = grace.as_secs(), "no processing indicator, using grace period");
            sleep(grace).await;
            return Ok(ProcessingOutcome::Grace);
        }

        let remaining = ceiling.saturating_sub(started.elapsed());
        let cleared = self
            .executor
            .confirm(self.surface, &NoneVisible::new(selectors), remaining)
            .await;
        if cleared {
            Ok(ProcessingOutcome::Cleared)
        } else {
            Err(PublishError::ProcessingTimeout {
                message: format!(
                    "{kind} processing indicator still visible after {}s",
                    ceiling.as_secs()
                ),
                bundle: None,
            })
        }
    }
}
