//! Publish queue and outcome reconciler.
//!
//! Picks the next approved, due record, enforces the daily rate limit, drives
//! the record through the compose workflow and writes the outcome back to the
//! store. The store is only touched once the workflow reports a terminal
//! outcome.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::compose::{ComposeReport, ComposeState, Composer};
use crate::config::{HeraldConfig, TimingConfig};
use crate::debug::DebugCollector;
use crate::error::{HeraldError, PublishError};
use crate::record::{Action, AuditEntry, PostStatus, PostStore, PublishRecord};
use crate::session::SessionManager;
use crate::surface::SurfaceProfile;

/// Result of one publish cycle.
#[derive(Debug)]
pub enum PublishOutcome {
    Published {
        record_id: String,
        report: ComposeReport,
    },
    /// A content attempt failed; the record is `failed` and eligible for an
    /// explicit retry.
    Failed {
        record_id: String,
        error: PublishError,
    },
    /// The daily ceiling is reached. Nothing was touched.
    RateLimited { published: usize, limit: usize },
    NothingDue,
}

impl PublishOutcome {
    /// True when the cycle did not try to publish anything.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            PublishOutcome::RateLimited { .. } | PublishOutcome::NothingDue
        )
    }
}

type StateObserver = Box<dyn Fn(ComposeState) + Send + Sync>;

pub struct Publisher {
    session: SessionManager,
    profile: SurfaceProfile,
    timing: TimingConfig,
    debug: DebugCollector,
    max_daily_posts: usize,
    observer: Option<StateObserver>,
}

impl Publisher {
    pub fn new(session: SessionManager, config: &HeraldConfig) -> Self {
        Self {
            session,
            profile: config.surface.clone(),
            timing: config.timing.clone(),
            debug: DebugCollector::new(config.diagnostics_dir()),
            max_daily_posts: config.max_daily_posts as usize,
            observer: None,
        }
    }

    /// Reports the compose state of every following attempt.
    pub fn set_observer(&mut self, observer: impl Fn(ComposeState) + Send + Sync + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Publishes the earliest due record, if the rate limit allows it.
    ///
    /// Content failures are reconciled into the record and reported as
    /// [`PublishOutcome::Failed`]. Session failures are fatal: the record is
    /// marked `failed` and the error propagates unchanged.
    pub async fn publish_next(
        &mut self,
        store: &mut dyn PostStore,
        now: DateTime<Utc>,
    ) -> Result<PublishOutcome, HeraldError> {
        if let Some(limited) = self.rate_limited(store, now)? {
            return Ok(limited);
        }
        let Some(record) = store.due(now)?.into_iter().next() else {
            return Ok(PublishOutcome::NothingDue);
        };
        self.attempt(store, record).await
    }

    /// Publishes one record right away, ignoring its schedule. The record
    /// must still be `approved` and the rate limit still applies.
    pub async fn publish_now(
        &mut self,
        store: &mut dyn PostStore,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<PublishOutcome, HeraldError> {
        let record = store.resolve(id)?;
        if record.status != PostStatus::Approved {
            return Err(HeraldError::InvalidState(format!(
                "post {} is {}, only approved posts can be published",
                record.short_id(),
                record.status
            )));
        }
        if let Some(limited) = self.rate_limited(store, now)? {
            return Ok(limited);
        }
        self.attempt(store, record).await
    }

    pub fn release(&mut self) {
        self.session.release();
    }

    fn rate_limited(
        &self,
        store: &dyn PostStore,
        now: DateTime<Utc>,
    ) -> Result<Option<PublishOutcome>, HeraldError> {
        let published = store.published_on(now.date_naive())?;
        if published >= self.max_daily_posts {
            info!(published, limit = self.max_daily_posts, "daily limit reached, skipping");
            return Ok(Some(PublishOutcome::RateLimited {
                published,
                limit: self.max_daily_posts,
            }));
        }
        Ok(None)
    }

    async fn attempt(
        &mut self,
        store: &mut dyn PostStore,
        mut record: PublishRecord,
    ) -> Result<PublishOutcome, HeraldError> {
        info!(record_id = %record.id, "publishing");
        debug!(reuse = self.session.is_live(), "acquiring session");

        let result = match self.session.acquire().await {
            Ok(surface) => {
                let mut composer =
                    Composer::new(surface.as_ref(), &self.profile, &self.timing, &self.debug);
                if let Some(observer) = self.observer.as_deref() {
                    composer = composer.observed_by(observer);
                }
                let result = composer.publish(&record).await;
                if result.is_err() {
                    // Leave the surface on a clean page for the next record.
                    if let Err(e) = surface.navigate(&self.profile.landing_url).await {
                        warn!(error = %e, "could not return to landing view");
                    }
                }
                result
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                let posted_at = Utc::now();
                record.status = PostStatus::Posted;
                record.posted_at = Some(posted_at);
                record.error_message = None;
                record.debug_bundle = None;
                record.updated_at = posted_at;
                store.update_post(&record)?;
                store.append_activity(AuditEntry::new(
                    &record.id,
                    Action::Published,
                    format!("confirmed in {}ms", report.duration_ms),
                ))?;
                info!(record_id = %record.id, duration_ms = report.duration_ms, "published");
                Ok(PublishOutcome::Published {
                    record_id: record.id,
                    report,
                })
            }
            Err(err) => {
                self.reconcile_failure(store, &mut record, &err)?;
                if err.is_fatal() {
                    error!(record_id = %record.id, error = %err, "session failure");
                    self.session.release();
                    return Err(err.into());
                }
                Ok(PublishOutcome::Failed {
                    record_id: record.id,
                    error: err,
                })
            }
        }
    }

    /// Marks the record `failed`. `retry_count` is left alone: only an
    /// operator retry changes it.
    fn reconcile_failure(
        &self,
        store: &mut dyn PostStore,
        record: &mut PublishRecord,
        err: &PublishError,
    ) -> Result<(), HeraldError> {
        record.status = PostStatus::Failed;
        record.error_message = Some(err.record_message());
        record.debug_bundle = err.bundle().map(|p| p.to_path_buf());
        record.updated_at = Utc::now();
        store.update_post(record)?;
        store.append_activity(AuditEntry::new(
            &record.id,
            Action::Failed,
            format!("{}: {err}", err.kind()),
        ))?;
        warn!(record_id = %record.id, kind = %err.kind(), error = %err, "publish failed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::compose::tests::{
        DOC_BUTTON, DONE, EDITOR, FILE_INPUT, TITLE, compose_surface, touch,
    };
    use crate::error::FailureKind;
    use crate::record::{MemoryStore, NewPost, RecordPolicy, RecordService};
    use crate::session::SessionTiming;
    use crate::session::tests::ScriptedLauncher;
    use crate::surface::scripted::{Effect, Element, ScriptedSurface, Trigger};

    fn config(dir: &std::path::Path) -> HeraldConfig {
        HeraldConfig {
            data_dir: dir.to_path_buf(),
            ..HeraldConfig::default()
        }
    }

    fn publisher(launcher: Arc<ScriptedLauncher>, config: &HeraldConfig) -> Publisher {
        let session = SessionManager::new(
            Box::new(launcher),
            config.surface.clone(),
            config.credentials(),
            SessionTiming::from(&config.timing),
        );
        Publisher::new(session, config)
    }

    fn create(store: &mut MemoryStore, post: NewPost) -> PublishRecord {
        RecordService::new(store, RecordPolicy::default())
            .create(post, Utc::now())
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn approved_text_post_is_published() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let launcher = Arc::new(ScriptedLauncher::new(compose_surface()));
        let mut publisher = publisher(Arc::clone(&launcher), &config);
        let mut store = MemoryStore::new(50);
        let record = create(&mut store, NewPost::text("Launching v2"));
        assert_eq!(record.status, PostStatus::Approved);

        let outcome = publisher.publish_next(&mut store, Utc::now()).await.unwrap();

        let PublishOutcome::Published { record_id, report } = outcome else {
            panic!("expected a published outcome, got {outcome:?}");
        };
        assert_eq!(record_id, record.id);
        assert_eq!(
            report.state_transitions,
            vec![
                ComposeState::Idle,
                ComposeState::ComposerOpen,
                ComposeState::ContentEntered,
                ComposeState::Submitted,
                ComposeState::Confirmed,
            ]
        );
        let stored = store.get_post(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Posted);
        assert!(stored.posted_at.is_some());
        let last = store.recent_activity(1).unwrap();
        assert_eq!(last[0].action, Action::Published);
        assert_eq!(last[0].action.to_string(), "published");
        assert_eq!(launcher.surface.element(EDITOR).unwrap().text, "Launching v2");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_skips_without_touching_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = HeraldConfig {
            max_daily_posts: 1,
            ..config(dir.path())
        };
        let launcher = Arc::new(ScriptedLauncher::new(compose_surface()));
        let mut publisher = publisher(Arc::clone(&launcher), &config);
        let mut store = MemoryStore::new(50);
        let mut posted = create(&mut store, NewPost::text("yesterday's news"));
        posted.status = PostStatus::Posted;
        posted.posted_at = Some(Utc::now());
        store.update_post(&posted).unwrap();
        let waiting = create(&mut store, NewPost::text("Launching v2"));

        let outcome = publisher.publish_next(&mut store, Utc::now()).await.unwrap();

        assert!(matches!(
            outcome,
            PublishOutcome::RateLimited {
                published: 1,
                limit: 1
            }
        ));
        assert_eq!(store.get_post(&waiting.id).unwrap().unwrap(), waiting);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn every_due_record_waits_while_at_the_daily_limit() {
        let dir = tempfile::tempdir().unwrap();
        let config = HeraldConfig {
            max_daily_posts: 2,
            ..config(dir.path())
        };
        let launcher = Arc::new(ScriptedLauncher::new(compose_surface()));
        let mut publisher = publisher(Arc::clone(&launcher), &config);
        let mut store = MemoryStore::new(50);
        for body in ["morning update", "lunch update"] {
            let mut posted = create(&mut store, NewPost::text(body));
            posted.status = PostStatus::Posted;
            posted.posted_at = Some(Utc::now());
            store.update_post(&posted).unwrap();
        }
        let waiting: Vec<PublishRecord> = ["Launching v2", "Release notes", "Thanks all"]
            .into_iter()
            .map(|body| create(&mut store, NewPost::text(body)))
            .collect();
        let activity_before = store.recent_activity(50).unwrap().len();

        for _ in 0..waiting.len() {
            let outcome = publisher.publish_next(&mut store, Utc::now()).await.unwrap();
            assert!(outcome.is_skip());
            assert!(matches!(
                outcome,
                PublishOutcome::RateLimited {
                    published: 2,
                    limit: 2
                }
            ));
        }
        let forced = publisher
            .publish_now(&mut store, &waiting[0].id, Utc::now())
            .await
            .unwrap();
        assert!(matches!(forced, PublishOutcome::RateLimited { .. }));

        for record in &waiting {
            assert_eq!(store.get_post(&record.id).unwrap().unwrap(), *record);
        }
        assert_eq!(store.due(Utc::now()).unwrap().len(), waiting.len());
        assert_eq!(store.recent_activity(50).unwrap().len(), activity_before);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_due_is_a_skip() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let launcher = Arc::new(ScriptedLauncher::new(compose_surface()));
        let mut publisher = publisher(launcher, &config);
        let mut store = MemoryStore::new(50);
        create(
            &mut store,
            NewPost {
                scheduled_at: Some(Utc::now() + chrono::Duration::hours(2)),
                ..NewPost::text("later")
            },
        );

        let outcome = publisher.publish_next(&mut store, Utc::now()).await.unwrap();
        assert!(matches!(outcome, PublishOutcome::NothingDue));
    }

    #[tokio::test(start_paused = true)]
    async fn document_that_never_confirms_marks_record_failed() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let deck = touch(dir.path(), "quarterly_report.pdf");
        let surface = compose_surface()
            .with(DOC_BUTTON, Element::labelled("Add a document"))
            .with(FILE_INPUT, Element::block().hidden())
            .with(TITLE, Element::block().hidden())
            .with(DONE, Element::button("Done").hidden().disabled())
            .on(
                Trigger::SetFiles(FILE_INPUT.into()),
                vec![Effect::Show(TITLE.into()), Effect::Show(DONE.into())],
            );
        let launcher = Arc::new(ScriptedLauncher::new(surface));
        let mut publisher = publisher(launcher, &config);
        let mut store = MemoryStore::new(50);
        let record = create(
            &mut store,
            NewPost {
                document: Some(deck),
                ..NewPost::text("Numbers are in")
            },
        );

        let outcome = publisher.publish_next(&mut store, Utc::now()).await.unwrap();

        let PublishOutcome::Failed { error, .. } = &outcome else {
            panic!("expected a failed outcome, got {outcome:?}");
        };
        assert!(matches!(error, PublishError::AttachmentFailure { .. }));
        let stored = store.get_post(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Failed);
        assert_eq!(stored.retry_count, 0);
        let message = stored.error_message.unwrap();
        assert!(message.contains("title") || message.contains("processing"));
        assert!(message.contains("diagnostics"));
        let bundle = stored.debug_bundle.unwrap();
        assert!(bundle.starts_with(config.diagnostics_dir()));
        let last = store.recent_activity(1).unwrap();
        assert_eq!(last[0].action, Action::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn session_failure_is_fatal_and_keeps_retry_count() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        // The landing view bounces to the login page and no credentials exist.
        let surface = ScriptedSurface::new("about:blank").on(
            Trigger::Navigate("feed".into()),
            vec![Effect::SetUrl("https://www.linkedin.com/login".into())],
        );
        let launcher = Arc::new(ScriptedLauncher::new(surface));
        let mut publisher = publisher(launcher, &config);
        let mut store = MemoryStore::new(50);
        let mut record = create(&mut store, NewPost::text("Launching v2"));
        record.retry_count = 1;
        store.update_post(&record).unwrap();

        let err = publisher.publish_next(&mut store, Utc::now()).await.unwrap_err();

        let HeraldError::Publish(publish) = &err else {
            panic!("expected a publish error, got {err:?}");
        };
        assert_eq!(publish.kind(), FailureKind::Session);
        assert_eq!(err.exit_code(), 4);
        let stored = store.get_post(&record.id).unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Failed);
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_now_requires_approved() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let launcher = Arc::new(ScriptedLauncher::new(compose_surface()));
        let mut publisher = publisher(launcher, &config);
        let mut store = MemoryStore::new(50);
        let pending = create(
            &mut store,
            NewPost {
                importance: crate::record::Importance::Critical,
                ..NewPost::text("needs sign-off")
            },
        );

        let err = publisher
            .publish_now(&mut store, &pending.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, HeraldError::InvalidState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn publish_now_ignores_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let launcher = Arc::new(ScriptedLauncher::new(compose_surface()));
        let mut publisher = publisher(launcher, &config);
        let mut store = MemoryStore::new(50);
        let later = create(
            &mut store,
            NewPost {
                scheduled_at: Some(Utc::now() + chrono::Duration::days(3)),
                ..NewPost::text("Launching v2")
            },
        );

        let outcome = publisher
            .publish_now(&mut store, &later.id[..8], Utc::now())
            .await
            .unwrap();

        assert!(matches!(outcome, PublishOutcome::Published { .. }));
        assert_eq!(
            store.get_post(&later.id).unwrap().unwrap().status,
            PostStatus::Posted
        );
    }
}
