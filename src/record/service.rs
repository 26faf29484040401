//! Operator-facing record operations: create, approve, reject, retry and the
//! approval deadline sweep.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::activity::{Action, AuditEntry};
use super::approval::{ApprovalRequest, Decision};
use super::post::{NewPost, PostStatus, PublishRecord};
use super::store::PostStore;
use crate::config::HeraldConfig;
use crate::error::HeraldError;

/// Limits and policy applied to record operations.
#[derive(Debug, Clone, Copy)]
pub struct RecordPolicy {
    pub max_retries: u32,
    pub max_body_chars: usize,
    pub approval_window_hours: i64,
    pub auto_approve_on_deadline: bool,
}

impl Default for RecordPolicy {
    fn default() -> Self {
        Self::from(&HeraldConfig::default())
    }
}

impl From<&HeraldConfig> for RecordPolicy {
    fn from(config: &HeraldConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            max_body_chars: config.max_body_chars,
            approval_window_hours: config.approval_window_hours,
            auto_approve_on_deadline: config.auto_approve_on_deadline,
        }
    }
}

/// Result of one approval deadline sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub auto_approved: Vec<String>,
    /// Overdue but left pending because auto-approval is off.
    pub overdue: Vec<String>,
}

pub struct RecordService<'a> {
    store: &'a mut dyn PostStore,
    policy: RecordPolicy,
}

impl<'a> RecordService<'a> {
    pub fn new(store: &'a mut dyn PostStore, policy: RecordPolicy) -> Self {
        Self { store, policy }
    }

    /// Validates and persists a new record. High and critical records get an
    /// approval request and start `pending`; the rest start `approved`.
    /// Nothing is persisted when validation fails.
    pub fn create(&mut self, post: NewPost, now: DateTime<Utc>) -> Result<PublishRecord, HeraldError> {
        post.validate(self.policy.max_body_chars)?;
        let mut record = PublishRecord::new(post, self.policy.max_retries, now);

        if record.status == PostStatus::Pending {
            let approval = ApprovalRequest::new(
                &record.id,
                &format!("{} importance", record.importance),
                now,
                self.policy.approval_window_hours,
            );
            record.approval_id = Some(approval.id.clone());
            self.store.insert_post(record.clone())?;
            self.store.insert_approval(approval)?;
        } else {
            self.store.insert_post(record.clone())?;
        }

        self.store
            .append_activity(AuditEntry::new(&record.id, Action::Created, record.status.to_string()))?;
        info!(record_id = %record.id, status = %record.status, importance = %record.importance, "record created");
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<PublishRecord, HeraldError> {
        self.store.resolve(id)
    }

    pub fn list(&self, status: Option<PostStatus>) -> Result<Vec<PublishRecord>, HeraldError> {
        self.store.list_posts(status)
    }

    pub fn approval_for(&self, record: &PublishRecord) -> Result<Option<ApprovalRequest>, HeraldError> {
        match &record.approval_id {
            Some(id) => self.store.get_approval(id),
            None => Ok(None),
        }
    }

    pub fn approve(&mut self, id: &str, now: DateTime<Utc>) -> Result<PublishRecord, HeraldError> {
        let mut record = self.pending(id, "approve")?;
        self.decide(&record, Decision::Approved, None, now)?;
        record.status = PostStatus::Approved;
        record.updated_at = now;
        self.store.update_post(&record)?;
        self.store
            .append_activity(AuditEntry::new(&record.id, Action::Approved, ""))?;
        info!(record_id = %record.id, "record approved");
        Ok(record)
    }

    pub fn reject(
        &mut self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<PublishRecord, HeraldError> {
        let mut record = self.pending(id, "reject")?;
        self.decide(&record, Decision::Rejected, Some(reason.to_string()), now)?;
        record.status = PostStatus::Rejected;
        record.error_message = Some(format!("Rejected: {reason}"));
        record.updated_at = now;
        self.store.update_post(&record)?;
        self.store
            .append_activity(AuditEntry::new(&record.id, Action::Rejected, reason))?;
        info!(record_id = %record.id, reason, "record rejected");
        Ok(record)
    }

    /// Re-queues a failed record: `approved`, `retry_count + 1`, error
    /// cleared. This is the only place `retry_count` ever grows.
    pub fn retry(&mut self, id: &str, now: DateTime<Utc>) -> Result<PublishRecord, HeraldError> {
        let mut record = self.store.resolve(id)?;
        if record.status != PostStatus::Failed {
            return Err(HeraldError::InvalidState(format!(
                "cannot retry post {} in status {}",
                record.short_id(),
                record.status
            )));
        }
        if record.retry_count >= record.max_retries {
            return Err(HeraldError::MaxRetries {
                id: record.id.clone(),
                max_retries: record.max_retries,
            });
        }

        record.status = PostStatus::Approved;
        record.retry_count += 1;
        record.error_message = None;
        record.debug_bundle = None;
        record.updated_at = now;
        self.store.update_post(&record)?;
        self.store.append_activity(AuditEntry::new(
            &record.id,
            Action::Retried,
            format!("attempt {}/{}", record.retry_count, record.max_retries),
        ))?;
        info!(record_id = %record.id, retry_count = record.retry_count, "record re-queued");
        Ok(record)
    }

    /// Handles overdue approvals. They are approved only when the operator
    /// opted in to auto-approval; otherwise they are reported and left alone.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Result<SweepReport, HeraldError> {
        let mut report = SweepReport::default();
        for mut approval in self.store.list_approvals(true)? {
            if !approval.is_overdue(now) {
                continue;
            }
            let Some(mut record) = self.store.get_post(&approval.record_id)? else {
                warn!(approval_id = %approval.id, "approval references a missing record");
                continue;
            };
            if record.status != PostStatus::Pending {
                continue;
            }

            if !self.policy.auto_approve_on_deadline {
                warn!(record_id = %record.id, deadline = %approval.deadline, "approval overdue");
                report.overdue.push(record.id);
                continue;
            }

            approval.resolve(Decision::AutoApproved, Some("deadline passed".into()), now);
            self.store.update_approval(&approval)?;
            record.status = PostStatus::Approved;
            record.updated_at = now;
            self.store.update_post(&record)?;
            self.store.append_activity(AuditEntry::new(
                &record.id,
                Action::AutoApproved,
                "deadline passed",
            ))?;
            info!(record_id = %record.id, "record auto-approved after deadline");
            report.auto_approved.push(record.id);
        }
        Ok(report)
    }

    fn pending(&self, id: &str, operation: &str) -> Result<PublishRecord, HeraldError> {
        let record = self.store.resolve(id)?;
        if record.status != PostStatus::Pending {
            return Err(HeraldError::InvalidState(format!(
                "cannot {operation} post {} in status {}",
                record.short_id(),
                record.status
            )));
        }
        Ok(record)
    }

    fn decide(
        &mut self,
        record: &PublishRecord,
        decision: Decision,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), HeraldError> {
        let Some(approval_id) = &record.approval_id else {
            return Ok(());
        };
        if let Some(mut approval) = self.store.get_approval(approval_id)? {
            approval.resolve(decision, reason, now);
            self.store.update_approval(&approval)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::record::post::Importance;
    use crate::record::store::MemoryStore;

    fn create(store: &mut MemoryStore, importance: Importance) -> PublishRecord {
        let post = NewPost {
            importance,
            ..NewPost::text("Launching v2")
        };
        RecordService::new(store, RecordPolicy::default())
            .create(post, Utc::now())
            .unwrap()
    }

    fn fail(store: &mut MemoryStore, record: &PublishRecord) {
        let mut failed = record.clone();
        failed.status = PostStatus::Failed;
        failed.error_message = Some("submission not accepted".into());
        store.update_post(&failed).unwrap();
    }

    /// Delegates to a memory store but refuses new posts.
    struct FullStore(MemoryStore);

    impl PostStore for FullStore {
        fn insert_post(&mut self, _record: PublishRecord) -> Result<(), HeraldError> {
            Err(HeraldError::Store("disk full".into()))
        }

        fn get_post(&self, id: &str) -> Result<Option<PublishRecord>, HeraldError> {
            self.0.get_post(id)
        }

        fn update_post(&mut self, record: &PublishRecord) -> Result<(), HeraldError> {
            self.0.update_post(record)
        }

        fn list_posts(&self, status: Option<PostStatus>) -> Result<Vec<PublishRecord>, HeraldError> {
            self.0.list_posts(status)
        }

        fn insert_approval(&mut self, approval: ApprovalRequest) -> Result<(), HeraldError> {
            self.0.insert_approval(approval)
        }

        fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>, HeraldError> {
            self.0.get_approval(id)
        }

        fn update_approval(&mut self, approval: &ApprovalRequest) -> Result<(), HeraldError> {
            self.0.update_approval(approval)
        }

        fn list_approvals(&self, open_only: bool) -> Result<Vec<ApprovalRequest>, HeraldError> {
            self.0.list_approvals(open_only)
        }

        fn append_activity(&mut self, entry: AuditEntry) -> Result<(), HeraldError> {
            self.0.append_activity(entry)
        }

        fn recent_activity(&self, limit: usize) -> Result<Vec<AuditEntry>, HeraldError> {
            self.0.recent_activity(limit)
        }
    }

    #[test]
    fn refused_post_leaves_no_approval_behind() {
        let mut store = FullStore(MemoryStore::new(10));
        let post = NewPost {
            importance: Importance::Critical,
            ..NewPost::text("Launching v2")
        };

        let err = RecordService::new(&mut store, RecordPolicy::default())
            .create(post, Utc::now())
            .unwrap_err();

        assert!(matches!(err, HeraldError::Store(_)));
        assert!(store.list_approvals(false).unwrap().is_empty());
        assert!(store.recent_activity(10).unwrap().is_empty());
    }

    #[test]
    fn importance_decides_initial_status_and_approval() {
        let mut store = MemoryStore::new(10);
        for importance in [Importance::High, Importance::Critical] {
            let r = create(&mut store, importance);
            assert_eq!(r.status, PostStatus::Pending);
            let approval_id = r.approval_id.unwrap();
            assert!(store.get_approval(&approval_id).unwrap().is_some());
        }
        for importance in [Importance::Low, Importance::Normal] {
            let r = create(&mut store, importance);
            assert_eq!(r.status, PostStatus::Approved);
            assert!(r.approval_id.is_none());
        }
    }

    #[test]
    fn invalid_post_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("deck.pdf");
        let png = dir.path().join("shot.png");
        std::fs::write(&pdf, b"%PDF").unwrap();
        std::fs::write(&png, b"png").unwrap();
        let mut store = MemoryStore::new(10);
        let post = NewPost {
            document: Some(pdf),
            media: vec![png],
            importance: Importance::High,
            ..NewPost::text("both")
        };

        let err = RecordService::new(&mut store, RecordPolicy::default())
            .create(post, Utc::now())
            .unwrap_err();

        assert!(matches!(err, HeraldError::Validation(_)));
        assert!(store.list_posts(None).unwrap().is_empty());
        assert!(store.list_approvals(false).unwrap().is_empty());
        assert!(store.recent_activity(10).unwrap().is_empty());
    }

    #[test]
    fn retry_requeues_failed_record() {
        let mut store = MemoryStore::new(10);
        let r = create(&mut store, Importance::Normal);
        fail(&mut store, &r);

        let retried = RecordService::new(&mut store, RecordPolicy::default())
            .retry(&r.id, Utc::now())
            .unwrap();

        assert_eq!(retried.status, PostStatus::Approved);
        assert_eq!(retried.retry_count, 1);
        assert!(retried.error_message.is_none());
        let last = store.recent_activity(1).unwrap();
        assert_eq!(last[0].action, Action::Retried);
    }

    #[test]
    fn retry_at_max_fails_and_leaves_record_unchanged() {
        let mut store = MemoryStore::new(10);
        let r = create(&mut store, Importance::Normal);
        let mut exhausted = r.clone();
        exhausted.status = PostStatus::Failed;
        exhausted.retry_count = exhausted.max_retries;
        exhausted.error_message = Some("processing timeout".into());
        store.update_post(&exhausted).unwrap();

        let err = RecordService::new(&mut store, RecordPolicy::default())
            .retry(&r.id, Utc::now())
            .unwrap_err();

        assert_eq!(err.to_string(), format!("Max retries (2) exceeded for post {}", r.id));
        assert_eq!(store.get_post(&r.id).unwrap().unwrap(), exhausted);
    }

    #[test]
    fn retry_requires_failed_status() {
        let mut store = MemoryStore::new(10);
        let r = create(&mut store, Importance::Normal);
        let err = RecordService::new(&mut store, RecordPolicy::default())
            .retry(&r.id, Utc::now())
            .unwrap_err();
        assert!(matches!(err, HeraldError::InvalidState(_)));
    }

    #[test]
    fn approve_and_reject_resolve_the_request() {
        let mut store = MemoryStore::new(10);
        let a = create(&mut store, Importance::High);
        let b = create(&mut store, Importance::Critical);
        let now = Utc::now();
        let mut service = RecordService::new(&mut store, RecordPolicy::default());

        assert_eq!(service.approve(&a.id, now).unwrap().status, PostStatus::Approved);
        let rejected = service.reject(&b.id, "off-brand", now).unwrap();
        assert_eq!(rejected.status, PostStatus::Rejected);
        assert_eq!(rejected.error_message.as_deref(), Some("Rejected: off-brand"));
        assert!(matches!(
            service.approve(&a.id, now),
            Err(HeraldError::InvalidState(_))
        ));

        let approval = store.get_approval(a.approval_id.as_ref().unwrap()).unwrap().unwrap();
        assert_eq!(approval.decision, Some(Decision::Approved));
    }

    #[test]
    fn sweep_leaves_overdue_pending_without_opt_in() {
        let mut store = MemoryStore::new(10);
        let r = create(&mut store, Importance::High);
        let later = Utc::now() + Duration::hours(30);

        let report = RecordService::new(&mut store, RecordPolicy::default())
            .sweep(later)
            .unwrap();

        assert_eq!(report.overdue, vec![r.id.clone()]);
        assert!(report.auto_approved.is_empty());
        assert_eq!(store.get_post(&r.id).unwrap().unwrap().status, PostStatus::Pending);
    }

    #[test]
    fn sweep_auto_approves_when_opted_in() {
        let mut store = MemoryStore::new(10);
        let r = create(&mut store, Importance::Critical);
        let policy = RecordPolicy {
            auto_approve_on_deadline: true,
            ..RecordPolicy::default()
        };

        let report = RecordService::new(&mut store, policy)
            .sweep(Utc::now() + Duration::hours(25))
            .unwrap();

        assert_eq!(report.auto_approved, vec![r.id.clone()]);
        assert_eq!(store.get_post(&r.id).unwrap().unwrap().status, PostStatus::Approved);
        let approval = store.get_approval(r.approval_id.as_ref().unwrap()).unwrap().unwrap();
        assert_eq!(approval.decision, Some(Decision::AutoApproved));
    }
}
