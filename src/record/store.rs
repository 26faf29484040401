//! The persistence seam for records, approvals and activity.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::activity::{AuditEntry, RingBuffer};
use super::approval::ApprovalRequest;
use super::post::{PostStatus, PublishRecord};
use crate::error::HeraldError;

/// Create/get/update access to everything the engine persists.
pub trait PostStore {
    fn insert_post(&mut self, record: PublishRecord) -> Result<(), HeraldError>;

    fn get_post(&self, id: &str) -> Result<Option<PublishRecord>, HeraldError>;

    fn update_post(&mut self, record: &PublishRecord) -> Result<(), HeraldError>;

    /// Records in creation order, optionally filtered by status.
    fn list_posts(&self, status: Option<PostStatus>) -> Result<Vec<PublishRecord>, HeraldError>;

    fn insert_approval(&mut self, approval: ApprovalRequest) -> Result<(), HeraldError>;

    fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>, HeraldError>;

    fn update_approval(&mut self, approval: &ApprovalRequest) -> Result<(), HeraldError>;

    fn list_approvals(&self, open_only: bool) -> Result<Vec<ApprovalRequest>, HeraldError>;

    fn append_activity(&mut self, entry: AuditEntry) -> Result<(), HeraldError>;

    /// The newest `limit` entries, oldest first.
    fn recent_activity(&self, limit: usize) -> Result<Vec<AuditEntry>, HeraldError>;

    /// Approved records whose scheduled time has passed, earliest first.
    fn due(&self, now: DateTime<Utc>) -> Result<Vec<PublishRecord>, HeraldError> {
        let mut due: Vec<PublishRecord> = self
            .list_posts(Some(PostStatus::Approved))?
            .into_iter()
            .filter(|r| r.is_due(now))
            .collect();
        due.sort_by_key(|r| r.scheduled_at);
        Ok(due)
    }

    /// Number of records posted on the given UTC day.
    fn published_on(&self, day: NaiveDate) -> Result<usize, HeraldError> {
        Ok(self
            .list_posts(Some(PostStatus::Posted))?
            .iter()
            .filter(|r| r.posted_at.is_some_and(|t| t.date_naive() == day))
            .count())
    }

    /// Finds a record by full id or unique id prefix.
    fn resolve(&self, id: &str) -> Result<PublishRecord, HeraldError> {
        if let Some(record) = self.get_post(id)? {
            return Ok(record);
        }
        let mut matches: Vec<PublishRecord> = self
            .list_posts(None)?
            .into_iter()
            .filter(|r| !id.is_empty() && r.id.starts_with(id))
            .collect();
        match matches.len() {
            0 => Err(HeraldError::NotFound(id.to_string())),
            1 => Ok(matches.remove(0)),
            n => Err(HeraldError::Validation(format!(
                "id prefix {id} is ambiguous ({n} matches)"
            ))),
        }
    }
}

/// Everything a store holds, independent of where it lives.
#[derive(Debug, Clone)]
struct Ledger {
    posts: Vec<PublishRecord>,
    approvals: Vec<ApprovalRequest>,
    activity: RingBuffer<AuditEntry>,
}

impl Ledger {
    fn new(activity_capacity: usize) -> Self {
        Self {
            posts: Vec::new(),
            approvals: Vec::new(),
            activity: RingBuffer::new(activity_capacity),
        }
    }

    fn insert_post(&mut self, record: PublishRecord) -> Result<(), HeraldError> {
        if self.posts.iter().any(|r| r.id == record.id) {
            return Err(HeraldError::Store(format!("duplicate post id {}", record.id)));
        }
        self.posts.push(record);
        Ok(())
    }

    fn update_post(&mut self, record: &PublishRecord) -> Result<(), HeraldError> {
        let slot = self
            .posts
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| HeraldError::NotFound(record.id.clone()))?;
        *slot = record.clone();
        Ok(())
    }

    fn list_posts(&self, status: Option<PostStatus>) -> Vec<PublishRecord> {
        self.posts
            .iter()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect()
    }

    fn insert_approval(&mut self, approval: ApprovalRequest) -> Result<(), HeraldError> {
        if self.approvals.iter().any(|a| a.id == approval.id) {
            return Err(HeraldError::Store(format!("duplicate approval id {}", approval.id)));
        }
        self.approvals.push(approval);
        Ok(())
    }

    fn update_approval(&mut self, approval: &ApprovalRequest) -> Result<(), HeraldError> {
        let slot = self
            .approvals
            .iter_mut()
            .find(|a| a.id == approval.id)
            .ok_or_else(|| HeraldError::NotFound(approval.id.clone()))?;
        *slot = approval.clone();
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    ledger: Ledger,
}

impl MemoryStore {
    pub fn new(activity_capacity: usize) -> Self {
        Self {
            ledger: Ledger::new(activity_capacity),
        }
    }
}

impl PostStore for MemoryStore {
    fn insert_post(&mut self, record: PublishRecord) -> Result<(), HeraldError> {
        self.ledger.insert_post(record)
    }

    fn get_post(&self, id: &str) -> Result<Option<PublishRecord>, HeraldError> {
        Ok(self.ledger.posts.iter().find(|r| r.id == id).cloned())
    }

    fn update_post(&mut self, record: &PublishRecord) -> Result<(), HeraldError> {
        self.ledger.update_post(record)
    }

    fn list_posts(&self, status: Option<PostStatus>) -> Result<Vec<PublishRecord>, HeraldError> {
        Ok(self.ledger.list_posts(status))
    }

    fn insert_approval(&mut self, approval: ApprovalRequest) -> Result<(), HeraldError> {
        self.ledger.insert_approval(approval)
    }

    fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>, HeraldError> {
        Ok(self.ledger.approvals.iter().find(|a| a.id == id).cloned())
    }

    fn update_approval(&mut self, approval: &ApprovalRequest) -> Result<(), HeraldError> {
        self.ledger.update_approval(approval)
    }

    fn list_approvals(&self, open_only: bool) -> Result<Vec<ApprovalRequest>, HeraldError> {
        Ok(self
            .ledger
            .approvals
            .iter()
            .filter(|a| !open_only || a.is_open())
            .cloned()
            .collect())
    }

    fn append_activity(&mut self, entry: AuditEntry) -> Result<(), HeraldError> {
        self.ledger.activity.push(entry);
        Ok(())
    }

    fn recent_activity(&self, limit: usize) -> Result<Vec<AuditEntry>, HeraldError> {
        Ok(self.ledger.activity.latest(limit).cloned().collect())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    posts: Vec<PublishRecord>,
    #[serde(default)]
    approvals: Vec<ApprovalRequest>,
    #[serde(default)]
    activity: Vec<AuditEntry>,
}

/// Store persisted as one JSON document, rewritten after every change
/// through a temporary file and a rename.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonStore {
    pub fn open(path: impl Into<PathBuf>, activity_capacity: usize) -> Result<Self, HeraldError> {
        let path = path.into();
        let mut inner = MemoryStore::new(activity_capacity);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let file: StoreFile = serde_json::from_str(&contents)?;
            inner.ledger.posts = file.posts;
            inner.ledger.approvals = file.approvals;
            inner.ledger.activity = RingBuffer::from_items(activity_capacity, file.activity);
            debug!(
                path = %path.display(),
                posts = inner.ledger.posts.len(),
                activity = inner.ledger.activity.len(),
                "store loaded"
            );
        }
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), HeraldError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let ledger = &self.inner.ledger;
        let file = StoreFile {
            posts: ledger.posts.clone(),
            approvals: ledger.approvals.clone(),
            activity: ledger.activity.iter().cloned().collect(),
        };
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&file)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PostStore for JsonStore {
    fn insert_post(&mut self, record: PublishRecord) -> Result<(), HeraldError> {
        self.inner.insert_post(record)?;
        self.persist()
    }

    fn get_post(&self, id: &str) -> Result<Option<PublishRecord>, HeraldError> {
        self.inner.get_post(id)
    }

    fn update_post(&mut self, record: &PublishRecord) -> Result<(), HeraldError> {
        self.inner.update_post(record)?;
        self.persist()
    }

    fn list_posts(&self, status: Option<PostStatus>) -> Result<Vec<PublishRecord>, HeraldError> {
        self.inner.list_posts(status)
    }

    fn insert_approval(&mut self, approval: ApprovalRequest) -> Result<(), HeraldError> {
        self.inner.insert_approval(approval)?;
        self.persist()
    }

    fn get_approval(&self, id: &str) -> Result<Option<ApprovalRequest>, HeraldError> {
        self.inner.get_approval(id)
    }

    fn update_approval(&mut self, approval: &ApprovalRequest) -> Result<(), HeraldError> {
        self.inner.update_approval(approval)?;
        self.persist()
    }

    fn list_approvals(&self, open_only: bool) -> Result<Vec<ApprovalRequest>, HeraldError> {
        self.inner.list_approvals(open_only)
    }

    fn append_activity(&mut self, entry: AuditEntry) -> Result<(), HeraldError> {
        self.inner.append_activity(entry)?;
        self.persist()
    }

    fn recent_activity(&self, limit: usize) -> Result<Vec<AuditEntry>, HeraldError> {
        self.inner.recent_activity(limit)
    }
}
