use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HeraldError;

/// Importance tier, ordered `Low < Normal < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Normal,
    High,
    Critical,
}

impl Importance {
    /// High and critical posts wait for a human decision.
    pub fn requires_approval(self) -> bool {
        self >= Importance::High
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Importance::Low => write!(f, "low"),
            Importance::Normal => write!(f, "normal"),
            Importance::High => write!(f, "high"),
            Importance::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Approved,
    Posted,
    Rejected,
    Failed,
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostStatus::Pending => write!(f, "pending"),
            PostStatus::Approved => write!(f, "approved"),
            PostStatus::Posted => write!(f, "posted"),
            PostStatus::Rejected => write!(f, "rejected"),
            PostStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The persisted unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub id: String,
    pub body: String,
    #[serde(default)]
    pub media: Vec<PathBuf>,
    #[serde(default)]
    pub document: Option<PathBuf>,
    #[serde(default)]
    pub link: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub importance: Importance,
    pub status: PostStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Stem path of the diagnostics captured for the last failure.
    #[serde(default)]
    pub debug_bundle: Option<PathBuf>,
    #[serde(default)]
    pub approval_id: Option<String>,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublishRecord {
    /// Builds a record from a validated request. Status follows importance.
    pub fn new(post: NewPost, max_retries: u32, now: DateTime<Utc>) -> Self {
        let status = if post.importance.requires_approval() {
            PostStatus::Pending
        } else {
            PostStatus::Approved
        };
        Self {
            id: Uuid::new_v4().to_string(),
            body: post.body,
            media: post.media,
            document: post.document,
            link: post.link,
            scheduled_at: post.scheduled_at.unwrap_or(now),
            importance: post.importance,
            status,
            retry_count: 0,
            max_retries,
            error_message: None,
            debug_bundle: None,
            approval_id: None,
            posted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Approved && self.scheduled_at <= now
    }

    pub fn can_retry(&self) -> bool {
        self.status == PostStatus::Failed && self.retry_count < self.max_retries
    }

    /// First line of the body, shortened for listings.
    pub fn preview(&self, width: usize) -> String {
        let line = self.body.lines().next().unwrap_or_default();
        if line.chars().count() <= width {
            return line.to_string();
        }
        let cut: String = line.chars().take(width.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

/// A request to create a record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub body: String,
    pub media: Vec<PathBuf>,
    pub document: Option<PathBuf>,
    pub link: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub importance: Importance,
}

impl NewPost {
    pub fn text(body: &str) -> Self {
        Self {
            body: body.to_string(),
            media: Vec::new(),
            document: None,
            link: None,
            scheduled_at: None,
            importance: Importance::Normal,
        }
    }

    pub fn validate(&self, max_body_chars: usize) -> Result<(), HeraldError> {
        if self.body.trim().is_empty() {
            return Err(HeraldError::Validation("post body must not be empty".into()));
        }
        let chars = self.body.chars().count();
        if chars > max_body_chars {
            return Err(HeraldError::Validation(format!(
                "post body is {chars} characters, limit is {max_body_chars}"
            )));
        }
        if self.document.is_some() && !self.media.is_empty() {
            return Err(HeraldError::Validation(
                "a post cannot carry both a document and media".into(),
            ));
        }
        for file in self.media.iter().chain(self.document.iter()) {
            if !file.is_file() {
                return Err(HeraldError::Validation(format!(
                    "attachment not found: {}",
                    file.display()
                )));
            }
        }
        if let Some(link) = &self.link {
            if !(link.starts_with("http://") || link.starts_with("https://")) {
                return Err(HeraldError::Validation(format!(
                    "link must start with http:// or https://: {link}"
                )));
            }
        }
        Ok(())
    }
}
