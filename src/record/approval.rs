use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
    /// Approved by the deadline sweep, only when the operator opted in.
    AutoApproved,
}

/// A human decision pending on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub record_id: String,
    pub requested_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub decision: Option<Decision>,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub decision_reason: Option<String>,
}

impl ApprovalRequest {
    pub fn new(record_id: &str, reason: &str, now: DateTime<Utc>, window_hours: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            record_id: record_id.to_string(),
            requested_at: now,
            deadline: now + Duration::hours(window_hours),
            reason: reason.to_string(),
            decision: None,
            decided_at: None,
            decision_reason: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.decision.is_none()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && now > self.deadline
    }

    pub fn resolve(&mut self, decision: Decision, reason: Option<String>, now: DateTime<Utc>) {
        self.decision = Some(decision);
        self.decided_at = Some(now);
        self.decision_reason = reason;
    }
}
