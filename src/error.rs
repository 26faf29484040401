use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-level errors surfaced by the operator commands.
#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Max retries ({max_retries}) exceeded for post {id}")]
    MaxRetries { id: String, max_retries: u32 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Automation failure: {0}")]
    Publish(#[from] PublishError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl HeraldError {
    /// Process exit code for the operator surface.
    pub fn exit_code(&self) -> i32 {
        match self {
            HeraldError::NotFound(_) => 2,
            HeraldError::InvalidState(_)
            | HeraldError::MaxRetries { .. }
            | HeraldError::Validation(_) => 3,
            HeraldError::Publish(_) => 4,
            _ => 1,
        }
    }
}

/// Classifies a publish failure for reconciliation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// Session could not be established; no automatic remediation is safe.
    Session,
    /// A content attempt failed; the record stays eligible for an explicit retry.
    Content,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Session => write!(f, "Session"),
            FailureKind::Content => write!(f, "Content"),
        }
    }
}

/// Failures raised by the publish engine.
///
/// Content-attempt variants carry the diagnostic bundle captured when the
/// failing cascade was exhausted, if the capture succeeded.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("verification challenge not cleared after {waited_secs}s")]
    VerificationTimeout { waited_secs: u64 },

    #[error("composer did not open: {message}")]
    ComposerOpenFailure {
        message: String,
        bundle: Option<PathBuf>,
    },

    #[error("editor not found: {message}")]
    EditorNotFound {
        message: String,
        bundle: Option<PathBuf>,
    },

    #[error("attachment failed: {message}")]
    AttachmentFailure {
        message: String,
        bundle: Option<PathBuf>,
    },

    #[error("submission not accepted: {message}")]
    SubmissionNotAccepted {
        message: String,
        bundle: Option<PathBuf>,
    },

    #[error("processing timeout: {message}")]
    ProcessingTimeout {
        message: String,
        bundle: Option<PathBuf>,
    },
}

impl PublishError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PublishError::AuthenticationFailure(_) | PublishError::VerificationTimeout { .. } => {
                FailureKind::Session
            }
            _ => FailureKind::Content,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == FailureKind::Session
    }

    pub fn bundle(&self) -> Option<&Path> {
        match self {
            PublishError::ComposerOpenFailure { bundle, .. }
            | PublishError::EditorNotFound { bundle, .. }
            | PublishError::AttachmentFailure { bundle, .. }
            | PublishError::SubmissionNotAccepted { bundle, .. }
            | PublishError::ProcessingTimeout { bundle, .. } => bundle.as_deref(),
            _ => None,
        }
    }

    /// Attaches a diagnostic bundle to a content-attempt failure.
    pub fn with_bundle(mut self, path: Option<PathBuf>) -> Self {
        match &mut self {
            PublishError::ComposerOpenFailure { bundle, .. }
            | PublishError::EditorNotFound { bundle, .. }
            | PublishError::AttachmentFailure { bundle, .. }
            | PublishError::SubmissionNotAccepted { bundle, .. }
            | PublishError::ProcessingTimeout { bundle, .. } => {
                if bundle.is_none() {
                    *bundle = path;
                }
            }
            _ => {}
        }
        self
    }

    /// Message stored on the record, including the diagnostics location.
    pub fn record_message(&self) -> String {
        match self.bundle() {
            Some(path) => format!("{self} (diagnostics: {})", path.display()),
            None => self.to_string(),
        }
    }
}
