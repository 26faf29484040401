//! The target-surface contract the engine drives.
//!
//! [`Surface`] is the only seam between the engine and a live page. It exposes
//! primitive interactions (structural clicks, synthetic clicks, coordinate
//! clicks, keyboard input, file supply) and raw observations. None of the
//! interaction methods report whether the page actually reacted; that is
//! decided separately by success oracles.

#[cfg(feature = "browser")]
pub mod chrome;
pub mod profile;
#[cfg(test)]
pub mod scripted;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use profile::SurfaceProfile;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface call timed out")]
    Timeout,

    #[error("no element matches `{0}`")]
    NotFound(String),

    #[error("driver error: {0}")]
    Driver(String),
}

/// Viewport coordinates in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Observed state of one element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementState {
    pub visible: bool,
    pub enabled: bool,
    /// Whitespace-collapsed text content.
    pub text: String,
    /// `aria-label`, empty when absent.
    pub label: String,
    /// Current value for form fields.
    pub value: String,
    pub center: Option<Point>,
}

/// Finds a button-like control by its visible text or label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextQuery {
    /// Exact texts or labels accepted.
    pub texts: Vec<String>,
    /// Lowercase fragments that disqualify a candidate.
    pub exclude: Vec<String>,
    /// Containers searched first, in order, before the whole document.
    pub scopes: Vec<String>,
    pub enabled_only: bool,
}

impl TextQuery {
    pub fn new(texts: &[String]) -> Self {
        Self {
            texts: texts.to_vec(),
            ..Default::default()
        }
    }

    pub fn excluding(mut self, exclude: &[String]) -> Self {
        self.exclude = exclude.iter().map(|e| e.to_lowercase()).collect();
        self
    }

    pub fn within(mut self, scopes: &[String]) -> Self {
        self.scopes = scopes.to_vec();
        self
    }

    pub fn enabled(mut self) -> Self {
        self.enabled_only = true;
        self
    }

    /// Whether a candidate with this text and label satisfies the query.
    pub fn matches(&self, text: &str, label: &str) -> bool {
        let text = normalize(text);
        let label = label.trim();
        let lower = text.to_lowercase();
        if self.exclude.iter().any(|e| lower.contains(e.as_str())) {
            return false;
        }
        self.texts.iter().any(|t| *t == text || *t == label)
    }
}

/// Collapses runs of whitespace and trims.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Driver for one live page of the target surface.
#[async_trait]
pub trait Surface: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError>;

    async fn current_url(&self) -> Result<String, SurfaceError>;

    /// Observes the first element matching `selector`, if any.
    async fn probe(&self, selector: &str) -> Result<Option<ElementState>, SurfaceError>;

    /// Observes the first button-like control matching `query`, if any.
    async fn locate(&self, query: &TextQuery) -> Result<Option<ElementState>, SurfaceError>;

    /// Trusted (input-pipeline) click on the first match of `selector`.
    async fn click(&self, selector: &str) -> Result<(), SurfaceError>;

    /// Synthetic DOM click event on the first match of `selector`.
    async fn dispatch_click(&self, selector: &str) -> Result<(), SurfaceError>;

    /// Synthetic DOM click on the control matching `query`. Returns whether
    /// a candidate was found.
    async fn dispatch_click_text(&self, query: &TextQuery) -> Result<bool, SurfaceError>;

    /// Trusted mouse click at viewport coordinates.
    async fn click_at(&self, point: Point) -> Result<(), SurfaceError>;

    async fn focus(&self, selector: &str) -> Result<(), SurfaceError>;

    /// Presses a named key (`Tab`, `Enter`, `End`, `Escape`).
    async fn press_key(&self, key: &str) -> Result<(), SurfaceError>;

    /// Types text into the focused element one keystroke at a time.
    async fn type_text(&self, text: &str) -> Result<(), SurfaceError>;

    /// Inserts text into the focused element as a single edit.
    async fn insert_text(&self, text: &str) -> Result<(), SurfaceError>;

    /// Selects and deletes everything in the focused element.
    async fn clear_focused(&self) -> Result<(), SurfaceError>;

    /// Sets the value of a form field.
    async fn fill(&self, selector: &str, value: &str) -> Result<(), SurfaceError>;

    /// Supplies files to a file input.
    async fn set_files(&self, selector: &str, files: &[PathBuf]) -> Result<(), SurfaceError>;

    /// Text or label of the currently focused element.
    async fn focused_text(&self) -> Result<String, SurfaceError>;

    async fn markup(&self) -> Result<String, SurfaceError>;

    /// PNG capture of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError>;
}

/// Returns the first selector whose element is currently visible.
pub async fn first_visible(
    surface: &dyn Surface,
    selectors: &[String],
) -> Result<Option<String>, SurfaceError> {
    for selector in selectors {
        if let Some(state) = surface.probe(selector).await? {
            if state.visible {
                return Ok(Some(selector.clone()));
            }
        }
    }
    Ok(None)
}

/// Returns the first selector with any match in the document, visible or not.
pub async fn first_present(
    surface: &dyn Surface,
    selectors: &[String],
) -> Result<Option<String>, SurfaceError> {
    for selector in selectors {
        if surface.probe(selector).await?.is_some() {
            return Ok(Some(selector.clone()));
        }
    }
    Ok(None)
}
