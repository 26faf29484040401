use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::surface::{Surface, SurfaceError, TextQuery, first_present, first_visible};

/// One way of attempting a goal. Returning `Ok` only means the interaction
/// was delivered; it says nothing about whether the goal was reached.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> String;

    /// Overrides the executor's per-strategy timeout.
    fn time_limit(&self) -> Option<Duration> {
        None
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError>;
}

fn none_visible(selectors: &[String]) -> SurfaceError {
    SurfaceError::NotFound(selectors.join(", "))
}

/// Synthetic click on the first visible selector.
pub struct DispatchFirstVisible {
    selectors: Vec<String>,
}

impl DispatchFirstVisible {
    pub fn new(selectors: &[String]) -> Self {
        Self {
            selectors: selectors.to_vec(),
        }
    }
}

#[async_trait]
impl Strategy for DispatchFirstVisible {
    fn name(&self) -> String {
        "dispatch-click".into()
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        let selector = first_visible(surface, &self.selectors)
            .await?
            .ok_or_else(|| none_visible(&self.selectors))?;
        surface.dispatch_click(&selector).await
    }
}

/// Trusted click on the first visible selector.
pub struct ClickFirstVisible {
    selectors: Vec<String>,
}

impl ClickFirstVisible {
    pub fn new(selectors: &[String]) -> Self {
        Self {
            selectors: selectors.to_vec(),
        }
    }
}

#[async_trait]
impl Strategy for ClickFirstVisible {
    fn name(&self) -> String {
        "structural-click".into()
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        let selector = first_visible(surface, &self.selectors)
            .await?
            .ok_or_else(|| none_visible(&self.selectors))?;
        surface.click(&selector).await
    }
}

pub struct Navigate {
    url: String,
}

impl Navigate {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Strategy for Navigate {
    fn name(&self) -> String {
        "navigate".into()
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        surface.navigate(&self.url).await
    }
}

/// Locates a control by text and clicks the centre of its bounding box.
pub struct ClickTextAt {
    query: TextQuery,
}

impl ClickTextAt {
    pub fn new(query: TextQuery) -> Self {
        Self { query }
    }
}

#[async_trait]
impl Strategy for ClickTextAt {
    fn name(&self) -> String {
        "coordinate-click".into()
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        let center = surface
            .locate(&self.query)
            .await?
            .and_then(|state| state.center)
            .ok_or_else(|| none_visible(&self.query.texts))?;
        surface.click_at(center).await
    }
}

/// Synthetic click on a control found by text.
pub struct DispatchText {
    query: TextQuery,
}

impl DispatchText {
    pub fn new(query: TextQuery) -> Self {
        Self { query }
    }
}

#[async_trait]
impl Strategy for DispatchText {
    fn name(&self) -> String {
        "dispatch-text".into()
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        if surface.dispatch_click_text(&self.query).await? {
            Ok(())
        } else {
            Err(none_visible(&self.query.texts))
        }
    }
}

/// Tabs through focusable controls and presses Enter on the first whose
/// text or label is one of `targets`.
pub struct KeyboardTraversal {
    targets: Vec<String>,
    max_presses: usize,
    prelude: Option<String>,
}

impl KeyboardTraversal {
    pub fn new(targets: &[String], max_presses: usize) -> Self {
        Self {
            targets: targets.to_vec(),
            max_presses,
            prelude: None,
        }
    }

    /// Key pressed once before traversal starts, e.g. `Escape` to drop focus
    /// out of a file picker.
    pub fn after(mut self, key: &str) -> Self {
        self.prelude = Some(key.to_string());
        self
    }
}

#[async_trait]
impl Strategy for KeyboardTraversal {
    fn name(&self) -> String {
        "keyboard-traversal".into()
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        if let Some(key) = &self.prelude {
            surface.press_key(key).await?;
        }
        for _ in 0..self.max_presses {
            surface.press_key("Tab").await?;
            let focused = crate::surface::normalize(&surface.focused_text().await?);
            if self.targets.iter().any(|t| *t == focused) {
                return surface.press_key("Enter").await;
            }
        }
        Err(none_visible(&self.targets))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// One editing command, like a paste.
    Insert,
    /// Keystroke by keystroke.
    Type,
}

impl InputMode {
    async fn deliver(self, surface: &dyn Surface, text: &str) -> Result<(), SurfaceError> {
        match self {
            InputMode::Insert => surface.insert_text(text).await,
            InputMode::Type => surface.type_text(text).await,
        }
    }
}

/// Focuses the editor, clears it, then enters `text`.
pub struct ReplaceText {
    editors: Vec<String>,
    text: String,
    mode: InputMode,
    limit: Option<Duration>,
}

impl ReplaceText {
    pub fn new(editors: &[String], text: &str, mode: InputMode) -> Self {
        Self {
            editors: editors.to_vec(),
            text: text.to_string(),
            mode,
            limit: None,
        }
    }

    pub fn within(mut self, limit: Duration) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
impl Strategy for ReplaceText {
    fn name(&self) -> String {
        match self.mode {
            InputMode::Insert => "paste-text".into(),
            InputMode::Type => "type-text".into(),
        }
    }

    fn time_limit(&self) -> Option<Duration> {
        self.limit
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        let editor = first_visible(surface, &self.editors)
            .await?
            .ok_or_else(|| none_visible(&self.editors))?;
        surface.click(&editor).await?;
        surface.focus(&editor).await?;
        surface.clear_focused().await?;
        self.mode.deliver(surface, &self.text).await
    }
}

/// Moves the caret to the end of the editor and enters `text`.
pub struct AppendText {
    editors: Vec<String>,
    text: String,
    mode: InputMode,
    limit: Option<Duration>,
}

impl AppendText {
    pub fn new(editors: &[String], text: &str, mode: InputMode) -> Self {
        Self {
            editors: editors.to_vec(),
            text: text.to_string(),
            mode,
            limit: None,
        }
    }

    pub fn within(mut self, limit: Duration) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
impl Strategy for AppendText {
    fn name(&self) -> String {
        match self.mode {
            InputMode::Insert => "paste-append".into(),
            InputMode::Type => "type-append".into(),
        }
    }

    fn time_limit(&self) -> Option<Duration> {
        self.limit
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        let editor = first_visible(surface, &self.editors)
            .await?
            .ok_or_else(|| none_visible(&self.editors))?;
        surface.focus(&editor).await?;
        surface.press_key("End").await?;
        self.mode.deliver(surface, &self.text).await
    }
}

/// Supplies files to the first file input in the document, hidden or not.
pub struct SetFiles {
    inputs: Vec<String>,
    files: Vec<PathBuf>,
}

impl SetFiles {
    pub fn new(inputs: &[String], files: &[PathBuf]) -> Self {
        Self {
            inputs: inputs.to_vec(),
            files: files.to_vec(),
        }
    }
}

#[async_trait]
impl Strategy for SetFiles {
    fn name(&self) -> String {
        "set-files".into()
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        let input = first_present(surface, &self.inputs)
            .await?
            .ok_or_else(|| none_visible(&self.inputs))?;
        surface.set_files(&input, &self.files).await
    }
}

/// Sets the value of the first visible field.
pub struct Fill {
    selectors: Vec<String>,
    value: String,
}

impl Fill {
    pub fn new(selectors: &[String], value: &str) -> Self {
        Self {
            selectors: selectors.to_vec(),
            value: value.to_string(),
        }
    }
}

#[async_trait]
impl Strategy for Fill {
    fn name(&self) -> String {
        "fill".into()
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        let field = first_visible(surface, &self.selectors)
            .await?
            .ok_or_else(|| none_visible(&self.selectors))?;
        surface.fill(&field, &self.value).await
    }
}

/// Waits, letting animations settle between the steps of a [`Sequence`].
pub struct Settle(pub Duration);

#[async_trait]
impl Strategy for Settle {
    fn name(&self) -> String {
        "settle".into()
    }

    async fn attempt(&self, _surface: &dyn Surface) -> Result<(), SurfaceError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

/// Several interactions run as one strategy, stopping at the first error.
pub struct Sequence {
    name: String,
    steps: Vec<Box<dyn Strategy>>,
}

impl Sequence {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, strategy: impl Strategy + 'static) -> Self {
        self.steps.push(Box::new(strategy));
        self
    }
}

#[async_trait]
impl Strategy for Sequence {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn attempt(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        for step in &self.steps {
            step.attempt(surface).await?;
        }
        Ok(())
    }
}
