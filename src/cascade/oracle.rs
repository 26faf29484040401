use async_trait::async_trait;

use crate::surface::{Surface, SurfaceError, TextQuery, first_visible, normalize};

/// Decides, from observation alone, whether a goal has been reached.
#[async_trait]
pub trait SuccessOracle: Send + Sync {
    fn describe(&self) -> String;

    async fn check(&self, surface: &dyn Surface) -> Result<bool, SurfaceError>;
}

/// Holds when any of the selectors is visible.
pub struct AnyVisible {
    selectors: Vec<String>,
}

impl AnyVisible {
    pub fn new(selectors: &[String]) -> Self {
        Self {
            selectors: selectors.to_vec(),
        }
    }
}

#[async_trait]
impl SuccessOracle for AnyVisible {
    fn describe(&self) -> String {
        format!("visible: {}", self.selectors.join(", "))
    }

    async fn check(&self, surface: &dyn Surface) -> Result<bool, SurfaceError> {
        Ok(first_visible(surface, &self.selectors).await?.is_some())
    }
}

/// Holds when none of the selectors is visible, e.g. a dialog has closed.
pub struct NoneVisible {
    selectors: Vec<String>,
}

impl NoneVisible {
    pub fn new(selectors: &[String]) -> Self {
        Self {
            selectors: selectors.to_vec(),
        }
    }
}

#[async_trait]
impl SuccessOracle for NoneVisible {
    fn describe(&self) -> String {
        format!("hidden: {}", self.selectors.join(", "))
    }

    async fn check(&self, surface: &dyn Surface) -> Result<bool, SurfaceError> {
        Ok(first_visible(surface, &self.selectors).await?.is_none())
    }
}

/// Holds when a control matching the query is on screen.
pub struct ControlPresent {
    query: TextQuery,
}

impl ControlPresent {
    pub fn new(query: TextQuery) -> Self {
        Self { query }
    }
}

#[async_trait]
impl SuccessOracle for ControlPresent {
    fn describe(&self) -> String {
        format!("control present: {}", self.query.texts.join("|"))
    }

    async fn check(&self, surface: &dyn Surface) -> Result<bool, SurfaceError> {
        Ok(surface.locate(&self.query).await?.is_some())
    }
}

/// Holds when no control matching the query is on screen.
pub struct ControlAbsent {
    query: TextQuery,
}

impl ControlAbsent {
    pub fn new(query: TextQuery) -> Self {
        Self { query }
    }
}

#[async_trait]
impl SuccessOracle for ControlAbsent {
    fn describe(&self) -> String {
        format!("control absent: {}", self.query.texts.join("|"))
    }

    async fn check(&self, surface: &dyn Surface) -> Result<bool, SurfaceError> {
        Ok(surface.locate(&self.query).await?.is_none())
    }
}

/// Holds when the visible editor's text contains `needle`, compared with
/// whitespace collapsed.
pub struct EditorContains {
    editors: Vec<String>,
    needle: String,
}

impl EditorContains {
    pub fn new(editors: &[String], needle: &str) -> Self {
        Self {
            editors: editors.to_vec(),
            needle: normalize(needle),
        }
    }
}

#[async_trait]
impl SuccessOracle for EditorContains {
    fn describe(&self) -> String {
        format!("editor contains {:?}", self.needle)
    }

    async fn check(&self, surface: &dyn Surface) -> Result<bool, SurfaceError> {
        for selector in &self.editors {
            if let Some(state) = surface.probe(selector).await? {
                if state.visible && normalize(&state.text).contains(&self.needle) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Holds when a visible field carries exactly `value`.
pub struct FieldHasValue {
    selectors: Vec<String>,
    value: String,
}

impl FieldHasValue {
    pub fn new(selectors: &[String], value: &str) -> Self {
        Self {
            selectors: selectors.to_vec(),
            value: value.to_string(),
        }
    }
}

#[async_trait]
impl SuccessOracle for FieldHasValue {
    fn describe(&self) -> String {
        format!("field value {:?}", self.value)
    }

    async fn check(&self, surface: &dyn Surface) -> Result<bool, SurfaceError> {
        for selector in &self.selectors {
            if let Some(state) = surface.probe(selector).await? {
                if state.visible && state.value == self.value {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Holds when any inner oracle holds.
pub struct AnyOf(pub Vec<Box<dyn SuccessOracle>>);

#[async_trait]
impl SuccessOracle for AnyOf {
    fn describe(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(|o| o.describe()).collect();
        format!("any of [{}]", parts.join("; "))
    }

    async fn check(&self, surface: &dyn Surface) -> Result<bool, SurfaceError> {
        for oracle in &self.0 {
            if oracle.check(surface).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
