//! Scripted in-memory surface for tests.
//!
//! Elements are keyed by selector. Interactions fire reactions registered
//! per trigger; an interaction with no reaction is silently dropped, which is
//! exactly how the real surface misbehaves.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ElementState, Point, Surface, SurfaceError, TextQuery};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Trusted click, by selector, by coordinates or Enter on focus.
    Click(String),
    /// Synthetic DOM click.
    Dispatch(String),
    /// Navigation to a URL containing this fragment.
    Navigate(String),
    SetFiles(String),
    Fill(String),
}

#[derive(Debug, Clone)]
pub enum Effect {
    Show(String),
    Hide(String),
    Enable(String),
    Disable(String),
    Add(String, Element),
    SetUrl(String),
    /// Hide the element after it has been probed this many more times.
    HideAfterProbes(String, u32),
    /// Show the element after it has been probed this many more times.
    ShowAfterProbes(String, u32),
}

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub visible: bool,
    pub enabled: bool,
    pub button: bool,
    pub editable: bool,
    pub text: String,
    pub label: String,
    pub value: String,
    hide_after_probes: Option<u32>,
    show_after_probes: Option<u32>,
    id: usize,
}

impl Element {
    pub fn button(text: &str) -> Self {
        Self {
            visible: true,
            enabled: true,
            button: true,
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn labelled(label: &str) -> Self {
        Self {
            visible: true,
            enabled: true,
            button: true,
            label: label.to_string(),
            ..Default::default()
        }
    }

    pub fn editor() -> Self {
        Self {
            visible: true,
            enabled: true,
            editable: true,
            ..Default::default()
        }
    }

    pub fn block() -> Self {
        Self {
            visible: true,
            enabled: true,
            ..Default::default()
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Default)]
struct Inner {
    url: String,
    order: Vec<String>,
    elements: HashMap<String, Element>,
    reactions: HashMap<Trigger, Vec<Effect>>,
    focused: Option<String>,
    tab_index: Option<usize>,
    files: HashMap<String, Vec<PathBuf>>,
    failing: Vec<String>,
    calls: Vec<String>,
    next_id: usize,
}

impl Inner {
    fn insert(&mut self, selector: &str, mut element: Element) {
        self.next_id += 1;
        element.id = self.next_id;
        if !self.elements.contains_key(selector) {
            self.order.push(selector.to_string());
        }
        self.elements.insert(selector.to_string(), element);
    }

    fn apply(&mut self, trigger: &Trigger) {
        let Some(effects) = self.reactions.get(trigger).cloned() else {
            return;
        };
        for effect in effects {
            match effect {
                Effect::Show(s) => self.set(&s, |e| e.visible = true),
                Effect::Hide(s) => self.set(&s, |e| e.visible = false),
                Effect::Enable(s) => self.set(&s, |e| e.enabled = true),
                Effect::Disable(s) => self.set(&s, |e| e.enabled = false),
                Effect::Add(s, element) => self.insert(&s, element),
                Effect::SetUrl(url) => self.url = url,
                Effect::HideAfterProbes(s, n) => self.set(&s, |e| e.hide_after_probes = Some(n)),
                Effect::ShowAfterProbes(s, n) => self.set(&s, |e| e.show_after_probes = Some(n)),
            }
        }
    }

    fn set(&mut self, selector: &str, f: impl FnOnce(&mut Element)) {
        if let Some(element) = self.elements.get_mut(selector) {
            f(element);
        }
    }

    fn check(&mut self, op: String) -> Result<(), SurfaceError> {
        self.calls.push(op.clone());
        if self.failing.iter().any(|f| *f == op) {
            return Err(SurfaceError::Driver(format!("scripted failure: {op}")));
        }
        Ok(())
    }

    fn state(selector_id: usize, element: &Element) -> ElementState {
        ElementState {
            visible: element.visible,
            enabled: element.enabled,
            text: element.text.clone(),
            label: element.label.clone(),
            value: element.value.clone(),
            center: element.visible.then_some(Point {
                x: 10.0 * selector_id as f64,
                y: 20.0,
            }),
        }
    }

    fn focusable(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|s| {
                self.elements
                    .get(*s)
                    .is_some_and(|e| e.visible && (e.button || e.editable))
            })
            .cloned()
            .collect()
    }

    fn edit_focused(&mut self, f: impl FnOnce(&mut String)) -> Result<(), SurfaceError> {
        let focused = self.focused.clone().ok_or(SurfaceError::NotFound("focus".into()))?;
        match self.elements.get_mut(&focused) {
            Some(element) if element.editable => {
                f(&mut element.text);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

pub struct ScriptedSurface {
    inner: Mutex<Inner>,
}

impl ScriptedSurface {
    pub fn new(url: &str) -> Self {
        Self {
            inner: Mutex::new(Inner {
                url: url.to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn with(self, selector: &str, element: Element) -> Self {
        self.lock().insert(selector, element);
        self
    }

    pub fn on(self, trigger: Trigger, effects: Vec<Effect>) -> Self {
        self.lock().reactions.insert(trigger, effects);
        self
    }

    /// Makes the given operation (e.g. `click:#post`) return a driver error.
    pub fn failing(self, op: &str) -> Self {
        self.lock().failing.push(op.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn element(&self, selector: &str) -> Option<Element> {
        self.lock().elements.get(selector).cloned()
    }

    pub fn files(&self, selector: &str) -> Vec<PathBuf> {
        self.lock().files.get(selector).cloned().unwrap_or_default()
    }

    pub fn url(&self) -> String {
        self.lock().url.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Surface for ScriptedSurface {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.check(format!("navigate:{url}"))?;
        inner.url = url.to_string();
        let matching: Vec<Trigger> = inner
            .reactions
            .keys()
            .filter(|t| matches!(t, Trigger::Navigate(f) if url.contains(f.as_str())))
            .cloned()
            .collect();
        for trigger in matching {
            inner.apply(&trigger);
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SurfaceError> {
        Ok(self.lock().url.clone())
    }

    async fn probe(&self, selector: &str) -> Result<Option<ElementState>, SurfaceError> {
        let mut inner = self.lock();
        let Some(element) = inner.elements.get_mut(selector) else {
            return Ok(None);
        };
        if let Some(n) = element.hide_after_probes {
            if n == 0 {
                element.visible = false;
                element.hide_after_probes = None;
            } else {
                element.hide_after_probes = Some(n - 1);
            }
        }
        if let Some(n) = element.show_after_probes {
            if n == 0 {
                element.visible = true;
                element.show_after_probes = None;
            } else {
                element.show_after_probes = Some(n - 1);
            }
        }
        Ok(Some(Inner::state(element.id, element)))
    }

    async fn locate(&self, query: &TextQuery) -> Result<Option<ElementState>, SurfaceError> {
        let inner = self.lock();
        for selector in &inner.order {
            let element = &inner.elements[selector];
            if !element.button || !element.visible {
                continue;
            }
            if query.enabled_only && !element.enabled {
                continue;
            }
            if query.matches(&element.text, &element.label) {
                return Ok(Some(Inner::state(element.id, element)));
            }
        }
        Ok(None)
    }

    async fn click(&self, selector: &str) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.check(format!("click:{selector}"))?;
        match inner.elements.get(selector) {
            Some(e) if e.visible => {}
            _ => return Err(SurfaceError::NotFound(selector.to_string())),
        }
        inner.focused = Some(selector.to_string());
        if inner.elements[selector].enabled {
            inner.apply(&Trigger::Click(selector.to_string()));
        }
        Ok(())
    }

    async fn dispatch_click(&self, selector: &str) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.check(format!("dispatch:{selector}"))?;
        if !inner.elements.contains_key(selector) {
            return Err(SurfaceError::NotFound(selector.to_string()));
        }
        inner.apply(&Trigger::Dispatch(selector.to_string()));
        Ok(())
    }

    async fn dispatch_click_text(&self, query: &TextQuery) -> Result<bool, SurfaceError> {
        let mut inner = self.lock();
        inner.check(format!("dispatch-text:{}", query.texts.join("|")))?;
        let found = inner.order.iter().find(|s| {
            let e = &inner.elements[*s];
            e.button && e.visible && e.enabled && query.matches(&e.text, &e.label)
        });
        match found.cloned() {
            Some(selector) => {
                inner.apply(&Trigger::Dispatch(selector));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn click_at(&self, point: Point) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.check(format!("click-at:{},{}", point.x, point.y))?;
        let hit = inner.order.iter().find(|s| {
            let e = &inner.elements[*s];
            e.visible && Inner::state(e.id, e).center == Some(point)
        });
        if let Some(selector) = hit.cloned() {
            inner.focused = Some(selector.clone());
            if inner.elements[&selector].enabled {
                inner.apply(&Trigger::Click(selector));
            }
        }
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.check(format!("focus:{selector}"))?;
        if !inner.elements.contains_key(selector) {
            return Err(SurfaceError::NotFound(selector.to_string()));
        }
        inner.focused = Some(selector.to_string());
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.check(format!("key:{key}"))?;
        match key {
            "Tab" => {
                let focusable = inner.focusable();
                if focusable.is_empty() {
                    return Ok(());
                }
                let next = inner.tab_index.map_or(0, |i| (i + 1) % focusable.len());
                inner.tab_index = Some(next);
                inner.focused = Some(focusable[next].clone());
            }
            "Enter" => {
                if let Some(focused) = inner.focused.clone() {
                    let is_button = inner.elements.get(&focused).is_some_and(|e| e.button);
                    if is_button {
                        if inner.elements[&focused].enabled {
                            inner.apply(&Trigger::Click(focused));
                        }
                    } else {
                        inner.edit_focused(|t| t.push('\n'))?;
                    }
                }
            }
            "Escape" => inner.tab_index = None,
            _ => {}
        }
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.check("type".to_string())?;
        inner.edit_focused(|t| t.push_str(text))
    }

    async fn insert_text(&self, text: &str) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.check("insert".to_string())?;
        inner.edit_focused(|t| t.push_str(text))
    }

    async fn clear_focused(&self) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.check("clear".to_string())?;
        inner.edit_focused(|t| t.clear())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.check(format!("fill:{selector}"))?;
        match inner.elements.get_mut(selector) {
            Some(element) => element.value = value.to_string(),
            None => return Err(SurfaceError::NotFound(selector.to_string())),
        }
        inner.apply(&Trigger::Fill(selector.to_string()));
        Ok(())
    }

    async fn set_files(&self, selector: &str, files: &[PathBuf]) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        inner.check(format!("set-files:{selector}"))?;
        if !inner.elements.contains_key(selector) {
            return Err(SurfaceError::NotFound(selector.to_string()));
        }
        inner.files.insert(selector.to_string(), files.to_vec());
        inner.apply(&Trigger::SetFiles(selector.to_string()));
        Ok(())
    }

    async fn focused_text(&self) -> Result<String, SurfaceError> {
        let inner = self.lock();
        Ok(inner
            .focused
            .as_ref()
            .and_then(|s| inner.elements.get(s))
            .map(|e| if e.text.is_empty() { e.label.clone() } else { e.text.clone() })
            .unwrap_or_default())
    }

    async fn markup(&self) -> Result<String, SurfaceError> {
        let inner = self.lock();
        let body: Vec<String> = inner
            .order
            .iter()
            .map(|s| format!("<!-- {s} --><div>{}</div>", inner.elements[s].text))
            .collect();
        Ok(format!("<html><body>{}</body></html>", body.join("")))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreacted_clicks_change_nothing() {
        let surface = ScriptedSurface::new("https://x/feed/")
            .with("#open", Element::button("Open"))
            .with("#dialog", Element::block().hidden());
        surface.click("#open").await.unwrap();
        assert!(!surface.probe("#dialog").await.unwrap().unwrap().visible);
    }

    #[tokio::test]
    async fn coordinate_clicks_hit_the_element_under_the_point() {
        let surface = ScriptedSurface::new("https://x/feed/")
            .with("#post", Element::button("Post"))
            .with("#dialog", Element::block())
            .on(Trigger::Click("#post".into()), vec![Effect::Hide("#dialog".into())]);
        let state = surface.probe("#post").await.unwrap().unwrap();
        surface.click_at(state.center.unwrap()).await.unwrap();
        assert!(!surface.element("#dialog").unwrap().visible);
    }

    #[tokio::test]
    async fn tab_then_enter_activates_focused_button() {
        let surface = ScriptedSurface::new("https://x/feed/")
            .with("#editor", Element::editor())
            .with("#post", Element::button("Post"))
            .with("#dialog", Element::block())
            .on(Trigger::Click("#post".into()), vec![Effect::Hide("#dialog".into())]);
        surface.press_key("Tab").await.unwrap();
        surface.press_key("Tab").await.unwrap();
        assert_eq!(surface.focused_text().await.unwrap(), "Post");
        surface.press_key("Enter").await.unwrap();
        assert!(!surface.element("#dialog").unwrap().visible);
    }

    #[tokio::test]
    async fn probes_count_down_to_show() {
        let surface = ScriptedSurface::new("https://x/")
            .with("#title", Element::block().hidden())
            .with("#file", Element::block().hidden())
            .on(
                Trigger::SetFiles("#file".into()),
                vec![Effect::ShowAfterProbes("#title".into(), 1)],
            );
        surface.set_files("#file", &[PathBuf::from("a.pdf")]).await.unwrap();
        assert!(!surface.probe("#title").await.unwrap().unwrap().visible);
        assert!(surface.probe("#title").await.unwrap().unwrap().visible);
    }

    #[tokio::test]
    async fn probes_count_down_to_hide() {
        let surface = ScriptedSurface::new("https://x/feed/")
            .with("#toast", Element::block())
            .on(
                Trigger::Navigate("feed".into()),
                vec![Effect::HideAfterProbes("#toast".into(), 1)],
            );
        surface.navigate("https://x/feed/").await.unwrap();
        assert!(surface.probe("#toast").await.unwrap().unwrap().visible);
        assert!(!surface.probe("#toast").await.unwrap().unwrap().visible);
    }

    #[tokio::test]
    async fn failing_ops_return_driver_errors() {
        let surface = ScriptedSurface::new("https://x/")
            .with("#a", Element::button("A"))
            .failing("click:#a");
        assert!(matches!(
            surface.click("#a").await,
            Err(SurfaceError::Driver(_))
        ));
        assert_eq!(surface.calls(), vec!["click:#a".to_string()]);
    }
}
