//! Chrome driver for the real target surface.
//!
//! Needs the `browser` feature and a local Chrome/Chromium. Every
//! `headless_chrome` call blocks, so each one runs on the blocking pool.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use headless_chrome::browser::tab::point::Point as ChromePoint;
use headless_chrome::protocol::cdp::{Input, Page};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Serialize;
use tracing::{debug, info};

use super::{ElementState, Point, Surface, SurfaceError, TextQuery};
use crate::config::HeraldConfig;
use crate::session::Launcher;

const VIEWPORT: (u32, u32) = (1400, 900);

/// Keeps the browser alive between publish cycles of a long `run`.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Shared page helpers, prepended to every evaluated script.
const PRELUDE: &str = r#"
const norm = (t) => (t || '').replace(/\s+/g, ' ').trim();
const visible = (el) => {
  const r = el.getBoundingClientRect();
  const s = window.getComputedStyle(el);
  return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
};
const state = (el) => {
  const r = el.getBoundingClientRect();
  const shown = visible(el);
  return {
    visible: shown,
    enabled: !el.disabled && el.getAttribute('aria-disabled') !== 'true',
    text: norm(el.innerText || el.textContent),
    label: (el.getAttribute('aria-label') || '').trim(),
    value: el.value !== undefined ? String(el.value) : norm(el.textContent),
    center: shown ? { x: r.left + r.width / 2, y: r.top + r.height / 2 } : null,
  };
};
const find = (q) => {
  const roots = q.scopes.map((s) => document.querySelector(s)).filter((r) => r);
  roots.push(document);
  for (const root of roots) {
    const nodes = root.querySelectorAll('button, [role="button"], a, label, span');
    for (const el of nodes) {
      const text = norm(el.innerText || el.textContent);
      const label = (el.getAttribute('aria-label') || '').trim();
      const lower = text.toLowerCase();
      if (q.exclude.some((e) => lower.includes(e))) continue;
      if (!q.texts.some((t) => t === text || t === label)) continue;
      if (!visible(el)) continue;
      if (q.enabled_only && (el.disabled || el.getAttribute('aria-disabled') === 'true')) continue;
      return el.closest('button, [role="button"], a, label') || el;
    }
  }
  return null;
};
"#;

/// Launches Chrome on the persistent profile directory.
pub struct ChromeLauncher {
    headless: bool,
    profile_dir: PathBuf,
    slow_mo: Duration,
}

impl ChromeLauncher {
    pub fn new(config: &HeraldConfig) -> Self {
        Self {
            headless: config.headless,
            profile_dir: config.profile_dir.clone(),
            slow_mo: Duration::from_millis(config.slow_mo_ms),
        }
    }
}

#[async_trait]
impl Launcher for ChromeLauncher {
    async fn launch(&self) -> Result<Arc<dyn Surface>, SurfaceError> {
        let headless = self.headless;
        let profile_dir = self.profile_dir.clone();
        let slow_mo = self.slow_mo;
        let surface = tokio::task::spawn_blocking(move || open(headless, profile_dir, slow_mo))
            .await
            .map_err(|e| SurfaceError::Driver(format!("launch task failed: {e}")))?
            .map_err(|e| SurfaceError::Driver(format!("{e:#}")))?;
        Ok(Arc::new(surface))
    }
}

fn open(headless: bool, profile_dir: PathBuf, slow_mo: Duration) -> anyhow::Result<ChromeSurface> {
    std::fs::create_dir_all(&profile_dir)
        .with_context(|| format!("cannot create profile dir {}", profile_dir.display()))?;
    let options = LaunchOptions::default_builder()
        .headless(headless)
        .window_size(Some(VIEWPORT))
        .user_data_dir(Some(profile_dir.clone()))
        .idle_browser_timeout(IDLE_TIMEOUT)
        .args(vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--no-first-run"),
            OsStr::new("--no-default-browser-check"),
        ])
        .build()
        .map_err(|e| anyhow!("invalid launch options: {e}"))?;
    let browser = Browser::new(options).context("Chrome launch failed, is Chrome/Chromium installed?")?;
    let tab = browser.new_tab().context("cannot open tab")?;
    info!(headless, profile = %profile_dir.display(), "browser started");
    Ok(ChromeSurface {
        _browser: browser,
        tab,
        slow_mo,
    })
}

/// One Chrome tab. Dropping it closes the browser.
pub struct ChromeSurface {
    _browser: Browser,
    tab: Arc<Tab>,
    slow_mo: Duration,
}

const TYPE_CHUNK_CHARS: usize = 32;

fn chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Embeds a value as a JavaScript literal.
fn js<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".into())
}

fn script(body: &str) -> String {
    format!("(() => {{ {PRELUDE}\n{body} }})()")
}

impl ChromeSurface {
    async fn blocking<T, F>(&self, call: F) -> Result<T, SurfaceError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || call(&tab))
            .await
            .map_err(|e| SurfaceError::Driver(format!("driver task failed: {e}")))?
            .map_err(|e| SurfaceError::Driver(format!("{e:#}")))
    }

    /// Like [`Self::blocking`], pausing afterwards so the page keeps up.
    async fn act<F>(&self, call: F) -> Result<(), SurfaceError>
    where
        F: FnOnce(&Tab) -> anyhow::Result<()> + Send + 'static,
    {
        let slow_mo = self.slow_mo;
        self.blocking(move |tab| {
            call(tab)?;
            std::thread::sleep(slow_mo);
            Ok(())
        })
        .await
    }

    async fn eval(&self, body: String) -> Result<Option<serde_json::Value>, SurfaceError> {
        self.blocking(move |tab| Ok(tab.evaluate(&script(&body), false)?.value))
            .await
    }

    /// Evaluates a script returning `JSON.stringify(state | null)`.
    async fn eval_state(&self, body: String) -> Result<Option<ElementState>, SurfaceError> {
        let value = self.eval(body).await?;
        let Some(json) = value.as_ref().and_then(|v| v.as_str()) else {
            return Ok(None);
        };
        serde_json::from_str(json).map_err(|e| SurfaceError::Driver(format!("bad element state: {e}")))
    }

    async fn eval_bool(&self, body: String) -> Result<bool, SurfaceError> {
        Ok(self
            .eval(body)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

#[async_trait]
impl Surface for ChromeSurface {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let url = url.to_string();
        debug!(%url, "navigate");
        self.act(move |tab| {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn current_url(&self) -> Result<String, SurfaceError> {
        self.blocking(|tab| Ok(tab.get_url())).await
    }

    async fn probe(&self, selector: &str) -> Result<Option<ElementState>, SurfaceError> {
        self.eval_state(format!(
            "const el = document.querySelector({});\nreturn JSON.stringify(el ? state(el) : null);",
            js(selector)
        ))
        .await
    }

    async fn locate(&self, query: &TextQuery) -> Result<Option<ElementState>, SurfaceError> {
        self.eval_state(format!(
            "const el = find({});\nreturn JSON.stringify(el ? state(el) : null);",
            js(query)
        ))
        .await
    }

    async fn click(&self, selector: &str) -> Result<(), SurfaceError> {
        let selector = selector.to_string();
        self.act(move |tab| {
            tab.find_element(&selector)?.click()?;
            Ok(())
        })
        .await
    }

    async fn dispatch_click(&self, selector: &str) -> Result<(), SurfaceError> {
        let clicked = self
            .eval_bool(format!(
                "const el = document.querySelector({});\nif (!el) return false;\nel.click();\nreturn true;",
                js(selector)
            ))
            .await?;
        if !clicked {
            return Err(SurfaceError::NotFound(selector.to_string()));
        }
        tokio::time::sleep(self.slow_mo).await;
        Ok(())
    }

    async fn dispatch_click_text(&self, query: &TextQuery) -> Result<bool, SurfaceError> {
        let clicked = self
            .eval_bool(format!(
                "const el = find({});\nif (!el) return false;\nel.click();\nreturn true;",
                js(query)
            ))
            .await?;
        tokio::time::sleep(self.slow_mo).await;
        Ok(clicked)
    }

    async fn click_at(&self, point: Point) -> Result<(), SurfaceError> {
        self.act(move |tab| {
            tab.click_point(ChromePoint {
                x: point.x,
                y: point.y,
            })?;
            Ok(())
        })
        .await
    }

    async fn focus(&self, selector: &str) -> Result<(), SurfaceError> {
        let found = self
            .eval_bool(format!(
                "const el = document.querySelector({});\nif (!el) return false;\nel.focus();\nreturn true;",
                js(selector)
            ))
            .await?;
        if found {
            Ok(())
        } else {
            Err(SurfaceError::NotFound(selector.to_string()))
        }
    }

    async fn press_key(&self, key: &str) -> Result<(), SurfaceError> {
        let key = key.to_string();
        self.act(move |tab| {
            tab.press_key(&key)?;
            Ok(())
        })
        .await
    }

    /// Types in short chunks so a cancelled attempt stops within one chunk
    /// instead of typing on in the background.
    async fn type_text(&self, text: &str) -> Result<(), SurfaceError> {
        for chunk in chunks(text, TYPE_CHUNK_CHARS) {
            self.blocking(move |tab| {
                tab.type_str(&chunk)?;
                Ok(())
            })
            .await?;
        }
        tokio::time::sleep(self.slow_mo).await;
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<(), SurfaceError> {
        let text = text.to_string();
        self.act(move |tab| {
            tab.call_method(Input::InsertText { text })?;
            Ok(())
        })
        .await
    }

    async fn clear_focused(&self) -> Result<(), SurfaceError> {
        self.eval(
            "const el = document.activeElement;\n\
             if (el && el.value !== undefined) { el.value = ''; el.dispatchEvent(new Event('input', { bubbles: true })); }\n\
             else { document.execCommand('selectAll'); document.execCommand('delete'); }\n\
             return true;"
                .to_string(),
        )
        .await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), SurfaceError> {
        let found = self
            .eval_bool(format!(
                "const el = document.querySelector({});\n\
                 if (!el) return false;\n\
                 el.focus();\n\
                 if (el.value !== undefined) {{\n\
                   const proto = Object.getPrototypeOf(el);\n\
                   const setter = Object.getOwnPropertyDescriptor(proto, 'value');\n\
                   if (setter && setter.set) setter.set.call(el, {v}); else el.value = {v};\n\
                 }} else {{ el.textContent = {v}; }}\n\
                 el.dispatchEvent(new Event('input', {{ bubbles: true }}));\n\
                 el.dispatchEvent(new Event('change', {{ bubbles: true }}));\n\
                 return true;",
                js(selector),
                v = js(value)
            ))
            .await?;
        if !found {
            return Err(SurfaceError::NotFound(selector.to_string()));
        }
        tokio::time::sleep(self.slow_mo).await;
        Ok(())
    }

    async fn set_files(&self, selector: &str, files: &[PathBuf]) -> Result<(), SurfaceError> {
        let selector = selector.to_string();
        let files: Vec<String> = files
            .iter()
            .map(|f| std::path::absolute(f).unwrap_or_else(|_| f.clone()))
            .map(|f| f.to_string_lossy().into_owned())
            .collect();
        self.act(move |tab| {
            let paths: Vec<&str> = files.iter().map(String::as_str).collect();
            tab.find_element(&selector)?.set_input_files(&paths)?;
            Ok(())
        })
        .await
    }

    async fn focused_text(&self) -> Result<String, SurfaceError> {
        let value = self
            .eval(
                "const el = document.activeElement;\n\
                 if (!el) return '';\n\
                 return norm(el.innerText || el.textContent) || (el.getAttribute('aria-label') || '');"
                    .to_string(),
            )
            .await?;
        Ok(value
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    async fn markup(&self) -> Result<String, SurfaceError> {
        self.blocking(|tab| tab.get_content()).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SurfaceError> {
        self.blocking(|tab| {
            tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
        })
        .await
    }
}
