//! Diagnostic capture on cascade exhaustion.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use crate::surface::Surface;

/// Writes markup and a screenshot of the surface to a timestamped,
/// label-tagged location.
#[derive(Debug, Clone)]
pub struct DebugCollector {
    dir: PathBuf,
}

impl DebugCollector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Captures `<label>_<YYYYmmdd_HHMMSS>.html` and `.png` and returns the
    /// shared stem path. Never fails: capture errors are logged and `None` is
    /// returned so the original failure stays visible.
    pub async fn capture(&self, surface: &dyn Surface, label: &str) -> Option<PathBuf> {
        let stem = self
            .dir
            .join(format!("{}_{}", sanitize(label), Utc::now().format("%Y%m%d_%H%M%S")));

        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "cannot create diagnostics directory");
            return None;
        }

        let mut written = false;
        match surface.markup().await {
            Ok(html) => match std::fs::write(stem.with_extension("html"), html) {
                Ok(()) => written = true,
                Err(e) => warn!(label, error = %e, "failed to write markup"),
            },
            Err(e) => warn!(label, error = %e, "failed to read markup"),
        }
        match surface.screenshot().await {
            Ok(png) => match std::fs::write(stem.with_extension("png"), png) {
                Ok(()) => written = true,
                Err(e) => warn!(label, error = %e, "failed to write screenshot"),
            },
            Err(e) => warn!(label, error = %e, "failed to take screenshot"),
        }

        if written {
            info!(bundle = %stem.display(), "diagnostics captured");
            Some(stem)
        } else {
            None
        }
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
