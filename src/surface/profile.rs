//! Locators and labels for the target compose surface.
//!
//! Every site-specific string lives here so a relabelled release can be
//! handled from `herald.toml` without touching the engine. Defaults describe
//! the surface the engine was first built against.

use serde::{Deserialize, Serialize};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceProfile {
    pub landing_url: String,
    pub login_url: String,
    /// Deep link that opens the composer directly.
    pub compose_url: String,
    pub landing_fragment: String,
    pub login_fragments: Vec<String>,
    pub challenge_fragments: Vec<String>,

    pub username_selector: String,
    pub password_selector: String,
    pub sign_in_selector: String,

    pub trigger_selectors: Vec<String>,
    pub trigger_texts: Vec<String>,
    pub dialog_selectors: Vec<String>,
    pub editor_selectors: Vec<String>,

    pub media_labels: Vec<String>,
    pub document_labels: Vec<String>,
    pub overflow_selectors: Vec<String>,
    pub overflow_texts: Vec<String>,
    pub file_input_selectors: Vec<String>,
    pub choose_file_texts: Vec<String>,
    pub title_selectors: Vec<String>,
    pub media_confirm_texts: Vec<String>,
    pub document_confirm_texts: Vec<String>,
    pub confirm_exclusions: Vec<String>,

    pub submit_texts: Vec<String>,
    pub submit_exclusions: Vec<String>,
    pub submit_selectors: Vec<String>,
    pub overlay_selectors: Vec<String>,
    pub processing_selectors: Vec<String>,
}

impl Default for SurfaceProfile {
    fn default() -> Self {
        Self {
            landing_url: "https://www.linkedin.com/feed/".into(),
            login_url: "https://www.linkedin.com/login".into(),
            compose_url: "https://www.linkedin.com/feed/?shareActive=true".into(),
            landing_fragment: "feed".into(),
            login_fragments: strings(&["login", "uas/login", "session_redirect", "authwall"]),
            challenge_fragments: strings(&["checkpoint", "challenge", "verification"]),

            username_selector: "#username".into(),
            password_selector: "#password".into(),
            sign_in_selector: "[type=\"submit\"]".into(),

            trigger_selectors: strings(&[
                "[data-view-name=\"share-sharebox-focus\"]",
                ".share-box-feed-entry__trigger",
                "[aria-label=\"Start a post\"]",
            ]),
            trigger_texts: strings(&["Start a post"]),
            dialog_selectors: strings(&["[role=\"dialog\"]", "[aria-modal=\"true\"]"]),
            editor_selectors: strings(&[
                "[role=\"dialog\"] div[contenteditable=\"true\"][data-placeholder]",
                "[role=\"dialog\"] div[contenteditable=\"true\"][role=\"textbox\"]",
                "[role=\"dialog\"] .ql-editor",
                "[aria-modal=\"true\"] div[contenteditable=\"true\"]",
                "[role=\"dialog\"] div[contenteditable=\"true\"]",
                "div[contenteditable=\"true\"][role=\"textbox\"]",
            ]),

            media_labels: strings(&[
                "Add a photo",
                "Add photos or video",
                "Add photo",
                "Add media",
                "Photo/video",
                "Photo",
                "Media",
                "Image",
            ]),
            document_labels: strings(&["Add a document", "Add document", "Document", "PDF"]),
            overflow_selectors: strings(&[
                "button[aria-label=\"More options\"]",
                "button[aria-label=\"More\"]",
                "button[aria-label=\"Show more options\"]",
                ".share-creation-state__additional-toolbar button",
            ]),
            overflow_texts: strings(&["+"]),
            file_input_selectors: strings(&[
                "[role=\"dialog\"] input[type=\"file\"]",
                "[aria-modal=\"true\"] input[type=\"file\"]",
                "input[type=\"file\"]",
            ]),
            choose_file_texts: strings(&["Choose file"]),
            title_selectors: strings(&[
                "input[placeholder*=\"descriptive title\"]",
                "input[placeholder*=\"title\" i]",
                "input[aria-label*=\"title\" i]",
            ]),
            media_confirm_texts: strings(&["Next", "Done"]),
            document_confirm_texts: strings(&["Done"]),
            confirm_exclusions: strings(&["post", "share", "cancel", "discard", "close", "skip"]),

            submit_texts: strings(&["Post", "Post now", "Share now"]),
            submit_exclusions: strings(&[
                "hide post",
                "repost",
                "copy link",
                "report",
                "edit",
                "delete",
                "remove",
                "undo",
                "anyone",
                "connections",
                "back",
                "cancel",
                "done",
                "next",
            ]),
            submit_selectors: strings(&[
                "button[aria-label=\"Post\"]",
                "button[aria-label=\"Post now\"]",
                "button[data-control-name=\"share.post\"]",
                "button.share-actions__primary-action",
            ]),
            overlay_selectors: strings(&[
                ".artdeco-modal-overlay",
                "[class*=\"share-creation\"][class*=\"overlay\"]",
            ]),
            processing_selectors: strings(&[
                ".artdeco-toast-item",
                ".artdeco-snackbar",
                "[data-test-toast]",
                "[role=\"progressbar\"]",
            ]),
        }
    }
}

impl SurfaceProfile {
    /// Names of required affordances that have no locator configured.
    pub fn missing_affordances(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.trigger_selectors.is_empty() && self.trigger_texts.is_empty() {
            missing.push("composer trigger");
        }
        if self.dialog_selectors.is_empty() {
            missing.push("compose dialog");
        }
        if self.editor_selectors.is_empty() {
            missing.push("editor");
        }
        if self.submit_texts.is_empty() && self.submit_selectors.is_empty() {
            missing.push("submit control");
        }
        if self.file_input_selectors.is_empty() {
            missing.push("file input");
        }
        if self.landing_fragment.is_empty() {
            missing.push("landing fragment");
        }
        missing
    }

    pub fn needs_login(&self, url: &str) -> bool {
        self.login_fragments.iter().any(|f| url.contains(f.as_str()))
    }

    pub fn is_challenge(&self, url: &str) -> bool {
        self.challenge_fragments.iter().any(|f| url.contains(f.as_str()))
    }

    pub fn is_landing(&self, url: &str) -> bool {
        url.contains(self.landing_fragment.as_str())
    }

    /// Structural selectors for a toolbar control identified by its labels,
    /// most precise first.
    pub fn label_selectors(labels: &[String]) -> Vec<String> {
        let exact = labels.iter().flat_map(|l| {
            [
                format!("button[aria-label=\"{l}\"]"),
                format!("[role=\"button\"][aria-label=\"{l}\"]"),
            ]
        });
        let partial = labels.iter().flat_map(|l| {
            [
                format!("button[aria-label*=\"{l}\" i]"),
                format!("[role=\"button\"][aria-label*=\"{l}\" i]"),
            ]
        });
        exact.chain(partial).collect()
    }
}
