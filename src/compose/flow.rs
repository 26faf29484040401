use tracing::warn;

use super::Composer;
use crate::cascade::Cascade;
use crate::cascade::oracle::{AnyVisible, EditorContains, NoneVisible};
use crate::cascade::strategy::{
    AppendText, ClickFirstVisible, ClickTextAt, DispatchFirstVisible, DispatchText, InputMode,
    KeyboardTraversal, Navigate, ReplaceText,
};
use crate::error::PublishError;
use crate::surface::TextQuery;

impl Composer<'_> {
    pub(super) async fn open_composer(&self) -> Result<String, PublishError> {
        let p = self.profile;
        let failure = |message: String| PublishError::ComposerOpenFailure {
            message,
            bundle: None,
        };

        let url = self
            .surface
            .current_url()
            .await
            .map_err(|e| failure(e.to_string()))?;
        if !p.is_landing(&url) {
            self.surface
                .navigate(&p.landing_url)
                .await
                .map_err(|e| failure(format!("cannot reach landing view: {e}")))?;
        }

        let triggers = TextQuery::new(&p.trigger_texts);
        let cascade = Cascade::new("open composer", AnyVisible::new(&p.dialog_selectors))
            .then(DispatchFirstVisible::new(&p.trigger_selectors))
            .then(Navigate::new(&p.compose_url))
            .then(DispatchText::new(triggers.clone()))
            .then(ClickFirstVisible::new(&p.trigger_selectors))
            .then(ClickTextAt::new(triggers));
        self.run(&cascade).await.map_err(failure)
    }

    pub(super) async fn enter_content(&self, body: &str) -> Result<String, PublishError> {
        let p = self.profile;
        // The whole body must be present: typing can be cut off part way.
        let typing = self.timing.typing_budget(body.chars().count());
        let cascade = Cascade::new("enter content", EditorContains::new(&p.editor_selectors, body))
            .then(ReplaceText::new(&p.editor_selectors, body, InputMode::Insert))
            .then(ReplaceText::new(&p.editor_selectors, body, InputMode::Type).within(typing));
        self.run(&cascade)
            .await
            .map_err(|message| PublishError::EditorNotFound {
                message,
                bundle: None,
            })
    }

    /// Appends the link after the body. Must run before any attachment step
    /// because attaching resets the editor on this surface.
    pub(super) async fn append_link(&self, link: &str) -> Result<String, PublishError> {
        let p = self.profile;
        let suffix = format!("\n\n{link}");
        let typing = self.timing.typing_budget(suffix.chars().count());
        let cascade = Cascade::new("append link", EditorContains::new(&p.editor_selectors, link))
            .then(AppendText::new(&p.editor_selectors, &suffix, InputMode::Insert))
            .then(AppendText::new(&p.editor_selectors, &suffix, InputMode::Type).within(typing));
        self.run(&cascade)
            .await
            .map_err(|message| PublishError::EditorNotFound {
                message: format!("link not appended: {message}"),
                bundle: None,
            })
    }

    pub(super) async fn submit(&self) -> Result<String, PublishError> {
        let p = self.profile;

        let overlays_clear = self
            .executor
            .confirm(
                self.surface,
                &NoneVisible::new(&p.overlay_selectors),
                Self::secs(self.timing.overlay_wait_secs),
            )
            .await;
        if !overlays_clear {
            warn!("overlay still visible, submitting anyway");
        }

        let query = TextQuery::new(&p.submit_texts)
            .excluding(&p.submit_exclusions)
            .within(&p.dialog_selectors)
            .enabled();
        let cascade = Cascade::new("submit", NoneVisible::new(&p.dialog_selectors))
            .confirm_within(Self::secs(self.timing.submit_confirm_secs))
            .then(ClickTextAt::new(query.clone()))
            .then(ClickFirstVisible::new(&p.submit_selectors))
            .then(DispatchText::new(query))
            .then(KeyboardTraversal::new(&p.submit_texts, 25));
        self.run(&cascade)
            .await
            .map_err(|message| PublishError::SubmissionNotAccepted {
                message,
                bundle: None,
            })
    }
}
