//! Media and document attachment sub-flows.
//!
//! Both are two-phase: supply the file through whichever affordance the
//! surface currently exposes, then wait for an *enabled* confirmation control
//! before clicking it. Generic progress elements are never used as the
//! upload-complete signal; unrelated progress bars elsewhere on the page make
//! them unreliable.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::Composer;
use crate::cascade::Cascade;
use crate::cascade::oracle::{AnyOf, AnyVisible, ControlAbsent, ControlPresent, FieldHasValue};
use crate::cascade::strategy::{
    ClickFirstVisible, ClickTextAt, DispatchFirstVisible, DispatchText, Fill, InputMode,
    KeyboardTraversal, ReplaceText, Sequence, SetFiles, Settle,
};
use crate::error::PublishError;
use crate::record::PublishRecord;
use crate::surface::{SurfaceProfile, TextQuery};

fn failure(message: String) -> PublishError {
    PublishError::AttachmentFailure {
        message,
        bundle: None,
    }
}

/// Title derived from a document's file name: separators become spaces and
/// each word is capitalised. `q3_board-deck.pdf` becomes `Q3 Board Deck`.
fn document_title(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().replace(['_', '-'], " "))
        .unwrap_or_default();
    let words: Vec<String> = stem
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() {
        "Document".to_string()
    } else {
        words.join(" ")
    }
}

impl Composer<'_> {
    pub(super) async fn attach(&self, record: &PublishRecord) -> Result<String, PublishError> {
        match &record.document {
            Some(document) => self.attach_document(document).await,
            None => self.attach_media(&record.media).await,
        }
    }

    async fn attach_media(&self, files: &[PathBuf]) -> Result<String, PublishError> {
        let p = self.profile;
        let buttons = SurfaceProfile::label_selectors(&p.media_labels);
        let confirm = TextQuery::new(&p.media_confirm_texts).excluding(&p.confirm_exclusions);
        info!(count = files.len(), "attaching media");

        let supply = Cascade::new("supply media", ControlPresent::new(confirm.clone()))
            .then(
                Sequence::new("toolbar-media")
                    .step(DispatchFirstVisible::new(&buttons))
                    .step(Settle(self.timing.settle()))
                    .step(SetFiles::new(&p.file_input_selectors, files)),
            )
            .then(
                Sequence::new("overflow-media")
                    .step(ClickFirstVisible::new(&p.overflow_selectors))
                    .step(Settle(self.timing.settle()))
                    .step(DispatchFirstVisible::new(&buttons))
                    .step(Settle(self.timing.settle()))
                    .step(SetFiles::new(&p.file_input_selectors, files)),
            )
            .then(SetFiles::new(&p.file_input_selectors, files));
        self.run(&supply)
            .await
            .map_err(|m| failure(format!("media not accepted: {m}")))?;

        let ceiling = Self::secs(self.timing.media_upload_secs);
        let ready = self
            .executor
            .confirm(self.surface, &ControlPresent::new(confirm.clone().enabled()), ceiling)
            .await;
        if !ready {
            return Err(failure(format!(
                "media upload did not finish within {}s",
                ceiling.as_secs()
            )));
        }

        let finish = Cascade::new("confirm media", ControlAbsent::new(confirm.clone()))
            .then(ClickTextAt::new(confirm.clone().enabled()))
            .then(DispatchText::new(confirm.enabled()))
            .then(KeyboardTraversal::new(&p.media_confirm_texts, 15).after("Escape"));
        self.run(&finish)
            .await
            .map_err(|m| failure(format!("media confirmation not accepted: {m}")))
    }

    async fn attach_document(&self, document: &Path) -> Result<String, PublishError> {
        let p = self.profile;
        let files = [document.to_path_buf()];
        let buttons = SurfaceProfile::label_selectors(&p.document_labels);
        let done = TextQuery::new(&p.document_confirm_texts).excluding(&p.confirm_exclusions);
        let title = document_title(document);
        info!(file = %document.display(), %title, "attaching document");

        let opened = AnyOf(vec![
            Box::new(AnyVisible::new(&p.title_selectors)),
            Box::new(ControlPresent::new(done.clone())),
        ]);
        let supply = Cascade::new("supply document", opened)
            .then(
                Sequence::new("toolbar-document")
                    .step(ClickFirstVisible::new(&buttons))
                    .step(Settle(self.timing.settle()))
                    .step(SetFiles::new(&p.file_input_selectors, &files)),
            )
            .then(
                Sequence::new("overflow-document")
                    .step(ClickFirstVisible::new(&p.overflow_selectors))
                    .step(Settle(self.timing.settle()))
                    .step(ClickFirstVisible::new(&buttons))
                    .step(Settle(self.timing.settle()))
                    .step(SetFiles::new(&p.file_input_selectors, &files)),
            )
            .then(
                Sequence::new("overflow-text-document")
                    .step(ClickTextAt::new(
                        TextQuery::new(&p.overflow_texts).within(&p.dialog_selectors),
                    ))
                    .step(Settle(self.timing.settle()))
                    .step(DispatchFirstVisible::new(&buttons))
                    .step(Settle(self.timing.settle()))
                    .step(SetFiles::new(&p.file_input_selectors, &files)),
            )
            .then(
                Sequence::new("choose-file")
                    .step(DispatchText::new(TextQuery::new(&p.choose_file_texts)))
                    .step(Settle(self.timing.settle()))
                    .step(SetFiles::new(&p.file_input_selectors, &files)),
            )
            .then(SetFiles::new(&p.file_input_selectors, &files));
        self.run(&supply)
            .await
            .map_err(|m| failure(format!("document not accepted: {m}")))?;

        // Done stays disabled until the title is non-empty. The title field
        // can render after Done does, so wait for it before giving up on it.
        let title_shown = self
            .executor
            .confirm(
                self.surface,
                &AnyVisible::new(&p.title_selectors),
                Self::secs(self.timing.title_appear_secs),
            )
            .await;
        let detail = if title_shown {
            let titled = Cascade::new("title document", FieldHasValue::new(&p.title_selectors, &title))
                .then(Fill::new(&p.title_selectors, &title))
                .then(ReplaceText::new(&p.title_selectors, &title, InputMode::Type));
            self.run(&titled)
                .await
                .map_err(|m| failure(format!("document title {title:?} could not be set: {m}")))?;
            format!("after setting title {title:?}")
        } else {
            debug!("no document title field appeared");
            "and no title field appeared".to_string()
        };

        let ceiling = Self::secs(self.timing.document_upload_secs);
        let enabled = self
            .executor
            .confirm(self.surface, &ControlPresent::new(done.clone().enabled()), ceiling)
            .await;
        if !enabled {
            return Err(failure(format!(
                "document processing did not finish within {}s: Done never enabled {detail}",
                ceiling.as_secs()
            )));
        }

        let finish = Cascade::new("confirm document", ControlAbsent::new(done.clone()))
            .then(ClickTextAt::new(done.clone().enabled()))
            .then(DispatchText::new(done.enabled()))
            .then(KeyboardTraversal::new(&p.document_confirm_texts, 15));
        self.run(&finish)
            .await
            .map_err(|m| failure(format!("document dialog did not close: {m}")))
    }
}
