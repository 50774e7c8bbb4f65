//! Studio: drives a [`SessionState`] against a [`Compositor`].
//!
//! The studio owns the session state, the preview store and the backend.
//! It turns user actions into [`Message`]s, carries out the returned
//! [`Effect`]s, and runs generation requests.

use crate::cancel::CancelToken;
use crate::download;
use crate::error::{LuminaError, Result};
use crate::image::{acquire, Compositor, CompositorExt, PreviewStore, RawFile};
use crate::session::{Effect, GenerationJob, Message, ProcessingStatus, SessionState, Slot};
use std::path::{Path, PathBuf};

/// A composition session bound to a backend.
pub struct Studio<C> {
    compositor: C,
    state: SessionState,
    previews: PreviewStore,
}

impl<C: Compositor> Studio<C> {
    /// Creates an idle studio.
    pub fn new(compositor: C) -> Self {
        Self {
            compositor,
            state: SessionState::new(),
            previews: PreviewStore::new(),
        }
    }

    /// Current session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Preview references issued so far.
    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    /// The backend requests are sent to.
    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    /// Accepts a file into a slot.
    ///
    /// Rejected or unreadable files leave the slot untouched; the error is
    /// logged and returned so callers may surface it.
    pub fn select_image(&mut self, slot: Slot, file: &RawFile) -> Result<()> {
        let image = match acquire(file, &mut self.previews) {
            Ok(image) => image,
            Err(e @ LuminaError::UnsupportedMediaType(_)) => {
                tracing::warn!(%slot, "ignoring non-image file: {e}");
                return Err(e);
            }
            Err(e) => {
                tracing::error!(%slot, file = %file.name, "failed to process file: {e}");
                return Err(e);
            }
        };
        self.dispatch(Message::ImageSelected(slot, image))?;
        Ok(())
    }

    /// Removes the image from a slot.
    pub fn clear_image(&mut self, slot: Slot) -> Result<()> {
        self.dispatch(Message::ImageCleared(slot))?;
        Ok(())
    }

    /// Replaces the instruction text.
    pub fn set_instruction(&mut self, text: impl Into<String>) -> Result<()> {
        self.dispatch(Message::InstructionChanged(text.into()))?;
        Ok(())
    }

    /// Clears the current result.
    pub fn discard(&mut self) -> Result<()> {
        self.dispatch(Message::Discard)?;
        Ok(())
    }

    /// Moves the session to processing and returns the job to run.
    ///
    /// Fails with [`LuminaError::MissingImage`] or [`LuminaError::Busy`]
    /// without changing state.
    pub fn begin_generation(&mut self) -> Result<GenerationJob> {
        self.dispatch(Message::GenerateRequested)?
            .ok_or_else(|| LuminaError::UnexpectedResponse("generate produced no job".into()))
    }

    /// Runs a job against the backend and reports how it ended.
    pub async fn run_job(&self, job: &GenerationJob, cancel: &CancelToken) -> Message {
        let request = job.request;
        match self
            .compositor
            .compose_until_cancelled(&job.backdrop, &job.asset, &job.config, cancel)
            .await
        {
            Ok(image) => Message::GenerationSucceeded {
                request,
                image: image.to_string(),
            },
            Err(LuminaError::Cancelled) => Message::GenerationCancelled { request },
            Err(e) => {
                tracing::error!(%request, model = self.compositor.model(), "composition failed: {e}");
                Message::GenerationFailed {
                    request,
                    message: e.user_message(),
                }
            }
        }
    }

    /// Applies the outcome of [`run_job`](Self::run_job).
    pub fn finish(&mut self, outcome: Message) -> Result<ProcessingStatus> {
        self.dispatch(outcome)?;
        Ok(self.state.status())
    }

    /// Generates a composition from the two slots and the instruction.
    ///
    /// Resolves to the terminal status: `Completed`, `Error`, or `Idle` if
    /// `cancel` fired first.
    pub async fn generate(&mut self, cancel: &CancelToken) -> Result<ProcessingStatus> {
        let job = self.begin_generation()?;
        let outcome = self.run_job(&job, cancel).await;
        self.finish(outcome)
    }

    /// Saves the current result into `dir`. Returns `None` if there is none.
    pub fn download(&self, dir: impl AsRef<Path>) -> Result<Option<PathBuf>> {
        self.state
            .result()
            .map(|uri| download::save_composition(uri, dir))
            .transpose()
    }

    /// Applies a message, performs preview effects and hands back a
    /// generation job if one was started.
    fn dispatch(&mut self, message: Message) -> Result<Option<GenerationJob>> {
        let mut job = None;
        for effect in self.state.update(message)? {
            match effect {
                Effect::RevokePreview(preview) => {
                    self.previews.revoke(preview);
                }
                Effect::StartGeneration(started) => job = Some(started),
            }
        }
        Ok(job)
    }
}
