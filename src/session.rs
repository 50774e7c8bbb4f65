//! Session state and its transition function.
//!
//! All mutable session state lives in one serializable [`SessionState`].
//! Changes go through [`SessionState::update`], which applies a
//! [`Message`] and returns the side effects the caller must carry out.
//! Nothing here performs I/O.

use crate::error::{LuminaError, Result};
use crate::image::{CompositionConfig, PreviewRef, UploadedImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing status shown by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    /// Nothing has been generated yet, or the last request was cancelled.
    #[default]
    Idle,
    /// Reserved; file intake is synchronous so this is never entered.
    Uploading,
    /// A composition request is in flight.
    Processing,
    /// The last request produced an image.
    Completed,
    /// The last request failed.
    Error,
}

/// One of the two image slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// Background scene.
    Backdrop,
    /// Image holding the subject to composite.
    Asset,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backdrop => write!(f, "backdrop"),
            Self::Asset => write!(f, "asset"),
        }
    }
}

/// Identifies one generate attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything needed to run one composition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    /// Request this job belongs to.
    pub request: RequestId,
    /// Backdrop image at the time generate was triggered.
    pub backdrop: UploadedImage,
    /// Asset image at the time generate was triggered.
    pub asset: UploadedImage,
    /// Options built for this request.
    pub config: CompositionConfig,
}

/// Input events for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A file was accepted into a slot.
    ImageSelected(Slot, UploadedImage),
    /// The user removed the image from a slot.
    ImageCleared(Slot),
    /// The instruction text field changed.
    InstructionChanged(String),
    /// The user pressed generate.
    GenerateRequested,
    /// A request finished with an image.
    GenerationSucceeded {
        /// Request that finished.
        request: RequestId,
        /// Generated image as a data URI.
        image: String,
    },
    /// A request failed.
    GenerationFailed {
        /// Request that failed.
        request: RequestId,
        /// User-facing failure text.
        message: String,
    },
    /// A request was cancelled before it finished.
    GenerationCancelled {
        /// Request that was cancelled.
        request: RequestId,
    },
    /// The user dismissed the current result.
    Discard,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Release a preview reference that is no longer displayed.
    RevokePreview(PreviewRef),
    /// Start a composition request.
    StartGeneration(GenerationJob),
}

/// The complete state of one studio session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    status: ProcessingStatus,
    backdrop: Option<UploadedImage>,
    asset: Option<UploadedImage>,
    instruction: String,
    result: Option<String>,
    error: Option<String>,
    in_flight: Option<RequestId>,
    next_request: u64,
}

impl SessionState {
    /// Creates an idle session with empty slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current processing status.
    pub fn status(&self) -> ProcessingStatus {
        self.status
    }

    /// Image in the given slot.
    pub fn image(&self, slot: Slot) -> Option<&UploadedImage> {
        match slot {
            Slot::Backdrop => self.backdrop.as_ref(),
            Slot::Asset => self.asset.as_ref(),
        }
    }

    /// Raw instruction text as typed.
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Last generated image as a data URI.
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// Message of the last failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Request currently in flight.
    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    /// True when both slots are filled and nothing is in flight.
    pub fn can_generate(&self) -> bool {
        self.backdrop.is_some() && self.asset.is_some() && self.in_flight.is_none()
    }

    /// Applies a message and returns the effects to perform.
    ///
    /// A rejected message (generate while a slot is empty or while another
    /// request is in flight) returns an error and leaves the state untouched.
    pub fn update(&mut self, message: Message) -> Result<Vec<Effect>> {
        match message {
            Message::ImageSelected(slot, image) => {
                let previous = self.slot_mut(slot).replace(image);
                Ok(previous
                    .map(|old| vec![Effect::RevokePreview(old.preview)])
                    .unwrap_or_default())
            }
            Message::ImageCleared(slot) => Ok(self
                .slot_mut(slot)
                .take()
                .map(|old| vec![Effect::RevokePreview(old.preview)])
                .unwrap_or_default()),
            Message::InstructionChanged(text) => {
                self.instruction = text;
                Ok(Vec::new())
            }
            Message::GenerateRequested => self.start_generation(),
            Message::GenerationSucceeded { request, image } => {
                if self.settle(request) {
                    self.status = ProcessingStatus::Completed;
                    self.result = Some(image);
                }
                Ok(Vec::new())
            }
            Message::GenerationFailed { request, message } => {
                if self.settle(request) {
                    self.status = ProcessingStatus::Error;
                    self.error = Some(message);
                }
                Ok(Vec::new())
            }
            Message::GenerationCancelled { request } => {
                if self.settle(request) {
                    self.status = ProcessingStatus::Idle;
                }
                Ok(Vec::new())
            }
            Message::Discard => {
                self.result = None;
                Ok(Vec::new())
            }
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<UploadedImage> {
        match slot {
            Slot::Backdrop => &mut self.backdrop,
            Slot::Asset => &mut self.asset,
        }
    }

    fn start_generation(&mut self) -> Result<Vec<Effect>> {
        if self.in_flight.is_some() {
            return Err(LuminaError::Busy);
        }
        let (backdrop, asset) = match (&self.backdrop, &self.asset) {
            (Some(b), Some(a)) => (b.clone(), a.clone()),
            (None, _) => return Err(LuminaError::MissingImage(Slot::Backdrop.to_string())),
            (_, None) => return Err(LuminaError::MissingImage(Slot::Asset.to_string())),
        };

        self.next_request += 1;
        let request = RequestId(self.next_request);
        self.in_flight = Some(request);
        self.status = ProcessingStatus::Processing;
        self.error = None;

        Ok(vec![Effect::StartGeneration(GenerationJob {
            request,
            backdrop,
            asset,
            config: CompositionConfig::new(&self.instruction),
        })])
    }

    /// Clears the in-flight marker if `request` is the one in flight.
    fn settle(&mut self, request: RequestId) -> bool {
        if self.in_flight == Some(request) {
            self.in_flight = None;
            true
        } else {
            tracing::debug!(%request, "ignoring completion of stale request");
            false
        }
    }
}
