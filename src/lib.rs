#![warn(missing_docs)]
//! Lumina - photo composition studio.
//!
//! Places the subject of one image onto the backdrop of another by sending
//! both, together with a fixed retouching prompt, to a multimodal image
//! model. Cut-out, relighting and shadow synthesis are done by the model.
//!
//! # Quick Start
//!
//! ```no_run
//! use lumina::{CancelToken, GeminiCompositor, Slot, Studio};
//!
//! #[tokio::main]
//! async fn main() -> lumina::Result<()> {
//!     let compositor = GeminiCompositor::builder().build()?;
//!     let mut studio = Studio::new(compositor);
//!
//!     studio.select_image(Slot::Backdrop, &lumina::read_file("beach.jpg")?)?;
//!     studio.select_image(Slot::Asset, &lumina::read_file("dog.png")?)?;
//!     studio.set_instruction("Light comes from the left")?;
//!
//!     studio.generate(&CancelToken::new()).await?;
//!     if let Some(path) = studio.download(".")? {
//!         println!("saved {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Layout
//!
//! - [`image`]: intake (validation, previews, base64), prompt text and the
//!   [`Compositor`] backends.
//! - [`session`]: the serializable session state and its transition
//!   function.
//! - [`Studio`]: runs the session against a backend.
//! - [`download`]: writes a result to disk.

mod cancel;
pub mod download;
mod error;
pub mod image;
pub mod session;
mod studio;

pub use cancel::CancelToken;
pub use error::{LuminaError, Result, GENERIC_FAILURE_MESSAGE};
pub use image::intake::{acquire, read_file};
pub use image::providers::{GeminiCompositor, GeminiCompositorBuilder, GeminiModel};
pub use image::{
    CompositionConfig, Compositor, CompositorExt, DataUri, ImageFormat, PreviewRef, PreviewStore,
    RawFile, UploadedImage,
};
pub use session::{ProcessingStatus, SessionState, Slot};
pub use studio::Studio;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::error::{LuminaError, Result};
    pub use crate::image::providers::GeminiCompositor;
    pub use crate::image::{Compositor, CompositorExt, RawFile};
    pub use crate::session::{ProcessingStatus, Slot};
    pub use crate::studio::Studio;
}
