//! Image intake and composition requests.

pub mod intake;
pub mod prompt;
mod provider;
pub mod providers;
mod types;

pub use intake::{acquire, read_file, PreviewStore};
pub use provider::{Compositor, CompositorExt};
pub use types::{
    CompositionConfig, DataUri, ImageFormat, PreviewRef, RawFile, UploadedImage,
};
