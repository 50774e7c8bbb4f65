//! Composition backends.

mod gemini;

pub use gemini::{
    GeminiCompositor, GeminiCompositorBuilder, GeminiModel, API_KEY_ENV_VARS, DEFAULT_BASE_URL,
};
