//! Compositor trait and utilities.

use crate::cancel::CancelToken;
use crate::error::{LuminaError, Result};
use crate::image::types::{CompositionConfig, DataUri, UploadedImage};
use async_trait::async_trait;

/// A backend that composites a subject onto a backdrop.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Sends both images and the instruction as one request and returns the
    /// first generated image as a data URI.
    async fn compose(
        &self,
        backdrop: &UploadedImage,
        asset: &UploadedImage,
        config: &CompositionConfig,
    ) -> Result<DataUri>;

    /// Returns the model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Checks if the backend is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

/// Extension trait adding cancellation at the request boundary.
#[async_trait]
pub trait CompositorExt: Compositor {
    /// Runs [`Compositor::compose`], dropping the request future as soon as
    /// `cancel` fires.
    async fn compose_until_cancelled(
        &self,
        backdrop: &UploadedImage,
        asset: &UploadedImage,
        config: &CompositionConfig,
        cancel: &CancelToken,
    ) -> Result<DataUri> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(model = self.model(), "composition request cancelled");
                Err(LuminaError::Cancelled)
            }
            result = self.compose(backdrop, asset, config) => result,
        }
    }
}

impl<T: Compositor> CompositorExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::intake::{acquire, PreviewStore};
    use crate::image::types::RawFile;
    use std::time::Duration;

    struct SlowCompositor;

    #[async_trait]
    impl Compositor for SlowCompositor {
        async fn compose(
            &self,
            _backdrop: &UploadedImage,
            _asset: &UploadedImage,
            _config: &CompositionConfig,
        ) -> Result<DataUri> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(DataUri::new("image/png", "AAAA"))
        }

        fn model(&self) -> &str {
            "slow"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn image(name: &str, previews: &mut PreviewStore) -> UploadedImage {
        acquire(&RawFile::new(name, "image/png", vec![1, 2, 3]), previews).unwrap()
    }

    #[tokio::test]
    async fn test_compose_until_cancelled_aborts_request() {
        let mut previews = PreviewStore::new();
        let backdrop = image("a.png", &mut previews);
        let asset = image("b.png", &mut previews);
        let cancel = CancelToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            SlowCompositor.compose_until_cancelled(
                &backdrop,
                &asset,
                &CompositionConfig::default(),
                &cancel,
            ),
        )
        .await
        .expect("cancellation should end the request early");

        assert!(matches!(result, Err(LuminaError::Cancelled)));
    }
}
