//! Where the image comes from, and decoding it into raw pixels.

use snafu::ResultExt as _;

use crate::errors::{ImageLoadSnafu, ImageReadSnafu, ParticleImageError};

/// The source of the image to be turned into particles.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImageSource {
    /// An image file on disk.
    Path(std::path::PathBuf),
    /// Already-read, still encoded, image bytes (PNG, JPEG).
    Bytes(std::sync::Arc<[u8]>),
}

impl ImageSource {
    /// Something to tell a human about where the image came from.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }

    /// Read and decode the image. Decoding happens once, the resulting buffer is never touched
    /// again, it is only ever resampled.
    pub fn decode_blocking(&self) -> Result<image::RgbaImage, ParticleImageError> {
        let origin = self.describe();
        let decoded = match self {
            Self::Path(path) => {
                let bytes = std::fs::read(path).context(ImageReadSnafu { path })?;
                image::load_from_memory(&bytes)
            }
            Self::Bytes(bytes) => image::load_from_memory(bytes),
        }
        .context(ImageLoadSnafu { origin: &origin })?;

        tracing::debug!(
            "Decoded {origin} ({}x{})",
            decoded.width(),
            decoded.height()
        );
        Ok(decoded.to_rgba8())
    }

    /// Decode the image off the async runtime's thread.
    pub async fn decode(self) -> Result<image::RgbaImage, ParticleImageError> {
        tokio::task::spawn_blocking(move || self.decode_blocking())
            .await
            .with_whatever_context::<_, _, ParticleImageError>(|_| {
                "Image decoding task didn't finish"
            })?
    }
}

impl From<std::path::PathBuf> for ImageSource {
    fn from(path: std::path::PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}
