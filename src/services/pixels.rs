use camino::Utf8Path;
use image::error::LimitErrorKind;
use image::{ImageError, ImageReader, Limits};
use std::io;
use thiserror::Error;

use crate::models::{ImageRef, Pixels};

/// Why pixel data could not be produced. Each kind has its own user message.
#[derive(Error, Debug)]
pub enum PixelLoadError {
    #[error("I/O error reading {image}: {source}")]
    Io {
        image: String,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied reading {0}")]
    Permission(String),

    #[error("Image {image} exceeds decoder limits: {detail}")]
    TooLarge { image: String, detail: String },

    #[error("Failed to decode {image}: {detail}")]
    Decode { image: String, detail: String },
}

impl PixelLoadError {
    pub fn user_message(&self) -> &'static str {
        match self {
            PixelLoadError::Io { .. } => "Error loading image file.",
            PixelLoadError::Permission(_) => "Permission error loading image.",
            PixelLoadError::TooLarge { .. } => "Image is too large.",
            PixelLoadError::Decode { .. } => "Could not load image.",
        }
    }

    fn from_io(image: &ImageRef, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            PixelLoadError::Permission(image.to_string())
        } else {
            PixelLoadError::Io {
                image: image.to_string(),
                source,
            }
        }
    }

    fn from_image(image: &ImageRef, err: ImageError) -> Self {
        match err {
            ImageError::IoError(source) => Self::from_io(image, source),
            ImageError::Limits(limit) => match limit.kind() {
                LimitErrorKind::InsufficientMemory | LimitErrorKind::DimensionError => {
                    PixelLoadError::TooLarge {
                        image: image.to_string(),
                        detail: limit.to_string(),
                    }
                }
                _ => PixelLoadError::Decode {
                    image: image.to_string(),
                    detail: limit.to_string(),
                },
            },
            other => PixelLoadError::Decode {
                image: image.to_string(),
                detail: other.to_string(),
            },
        }
    }
}

/// Turns an [`ImageRef`] into decoded pixels. Blocking; call from a blocking context.
#[cfg_attr(test, mockall::automock)]
pub trait PixelLoader: Send + Sync {
    fn load(&self, image: &ImageRef) -> Result<Pixels, PixelLoadError>;
}

/// Loads images from the local filesystem with a decoder allocation cap.
#[derive(Debug, Clone)]
pub struct FsPixelLoader {
    max_alloc_bytes: u64,
}

impl FsPixelLoader {
    pub fn new(max_image_mb: u64) -> Self {
        Self {
            max_alloc_bytes: max_image_mb.saturating_mul(1024 * 1024),
        }
    }

    fn decode_file(&self, image: &ImageRef, path: &Utf8Path) -> Result<Pixels, PixelLoadError> {
        let mut reader = ImageReader::open(path)
            .map_err(|e| PixelLoadError::from_io(image, e))?
            .with_guessed_format()
            .map_err(|e| PixelLoadError::from_io(image, e))?;

        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_alloc_bytes);
        reader.limits(limits);

        let decoded = reader
            .decode()
            .map_err(|e| PixelLoadError::from_image(image, e))?;

        tracing::debug!(
            "Decoded {} ({}x{})",
            path,
            decoded.width(),
            decoded.height()
        );
        Ok(Pixels::new(decoded))
    }
}

impl PixelLoader for FsPixelLoader {
    fn load(&self, image: &ImageRef) -> Result<Pixels, PixelLoadError> {
        match image {
            ImageRef::File(path) => self.decode_file(image, path),
            // In-memory references arrive with their pixels; there is nothing on disk
            ImageRef::InMemory(_) => Err(PixelLoadError::Io {
                image: image.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no backing file"),
            }),
        }
    }
}
