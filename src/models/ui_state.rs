use camino::Utf8PathBuf;
use image::DynamicImage;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use super::classification::ClassificationResult;

/// Message shown when no usable image reference was supplied.
pub const FAILED_TO_GET_IMAGE: &str = "Failed to get image.";

/// Opaque reference to the image a user picked.
///
/// `File` covers gallery picks and camera captures saved to disk. `InMemory`
/// is used when pixels are handed over directly and there is nothing to load.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImageRef {
    File(Utf8PathBuf),
    InMemory(String),
}

impl ImageRef {
    pub fn file(path: impl Into<Utf8PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// An empty path or label cannot identify an image.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::File(path) => !path.as_str().trim().is_empty(),
            Self::InMemory(label) => !label.trim().is_empty(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path),
            Self::InMemory(label) => write!(f, "memory:{}", label),
        }
    }
}

/// Decoded pixel data, shared between states without copying.
#[derive(Clone, PartialEq)]
pub struct Pixels(Arc<DynamicImage>);

impl fmt::Debug for Pixels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pixels({}x{})", self.width(), self.height())
    }
}

impl Pixels {
    pub fn new(image: DynamicImage) -> Self {
        Self(Arc::new(image))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.0
    }

    /// Encode as PNG for transport. Float and 16-bit variants are narrowed to RGBA8
    /// because the PNG encoder does not accept every `DynamicImage` layout.
    pub fn to_png(&self) -> image::ImageResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        match self.0.as_ref() {
            DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_)
            | DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_) => {
                self.0.write_to(&mut buf, image::ImageFormat::Png)?;
            }
            other => {
                DynamicImage::ImageRgba8(other.to_rgba8())
                    .write_to(&mut buf, image::ImageFormat::Png)?;
            }
        }
        Ok(buf.into_inner())
    }
}

/// Coarse tag for a [`UiState`], used for transition validation and logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiPhase {
    Idle,
    ImageSelected,
    Analyzing,
    Success,
    Error,
}

impl UiPhase {
    /// Whether moving from `self` to `next` is one of the allowed transitions.
    ///
    /// `Analyzing -> Analyzing` is both the pixel enrichment self-transition and a
    /// superseding submit. `Error` is reachable from anywhere because a rejected
    /// image reference fails regardless of the current phase.
    pub fn can_transition_to(self, next: UiPhase) -> bool {
        use UiPhase::*;
        match (self, next) {
            (_, Analyzing) => true,
            (_, Error) => true,
            (Idle | Success | Error | ImageSelected, ImageSelected) => true,
            (Analyzing, Success) => true,
            (ImageSelected | Analyzing | Success | Error, Idle) => true,
            (Idle, Idle) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UiPhase::Success | UiPhase::Error)
    }
}

impl fmt::Display for UiPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UiPhase::Idle => "idle",
            UiPhase::ImageSelected => "image-selected",
            UiPhase::Analyzing => "analyzing",
            UiPhase::Success => "success",
            UiPhase::Error => "error",
        };
        f.write_str(name)
    }
}

/// The classification workflow's progress. Exactly one value is live per session.
///
/// Never mutate a `UiState` held by the [`StateManager`](crate::state::StateManager)
/// directly; use its transition methods so subscribers see every change.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum UiState {
    #[default]
    Idle,
    ImageSelected {
        image: ImageRef,
        pixels: Option<Pixels>,
    },
    Analyzing {
        image: ImageRef,
        pixels: Option<Pixels>,
    },
    Success {
        image: ImageRef,
        pixels: Option<Pixels>,
        classification: String,
        identified_object: String,
        reason: String,
    },
    Error {
        image: Option<ImageRef>,
        pixels: Option<Pixels>,
        message: String,
    },
}

impl UiState {
    pub fn phase(&self) -> UiPhase {
        match self {
            UiState::Idle => UiPhase::Idle,
            UiState::ImageSelected { .. } => UiPhase::ImageSelected,
            UiState::Analyzing { .. } => UiPhase::Analyzing,
            UiState::Success { .. } => UiPhase::Success,
            UiState::Error { .. } => UiPhase::Error,
        }
    }

    pub fn image(&self) -> Option<&ImageRef> {
        match self {
            UiState::Idle => None,
            UiState::ImageSelected { image, .. }
            | UiState::Analyzing { image, .. }
            | UiState::Success { image, .. } => Some(image),
            UiState::Error { image, .. } => image.as_ref(),
        }
    }

    pub fn pixels(&self) -> Option<&Pixels> {
        match self {
            UiState::Idle => None,
            UiState::ImageSelected { pixels, .. }
            | UiState::Analyzing { pixels, .. }
            | UiState::Success { pixels, .. }
            | UiState::Error { pixels, .. } => pixels.as_ref(),
        }
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self, UiState::Analyzing { .. })
    }

    /// Build the success state from a parsed result.
    pub fn success(image: ImageRef, pixels: Option<Pixels>, result: ClassificationResult) -> Self {
        UiState::Success {
            image,
            pixels,
            classification: result.classification,
            identified_object: result.identified_object,
            reason: result.reason,
        }
    }

    /// The parsed result carried by a `Success` state.
    pub fn result(&self) -> Option<ClassificationResult> {
        match self {
            UiState::Success {
                classification,
                identified_object,
                reason,
                ..
            } => Some(ClassificationResult {
                classification: classification.clone(),
                identified_object: identified_object.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixels(w: u32, h: u32) -> Pixels {
        Pixels::new(DynamicImage::new_rgb8(w, h))
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(UiState::default(), UiState::Idle);
        assert_eq!(UiState::default().phase(), UiPhase::Idle);
    }

    #[test]
    fn test_image_ref_validity() {
        assert!(ImageRef::file("/tmp/bottle.jpg").is_valid());
        assert!(!ImageRef::file("").is_valid());
        assert!(!ImageRef::InMemory("  ".to_string()).is_valid());
    }

    #[test]
    fn test_allowed_transitions() {
        use UiPhase::*;
        assert!(Idle.can_transition_to(Analyzing));
        assert!(Analyzing.can_transition_to(Analyzing));
        assert!(Analyzing.can_transition_to(Success));
        assert!(Analyzing.can_transition_to(Error));
        assert!(Success.can_transition_to(Idle));
        assert!(Error.can_transition_to(Analyzing));
        assert!(ImageSelected.can_transition_to(Idle));
    }

    #[test]
    fn test_rejected_transitions() {
        use UiPhase::*;
        assert!(!Idle.can_transition_to(Success));
        assert!(!ImageSelected.can_transition_to(Success));
        assert!(!Error.can_transition_to(Success));
        assert!(!Success.can_transition_to(Success));
        assert!(!Analyzing.can_transition_to(ImageSelected));
    }

    #[test]
    fn test_accessors() {
        let image = ImageRef::file("can.png");
        let state = UiState::Analyzing {
            image: image.clone(),
            pixels: Some(pixels(3, 2)),
        };
        assert_eq!(state.image(), Some(&image));
        assert_eq!(state.pixels().map(|p| (p.width(), p.height())), Some((3, 2)));
        assert!(state.is_analyzing());

        let error = UiState::Error {
            image: None,
            pixels: None,
            message: FAILED_TO_GET_IMAGE.to_string(),
        };
        assert!(error.image().is_none());
        assert!(error.phase().is_terminal());
    }

    #[test]
    fn test_success_round_trips_result() {
        let result = ClassificationResult::new("Recycling", "Can", "Aluminium is accepted.");
        let state = UiState::success(ImageRef::file("can.png"), None, result.clone());
        assert_eq!(state.result(), Some(result));
    }

    #[test]
    fn test_png_encoding() {
        let png = pixels(4, 4).to_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");

        let wide = Pixels::new(DynamicImage::new_rgb32f(2, 2));
        assert!(wide.to_png().is_ok());
    }
}
