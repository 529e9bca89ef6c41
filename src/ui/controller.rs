// Classifier Controller - Turns user actions into analysis cycles
//
// This module contains the ClassifierController which coordinates between:
// - StateManager (session state and change events)
// - PixelLoader (blocking image decode)
// - ClassificationOracle (remote model call)
// - ResponseParser (oracle text -> ClassificationResult)
//
// Every failure, including a panic inside the analysis task, ends as an
// `Error` state. Nothing escapes to the caller.

use crate::metrics::Metrics;
use crate::models::{ClassificationResult, ImageRef, Pixels, UiState};
use crate::services::{
    ClassificationOracle, ClassifyError, CLASSIFY_PROMPT, OracleRequest, PixelLoader,
    parse_classification,
};
use crate::state::StateManager;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Entry point for the presentation layer.
///
/// Policy for overlapping requests: a new submit supersedes the one in flight.
/// The superseded task is aborted as soon as it observes the generation change,
/// and anything it still produces is dropped by the [`StateManager`] generation guard.
///
/// # Example
/// ```ignore
/// let state = Arc::new(StateManager::new());
/// let controller = ClassifierController::new(
///     state.clone(),
///     Arc::new(FsPixelLoader::new(512)),
///     Some(Arc::new(GeminiOracle::from_settings(&settings)?)),
///     Arc::new(Metrics::new()),
///     runtime.handle().clone(),
/// );
/// if let Some(task) = controller.submit_image(Some(ImageRef::file("bottle.jpg"))) {
///     task.await?;
/// }
/// println!("{:?}", state.snapshot());
/// ```
pub struct ClassifierController {
    state: Arc<StateManager>,
    loader: Arc<dyn PixelLoader>,

    /// `None` when no credential was available at startup
    oracle: Option<Arc<dyn ClassificationOracle>>,

    metrics: Arc<Metrics>,

    /// Handle to the tokio runtime for spawning analysis tasks
    tokio_handle: tokio::runtime::Handle,
}

impl ClassifierController {
    pub fn new(
        state: Arc<StateManager>,
        loader: Arc<dyn PixelLoader>,
        oracle: Option<Arc<dyn ClassificationOracle>>,
        metrics: Arc<Metrics>,
        tokio_handle: tokio::runtime::Handle,
    ) -> Self {
        if oracle.is_none() {
            tracing::warn!("Classifier controller running without an oracle");
        }
        Self {
            state,
            loader,
            oracle,
            metrics,
            tokio_handle,
        }
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn is_oracle_ready(&self) -> bool {
        self.oracle.is_some()
    }

    /// Start a fresh analysis of `image`, superseding whatever is in flight.
    ///
    /// A missing or blank reference moves straight to `Error` with no image.
    /// Returns the spawned task, or `None` when the cycle ended synchronously.
    pub fn submit_image(&self, image: Option<ImageRef>) -> Option<JoinHandle<()>> {
        match image.filter(ImageRef::is_valid) {
            Some(image) => self.start(image, None),
            None => {
                self.reject();
                None
            }
        }
    }

    /// Start an analysis of pixels that are already decoded (e.g. a camera frame).
    pub fn submit_pixels(&self, pixels: Pixels) -> Option<JoinHandle<()>> {
        self.start(ImageRef::InMemory("camera".to_string()), Some(pixels))
    }

    /// Show an image without analysing it. Ignored while a request is in flight.
    pub fn select_image(&self, image: Option<ImageRef>) -> bool {
        match image.filter(ImageRef::is_valid) {
            Some(image) => self.state.select_image(image, None).is_some(),
            None => {
                self.reject();
                false
            }
        }
    }

    /// Analyse the image picked with [`select_image`](Self::select_image).
    pub fn analyze_selected(&self) -> Option<JoinHandle<()>> {
        let selected = self.state.read(|state| match state {
            UiState::ImageSelected { image, pixels } => Some((image.clone(), pixels.clone())),
            _ => None,
        });
        match selected {
            Some((image, pixels)) => self.start(image, pixels),
            None => {
                tracing::warn!("analyze_selected called with no selected image");
                None
            }
        }
    }

    /// Return to `Idle`, abandoning any request in flight.
    pub fn clear(&self) {
        let was_analyzing = self.state.read(UiState::is_analyzing);
        if self.state.clear().is_some() && was_analyzing {
            self.metrics.record_superseded();
        }
    }

    fn reject(&self) {
        let was_analyzing = self.state.read(UiState::is_analyzing);
        tracing::warn!("{}", ClassifyError::ImageAcquisitionFailed);
        self.state.reject_image();
        if was_analyzing {
            self.metrics.record_superseded();
        }
        self.metrics.record_failed();
    }

    fn start(&self, image: ImageRef, pixels: Option<Pixels>) -> Option<JoinHandle<()>> {
        let was_analyzing = self.state.read(UiState::is_analyzing);
        let generation = self.state.begin_analysis(image.clone(), pixels.clone());
        if was_analyzing {
            self.metrics.record_superseded();
        }
        self.metrics.record_request_started();

        tracing::info!("Analysis {} started for {}", generation, image);

        let Some(oracle) = self.oracle.clone() else {
            let err = ClassifyError::OracleNotConfigured;
            tracing::error!("Analysis {} failed: {}", generation, err);
            if self.state.fail(generation, err.user_message()).is_some() {
                self.metrics.record_failed();
            }
            return None;
        };

        let job = AnalysisJob {
            state: Arc::clone(&self.state),
            loader: Arc::clone(&self.loader),
            oracle,
            metrics: Arc::clone(&self.metrics),
            generation,
            image,
            pixels,
        };
        let cancel_rx = self.state.watch_generation();

        Some(self.tokio_handle.spawn(job.run(cancel_rx)))
    }
}

/// One analysis cycle, owned by its background task.
struct AnalysisJob {
    state: Arc<StateManager>,
    loader: Arc<dyn PixelLoader>,
    oracle: Arc<dyn ClassificationOracle>,
    metrics: Arc<Metrics>,
    generation: u64,
    image: ImageRef,
    pixels: Option<Pixels>,
}

impl AnalysisJob {
    /// Race the analysis against supersession and publish the outcome.
    ///
    /// The analysis runs in its own task so that a panic surfaces as a `JoinError`
    /// here instead of unwinding through the session.
    async fn run(self, mut cancel_rx: watch::Receiver<u64>) {
        let generation = self.generation;
        let state = Arc::clone(&self.state);
        let metrics = Arc::clone(&self.metrics);
        let image = self.image.clone();

        let work = tokio::spawn(self.analyze());
        let abort = work.abort_handle();

        let joined = tokio::select! {
            joined = work => joined,
            _ = cancel_rx.wait_for(|current| *current != generation) => {
                abort.abort();
                tracing::info!("Analysis {} for {} superseded", generation, image);
                return;
            }
        };

        let outcome = joined.unwrap_or_else(|e| {
            let detail = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            Err(ClassifyError::Unexpected(detail))
        });

        match outcome {
            Ok(result) => {
                tracing::info!(
                    "Analysis {} classified {} as '{}' ({})",
                    generation,
                    result.identified_object(),
                    result.classification(),
                    result.result_type()
                );
                if state.complete(generation, result).is_some() {
                    metrics.record_classified();
                }
            }
            Err(err) => {
                tracing::error!("Analysis {} for {} failed: {}", generation, image, err);
                if state.fail(generation, err.user_message()).is_some() {
                    metrics.record_failed();
                }
            }
        }
    }

    async fn analyze(self) -> Result<ClassificationResult, ClassifyError> {
        let pixels = match self.pixels {
            Some(pixels) => pixels,
            None => {
                let loader = Arc::clone(&self.loader);
                let image = self.image.clone();
                let pixels = tokio::task::spawn_blocking(move || loader.load(&image))
                    .await
                    .map_err(|e| ClassifyError::Unexpected(format!("Pixel loader task failed: {}", e)))??;
                self.state.attach_pixels(self.generation, pixels.clone());
                pixels
            }
        };

        let request = OracleRequest {
            pixels,
            prompt: CLASSIFY_PROMPT.to_string(),
        };

        let start = Instant::now();
        let reply = self.oracle.generate(request).await;
        self.metrics.record_oracle_time(start.elapsed());
        let reply = reply?;

        let Some(text) = reply.usable_text() else {
            return Err(ClassifyError::OracleResponseBlocked {
                block_reason: reply.block_reason.clone(),
                finish_reason: reply.finish_reason.clone(),
            });
        };

        tracing::debug!("Oracle raw response ({} chars): {:?}", text.len(), text);

        parse_classification(text).ok_or(ClassifyError::ResponseParseFailed)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FAILED_TO_GET_IMAGE, UiPhase};
    use crate::services::oracle::{MockClassificationOracle, OracleReply};
    use crate::services::pixels::MockPixelLoader;

    fn pixels() -> Pixels {
        Pixels::new(image::DynamicImage::new_rgb8(4, 4))
    }

    fn controller(
        loader: MockPixelLoader,
        oracle: Option<MockClassificationOracle>,
    ) -> (ClassifierController, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        let controller = ClassifierController::new(
            Arc::new(StateManager::new()),
            Arc::new(loader),
            oracle.map(|o| Arc::new(o) as Arc<dyn ClassificationOracle>),
            Arc::clone(&metrics),
            tokio::runtime::Handle::current(),
        );
        (controller, metrics)
    }

    fn oracle_replying(text: &'static str) -> MockClassificationOracle {
        let mut oracle = MockClassificationOracle::new();
        oracle
            .expect_generate()
            .times(1)
            .returning(move |_| Ok(OracleReply::text(text)));
        oracle
    }

    #[tokio::test]
    async fn test_submit_image_success() {
        let mut loader = MockPixelLoader::new();
        loader.expect_load().times(1).returning(|_| Ok(pixels()));
        let oracle =
            oracle_replying("Object: Can\nClassification: Recycling\nReason: Aluminium.");
        let (controller, metrics) = controller(loader, Some(oracle));

        let task = controller
            .submit_image(Some(ImageRef::file("can.jpg")))
            .unwrap();
        task.await.unwrap();

        let state = controller.state().snapshot();
        assert_eq!(state.phase(), UiPhase::Success);
        assert!(state.pixels().is_some());
        assert_eq!(state.result().unwrap().identified_object(), "Can");
        assert_eq!(metrics.snapshot().requests_classified, 1);
        assert_eq!(metrics.snapshot().oracle_calls, 1);
    }

    #[tokio::test]
    async fn test_missing_image_reference() {
        let mut loader = MockPixelLoader::new();
        loader.expect_load().never();
        let (controller, metrics) = controller(loader, None);

        assert!(controller.submit_image(None).is_none());
        assert!(controller.submit_image(Some(ImageRef::file(" "))).is_none());

        assert_eq!(
            controller.state().snapshot(),
            UiState::Error {
                image: None,
                pixels: None,
                message: FAILED_TO_GET_IMAGE.to_string()
            }
        );
        assert_eq!(metrics.snapshot().requests_failed, 2);
    }

    #[tokio::test]
    async fn test_submit_pixels_skips_loader() {
        let mut loader = MockPixelLoader::new();
        loader.expect_load().never();
        let oracle = oracle_replying("Classification: Compost");
        let (controller, _) = controller(loader, Some(oracle));

        controller.submit_pixels(pixels()).unwrap().await.unwrap();

        let state = controller.state().snapshot();
        assert_eq!(state.image(), Some(&ImageRef::InMemory("camera".to_string())));
        assert_eq!(state.result().unwrap().classification(), "Compost");
    }

    #[tokio::test]
    async fn test_select_then_analyze() {
        let mut loader = MockPixelLoader::new();
        loader.expect_load().times(1).returning(|_| Ok(pixels()));
        let oracle = oracle_replying("Classification: Trash");
        let (controller, _) = controller(loader, Some(oracle));

        assert!(controller.select_image(Some(ImageRef::file("wrapper.jpg"))));
        assert_eq!(controller.state().snapshot().phase(), UiPhase::ImageSelected);

        controller.analyze_selected().unwrap().await.unwrap();
        assert_eq!(controller.state().snapshot().phase(), UiPhase::Success);
    }

    #[tokio::test]
    async fn test_analyze_selected_without_selection() {
        let (controller, _) = controller(MockPixelLoader::new(), None);
        assert!(controller.analyze_selected().is_none());
        assert_eq!(controller.state().snapshot(), UiState::Idle);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "panic with non-string payload");
    }
}
