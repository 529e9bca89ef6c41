// State management module
//
// This module provides the StateManager which wraps the session's UiState with
// thread-safe access using Arc<RwLock<T>> and emits one change event per transition.

use crate::metrics::Metrics;
use crate::models::{ClassificationResult, FAILED_TO_GET_IMAGE, ImageRef, Pixels, UiState};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, watch};

/// Change events emitted when the session state moves.
///
/// Every applied transition produces exactly one event, delivered to all
/// subscribers in the order the transitions were applied. A subscriber that
/// watches for `Classified` will always have seen `AnalysisStarted` first.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// An image was picked for preview without analysis
    ImageSelected { image: ImageRef },

    /// A new analysis cycle started (loading indicator should show)
    AnalysisStarted {
        generation: u64,
        image: ImageRef,
    },

    /// Pixel data for the in-flight analysis is available
    PixelsLoaded {
        generation: u64,
        image: ImageRef,
        width: u32,
        height: u32,
    },

    /// The oracle answered and the answer parsed
    Classified {
        generation: u64,
        image: ImageRef,
        result: ClassificationResult,
    },

    /// The cycle ended in an error
    Failed {
        generation: u64,
        image: Option<ImageRef>,
        message: String,
    },

    /// The session returned to idle
    Cleared,
}

#[derive(Debug, Default)]
struct Session {
    state: UiState,
    generation: u64,
}

/// Thread-safe holder of the single live [`UiState`].
///
/// - [`snapshot()`](Self::snapshot) / [`read()`](Self::read) for the presentation layer
/// - transition methods ([`begin_analysis()`](Self::begin_analysis), [`complete()`](Self::complete), ...)
///   for the orchestration layer
/// - [`subscribe()`](Self::subscribe) for ordered change events
///
/// Each session cycle has a generation number. Starting a new cycle, clearing, or
/// rejecting an image bumps it; results tagged with an older generation are dropped.
/// The current generation is also published on a `watch` channel so in-flight
/// work can stop as soon as it is superseded.
pub struct StateManager {
    session: Arc<RwLock<Session>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,

    generation_tx: Arc<watch::Sender<u64>>,

    metrics: Option<Arc<Metrics>>,
}

impl StateManager {
    /// Create a new StateManager in `Idle`
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        let (generation_tx, _) = watch::channel(0);
        Self {
            session: Arc::new(RwLock::new(Session::default())),
            state_tx,
            generation_tx: Arc::new(generation_tx),
            metrics: None,
        }
    }

    /// Record broadcast counts into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Get a clone of the current state
    pub fn snapshot(&self) -> UiState {
        self.session_read().state.clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let busy = state_manager.read(|state| state.is_analyzing());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&UiState) -> R,
    {
        let session = self.session_read();
        f(&session.state)
    }

    pub fn generation(&self) -> u64 {
        self.session_read().generation
    }

    /// Subscribe to state change events
    ///
    /// Returns a receiver that will get notified of all future state changes.
    /// Multiple subscribers can listen simultaneously.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Watch the current generation; it changes whenever a cycle is superseded.
    pub fn watch_generation(&self) -> watch::Receiver<u64> {
        self.generation_tx.subscribe()
    }

    /// Start a fresh analysis cycle from any state.
    ///
    /// Returns the new generation, which the caller must pass to the
    /// completion methods.
    pub fn begin_analysis(&self, image: ImageRef, pixels: Option<Pixels>) -> u64 {
        self.transition(None, true, |_| Some(UiState::Analyzing { image, pixels }))
            .map(|(generation, _)| generation)
            .unwrap_or_else(|| self.generation())
    }

    /// Attach loaded pixels to the in-flight analysis.
    pub fn attach_pixels(&self, generation: u64, pixels: Pixels) -> Option<StateChange> {
        self.transition(Some(generation), false, |state| match state {
            UiState::Analyzing { image, .. } => Some(UiState::Analyzing {
                image: image.clone(),
                pixels: Some(pixels),
            }),
            _ => None,
        })
        .map(|(_, change)| change)
    }

    /// Finish the in-flight analysis successfully.
    pub fn complete(&self, generation: u64, result: ClassificationResult) -> Option<StateChange> {
        self.transition(Some(generation), false, |state| match state {
            UiState::Analyzing { image, pixels } => {
                Some(UiState::success(image.clone(), pixels.clone(), result))
            }
            _ => None,
        })
        .map(|(_, change)| change)
    }

    /// Finish the in-flight analysis with an error message.
    ///
    /// The image and any loaded pixels are carried into the `Error` state.
    pub fn fail(&self, generation: u64, message: impl Into<String>) -> Option<StateChange> {
        let message = message.into();
        self.transition(Some(generation), false, |state| match state {
            UiState::Analyzing { image, pixels } => Some(UiState::Error {
                image: Some(image.clone()),
                pixels: pixels.clone(),
                message,
            }),
            _ => None,
        })
        .map(|(_, change)| change)
    }

    /// Record that no usable image was obtained. Supersedes any in-flight cycle.
    pub fn reject_image(&self) -> StateChange {
        self.transition(None, true, |_| {
            Some(UiState::Error {
                image: None,
                pixels: None,
                message: FAILED_TO_GET_IMAGE.to_string(),
            })
        })
        .map(|(_, change)| change)
        .unwrap_or(StateChange::Failed {
            generation: self.generation(),
            image: None,
            message: FAILED_TO_GET_IMAGE.to_string(),
        })
    }

    /// Show an image without analysing it. Not allowed while a request is in flight.
    pub fn select_image(&self, image: ImageRef, pixels: Option<Pixels>) -> Option<StateChange> {
        self.transition(None, false, |state| {
            if state.is_analyzing() {
                None
            } else {
                Some(UiState::ImageSelected { image, pixels })
            }
        })
        .map(|(_, change)| change)
    }

    /// Return to `Idle` from any state, superseding any in-flight cycle.
    pub fn clear(&self) -> Option<StateChange> {
        self.transition(None, true, |state| match state {
            UiState::Idle => None,
            _ => Some(UiState::Idle),
        })
        .map(|(_, change)| change)
    }

    /// Apply one transition under the write lock and broadcast its event.
    ///
    /// `expected` guards completions: the transition is dropped when the session has
    /// moved to another generation. `supersede` starts a new generation.
    /// Returns the generation the new state belongs to and the emitted event.
    fn transition<F>(
        &self,
        expected: Option<u64>,
        supersede: bool,
        next_fn: F,
    ) -> Option<(u64, StateChange)>
    where
        F: FnOnce(&UiState) -> Option<UiState>,
    {
        let mut session = self.session_write();

        if let Some(expected) = expected {
            if expected != session.generation {
                tracing::debug!(
                    "Dropping stale transition for generation {} (current {})",
                    expected,
                    session.generation
                );
                return None;
            }
        }

        let next = next_fn(&session.state)?;
        let (from, to) = (session.state.phase(), next.phase());
        if !from.can_transition_to(to) {
            tracing::warn!("Rejected invalid transition {} -> {}", from, to);
            return None;
        }

        if supersede {
            session.generation += 1;
            self.generation_tx.send_replace(session.generation);
        }
        let generation = session.generation;

        let old = std::mem::replace(&mut session.state, next);
        let change = Self::detect_change(&old, &session.state, generation, supersede)?;

        tracing::debug!("State {} -> {} (generation {})", from, to, generation);

        // Sent while still holding the write lock so events are ordered exactly as applied
        match self.state_tx.send(change.clone()) {
            Ok(_) => self.record(|m| m.record_state_broadcast()),
            // No subscribers is fine
            Err(_) => self.record(|m| m.record_state_broadcast_error()),
        }

        Some((generation, change))
    }

    /// Describe the move from `old` to `new` as a single event.
    fn detect_change(
        old: &UiState,
        new: &UiState,
        generation: u64,
        supersede: bool,
    ) -> Option<StateChange> {
        match new {
            UiState::Idle => match old {
                UiState::Idle => None,
                _ => Some(StateChange::Cleared),
            },
            UiState::ImageSelected { image, .. } => Some(StateChange::ImageSelected {
                image: image.clone(),
            }),
            UiState::Analyzing { image, pixels } => {
                // A new generation always starts a fresh analysis
                let enriching = !supersede
                    && matches!(
                        old,
                        UiState::Analyzing { image: old_image, pixels: None } if old_image == image
                    )
                    && pixels.is_some();
                match (enriching, pixels) {
                    (true, Some(p)) => Some(StateChange::PixelsLoaded {
                        generation,
                        image: image.clone(),
                        width: p.width(),
                        height: p.height(),
                    }),
                    _ => Some(StateChange::AnalysisStarted {
                        generation,
                        image: image.clone(),
                    }),
                }
            }
            UiState::Success { image, .. } => Some(StateChange::Classified {
                generation,
                image: image.clone(),
                result: new.result()?,
            }),
            UiState::Error { image, message, .. } => Some(StateChange::Failed {
                generation,
                image: image.clone(),
                message: message.clone(),
            }),
        }
    }

    fn record(&self, f: impl FnOnce(&Metrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }

    // A panicking writer cannot leave a half-applied UiState (replacement is a single
    // mem::replace), so a poisoned lock is still safe to use.
    fn session_read(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(|e| e.into_inner())
    }

    fn session_write(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            state_tx: self.state_tx.clone(),
            generation_tx: Arc::clone(&self.generation_tx),
            metrics: self.metrics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UiPhase;
    use image::DynamicImage;

    fn image(name: &str) -> ImageRef {
        ImageRef::file(name)
    }

    fn pixels() -> Pixels {
        Pixels::new(DynamicImage::new_rgb8(4, 3))
    }

    fn result() -> ClassificationResult {
        ClassificationResult::new("Recycling", "Plastic bottle", "PET #1 is accepted.")
    }

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        assert_eq!(manager.snapshot(), UiState::Idle);
        assert_eq!(manager.generation(), 0);
    }

    #[test]
    fn test_begin_analysis_bumps_generation() {
        let manager = StateManager::new();
        let first = manager.begin_analysis(image("a.jpg"), None);
        let second = manager.begin_analysis(image("b.jpg"), None);

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(
            manager.snapshot(),
            UiState::Analyzing {
                image: image("b.jpg"),
                pixels: None
            }
        );
    }

    #[test]
    fn test_resubmit_same_image_with_pixels_is_a_new_analysis() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();
        manager.begin_analysis(image("a.jpg"), None);
        let generation = manager.begin_analysis(image("a.jpg"), Some(pixels()));

        let _ = rx.try_recv().unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            StateChange::AnalysisStarted {
                generation,
                image: image("a.jpg")
            }
        );
    }

    #[test]
    fn test_full_success_cycle() {
        let manager = StateManager::new();
        let generation = manager.begin_analysis(image("a.jpg"), None);

        let change = manager.attach_pixels(generation, pixels()).unwrap();
        assert!(matches!(change, StateChange::PixelsLoaded { width: 4, height: 3, .. }));

        let change = manager.complete(generation, result()).unwrap();
        assert!(matches!(change, StateChange::Classified { .. }));

        let state = manager.snapshot();
        assert_eq!(state.phase(), UiPhase::Success);
        assert!(state.pixels().is_some());
        assert_eq!(state.result(), Some(result()));
    }

    #[test]
    fn test_fail_keeps_image_and_pixels() {
        let manager = StateManager::new();
        let generation = manager.begin_analysis(image("a.jpg"), None);
        manager.attach_pixels(generation, pixels());
        manager.fail(generation, "Could not understand AI response format.");

        match manager.snapshot() {
            UiState::Error { image: img, pixels, message } => {
                assert_eq!(img, Some(image("a.jpg")));
                assert!(pixels.is_some());
                assert_eq!(message, "Could not understand AI response format.");
            }
            other => panic!("Expected Error, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_completion_is_dropped() {
        let manager = StateManager::new();
        let old = manager.begin_analysis(image("a.jpg"), None);
        let new = manager.begin_analysis(image("b.jpg"), None);

        assert!(manager.complete(old, result()).is_none());
        assert!(manager.fail(old, "late").is_none());
        assert!(manager.snapshot().is_analyzing());

        assert!(manager.complete(new, result()).is_some());
        assert_eq!(manager.snapshot().image(), Some(&image("b.jpg")));
    }

    #[test]
    fn test_completion_after_clear_is_dropped() {
        let manager = StateManager::new();
        let generation = manager.begin_analysis(image("a.jpg"), None);

        assert_eq!(manager.clear(), Some(StateChange::Cleared));
        assert!(manager.complete(generation, result()).is_none());
        assert_eq!(manager.snapshot(), UiState::Idle);
    }

    #[test]
    fn test_terminal_states_do_not_complete_twice() {
        let manager = StateManager::new();
        let generation = manager.begin_analysis(image("a.jpg"), None);
        manager.complete(generation, result());

        // Success -> Error is not a valid transition for the same cycle
        assert!(manager.fail(generation, "late failure").is_none());
        assert_eq!(manager.snapshot().phase(), UiPhase::Success);
    }

    #[test]
    fn test_reject_image() {
        let manager = StateManager::new();
        let generation = manager.begin_analysis(image("a.jpg"), None);

        let change = manager.reject_image();
        assert!(matches!(change, StateChange::Failed { image: None, .. }));
        assert_eq!(
            manager.snapshot(),
            UiState::Error {
                image: None,
                pixels: None,
                message: FAILED_TO_GET_IMAGE.to_string()
            }
        );

        // The analysis that was running is now stale
        assert!(manager.complete(generation, result()).is_none());
    }

    #[test]
    fn test_select_image_not_allowed_while_analyzing() {
        let manager = StateManager::new();
        assert!(manager.select_image(image("a.jpg"), None).is_some());
        assert_eq!(manager.snapshot().phase(), UiPhase::ImageSelected);

        manager.begin_analysis(image("a.jpg"), None);
        assert!(manager.select_image(image("b.jpg"), None).is_none());
        assert!(manager.snapshot().is_analyzing());
    }

    #[test]
    fn test_clear_from_idle_emits_nothing() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        assert!(manager.clear().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_subscribe_sees_every_transition_in_order() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        let generation = manager.begin_analysis(image("a.jpg"), None);
        manager.attach_pixels(generation, pixels());
        manager.complete(generation, result());
        manager.clear();

        assert!(matches!(rx.try_recv().unwrap(), StateChange::AnalysisStarted { .. }));
        assert!(matches!(rx.try_recv().unwrap(), StateChange::PixelsLoaded { .. }));
        assert!(matches!(rx.try_recv().unwrap(), StateChange::Classified { .. }));
        assert_eq!(rx.try_recv().unwrap(), StateChange::Cleared);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_multiple_subscribers() {
        let manager = StateManager::new();
        let mut rx1 = manager.subscribe();
        let mut rx2 = manager.subscribe();

        manager.begin_analysis(image("a.jpg"), None);

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_watch_generation_tracks_supersede() {
        let manager = StateManager::new();
        let rx = manager.watch_generation();

        manager.begin_analysis(image("a.jpg"), None);
        assert_eq!(*rx.borrow(), 1);

        manager.clear();
        assert_eq!(*rx.borrow(), 2);
    }

    #[test]
    fn test_clone_state_manager() {
        let manager1 = StateManager::new();
        let manager2 = manager1.clone();

        manager1.begin_analysis(image("a.jpg"), None);

        assert!(manager2.snapshot().is_analyzing());
        assert_eq!(manager2.generation(), 1);
    }

    #[test]
    fn test_metrics_count_broadcasts() {
        let metrics = Arc::new(Metrics::new());
        let manager = StateManager::new().with_metrics(metrics.clone());

        // No subscriber yet: counted as a broadcast error
        manager.begin_analysis(image("a.jpg"), None);
        let _rx = manager.subscribe();
        manager.clear();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.state_broadcast_errors, 1);
        assert_eq!(snapshot.state_broadcasts, 1);
    }
}
