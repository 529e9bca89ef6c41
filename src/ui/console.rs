// Console presenter - Renders session state for a terminal
//
// Subscribes to StateManager events on a background task and prints one line
// (or block) per transition. Rendering is kept in pure functions so it can be
// tested without a terminal.

use crate::models::{ResultType, UiState};
use crate::state::{StateChange, StateManager};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Category used to style a state. `Error` is only ever assigned here.
pub fn result_type_for(state: &UiState) -> Option<ResultType> {
    match state {
        UiState::Success { classification, .. } => {
            Some(ResultType::from_classification(classification))
        }
        UiState::Error { .. } => Some(ResultType::Error),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConsolePresenter {
    color: bool,
}

impl ConsolePresenter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, kind: ResultType, text: &str) -> String {
        if self.color {
            format!("\x1b[38;5;{}m{}\x1b[0m", kind.ansi_color(), text)
        } else {
            text.to_string()
        }
    }

    /// Render one change event, or `None` for events not worth printing.
    pub fn render_change(&self, change: &StateChange) -> Option<String> {
        match change {
            StateChange::ImageSelected { image } => Some(format!("Selected {}", image)),
            StateChange::AnalysisStarted { image, .. } => Some(format!("Analyzing {}...", image)),
            StateChange::PixelsLoaded { .. } => None,
            StateChange::Classified { image, result, .. } => {
                let kind = result.result_type();
                let headline = format!("{} {}", kind.icon(), kind.label());
                Some(format!(
                    "{}  {}\n  Object:         {}\n  Classification: {}\n  Tip:            {}",
                    self.paint(kind, &headline),
                    image,
                    result.identified_object(),
                    result.classification(),
                    result.reason()
                ))
            }
            StateChange::Failed { image, message, .. } => {
                let kind = ResultType::Error;
                let headline = format!("{} {}", kind.icon(), message);
                Some(match image {
                    Some(image) => format!("{}  {}", self.paint(kind, &headline), image),
                    None => self.paint(kind, &headline),
                })
            }
            StateChange::Cleared => Some("Cleared.".to_string()),
        }
    }

    /// One-line summary of a state snapshot.
    pub fn render_state(&self, state: &UiState) -> String {
        match state {
            UiState::Idle => "Take a photo or choose an image to classify.".to_string(),
            UiState::ImageSelected { image, .. } => format!("Selected {}", image),
            UiState::Analyzing { image, .. } => format!("Analyzing {}...", image),
            UiState::Success {
                classification,
                identified_object,
                ..
            } => {
                let kind = ResultType::from_classification(classification);
                self.paint(
                    kind,
                    &format!("{} {}: {}", kind.icon(), identified_object, classification),
                )
            }
            UiState::Error { message, .. } => {
                self.paint(ResultType::Error, &format!("{} {}", ResultType::Error.icon(), message))
            }
        }
    }

    /// Print every state change to stdout until the channel closes.
    ///
    /// Subscribes before returning, so no event applied after this call is missed.
    pub fn attach(self, state: &StateManager) -> JoinHandle<()> {
        let mut rx = state.subscribe();

        tokio::spawn(async move {
            tracing::debug!("Console subscription started");

            loop {
                match rx.recv().await {
                    Ok(change) => {
                        tracing::trace!("State change received: {:?}", change);
                        if let Some(line) = self.render_change(&change) {
                            println!("{}", line);
                        }
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("State broadcast channel closed");
                        break;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Console subscription lagged - {} events were skipped", skipped);
                    }
                }
            }
        })
    }
}
