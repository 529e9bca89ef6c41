// WasteSort - Photograph an item of waste and find out how to throw it away
//
// This is the library crate containing the core business logic and data structures.
// The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{ClassificationResult, ImageRef, Pixels, ResultType, UiState, UserConfig};
pub use services::{ClassificationOracle, ClassifyError, PixelLoader};
pub use state::{StateChange, StateManager};
pub use ui::ClassifierController;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
