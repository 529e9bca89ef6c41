//! Data models for the WasteSort application.
//!
//! - [`UiState`]: The classification workflow state, one live value per session
//! - [`ImageRef`] / [`Pixels`]: What the user picked and its decoded pixel data
//! - [`ClassificationResult`] / [`ResultType`]: Parsed oracle answer and its display category
//! - [`UserConfig`]: Oracle and logging settings loaded from `WasteSort Config.yaml`
//! - [`RulesConfig`]: Per-location disposal rules loaded from `WasteSort Rules.yaml`
//!
//! State updates go through [`StateManager`](crate::state::StateManager) so that every
//! transition is validated and broadcast.

pub mod classification;
pub mod config;
pub mod ui_state;

pub use classification::{ClassificationResult, NO_TIP_PROVIDED, ResultType, UNKNOWN_ITEM};
pub use config::{DisposalRule, RuleSet, RulesConfig, UserConfig, WasteSortSettings};
pub use ui_state::{FAILED_TO_GET_IMAGE, ImageRef, Pixels, UiPhase, UiState};
