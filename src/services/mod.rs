//! Services module - Business logic for classifying waste images.
//!
//! The services are **framework-agnostic** and have no dependencies on the UI layer.
//!
//! # Components
//!
//! - [`ResponseParser`] / [`parse_classification`]: Pure mapping from oracle text to a
//!   [`ClassificationResult`](crate::models::ClassificationResult)
//! - [`ClassificationOracle`]: Async seam for the remote image classifier, with
//!   [`GeminiOracle`] as the production implementation
//! - [`PixelLoader`]: Blocking seam for image decoding, with [`FsPixelLoader`] reading files
//! - [`ClassifyError`]: Every way a cycle can fail, each with a user-facing message
//! - [`RulesLookup`]: Text lookup against per-location disposal rules
//!
//! # Oracle contract
//!
//! Each request carries the image and [`CLASSIFY_PROMPT`], which asks for three
//! labeled lines:
//!
//! ```text
//! Object: [Object Name]
//! Classification: [Recycling/Trash/Compost/Uncertain/Check Locally]
//! Reason: [Brief Explanation]
//! ```

pub mod error;
pub mod gemini;
pub mod oracle;
pub mod parser;
pub mod pixels;
pub mod prompt;
pub mod rules;

pub use error::ClassifyError;
pub use gemini::{GeminiOracle, OracleInitError};
pub use oracle::{ClassificationOracle, OracleError, OracleReply, OracleRequest};
pub use parser::{ResponseParser, parse_classification};
pub use pixels::{FsPixelLoader, PixelLoadError, PixelLoader};
pub use prompt::CLASSIFY_PROMPT;
pub use rules::{Lookup, LookupOutcome, RulesError, RulesLookup};
