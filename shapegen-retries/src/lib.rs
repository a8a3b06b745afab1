//! # shapegen-retries
//!
//! Bounded retries for structured extraction.
//!
//! When model output fails to decode, the [`RetryController`] decides
//! whether to try again and how: feedback quoting the failure (and the
//! expected schema), a lower temperature after malformed JSON, and an
//! optional wait. When attempts run out it produces an [`ExtractionError`]
//! carrying the last raw output and the full attempt history.
//!
//! Generation failures are never retried here; only decode failures are.
//!
//! ## Example
//!
//! ```rust
//! use shapegen_output::DecodeError;
//! use shapegen_retries::{RetryConfig, RetryController, Transition};
//!
//! let mut controller = RetryController::new(RetryConfig::new().max_attempts(2));
//!
//! controller.begin_attempt();
//! let Transition::Retry(remedy) = controller.fail(DecodeError::malformed("eof"), "{") else {
//!     unreachable!()
//! };
//! assert_eq!(remedy.temperature, Some(0.0));
//!
//! controller.begin_attempt();
//! let Transition::Exhausted(err) = controller.fail(DecodeError::malformed("eof"), "{") else {
//!     unreachable!()
//! };
//! assert_eq!(err.attempt_count, 2);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod controller;
pub mod error;
pub mod feedback;

pub use config::{RetryCondition, RetryConfig, WaitStrategy};
pub use controller::{Remediation, RetryController, RetryPhase, Transition};
pub use error::{AttemptRecord, ExtractionError};
pub use feedback::{build_feedback, build_parse_error_feedback, build_validation_feedback};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        ExtractionError, RetryCondition, RetryConfig, RetryController, Transition, WaitStrategy,
    };
}
