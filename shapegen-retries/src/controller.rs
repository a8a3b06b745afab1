//! The retry state machine.
//!
//! A [`RetryController`] moves through `Attempting -> {Success, Retrying,
//! Exhausted}`. The caller drives it: [`RetryController::begin_attempt`]
//! before each generation, then [`RetryController::succeed`] or
//! [`RetryController::fail`] with the decode result. `fail` decides whether
//! another attempt is allowed and which remediation to apply to it.

use serde_json::Value as JsonValue;
use shapegen_core::GenConf;
use shapegen_output::{DecodeError, DecodeErrorKind};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::error::{AttemptRecord, ExtractionError};
use crate::feedback::build_feedback;

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    /// An attempt is in progress (or about to start).
    Attempting,
    /// The last attempt failed and another one is allowed.
    Retrying,
    /// An attempt succeeded.
    Success,
    /// No attempts remain.
    Exhausted,
}

impl RetryPhase {
    /// Whether no further attempts can start.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Exhausted)
    }
}

/// Changes to apply before the next attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Remediation {
    /// Number of the attempt this applies to.
    pub next_attempt: u32,
    /// Failure that caused it.
    pub kind: DecodeErrorKind,
    /// Corrective message to send with the next attempt.
    pub feedback: Option<String>,
    /// Temperature override for the next attempt.
    pub temperature: Option<f64>,
    /// Delay before the next attempt.
    pub wait: Duration,
}

impl Remediation {
    /// `genconf` with this remediation's overrides.
    #[must_use]
    pub fn apply(&self, genconf: &GenConf) -> GenConf {
        match self.temperature {
            Some(t) => genconf.clone().temperature(t),
            None => genconf.clone(),
        }
    }
}

/// Outcome of a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Try again after applying the remediation.
    Retry(Remediation),
    /// Stop and report.
    Exhausted(ExtractionError),
}

/// Bounded retry state for one extraction call.
#[derive(Debug, Clone)]
pub struct RetryController {
    config: RetryConfig,
    schema: Option<JsonValue>,
    phase: RetryPhase,
    attempt: u32,
    history: Vec<AttemptRecord>,
    total_wait: Duration,
}

impl RetryController {
    /// Create a controller.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            schema: None,
            phase: RetryPhase::Attempting,
            attempt: 0,
            history: Vec::new(),
            total_wait: Duration::ZERO,
        }
    }

    /// Schema quoted in validation feedback.
    #[must_use]
    pub fn with_schema(mut self, schema: JsonValue) -> Self {
        self.schema = Some(schema);
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    /// Number of the current (or last) attempt; zero before the first.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Total attempts allowed.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Failed attempts so far.
    #[must_use]
    pub fn history(&self) -> &[AttemptRecord] {
        &self.history
    }

    /// Total scheduled wait time.
    #[must_use]
    pub fn total_wait(&self) -> Duration {
        self.total_wait
    }

    /// Start the next attempt, returning its number.
    ///
    /// Returns `None` once the controller is in a terminal phase.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.phase.is_terminal() {
            return None;
        }
        self.attempt += 1;
        self.phase = RetryPhase::Attempting;
        debug!(
            attempt = self.attempt,
            max_attempts = self.config.max_attempts,
            "Executing extraction attempt"
        );
        Some(self.attempt)
    }

    /// Record a successful attempt.
    pub fn succeed(&mut self) {
        self.phase = RetryPhase::Success;
        debug!(attempt = self.attempt, "Extraction attempt succeeded");
    }

    /// Record a failed attempt and decide what happens next.
    pub fn fail(&mut self, error: DecodeError, raw_text: &str) -> Transition {
        let attempt = self.attempt;
        let max_attempts = self.config.max_attempts;
        self.history.push(AttemptRecord::new(attempt, &error, raw_text));

        if attempt < max_attempts && self.config.retry_on.should_retry(&error) {
            self.phase = RetryPhase::Retrying;

            let schema = if self.config.include_schema_in_feedback {
                self.schema.as_ref()
            } else {
                None
            };
            let feedback = self
                .config
                .feedback
                .then(|| build_feedback(&error, raw_text, schema, attempt, max_attempts));
            let temperature = if error.is_malformed() {
                self.config.malformed_temperature
            } else {
                None
            };
            let wait = self.config.wait.calculate(attempt);
            self.total_wait += wait;

            info!(
                attempt,
                max_attempts,
                kind = %error.kind,
                path = %error.path,
                wait_ms = wait.as_millis(),
                "Decode failed, retrying"
            );

            return Transition::Retry(Remediation {
                next_attempt: attempt + 1,
                kind: error.kind,
                feedback,
                temperature,
                wait,
            });
        }

        self.phase = RetryPhase::Exhausted;
        warn!(
            attempt,
            max_attempts,
            kind = %error.kind,
            error = %error,
            "Retry exhausted or error not retryable"
        );
        Transition::Exhausted(ExtractionError {
            kind: error.kind,
            raw_text: raw_text.to_string(),
            attempt_count: attempt,
            last_error: error,
            history: self.history.clone(),
        })
    }
}
