//! Retry configuration.

use shapegen_output::{DecodeError, DecodeErrorKind};
use std::time::Duration;

/// Configuration for extraction retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Wait strategy between attempts.
    pub wait: WaitStrategy,
    /// Which decode failures are retried.
    pub retry_on: RetryCondition,
    /// Temperature for the attempt after a malformed response.
    pub malformed_temperature: Option<f64>,
    /// Whether failed output and corrective instructions are fed back.
    pub feedback: bool,
    /// Whether feedback repeats the expected schema.
    pub include_schema_in_feedback: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait: WaitStrategy::None,
            retry_on: RetryCondition::all(),
            malformed_temperature: Some(0.0),
            feedback: true,
            include_schema_in_feedback: true,
        }
    }
}

impl RetryConfig {
    /// Create a new default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the total number of attempts. Values below one are treated as one.
    #[must_use]
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Set the wait strategy.
    #[must_use]
    pub fn wait(mut self, strategy: WaitStrategy) -> Self {
        self.wait = strategy;
        self
    }

    /// Use a fixed delay.
    #[must_use]
    pub fn fixed(mut self, delay: Duration) -> Self {
        self.wait = WaitStrategy::Fixed(delay);
        self
    }

    /// Use exponential backoff.
    #[must_use]
    pub fn exponential(mut self, initial: Duration, max: Duration) -> Self {
        self.wait = WaitStrategy::ExponentialBackoff {
            initial,
            max,
            multiplier: 2.0,
        };
        self
    }

    /// Set the retry condition.
    #[must_use]
    pub fn retry_on(mut self, condition: RetryCondition) -> Self {
        self.retry_on = condition;
        self
    }

    /// Set the temperature used after a malformed response.
    #[must_use]
    pub fn malformed_temperature(mut self, temperature: Option<f64>) -> Self {
        self.malformed_temperature = temperature;
        self
    }

    /// Enable or disable feedback.
    #[must_use]
    pub fn feedback(mut self, enabled: bool) -> Self {
        self.feedback = enabled;
        self
    }

    /// Include the expected schema in feedback.
    #[must_use]
    pub fn include_schema_in_feedback(mut self, include: bool) -> Self {
        self.include_schema_in_feedback = include;
        self
    }

    /// A config that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new().max_attempts(1)
    }
}

/// Strategy for waiting between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitStrategy {
    /// No waiting.
    None,
    /// Fixed delay.
    Fixed(Duration),
    /// Exponential backoff.
    ExponentialBackoff {
        /// Initial delay.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier for each attempt.
        multiplier: f64,
    },
}

impl WaitStrategy {
    /// Wait before the attempt following failed attempt `attempt` (1-indexed).
    #[must_use]
    pub fn calculate(&self, attempt: u32) -> Duration {
        match self {
            WaitStrategy::None => Duration::ZERO,
            WaitStrategy::Fixed(d) => *d,
            WaitStrategy::ExponentialBackoff {
                initial,
                max,
                multiplier,
            } => {
                let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let delay = initial.as_secs_f64() * multiplier.powi(exponent);
                if delay.is_finite() {
                    Duration::from_secs_f64(delay.clamp(0.0, max.as_secs_f64()))
                } else {
                    *max
                }
            }
        }
    }
}

/// Which decode failures trigger another attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryCondition {
    kinds: Vec<DecodeErrorKind>,
}

impl RetryCondition {
    /// A condition that retries nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A condition that retries every decode failure.
    #[must_use]
    pub fn all() -> Self {
        Self {
            kinds: DecodeErrorKind::ALL.to_vec(),
        }
    }

    /// Retry on `kind`.
    #[must_use]
    pub fn on(mut self, kind: DecodeErrorKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    /// Retry on malformed JSON.
    #[must_use]
    pub fn on_malformed(self) -> Self {
        self.on(DecodeErrorKind::MalformedJson)
    }

    /// Retry on schema violations.
    #[must_use]
    pub fn on_violation(self) -> Self {
        self.on(DecodeErrorKind::SchemaViolation)
    }

    /// Retry on missing fields.
    #[must_use]
    pub fn on_missing_field(self) -> Self {
        self.on(DecodeErrorKind::MissingField)
    }

    /// Whether `error` should be retried.
    #[must_use]
    pub fn should_retry(&self, error: &DecodeError) -> bool {
        self.kinds.contains(&error.kind)
    }
}
