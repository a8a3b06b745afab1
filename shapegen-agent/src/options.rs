//! Per-call options.

use shapegen_core::{GenConf, TrimOptions};
use shapegen_retries::RetryConfig;
use tokio_util::sync::CancellationToken;

/// Options for one extraction call.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Cancels the call and any remaining attempts.
    pub cancel: Option<CancellationToken>,
    /// Settings merged over the handle's settings.
    pub genconf: Option<GenConf>,
    /// Replaces the handle's retry configuration.
    pub retry: Option<RetryConfig>,
    /// How the thread is trimmed to fit the context window.
    pub trim: TrimOptions,
}

impl ExtractOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cancellation token.
    #[must_use]
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set generation settings for this call.
    #[must_use]
    pub fn genconf(mut self, genconf: GenConf) -> Self {
        self.genconf = Some(genconf);
        self
    }

    /// Set the retry configuration for this call.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Set trimming options.
    #[must_use]
    pub fn trim(mut self, trim: TrimOptions) -> Self {
        self.trim = trim;
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
