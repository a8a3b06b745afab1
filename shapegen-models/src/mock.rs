//! In-process collaborators for tests.
//!
//! - [`MockModel`]: returns a queue of canned responses and records requests
//! - [`FunctionModel`]: responses computed by a closure
//!
//! ```rust
//! use shapegen_models::MockModel;
//!
//! let model = MockModel::new("test")
//!     .with_text_response("{\"name\": \"Ana\"}")
//!     .with_text_response("{\"name\": \"Rui\"}");
//! assert_eq!(model.call_count(), 0);
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::error::GenerationError;
use crate::model::{GenerationRequest, Model, ModelResponse, Prompt};
use crate::profile::ModelProfile;

type TokenCountFn = Arc<dyn Fn(&str) -> usize + Send + Sync>;

// ============================================================================
// MockModel - canned answers, recorded requests
// ============================================================================

/// A mock model returning pre-configured responses in order.
///
/// When the queue is empty it answers `"Mock response"`.
#[derive(Clone)]
pub struct MockModel {
    name: String,
    system: String,
    profile: ModelProfile,
    responses: Arc<Mutex<VecDeque<Result<ModelResponse, String>>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    delay: Option<Duration>,
    embedded_template: Option<String>,
    token_count: Option<TokenCountFn>,
}

impl std::fmt::Debug for MockModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockModel")
            .field("name", &self.name)
            .field("system", &self.system)
            .field("queued", &self.responses.lock().len())
            .field("calls", &self.requests.lock().len())
            .finish()
    }
}

impl MockModel {
    /// Create a new mock model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system: "mock".to_string(),
            profile: ModelProfile::default(),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            embedded_template: None,
            token_count: None,
        }
    }

    /// Set the provider name reported by [`Model::system`].
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Queue a response.
    #[must_use]
    pub fn with_response(self, response: ModelResponse) -> Self {
        self.responses.lock().push_back(Ok(response));
        self
    }

    /// Queue a text response.
    #[must_use]
    pub fn with_text_response(self, text: impl Into<String>) -> Self {
        self.with_response(ModelResponse::text(text))
    }

    /// Queue a collaborator failure.
    #[must_use]
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.responses.lock().push_back(Err(message.into()));
        self
    }

    /// Set a custom profile.
    #[must_use]
    pub fn with_profile(mut self, profile: ModelProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Sleep before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report an embedded chat template.
    #[must_use]
    pub fn with_embedded_template(mut self, template: impl Into<String>) -> Self {
        self.embedded_template = Some(template.into());
        self
    }

    /// Count tokens with `f` instead of estimating.
    #[must_use]
    pub fn with_token_count<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> usize + Send + Sync + 'static,
    {
        self.token_count = Some(Arc::new(f));
        self
    }

    /// Get recorded requests.
    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    /// Number of generate calls so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Clear recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }
}

#[async_trait]
impl Model for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn system(&self) -> &str {
        &self.system
    }

    fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ModelResponse, GenerationError> {
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        // Bind first so the lock is released before matching
        let next = self.responses.lock().pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(GenerationError::Failed(message)),
            None => Ok(ModelResponse::text("Mock response")),
        }
    }

    fn embedded_template(&self) -> Option<String> {
        self.embedded_template.clone()
    }

    fn count_tokens(&self, text: &str) -> Option<usize> {
        self.token_count.as_ref().map(|f| f(text))
    }
}

// ============================================================================
// FunctionModel - answers computed per request
// ============================================================================

/// Response function of a [`FunctionModel`].
pub type FunctionDef =
    Arc<dyn Fn(&GenerationRequest) -> Result<ModelResponse, GenerationError> + Send + Sync>;

/// A model whose answers come from a closure.
///
/// The function sees the full request (prompt, output request, settings),
/// so tests can answer differently depending on what was asked.
#[derive(Clone)]
pub struct FunctionModel {
    name: String,
    profile: ModelProfile,
    function: FunctionDef,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl std::fmt::Debug for FunctionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionModel")
            .field("name", &self.name)
            .field("profile", &self.profile)
            .finish()
    }
}

impl FunctionModel {
    /// Create a model from a response function.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<ModelResponse, GenerationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: "fn".to_string(),
            profile: ModelProfile::default(),
            function: Arc::new(function),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A model that always returns the same text.
    pub fn constant_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(ModelResponse::text(text.clone())))
    }

    /// A model that echoes the last input message.
    pub fn echo() -> Self {
        Self::new(|request| {
            let last = match &request.prompt {
                Prompt::Messages(messages) => messages
                    .iter()
                    .rev()
                    .find(|m| m.role == shapegen_core::Role::In)
                    .map(|m| m.text.clone())
                    .unwrap_or_default(),
                Prompt::Rendered(text) => text.clone(),
            };
            Ok(ModelResponse::text(last))
        })
    }

    /// Set a custom model name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set a custom profile.
    #[must_use]
    pub fn with_profile(mut self, profile: ModelProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Get recorded requests.
    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Model for FunctionModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn system(&self) -> &str {
        "function"
    }

    fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ModelResponse, GenerationError> {
        self.requests.lock().push(request.clone());
        (self.function)(request)
    }
}
