//! Model handles and the extraction pipeline.
//!
//! A [`ModelHandle`] wraps one generation collaborator with its template,
//! settings and retry policy. Each extraction compiles the descriptor once,
//! then loops: trim the thread to the context window, invoke the model,
//! decode, and on failure let the retry controller decide what to feed back.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use shapegen_core::{GenConf, Role, Thread, TrimOptions};
use shapegen_models::{
    BoxedModel, GenerationError, GenerationInvoker, ModelTokenCounter, RawOutput,
    TemplateRenderer,
};
use shapegen_output::{
    compile, DecodeMode, DecodeResult, Decoder, Instance, NormalizedSchema, Shape, TypeDescriptor,
};
use shapegen_retries::{RetryConfig, RetryController, Transition};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AgentError, AgentResult};
use crate::options::ExtractOptions;

/// A generation collaborator ready for extraction.
#[derive(Clone)]
pub struct ModelHandle {
    invoker: GenerationInvoker,
    genconf: GenConf,
    retry: RetryConfig,
    ctx_len: Option<usize>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model", &self.identifier())
            .field("genconf", &self.genconf)
            .field("ctx_len", &self.ctx_len)
            .finish()
    }
}

impl ModelHandle {
    /// Wrap a model. The context length comes from its profile.
    pub fn new(model: BoxedModel) -> Self {
        let ctx_len = model.profile().context_length;
        Self {
            invoker: GenerationInvoker::new(model),
            genconf: GenConf::default(),
            retry: RetryConfig::default(),
            ctx_len,
        }
    }

    /// Set the chat template.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.invoker = self.invoker.with_template(template);
        self
    }

    /// Set the template renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.invoker = self.invoker.with_renderer(renderer);
        self
    }

    /// Set default generation settings.
    #[must_use]
    pub fn with_genconf(mut self, genconf: GenConf) -> Self {
        self.genconf = genconf;
        self
    }

    /// Set the default retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the context length in tokens.
    #[must_use]
    pub fn with_ctx_len(mut self, ctx_len: usize) -> Self {
        self.ctx_len = Some(ctx_len);
        self
    }

    /// The model.
    pub fn model(&self) -> &BoxedModel {
        self.invoker.model()
    }

    /// The model's `provider:name` identifier.
    pub fn identifier(&self) -> String {
        self.invoker.model().identifier()
    }

    /// The chat template, if any.
    pub fn template(&self) -> Option<&str> {
        self.invoker.template()
    }

    /// Default generation settings.
    pub fn genconf(&self) -> &GenConf {
        &self.genconf
    }

    /// Context length in tokens.
    pub fn ctx_len(&self) -> Option<usize> {
        self.ctx_len
    }

    /// Extract an instance of `descriptor` from the conversation.
    ///
    /// The thread should end with the caller's IN message. On success the
    /// model's answer is appended as an OUT message. Retries with feedback
    /// append the failed answer and the correction, and these stay in the
    /// thread even when the call fails or is cancelled.
    pub async fn extract(
        &self,
        descriptor: &TypeDescriptor,
        thread: &mut Thread,
        options: &ExtractOptions,
    ) -> AgentResult<Instance> {
        let schema = compile(descriptor)?;
        let decoder = Decoder::new(DecodeMode::Schema);
        debug!(model = %self.identifier(), target = %descriptor.type_name(), "Starting extraction");

        self.run(thread, Some(&schema), self.call_genconf(options), options, |text| {
            let instance = decoder.decode(text, descriptor)?;
            #[cfg(feature = "strict-validation")]
            shapegen_output::strict::validate_document(&schema, &instance.to_json())?;
            Ok(instance)
        })
        .await
    }

    /// Extract a value of a [`Shape`] type.
    pub async fn extract_typed<T>(&self, thread: &mut Thread, options: &ExtractOptions) -> AgentResult<T>
    where
        T: Shape + DeserializeOwned,
    {
        let descriptor = T::descriptor();
        let schema = compile(&descriptor)?;
        let decoder = Decoder::new(DecodeMode::Schema);
        debug!(model = %self.identifier(), target = %descriptor.type_name(), "Starting typed extraction");

        self.run(thread, Some(&schema), self.call_genconf(options), options, |text| {
            decoder.decode(text, &descriptor)?.into_typed::<T>()
        })
        .await
    }

    /// Extract from a single query in a fresh thread.
    pub async fn extract_from(&self, descriptor: &TypeDescriptor, query: &str) -> AgentResult<Instance> {
        let mut thread = Thread::new();
        thread.append(Role::In, query);
        self.extract(descriptor, &mut thread, &ExtractOptions::default())
            .await
    }

    /// Extract from each query concurrently, each in its own thread.
    pub async fn extract_each<I, S>(
        &self,
        descriptor: &TypeDescriptor,
        queries: I,
    ) -> Vec<AgentResult<Instance>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tasks = queries.into_iter().map(|query| {
            let query: String = query.into();
            async move { self.extract_from(descriptor, &query).await }
        });
        futures::future::join_all(tasks).await
    }

    /// Pick one of `labels` for `query`.
    pub async fn classify<I, S>(&self, labels: I, query: &str) -> AgentResult<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let descriptor = TypeDescriptor::enumeration(labels.into_iter().map(Into::<String>::into));
        let instance = self.extract_from(&descriptor, query).await?;
        Ok(instance.into_typed::<String>()?)
    }

    /// Generate a free-form JSON value.
    pub async fn json(&self, thread: &mut Thread, options: &ExtractOptions) -> AgentResult<JsonValue> {
        let decoder = Decoder::new(DecodeMode::Free);
        let genconf = self.call_genconf(options).json();
        debug!(model = %self.identifier(), "Starting free JSON generation");
        self.run(thread, None, genconf, options, |text| decoder.parse(text))
            .await
    }

    /// Generate plain text. Not retried.
    pub async fn call(&self, thread: &mut Thread, options: &ExtractOptions) -> AgentResult<RawOutput> {
        if options.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let genconf = self.call_genconf(options);
        self.fit_context(thread, &genconf, options.trim);
        let raw = self
            .invoker
            .invoke(thread, None, &genconf, options.cancel.as_ref())
            .await?;
        thread.append(Role::Out, raw.text.clone());
        Ok(raw)
    }

    /// Blocking [`extract`](Self::extract).
    ///
    /// Runs on a private current-thread runtime; do not call from async code.
    pub fn extract_blocking(
        &self,
        descriptor: &TypeDescriptor,
        thread: &mut Thread,
        options: &ExtractOptions,
    ) -> AgentResult<Instance> {
        block_on(self.extract(descriptor, thread, options))?
    }

    /// Blocking [`extract_typed`](Self::extract_typed).
    pub fn extract_typed_blocking<T>(&self, thread: &mut Thread, options: &ExtractOptions) -> AgentResult<T>
    where
        T: Shape + DeserializeOwned,
    {
        block_on(self.extract_typed::<T>(thread, options))?
    }

    /// Blocking [`extract_from`](Self::extract_from).
    pub fn extract_from_blocking(&self, descriptor: &TypeDescriptor, query: &str) -> AgentResult<Instance> {
        block_on(self.extract_from(descriptor, query))?
    }

    /// Blocking [`classify`](Self::classify).
    pub fn classify_blocking<I, S>(&self, labels: I, query: &str) -> AgentResult<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        block_on(self.classify(labels, query))?
    }

    /// Blocking [`json`](Self::json).
    pub fn json_blocking(&self, thread: &mut Thread, options: &ExtractOptions) -> AgentResult<JsonValue> {
        block_on(self.json(thread, options))?
    }

    /// Blocking [`call`](Self::call).
    pub fn call_blocking(&self, thread: &mut Thread, options: &ExtractOptions) -> AgentResult<RawOutput> {
        block_on(self.call(thread, options))?
    }

    fn call_genconf(&self, options: &ExtractOptions) -> GenConf {
        match &options.genconf {
            Some(overrides) => self.genconf.merge(overrides),
            None => self.genconf.clone(),
        }
    }

    /// Trim the thread so prompt plus output fit the context window.
    ///
    /// Returns the number of messages evicted.
    fn fit_context(&self, thread: &mut Thread, genconf: &GenConf, trim: TrimOptions) -> usize {
        let Some(ctx_len) = self.ctx_len else {
            return 0;
        };
        let reserve = genconf
            .max_tokens
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        let budget = ctx_len.saturating_sub(reserve);
        let counter = ModelTokenCounter::new(self.invoker.model().as_ref());
        let outcome = thread.trim(budget, &counter, trim);
        if !outcome.within_budget {
            warn!(
                model = %self.identifier(),
                budget,
                tokens = outcome.token_len,
                "Prompt exceeds the context budget after trimming"
            );
        }
        outcome.removed
    }

    async fn run<T, D>(
        &self,
        thread: &mut Thread,
        schema: Option<&NormalizedSchema>,
        genconf: GenConf,
        options: &ExtractOptions,
        decode: D,
    ) -> AgentResult<T>
    where
        D: Fn(&str) -> DecodeResult<T>,
    {
        if thread.last_role() != Some(Role::In) {
            warn!(model = %self.identifier(), "Thread does not end with an IN message");
        }

        let retry = options.retry.clone().unwrap_or_else(|| self.retry.clone());
        let mut controller = RetryController::new(retry);
        if let Some(schema) = schema {
            controller = controller.with_schema(schema.document().clone());
        }
        let cancel = options.cancel.as_ref();
        let mut attempt_genconf = genconf.clone();
        // Retry feedback lands after the caller's request and must not push it out.
        let mut request_at = thread.messages().iter().rposition(|m| m.role == Role::In);

        while let Some(attempt) = controller.begin_attempt() {
            if options.is_cancelled() {
                debug!(attempt, "Extraction cancelled before attempt");
                return Err(AgentError::Cancelled);
            }

            let trim = match request_at {
                Some(at) => options.trim.protect_from(at),
                None => options.trim,
            };
            let removed = self.fit_context(thread, &attempt_genconf, trim);
            request_at = request_at.map(|at| at.saturating_sub(removed));
            let raw = self
                .invoker
                .invoke(thread, schema, &attempt_genconf, cancel)
                .await?;
            if raw.is_truncated() {
                warn!(attempt, model = %self.identifier(), "Output stopped at the length limit");
            }

            match decode(&raw.text) {
                Ok(value) => {
                    controller.succeed();
                    thread.append(Role::Out, raw.text);
                    info!(attempt, model = %self.identifier(), "Extraction succeeded");
                    return Ok(value);
                }
                Err(err) => match controller.fail(err, &raw.text) {
                    Transition::Retry(remedy) => {
                        if let Some(feedback) = remedy.feedback.as_ref() {
                            thread.append(Role::Out, raw.text);
                            thread.append(Role::In, feedback.clone());
                        }
                        attempt_genconf = remedy.apply(&genconf);
                        if !remedy.wait.is_zero() {
                            wait_or_cancel(remedy.wait, cancel).await?;
                        }
                    }
                    Transition::Exhausted(err) => return Err(err.into()),
                },
            }
        }

        Err(GenerationError::failed("retry controller stopped without a result").into())
    }
}

async fn wait_or_cancel(wait: Duration, cancel: Option<&CancellationToken>) -> AgentResult<()> {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(AgentError::Cancelled),
            _ = tokio::time::sleep(wait) => Ok(()),
        },
        None => {
            tokio::time::sleep(wait).await;
            Ok(())
        }
    }
}

fn block_on<F: Future>(future: F) -> AgentResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use shapegen_core::CharRatioCounter;
    use shapegen_models::{FunctionModel, MockModel, ModelProfile, ModelResponse, StructuredOutput};
    use shapegen_output::{DecodeErrorKind, RecordSpec};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TEMPLATE: &str = "in: <u>{text}</u>\nout: <a>{text}</a>\ngen: <a>";

    fn person_list() -> TypeDescriptor {
        TypeDescriptor::list(TypeDescriptor::record(
            RecordSpec::new()
                .field("first_name", TypeDescriptor::string())
                .field("age", TypeDescriptor::int()),
        ))
    }

    fn handle(model: MockModel) -> ModelHandle {
        ModelHandle::new(Arc::new(model)).with_template(TEMPLATE)
    }

    fn query(text: &str) -> Thread {
        let mut thread = Thread::with_inst("Extract people.");
        thread.append(Role::In, text);
        thread
    }

    #[tokio::test]
    async fn test_extract_list_of_records() {
        let model = MockModel::new("local").with_text_response(r#"[{"first_name":"Ana","age":30}]"#);
        let handle = handle(model.clone());
        let mut thread = query("Ana is 30.");

        let instance = handle
            .extract(&person_list(), &mut thread, &ExtractOptions::default())
            .await
            .unwrap();

        let expected: Instance = vec![Instance::from_iter([
            ("first_name", Instance::from("Ana")),
            ("age", Instance::from(30_i64)),
        ])]
        .into();
        assert_eq!(instance, expected);
        assert_eq!(thread.len(), 2);
        assert_eq!(thread.last_role(), Some(Role::Out));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_feeds_back_and_succeeds() {
        let model = MockModel::new("local")
            .with_text_response("no json here")
            .with_text_response(r#"[{"first_name":"Ana","age":"30"}]"#);
        let handle = handle(model.clone());
        let mut thread = query("Ana is 30.");

        let instance = handle
            .extract(&person_list(), &mut thread, &ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(instance.as_list().unwrap().len(), 1);

        // IN, failed OUT, feedback IN, final OUT
        assert_eq!(thread.len(), 4);
        assert_eq!(thread.messages()[1].text, "no json here");
        assert!(thread.messages()[2].text.contains("could not parse"));

        let requests = model.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].genconf.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_always_malformed_exhausts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let model = FunctionModel::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ModelResponse::text("{not json"))
        });
        let handle = ModelHandle::new(Arc::new(model)).with_template(TEMPLATE);
        let mut thread = query("x");

        let err = handle
            .extract(
                &TypeDescriptor::int(),
                &mut thread,
                &ExtractOptions::new().retry(RetryConfig::new().max_attempts(3)),
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let AgentError::Extraction(err) = err else {
            panic!("expected an extraction error");
        };
        assert_eq!(err.attempt_count, 3);
        assert_eq!(err.kind, DecodeErrorKind::MalformedJson);
        assert_eq!(err.raw_text, "{not json");
    }

    #[tokio::test]
    async fn test_generation_failure_not_retried() {
        let model = MockModel::new("local").with_error("connection reset");
        let handle = handle(model.clone());
        let err = handle
            .extract(&TypeDescriptor::int(), &mut query("x"), &ExtractOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Generation(_)));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_attempts() {
        let model = MockModel::new("slow").with_delay(Duration::from_secs(30));
        let handle = handle(model.clone());
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let mut thread = query("x");
        let err = handle
            .extract(&TypeDescriptor::int(), &mut thread, &ExtractOptions::new().cancel(token))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(model.call_count(), 1);
        assert_eq!(thread.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_wait() {
        let model = MockModel::new("local").with_text_response("bad");
        let handle = handle(model.clone()).with_retry(RetryConfig::new().fixed(Duration::from_secs(30)));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let mut thread = query("x");
        let err = handle
            .extract(&TypeDescriptor::int(), &mut thread, &ExtractOptions::new().cancel(token))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(model.call_count(), 1);
        // Partial state stays for inspection
        assert_eq!(thread.len(), 3);
    }

    #[derive(Debug, PartialEq, Deserialize, shapegen_output::Shape)]
    struct Person {
        /// Given name
        first_name: String,
        age: u32,
        nickname: Option<String>,
    }

    #[tokio::test]
    async fn test_extract_typed() {
        let model = MockModel::new("local")
            .with_text_response(r#"{"first_name": "Rui", "age": 41}"#);
        let person: Person = handle(model)
            .extract_typed(&mut query("Rui is 41"), &ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(
            person,
            Person {
                first_name: "Rui".into(),
                age: 41,
                nickname: None
            }
        );
    }

    #[tokio::test]
    async fn test_classify_rejects_unknown_label() {
        let model = MockModel::new("local")
            .with_text_response("\"neutral\"")
            .with_text_response("\"positive\"");
        let label = handle(model.clone())
            .classify(["positive", "negative"], "I love it")
            .await
            .unwrap();
        assert_eq!(label, "positive");
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_json_mode() {
        let model = MockModel::new("api")
            .with_profile(ModelProfile::chat(StructuredOutput::Native))
            .with_text_response("Sure: {\"a\": [1, 2]}");
        let handle = ModelHandle::new(Arc::new(model.clone()));
        let value = handle
            .json(&mut query("give me json"), &ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
        assert!(model.recorded_requests()[0].genconf.wants_json());
    }

    #[rstest]
    #[case::int(TypeDescriptor::int(), "42", json!(42))]
    #[case::coerced_int(TypeDescriptor::int(), "\"42\"", json!(42))]
    #[case::boolean(TypeDescriptor::bool(), " true\n", json!(true))]
    #[case::list(TypeDescriptor::list(TypeDescriptor::string()), "```json\n[\"a\", \"b\"]\n```", json!(["a", "b"]))]
    #[tokio::test]
    async fn test_extract_lenient_replies(
        #[case] descriptor: TypeDescriptor,
        #[case] reply: &str,
        #[case] expected: JsonValue,
    ) {
        let model = MockModel::new("local").with_text_response(reply);
        let instance = handle(model.clone())
            .extract(&descriptor, &mut query("go"), &ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(instance.to_json(), expected);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_call_appends_output() {
        let model = MockModel::new("local").with_text_response("Hello!");
        let mut thread = query("Hi");
        let raw = handle(model)
            .call(&mut thread, &ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(raw.text, "Hello!");
        assert_eq!(thread.last().unwrap().text, "Hello!");
    }

    #[tokio::test]
    async fn test_options_genconf_merges() {
        let model = MockModel::new("local").with_text_response("1");
        let handle = handle(model.clone()).with_genconf(GenConf::new().max_tokens(64).temperature(0.7));
        handle
            .extract(
                &TypeDescriptor::int(),
                &mut query("one"),
                &ExtractOptions::new().genconf(GenConf::new().temperature(0.1)),
            )
            .await
            .unwrap();
        let genconf = &model.recorded_requests()[0].genconf;
        assert_eq!(genconf.max_tokens, Some(64));
        assert_eq!(genconf.temperature, Some(0.1));
    }

    #[tokio::test]
    async fn test_trims_to_context_window() {
        let model = MockModel::new("local").with_text_response("1");
        let handle = handle(model)
            .with_ctx_len(20)
            .with_genconf(GenConf::new().max_tokens(10));
        let mut thread = Thread::new();
        for i in 0..5 {
            thread.append(Role::In, format!("question {i} padded out"));
            thread.append(Role::Out, format!("answer {i} padded out"));
        }
        thread.append(Role::In, "last");

        handle
            .extract(&TypeDescriptor::int(), &mut thread, &ExtractOptions::default())
            .await
            .unwrap();

        // Only the final exchange is left
        assert_eq!(thread.len(), 2);
        assert_eq!(thread.messages()[0].text, "last");
        assert!(thread.token_len(&CharRatioCounter::default()) <= 20);
    }

    #[tokio::test]
    async fn test_retry_keeps_request_in_trimmed_prompt() {
        let model = MockModel::new("local")
            .with_text_response("not json at all, sorry friend")
            .with_text_response("7");
        let handle = handle(model.clone())
            .with_ctx_len(40)
            .with_genconf(GenConf::new().max_tokens(10));
        let mut thread = Thread::new();
        thread.append(Role::In, "earlier question");
        thread.append(Role::Out, "earlier answer");
        thread.append(Role::In, "How many days are in a week?");

        let instance = handle
            .extract(&TypeDescriptor::int(), &mut thread, &ExtractOptions::default())
            .await
            .unwrap();
        assert_eq!(instance.as_i64(), Some(7));

        let requests = model.recorded_requests();
        assert_eq!(requests.len(), 2);
        let retry_prompt = requests[1].prompt.as_rendered().unwrap_or_default();
        assert!(retry_prompt.contains("How many days are in a week?"));
        assert!(retry_prompt.contains("not json at all"));
        assert!(!retry_prompt.contains("earlier question"));
        assert_eq!(thread.messages()[0].text, "How many days are in a week?");
    }

    #[tokio::test]
    async fn test_extract_each_runs_independent_threads() {
        let model = FunctionModel::new(|request| {
            let prompt = request.prompt.as_rendered().unwrap_or_default();
            let n = prompt.matches('x').count();
            Ok(ModelResponse::text(n.to_string()))
        });
        let handle = ModelHandle::new(Arc::new(model)).with_template(TEMPLATE);
        let results = handle
            .extract_each(&TypeDescriptor::int(), ["x", "xx", "xxx"])
            .await;
        let values: Vec<i64> = results
            .into_iter()
            .map(|r| r.unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_blocking() {
        let model = MockModel::new("local").with_text_response("[1, 2]");
        let instance = handle(model)
            .extract_from_blocking(&TypeDescriptor::list(TypeDescriptor::int()), "numbers")
            .unwrap();
        assert_eq!(instance.to_json(), json!([1, 2]));
    }

    #[test]
    fn test_unresolved_template_is_render_error() {
        let handle = ModelHandle::new(Arc::new(MockModel::new("local")));
        let err = handle
            .call_blocking(&mut query("x"), &ExtractOptions::default())
            .unwrap_err();
        assert!(matches!(err, AgentError::Generation(GenerationError::Render(_))));
    }
}
