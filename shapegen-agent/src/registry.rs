//! Model registry: providers, the model catalog and chat formats.
//!
//! [`ModelRegistry::create`] turns a `provider:name` identifier into a ready
//! [`ModelHandle`]: the catalog supplies settings and arguments, a
//! [`ModelProvider`] builds the collaborator, and the format resolver finds
//! a chat template when the collaborator needs one.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use shapegen_formats::{ConfigError, FormatResolver, ModelCatalog, ResolvedModel, UnresolvedFormatError};
use shapegen_models::{BoxedModel, GenerationError, TemplateRenderer, TurnRenderer};
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AgentError, AgentResult};
use crate::handle::ModelHandle;

/// Builds collaborators for one provider.
pub trait ModelProvider: Send + Sync {
    /// Provider name as used in identifiers.
    fn name(&self) -> &str;

    /// Whether models from this provider take rendered prompts.
    fn needs_template(&self) -> bool {
        true
    }

    /// Check that `model` could be built (files exist, credentials set).
    fn can_construct(&self, _model: &ResolvedModel) -> Result<(), GenerationError> {
        Ok(())
    }

    /// Build the collaborator.
    fn build(&self, model: &ResolvedModel) -> Result<BoxedModel, GenerationError>;
}

/// Shared provider for dynamic dispatch.
pub type BoxedProvider = Arc<dyn ModelProvider>;

type BuildFn = dyn Fn(&ResolvedModel) -> Result<BoxedModel, GenerationError> + Send + Sync;

/// A provider backed by a closure.
pub struct FnProvider {
    name: String,
    needs_template: bool,
    build: Box<BuildFn>,
}

impl FnProvider {
    /// Create a provider named `name`.
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(&ResolvedModel) -> Result<BoxedModel, GenerationError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            needs_template: true,
            build: Box::new(build),
        }
    }

    /// Mark this provider's models as chat APIs without templates.
    #[must_use]
    pub fn chat(mut self) -> Self {
        self.needs_template = false;
        self
    }
}

impl std::fmt::Debug for FnProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProvider").field("name", &self.name).finish()
    }
}

impl ModelProvider for FnProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn needs_template(&self) -> bool {
        self.needs_template
    }

    fn build(&self, model: &ResolvedModel) -> Result<BoxedModel, GenerationError> {
        (self.build)(model)
    }
}

/// What [`ModelRegistry::check`] found for an identifier.
///
/// A check builds nothing, so a collaborator's embedded template is out of
/// reach. When configuration yields no template for a templated provider,
/// [`needs_embedded_template`](Self::needs_embedded_template) is set and
/// [`ModelRegistry::create`] succeeds only if the collaborator embeds one.
#[derive(Debug, Clone)]
pub struct CheckReport {
    /// The effective catalog entry.
    pub model: ResolvedModel,
    /// The template that would be used, if one resolves from configuration.
    pub template: Option<String>,
    /// Template resolution is left to the collaborator's embedded template.
    pub needs_embedded_template: bool,
}

/// Registry of providers plus the model and format configuration.
///
/// All methods take `&self`; share the registry behind an [`Arc`].
pub struct ModelRegistry {
    catalog: RwLock<ModelCatalog>,
    formats: RwLock<FormatResolver>,
    renderer: Arc<dyn TemplateRenderer>,
    providers: RwLock<IndexMap<String, BoxedProvider>>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("providers", &self.provider_names())
            .field("formats", &self.formats.read().len())
            .finish()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::from_parts(ModelCatalog::new(), FormatResolver::new())
    }
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in models and formats.
    pub fn with_base() -> AgentResult<Self> {
        Ok(Self::from_parts(ModelCatalog::with_base()?, FormatResolver::with_base()?))
    }

    /// Create a registry from an existing catalog and resolver.
    pub fn from_parts(catalog: ModelCatalog, formats: FormatResolver) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            formats: RwLock::new(formats),
            renderer: Arc::new(TurnRenderer),
            providers: RwLock::new(IndexMap::new()),
        }
    }

    /// Use a different template renderer for created handles.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Register a provider, builder style.
    #[must_use]
    pub fn with_provider(self, provider: impl ModelProvider + 'static) -> Self {
        self.register(Arc::new(provider));
        self
    }

    /// Register a provider, replacing any with the same name.
    pub fn register(&self, provider: BoxedProvider) {
        let name = provider.name().to_string();
        debug!(provider = %name, "Registered model provider");
        self.providers.write().insert(name, provider);
    }

    /// Get a provider by name.
    pub fn provider(&self, name: &str) -> Option<BoxedProvider> {
        self.providers.read().get(name).cloned()
    }

    /// Registered provider names.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }

    /// Read access to the model catalog.
    pub fn catalog(&self) -> RwLockReadGuard<'_, ModelCatalog> {
        self.catalog.read()
    }

    /// Write access to the model catalog.
    pub fn catalog_mut(&self) -> RwLockWriteGuard<'_, ModelCatalog> {
        self.catalog.write()
    }

    /// Read access to the format resolver.
    pub fn formats(&self) -> RwLockReadGuard<'_, FormatResolver> {
        self.formats.read()
    }

    /// Write access to the format resolver.
    pub fn formats_mut(&self) -> RwLockWriteGuard<'_, FormatResolver> {
        self.formats.write()
    }

    /// Load a user format file over the built-in rules.
    pub fn load_user_formats(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.formats.write().load_user_file(path)
    }

    /// Load a user model file over the built-in catalog.
    pub fn load_user_models(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.catalog.write().load_user_file(path)
    }

    /// Drop all user formats and models.
    pub fn clear_user(&self) {
        self.formats.write().clear_user();
        self.catalog.write().clear_user();
    }

    /// Create a handle for `identifier`.
    pub fn create(&self, identifier: &str) -> AgentResult<ModelHandle> {
        self.create_with(identifier, None)
    }

    /// Create a handle, forcing a format rule name or literal template.
    pub fn create_with(&self, identifier: &str, format: Option<&str>) -> AgentResult<ModelHandle> {
        let resolved = self.catalog.read().resolve(identifier)?;
        let provider = self
            .provider(resolved.provider())
            .ok_or_else(|| AgentError::UnknownProvider(resolved.provider().to_string()))?;

        provider.can_construct(&resolved)?;
        let model = provider.build(&resolved)?;

        let ctx_len = resolved.ctx_len().or(model.profile().context_length);
        let needs_template = model.profile().needs_template();
        let embedded = model.embedded_template();

        let mut handle = ModelHandle::new(model)
            .with_genconf(resolved.genconf.clone())
            .with_renderer(self.renderer.clone());
        if let Some(ctx_len) = ctx_len {
            handle = handle.with_ctx_len(ctx_len);
        }

        if needs_template {
            let template = match self.configured_template(&resolved, format)? {
                Some(template) => template,
                None => embedded.ok_or_else(|| UnresolvedFormatError::new(identifier))?,
            };
            self.renderer.validate(&template)?;
            handle = handle.with_template(template);
        } else if format.is_some() {
            debug!(identifier, "Ignoring format for a model without templates");
        }

        info!(
            identifier,
            model = %resolved.id,
            ctx_len = ?handle.ctx_len(),
            templated = needs_template,
            "Created model handle"
        );
        Ok(handle)
    }

    /// Resolve an identifier without building anything.
    pub fn check(&self, identifier: &str) -> AgentResult<CheckReport> {
        let model = self.catalog.read().resolve(identifier)?;
        let provider = self
            .provider(model.provider())
            .ok_or_else(|| AgentError::UnknownProvider(model.provider().to_string()))?;
        provider.can_construct(&model)?;

        let template = if provider.needs_template() {
            self.configured_template(&model, None)?
        } else {
            None
        };
        let needs_embedded_template = provider.needs_template() && template.is_none();
        if needs_embedded_template {
            debug!(identifier, "No configured template, deferring to the collaborator");
        }
        Ok(CheckReport {
            model,
            template,
            needs_embedded_template,
        })
    }

    /// Template from configuration: the forced format, then the catalog
    /// format, then pattern rules on the model name and the identifier name.
    fn configured_template(
        &self,
        model: &ResolvedModel,
        forced: Option<&str>,
    ) -> AgentResult<Option<String>> {
        let formats = self.formats.read();
        if let Some(format) = forced.or(model.format.as_deref()) {
            return Ok(Some(formats.resolve(&model.name, Some(format))?));
        }
        if let Some(template) = formats.resolve_pattern(&model.name)? {
            return Ok(Some(template));
        }
        if model.id.name() != model.name {
            return Ok(formats.resolve_pattern(model.id.name())?);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shapegen_core::{Role, Thread};
    use shapegen_formats::{FormatRule, ModelEntry};
    use shapegen_models::{MockModel, ModelProfile, StructuredOutput};
    use shapegen_output::TypeDescriptor;
    use std::io::Write;

    const T1: &str = "in: <u>{text}</u>\nout: <a>{text}</a>\ngen: <a>";

    fn mock_provider(name: &str) -> FnProvider {
        FnProvider::new(name, |model| {
            Ok(Arc::new(MockModel::new(model.name.clone()).with_text_response("42")) as BoxedModel)
        })
    }

    fn registry() -> ModelRegistry {
        let formats = FormatResolver::from_rules([
            FormatRule::new("t1", T1),
            FormatRule::new("oc", "t1").with_pattern("openchat"),
        ])
        .unwrap();
        let mut catalog = ModelCatalog::new();
        catalog
            .add(
                "local:chat",
                ModelEntry::new()
                    .with_name("openchat-3.5-1210.gguf")
                    .with_arg("ctx_len", 2048),
            )
            .unwrap();
        ModelRegistry::from_parts(catalog, formats).with_provider(mock_provider("local"))
    }

    #[tokio::test]
    async fn test_create_resolves_template_by_pattern() {
        let handle = registry().create("local:chat").unwrap();
        assert_eq!(handle.template(), Some(T1));
        assert_eq!(handle.ctx_len(), Some(2048));

        let value = handle
            .extract_from(&TypeDescriptor::int(), "the answer")
            .await
            .unwrap();
        assert_eq!(value.as_i64(), Some(42));
    }

    #[test]
    fn test_forced_format() {
        let registry = registry();
        let handle = registry.create_with("local:anything", Some("t1")).unwrap();
        assert_eq!(handle.template(), Some(T1));

        let literal = "in: {text}\nout: {text}";
        let handle = registry.create_with("local:anything", Some(literal)).unwrap();
        assert_eq!(handle.template(), Some(literal));
    }

    #[test]
    fn test_invalid_forced_template() {
        let err = registry()
            .create_with("local:anything", Some("not a template"))
            .unwrap_err();
        assert!(matches!(err, AgentError::Generation(GenerationError::Render(_))));
    }

    #[test]
    fn test_embedded_template_fallback() {
        let registry = registry().with_provider(FnProvider::new("gguf", |model| {
            Ok(Arc::new(MockModel::new(model.name.clone()).with_embedded_template(T1)) as BoxedModel)
        }));
        let handle = registry.create("gguf:mystery-7b").unwrap();
        assert_eq!(handle.template(), Some(T1));
    }

    #[test]
    fn test_unresolved_format() {
        let err = registry().create("local:mystery-7b").unwrap_err();
        let AgentError::UnresolvedFormat(err) = err else {
            panic!("expected an unresolved format error");
        };
        assert_eq!(err.model_identifier, "local:mystery-7b");
    }

    #[test]
    fn test_chat_models_skip_templates() {
        let registry = registry().with_provider(
            FnProvider::new("api", |model| {
                Ok(Arc::new(
                    MockModel::new(model.name.clone())
                        .with_profile(ModelProfile::chat(StructuredOutput::Native)),
                ) as BoxedModel)
            })
            .chat(),
        );
        let handle = registry.create("api:gpt-x").unwrap();
        assert_eq!(handle.template(), None);
        assert!(registry.check("api:gpt-x").unwrap().template.is_none());
    }

    #[test]
    fn test_unknown_provider() {
        let err = registry().create("nowhere:model").unwrap_err();
        assert!(matches!(err, AgentError::UnknownProvider(p) if p == "nowhere"));
    }

    #[test]
    fn test_alias_and_genconf() {
        let registry = registry();
        registry
            .catalog_mut()
            .add("alias:fast", ModelEntry::new().with_name("local:chat"))
            .unwrap();
        registry
            .catalog_mut()
            .update(
                "local:chat",
                ModelEntry::new().with_genconf(shapegen_core::GenConf::new().temperature(0.3)),
            )
            .unwrap();

        let handle = registry.create("alias:fast").unwrap();
        assert_eq!(handle.template(), Some(T1));
        assert_eq!(handle.genconf().temperature, Some(0.3));
    }

    #[test]
    fn test_user_formats_from_file() {
        let registry = registry();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            serde_json::json!({"mystery": {"match": "mystery", "template": "t1"}})
        )
        .unwrap();

        registry.load_user_formats(file.path()).unwrap();
        let handle = registry.create("local:mystery-7b").unwrap();
        assert_eq!(handle.template(), Some(T1));

        registry.clear_user();
        assert!(registry.create("local:mystery-7b").is_err());
    }

    #[test]
    fn test_check_reports_without_building() {
        let registry = ModelRegistry::from_parts(ModelCatalog::new(), FormatResolver::new())
            .with_provider(FnProvider::new("local", |_| {
                Err(GenerationError::failed("should not build"))
            }));
        let report = registry.check("local:model.gguf").unwrap();
        assert_eq!(report.model.name, "model.gguf");
        assert!(report.template.is_none());
        assert!(report.needs_embedded_template);
        assert!(registry.create("local:model.gguf").is_err());
    }

    #[test]
    fn test_check_reports_configured_template() {
        let registry = registry().with_provider(
            FnProvider::new("api", |_| Err(GenerationError::failed("unused"))).chat(),
        );

        let report = registry.check("local:chat").unwrap();
        assert_eq!(report.template.as_deref(), Some(T1));
        assert!(!report.needs_embedded_template);

        let report = registry.check("api:gpt").unwrap();
        assert!(report.template.is_none());
        assert!(!report.needs_embedded_template);
    }

    #[test]
    fn test_base_templates_render() {
        let formats = FormatResolver::with_base().unwrap();
        for name in formats.names() {
            let template = formats.template_of(&name).unwrap();
            TurnRenderer.validate(&template).unwrap();
        }
    }

    #[test]
    fn test_base_registry_creates_llamacpp_handles() {
        let registry = ModelRegistry::with_base()
            .unwrap()
            .with_provider(mock_provider("llamacpp"));
        let handle = registry
            .create("llamacpp:Meta-Llama-3-8B-Instruct.Q4_K_M.gguf")
            .unwrap();
        assert_eq!(handle.ctx_len(), Some(4096));
        assert_eq!(handle.genconf().max_tokens, Some(1024));

        let mut thread = Thread::new();
        thread.append(Role::In, "hi");
        let rendered = TurnRenderer
            .render(handle.template().unwrap(), thread.messages(), true)
            .unwrap();
        assert!(rendered.starts_with("<|begin_of_text|>"));
    }
}
