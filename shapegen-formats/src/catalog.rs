//! The model catalog.
//!
//! Configuration is keyed `provider -> entry name -> ModelEntry`. Each
//! provider may carry a `default` entry whose fields every other entry of
//! that provider inherits. Entries of the `alias` provider redirect to
//! another `provider:name` identifier through their `name` field.
//!
//! Unlike format rules, user entries are merged over base entries field by
//! field.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use shapegen_core::{GenConf, ModelId, ALIAS_PROVIDER};
use std::path::Path;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::resolver::MAX_ALIAS_HOPS;

/// Built-in model catalog.
pub const BASE_MODELS: &str = include_str!("../assets/base_models.json");

/// Name of the per-provider defaults entry.
pub const DEFAULT_ENTRY: &str = "default";

/// Creation argument holding the context length in tokens.
pub const CTX_LEN_ARG: &str = "ctx_len";

/// One model entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Model name passed to the collaborator, or the target identifier for aliases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Format rule name or literal template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Generation settings.
    #[serde(default, skip_serializing_if = "GenConf::is_empty")]
    pub genconf: GenConf,
    /// Other creation arguments handed to the collaborator.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, JsonValue>,
}

impl ModelEntry {
    /// Create an empty entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set generation settings.
    #[must_use]
    pub fn with_genconf(mut self, genconf: GenConf) -> Self {
        self.genconf = genconf;
        self
    }

    /// Set one creation argument.
    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// `over` merged onto `self`, field by field.
    #[must_use]
    pub fn merge(&self, over: &ModelEntry) -> ModelEntry {
        let mut args = self.args.clone();
        args.extend(over.args.iter().map(|(k, v)| (k.clone(), v.clone())));
        ModelEntry {
            name: over.name.clone().or_else(|| self.name.clone()),
            format: over.format.clone().or_else(|| self.format.clone()),
            genconf: self.genconf.merge(&over.genconf),
            args,
        }
    }
}

/// A catalog lookup after alias and default resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    /// Identifier after following aliases.
    pub id: ModelId,
    /// Name handed to the collaborator.
    pub name: String,
    /// Format rule name or template, if configured.
    pub format: Option<String>,
    /// Provider defaults merged with the entry's settings.
    pub genconf: GenConf,
    /// Provider defaults merged with the entry's arguments.
    pub args: Map<String, JsonValue>,
    /// Whether the catalog has an entry for this model.
    pub registered: bool,
}

impl ResolvedModel {
    /// Provider name.
    #[must_use]
    pub fn provider(&self) -> &str {
        self.id.provider()
    }

    /// Context length from the `ctx_len` argument.
    #[must_use]
    pub fn ctx_len(&self) -> Option<usize> {
        self.args
            .get(CTX_LEN_ARG)
            .and_then(JsonValue::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }
}

type ProviderMap = IndexMap<String, IndexMap<String, ModelEntry>>;

/// Layered provider and model configuration.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    base: ProviderMap,
    user: ProviderMap,
}

impl ModelCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with the built-in entries.
    pub fn with_base() -> Result<Self, ConfigError> {
        Self::from_base_json(BASE_MODELS)
    }

    /// Create a catalog whose base layer is the given JSON document.
    pub fn from_base_json(json: &str) -> Result<Self, ConfigError> {
        let catalog = Self {
            base: parse_providers(json)?,
            user: ProviderMap::new(),
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Configured providers, base first.
    #[must_use]
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.base.keys().cloned().collect();
        names.extend(
            self.user
                .keys()
                .filter(|k| !self.base.contains_key(*k))
                .cloned(),
        );
        names
    }

    /// Whether `provider` appears in either layer.
    #[must_use]
    pub fn has_provider(&self, provider: &str) -> bool {
        self.base.contains_key(provider) || self.user.contains_key(provider)
    }

    /// Effective entry, without provider defaults.
    #[must_use]
    pub fn entry(&self, provider: &str, name: &str) -> Option<ModelEntry> {
        let base = self.base.get(provider).and_then(|p| p.get(name));
        let user = self.user.get(provider).and_then(|p| p.get(name));
        match (base, user) {
            (Some(b), Some(u)) => Some(b.merge(u)),
            (Some(e), None) | (None, Some(e)) => Some(e.clone()),
            (None, None) => None,
        }
    }

    /// Effective `default` entry of `provider`.
    #[must_use]
    pub fn default_entry(&self, provider: &str) -> ModelEntry {
        self.entry(provider, DEFAULT_ENTRY).unwrap_or_default()
    }

    /// Effective entry for `provider:name`.
    pub fn get(&self, identifier: &str) -> Result<Option<ModelEntry>, ConfigError> {
        let id = ModelId::parse(identifier)?;
        Ok(self.entry(id.provider(), id.name()))
    }

    /// Identifiers of all entries, optionally for one provider.
    #[must_use]
    pub fn list(&self, provider: Option<&str>) -> Vec<String> {
        let mut out = Vec::new();
        for p in self.providers() {
            if provider.is_some_and(|want| want != p) {
                continue;
            }
            let mut names: Vec<&String> = self
                .base
                .get(&p)
                .map(|m| m.keys().collect())
                .unwrap_or_default();
            if let Some(user) = self.user.get(&p) {
                let extra: Vec<&String> = user.keys().filter(|k| !names.contains(k)).collect();
                names.extend(extra);
            }
            out.extend(
                names
                    .into_iter()
                    .filter(|n| n.as_str() != DEFAULT_ENTRY)
                    .map(|n| format!("{p}:{n}")),
            );
        }
        out
    }

    /// Resolve an identifier into its effective configuration.
    ///
    /// Unknown names of any provider resolve to themselves with that
    /// provider's defaults, so local model files work unregistered.
    pub fn resolve(&self, identifier: &str) -> Result<ResolvedModel, ConfigError> {
        let id = self.follow_aliases(ModelId::parse(identifier)?)?;
        let entry = self.entry(id.provider(), id.name());
        let registered = entry.is_some();
        let entry = entry.unwrap_or_default();
        let merged = self.default_entry(id.provider()).merge(&entry);

        debug!(identifier, resolved = %id, registered, "Resolved model entry");
        Ok(ResolvedModel {
            name: entry.name.unwrap_or_else(|| id.name().to_string()),
            format: merged.format,
            genconf: merged.genconf,
            args: merged.args,
            registered,
            id,
        })
    }

    fn follow_aliases(&self, start: ModelId) -> Result<ModelId, ConfigError> {
        let mut chain: Vec<String> = Vec::new();
        let mut id = start;
        while id.is_alias() {
            let key = id.to_string();
            let seen = chain.contains(&key);
            chain.push(key);
            if seen || chain.len() > MAX_ALIAS_HOPS {
                return Err(ConfigError::cyclic(chain));
            }
            let target = self
                .entry(ALIAS_PROVIDER, id.name())
                .ok_or_else(|| ConfigError::UnknownModel(id.to_string()))?
                .name
                .ok_or_else(|| ConfigError::malformed(format!("alias '{id}' has no target name")))?;
            id = ModelId::parse(&target)?;
        }
        if let Some(first) = chain.first() {
            debug!(alias = %first, target = %id, hops = chain.len(), "Followed model alias");
        }
        Ok(id)
    }

    /// Check that no alias chain loops.
    ///
    /// Aliases pointing at missing entries are allowed here and only fail
    /// when resolved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for identifier in self.list(Some(ALIAS_PROVIDER)) {
            match self.follow_aliases(ModelId::parse(&identifier)?) {
                Ok(_) | Err(ConfigError::UnknownModel(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Add a new user entry.
    pub fn add(&mut self, identifier: &str, entry: ModelEntry) -> Result<(), ConfigError> {
        let id = ModelId::parse(identifier)?;
        if self.entry(id.provider(), id.name()).is_some() {
            return Err(ConfigError::DuplicateModel(id.to_string()));
        }
        let mut user = self.user.clone();
        user.entry(id.provider().to_string())
            .or_default()
            .insert(id.name().to_string(), entry);
        self.commit(user)
    }

    /// Merge `entry` onto an existing entry, field by field.
    pub fn update(&mut self, identifier: &str, entry: ModelEntry) -> Result<(), ConfigError> {
        let id = ModelId::parse(identifier)?;
        if self.entry(id.provider(), id.name()).is_none() {
            return Err(ConfigError::UnknownModel(id.to_string()));
        }
        let mut user = self.user.clone();
        let slot = user
            .entry(id.provider().to_string())
            .or_default()
            .entry(id.name().to_string())
            .or_default();
        *slot = slot.merge(&entry);
        self.commit(user)
    }

    /// Delete a user entry.
    pub fn delete(&mut self, identifier: &str) -> Result<ModelEntry, ConfigError> {
        let id = ModelId::parse(identifier)?;
        if !self.has_provider(id.provider()) {
            return Err(ConfigError::UnknownProvider(id.provider().to_string()));
        }
        let in_user = self
            .user
            .get(id.provider())
            .is_some_and(|p| p.contains_key(id.name()));
        if !in_user {
            let in_base = self
                .base
                .get(id.provider())
                .is_some_and(|p| p.contains_key(id.name()));
            return Err(if in_base {
                ConfigError::ReadOnly(id.to_string())
            } else {
                ConfigError::UnknownModel(id.to_string())
            });
        }

        let mut user = self.user.clone();
        let removed = user
            .get_mut(id.provider())
            .and_then(|p| p.shift_remove(id.name()))
            .ok_or_else(|| ConfigError::UnknownModel(id.to_string()))?;
        if user.get(id.provider()).is_some_and(|p| p.is_empty()) {
            user.shift_remove(id.provider());
        }
        self.commit(user)?;
        Ok(removed)
    }

    /// Merge a JSON document into the user layer, field by field.
    pub fn load_user_str(&mut self, json: &str) -> Result<(), ConfigError> {
        let incoming = parse_providers(json)?;
        let mut count = 0;
        let mut user = self.user.clone();
        for (provider, entries) in incoming {
            let target = user.entry(provider).or_default();
            for (name, entry) in entries {
                let slot = target.entry(name).or_default();
                *slot = slot.merge(&entry);
                count += 1;
            }
        }
        self.commit(user)?;
        info!(entries = count, "Loaded user model entries");
        Ok(())
    }

    /// Merge a user model file.
    pub fn load_user_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        self.load_user_str(&json)
    }

    /// The user layer as a JSON document.
    pub fn user_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(&self.user)?)
    }

    /// Write the user layer to `path`.
    pub fn save_user_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.user_json()?).map_err(|e| ConfigError::io(path, e))
    }

    /// Drop every user entry.
    pub fn clear_user(&mut self) {
        self.user.clear();
    }

    fn commit(&mut self, user: ProviderMap) -> Result<(), ConfigError> {
        let previous = std::mem::replace(&mut self.user, user);
        if let Err(err) = self.validate() {
            self.user = previous;
            return Err(err);
        }
        Ok(())
    }
}

fn parse_providers(json: &str) -> Result<ProviderMap, ConfigError> {
    let providers: ProviderMap = serde_json::from_str(json)?;
    for (provider, entries) in &providers {
        if provider == ALIAS_PROVIDER {
            if let Some((name, _)) = entries.iter().find(|(_, e)| e.name.is_none()) {
                return Err(ConfigError::malformed(format!(
                    "alias '{name}' has no target name"
                )));
            }
        }
    }
    Ok(providers)
}
