//! The format resolver.
//!
//! Rules live in two layers. The base layer is fixed once the resolver is
//! built; the user layer is loaded from configuration and changed through
//! [`FormatResolver::add`], [`FormatResolver::update`] and
//! [`FormatResolver::delete`]. A user rule replaces a base rule of the same
//! name entirely, and user patterns are tried before base patterns.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{ConfigError, ResolveError, UnresolvedFormatError};
use crate::rule::{build_layer, layer_to_json, parse_layer, CompiledRule, FormatRule, Layer};

/// Built-in format rules.
pub const BASE_FORMATS: &str = include_str!("../assets/base_formats.json");

/// Longest alias chain followed before reporting a cycle.
pub const MAX_ALIAS_HOPS: usize = 16;

/// Maps model identifiers to chat templates.
#[derive(Debug, Clone, Default)]
pub struct FormatResolver {
    base: Layer,
    user: Layer,
}

impl FormatResolver {
    /// Create a resolver with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver with the built-in rules.
    pub fn with_base() -> Result<Self, ConfigError> {
        Self::from_base_json(BASE_FORMATS)
    }

    /// Create a resolver whose base layer is the given JSON document.
    pub fn from_base_json(json: &str) -> Result<Self, ConfigError> {
        let resolver = Self {
            base: parse_layer(json)?,
            user: Layer::new(),
        };
        resolver.validate()?;
        Ok(resolver)
    }

    /// Create a resolver whose base layer is `rules`.
    pub fn from_rules(rules: impl IntoIterator<Item = FormatRule>) -> Result<Self, ConfigError> {
        let resolver = Self {
            base: build_layer(rules)?,
            user: Layer::new(),
        };
        resolver.validate()?;
        Ok(resolver)
    }

    /// Effective rule named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FormatRule> {
        self.user
            .get(name)
            .or_else(|| self.base.get(name))
            .map(|c| &c.rule)
    }

    /// Whether a rule named `name` exists in either layer.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Whether `name` is a built-in rule.
    #[must_use]
    pub fn is_builtin(&self, name: &str) -> bool {
        self.base.contains_key(name)
    }

    /// Effective rules in resolution order: user layer, then unshadowed base rules.
    pub fn rules(&self) -> impl Iterator<Item = &FormatRule> {
        self.compiled().map(|c| &c.rule)
    }

    /// Effective rule names in resolution order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.rules().map(|r| r.name.clone()).collect()
    }

    /// Number of effective rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.compiled().count()
    }

    /// Whether there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.user.is_empty()
    }

    fn compiled(&self) -> impl Iterator<Item = &CompiledRule> {
        self.user.values().chain(
            self.base
                .values()
                .filter(|c| !self.user.contains_key(&c.rule.name)),
        )
    }

    /// First rule whose pattern matches `identifier`.
    #[must_use]
    pub fn matching(&self, identifier: &str) -> Option<&FormatRule> {
        self.compiled()
            .find(|c| c.matches(identifier))
            .map(|c| &c.rule)
    }

    /// Resolve the template for a model.
    ///
    /// An explicit template naming a rule is followed through its alias
    /// chain; any other explicit text is returned verbatim. Without one, the
    /// first rule whose pattern matches `identifier` is used.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shapegen_formats::{FormatResolver, FormatRule};
    ///
    /// let resolver = FormatResolver::from_rules([
    ///     FormatRule::new("chatml", "T1"),
    ///     FormatRule::new("oc", "chatml").with_pattern("openchat"),
    /// ])
    /// .unwrap();
    ///
    /// assert_eq!(resolver.resolve("openchat-3.5-1210.gguf", None).unwrap(), "T1");
    /// assert_eq!(resolver.resolve("anything", Some("chatml")).unwrap(), "T1");
    /// assert_eq!(resolver.resolve("anything", Some("raw")).unwrap(), "raw");
    /// ```
    pub fn resolve(&self, identifier: &str, explicit: Option<&str>) -> Result<String, ResolveError> {
        if let Some(explicit) = explicit {
            return match self.get(explicit) {
                Some(rule) => Ok(self.follow(rule)?),
                None => Ok(explicit.to_string()),
            };
        }
        self.resolve_pattern(identifier)?
            .ok_or_else(|| UnresolvedFormatError::new(identifier).into())
    }

    /// Resolve by pattern only, returning `None` when nothing matches.
    pub fn resolve_pattern(&self, identifier: &str) -> Result<Option<String>, ConfigError> {
        match self.matching(identifier) {
            Some(rule) => {
                debug!(rule = %rule.name, identifier, "Matched format rule");
                self.follow(rule).map(Some)
            }
            None => {
                debug!(identifier, "No format rule matched");
                Ok(None)
            }
        }
    }

    /// Template text of the rule named `name`, following aliases.
    pub fn template_of(&self, name: &str) -> Result<String, ConfigError> {
        let rule = self
            .get(name)
            .ok_or_else(|| ConfigError::UnknownRule(name.to_string()))?;
        self.follow(rule)
    }

    fn follow(&self, start: &FormatRule) -> Result<String, ConfigError> {
        let mut chain = vec![start.name.clone()];
        let mut current = start;
        while let Some(next) = self.get(&current.template) {
            let seen = chain.iter().any(|n| n == &next.name);
            chain.push(next.name.clone());
            if seen || chain.len() > MAX_ALIAS_HOPS + 1 {
                return Err(ConfigError::cyclic(chain));
            }
            current = next;
        }
        if chain.len() > 1 {
            debug!(rule = %start.name, target = %current.name, hops = chain.len() - 1, "Followed format alias");
        }
        Ok(current.template.clone())
    }

    /// Check every rule's alias chain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in self.rules() {
            self.follow(rule)?;
        }
        Ok(())
    }

    /// Add a new user rule.
    pub fn add(&mut self, rule: FormatRule) -> Result<(), ConfigError> {
        if self.contains(&rule.name) {
            return Err(ConfigError::DuplicateRule(rule.name));
        }
        let mut user = self.user.clone();
        let compiled = CompiledRule::compile(rule)?;
        user.insert(compiled.rule.name.clone(), compiled);
        self.commit(user)
    }

    /// Replace an existing rule. Built-in rules are overridden in the user layer.
    pub fn update(&mut self, rule: FormatRule) -> Result<(), ConfigError> {
        if !self.contains(&rule.name) {
            return Err(ConfigError::UnknownRule(rule.name));
        }
        let mut user = self.user.clone();
        let compiled = CompiledRule::compile(rule)?;
        user.insert(compiled.rule.name.clone(), compiled);
        self.commit(user)
    }

    /// Delete a user rule. A shadowed built-in rule becomes visible again.
    pub fn delete(&mut self, name: &str) -> Result<FormatRule, ConfigError> {
        if !self.user.contains_key(name) {
            return Err(if self.is_builtin(name) {
                ConfigError::ReadOnly(name.to_string())
            } else {
                ConfigError::UnknownRule(name.to_string())
            });
        }
        let mut user = self.user.clone();
        let removed = user.shift_remove(name);
        self.commit(user)?;
        removed
            .map(|c| c.rule)
            .ok_or_else(|| ConfigError::UnknownRule(name.to_string()))
    }

    /// Merge rules into the user layer, replacing same-named rules whole.
    pub fn merge_user_rules(
        &mut self,
        rules: impl IntoIterator<Item = FormatRule>,
    ) -> Result<(), ConfigError> {
        let mut user = self.user.clone();
        user.extend(build_layer(rules)?);
        self.commit(user)
    }

    /// Merge a `{name: {match, template}}` JSON document into the user layer.
    pub fn load_user_str(&mut self, json: &str) -> Result<(), ConfigError> {
        let incoming = parse_layer(json)?;
        let count = incoming.len();
        let mut user = self.user.clone();
        user.extend(incoming);
        self.commit(user)?;
        info!(rules = count, total = self.len(), "Loaded user format rules");
        Ok(())
    }

    /// Merge a user rule file.
    pub fn load_user_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        self.load_user_str(&json)
    }

    /// The user layer as a JSON document.
    pub fn user_json(&self) -> Result<String, ConfigError> {
        layer_to_json(&self.user)
    }

    /// Write the user layer to `path`.
    pub fn save_user_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.user_json()?).map_err(|e| ConfigError::io(path, e))
    }

    /// Drop every user rule.
    pub fn clear_user(&mut self) {
        self.user.clear();
    }

    /// Install `user` if the resulting tables are consistent.
    fn commit(&mut self, user: Layer) -> Result<(), ConfigError> {
        let previous = std::mem::replace(&mut self.user, user);
        if let Err(err) = self.validate() {
            self.user = previous;
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn sample() -> FormatResolver {
        FormatResolver::from_rules([
            FormatRule::new("chatml", "T1"),
            FormatRule::new("oc", "chatml").with_pattern("openchat"),
        ])
        .unwrap()
    }

    #[test]
    fn test_alias_hop() {
        assert_eq!(sample().resolve("openchat-3.5-1210.gguf", None).unwrap(), "T1");
    }

    #[test]
    fn test_case_insensitive_match() {
        assert_eq!(sample().resolve("OpenChat-3.6.GGUF", None).unwrap(), "T1");
    }

    #[test]
    fn test_unresolved() {
        let err = sample().resolve("mystery-7b.gguf", None).unwrap_err();
        match err {
            ResolveError::Unresolved(e) => assert_eq!(e.model_identifier, "mystery-7b.gguf"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_patternless_rule_never_matches() {
        assert!(sample().matching("chatml").is_none());
    }

    #[test]
    fn test_explicit_template() {
        let resolver = sample();
        assert_eq!(resolver.resolve("x", Some("oc")).unwrap(), "T1");
        assert_eq!(resolver.resolve("x", Some("in: {text}")).unwrap(), "in: {text}");
    }

    #[test]
    fn test_user_layer_checked_first() {
        let mut resolver = sample();
        resolver
            .add(FormatRule::new("mine", "T2").with_pattern("openchat-3\\.6"))
            .unwrap();
        assert_eq!(resolver.resolve("openchat-3.6-8b", None).unwrap(), "T2");
        assert_eq!(resolver.resolve("openchat-3.5", None).unwrap(), "T1");
        assert_eq!(resolver.names(), vec!["mine", "chatml", "oc"]);
    }

    #[test]
    fn test_user_rule_replaces_base_whole() {
        let mut resolver = sample();
        resolver.load_user_str(r#"{"oc": {"template": "T3"}}"#).unwrap();
        // The user copy has no pattern, so the base pattern is gone too
        assert!(resolver.matching("openchat").is_none());
        assert_eq!(resolver.template_of("oc").unwrap(), "T3");
        assert_eq!(resolver.len(), 2);
    }

    #[test]
    fn test_cycle_rejected_and_rolled_back() {
        let mut resolver = sample();
        let err = resolver
            .load_user_str(r#"{"chatml": {"template": "oc"}}"#)
            .unwrap_err();
        assert!(err.is_cyclic());
        assert_eq!(resolver.template_of("chatml").unwrap(), "T1");
    }

    #[test]
    fn test_self_alias_is_cycle() {
        let err = FormatResolver::from_rules([FormatRule::new("a", "a")]).unwrap_err();
        assert_eq!(err.to_string(), "Cyclic alias: a -> a");
    }

    #[test]
    fn test_long_chain_is_cycle() {
        let rules = (0..20).map(|i| FormatRule::new(format!("r{i}"), format!("r{}", i + 1)));
        let err = FormatResolver::from_rules(rules).unwrap_err();
        assert!(err.is_cyclic());
    }

    #[test]
    fn test_add_update_delete() {
        let mut resolver = sample();

        let err = resolver.add(FormatRule::new("chatml", "x")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRule(_)));

        let err = resolver.update(FormatRule::new("nope", "x")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRule(_)));

        resolver.update(FormatRule::new("chatml", "T9")).unwrap();
        assert_eq!(resolver.resolve("openchat", None).unwrap(), "T9");

        let removed = resolver.delete("chatml").unwrap();
        assert_eq!(removed.template, "T9");
        assert_eq!(resolver.resolve("openchat", None).unwrap(), "T1");

        let err = resolver.delete("chatml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadOnly(_)));
        let err = resolver.delete("nope").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRule(_)));
    }

    #[test]
    fn test_save_and_load_user_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formats.json");

        let mut resolver = sample();
        resolver
            .add(FormatRule::new("mine", "oc").with_pattern("mine"))
            .unwrap();
        resolver.save_user_file(&path).unwrap();

        let mut fresh = sample();
        fresh.load_user_file(&path).unwrap();
        assert_eq!(fresh.get("mine"), resolver.get("mine"));
        assert_eq!(fresh.resolve("MINE-7b", None).unwrap(), "T1");

        fresh.clear_user();
        assert!(fresh.get("mine").is_none());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = sample()
            .load_user_file(dir.path().join("missing.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[rstest]
    #[case("openhermes-2.5-mistral-7b.Q4_K_M.gguf", "chatml")]
    #[case("dolphin-2.6-mistral-7b.Q4_K_M.gguf", "chatml")]
    #[case("llama-2-7b-chat.Q4_K_M.gguf", "llama2")]
    #[case("codellama-13b-instruct.Q4_K_M.gguf", "llama2")]
    #[case("Meta-Llama-3-8B-Instruct.Q4_K_M.gguf", "llama3")]
    #[case("mistral-7b-instruct-v0.2.Q4_K_M.gguf", "mistral")]
    #[case("openchat-3.5-1210.Q4_K_M.gguf", "openchat")]
    #[case("Phi-3-mini-4k-instruct-q4.gguf", "phi3")]
    #[case("gemma-2-9b-it-Q4_K_M.gguf", "gemma")]
    #[case("zephyr-7b-beta.Q4_K_M.gguf", "zephyr")]
    fn test_base_rules(#[case] identifier: &str, #[case] expected_rule: &str) {
        let resolver = FormatResolver::with_base().unwrap();
        assert_eq!(
            resolver.resolve(identifier, None).unwrap(),
            resolver.template_of(expected_rule).unwrap()
        );
    }
}
