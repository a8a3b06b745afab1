//! Format rules and rule layers.

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A named chat format.
///
/// `template` is either literal template text or the name of another rule.
/// A rule without a `match` pattern is only reachable by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRule {
    /// Rule name; the key in configuration files.
    #[serde(skip)]
    pub name: String,
    /// Case-insensitive regex searched for in model identifiers.
    #[serde(rename = "match", default)]
    pub pattern: Option<String>,
    /// Template text or the name of another rule.
    pub template: String,
}

impl FormatRule {
    /// Create a rule without a pattern.
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: None,
            template: template.into(),
        }
    }

    /// Set the match pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }
}

/// A rule with its compiled pattern.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub(crate) rule: FormatRule,
    regex: Option<Regex>,
}

impl CompiledRule {
    pub(crate) fn compile(rule: FormatRule) -> Result<Self, ConfigError> {
        if rule.name.trim().is_empty() {
            return Err(ConfigError::malformed("format rule with an empty name"));
        }
        let regex = match &rule.pattern {
            Some(pattern) => Some(
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConfigError::InvalidPattern {
                        rule: rule.name.clone(),
                        message: e.to_string(),
                    })?,
            ),
            None => None,
        };
        Ok(Self { rule, regex })
    }

    pub(crate) fn matches(&self, identifier: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(identifier))
    }
}

pub(crate) type Layer = IndexMap<String, CompiledRule>;

/// Parse a `{name: {match, template}}` document into a layer.
pub(crate) fn parse_layer(json: &str) -> Result<Layer, ConfigError> {
    let raw: IndexMap<String, FormatRule> = serde_json::from_str(json)?;
    build_layer(raw.into_iter().map(|(name, mut rule)| {
        rule.name = name;
        rule
    }))
}

pub(crate) fn build_layer(rules: impl IntoIterator<Item = FormatRule>) -> Result<Layer, ConfigError> {
    let mut layer = Layer::new();
    for rule in rules {
        let compiled = CompiledRule::compile(rule)?;
        layer.insert(compiled.rule.name.clone(), compiled);
    }
    Ok(layer)
}

pub(crate) fn layer_to_json(layer: &Layer) -> Result<String, ConfigError> {
    let doc: IndexMap<&str, &FormatRule> = layer
        .iter()
        .map(|(name, compiled)| (name.as_str(), &compiled.rule))
        .collect();
    Ok(serde_json::to_string_pretty(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_layer_sets_names_in_order() {
        let layer = parse_layer(
            r#"{"b": {"match": "bee", "template": "B"}, "a": {"template": "A"}}"#,
        )
        .unwrap();
        let names: Vec<_> = layer.keys().cloned().collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(layer["a"].rule, FormatRule::new("a", "A"));
        assert!(layer["b"].matches("a BEE model"));
        assert!(!layer["a"].matches("a"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = parse_layer(r#"{"bad": {"match": "(", "template": "x"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { ref rule, .. } if rule == "bad"));
    }

    #[test]
    fn test_missing_template_is_malformed() {
        let err = parse_layer(r#"{"x": {"match": "x"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn test_layer_to_json_uses_match_key() {
        let layer = build_layer([FormatRule::new("x", "T").with_pattern("xx")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&layer_to_json(&layer).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"x": {"match": "xx", "template": "T"}}));
    }
}
