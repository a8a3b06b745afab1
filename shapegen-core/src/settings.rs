//! Generation settings.
//!
//! [`GenConf`] carries the sampling parameters handed to a generation
//! collaborator. Settings are layered: provider defaults, per-model overrides
//! and per-call overrides are combined with [`GenConf::merge`], which
//! overrides field by field instead of replacing the whole object.

use serde::{Deserialize, Serialize};

/// Output format requested from the model when no schema is supplied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Free-form text.
    #[default]
    Text,
    /// Any syntactically valid JSON document.
    Json,
}

/// Settings for a generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenConf {
    /// Upper bound on generated tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Top-p (nucleus) sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    /// Stop sequences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Sampling seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Output format when no schema is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,

    /// Provider-specific settings, deep-merged on [`GenConf::merge`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<serde_json::Value>,
}

impl GenConf {
    /// Empty settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap generated tokens.
    #[must_use]
    pub fn max_tokens(mut self, tokens: u64) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Set temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set top-p.
    #[must_use]
    pub fn top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set stop sequences.
    #[must_use]
    pub fn stop(mut self, sequences: Vec<String>) -> Self {
        self.stop = Some(sequences);
        self
    }

    /// Add a stop sequence.
    #[must_use]
    pub fn add_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.get_or_insert_with(Vec::new).push(stop.into());
        self
    }

    /// Set seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Request free-form JSON output.
    #[must_use]
    pub fn json(self) -> Self {
        self.format(OutputFormat::Json)
    }

    /// Set provider-specific settings.
    #[must_use]
    pub fn special(mut self, special: serde_json::Value) -> Self {
        self.special = Some(special);
        self
    }

    /// Whether JSON output was requested.
    #[must_use]
    pub fn wants_json(&self) -> bool {
        self.format == Some(OutputFormat::Json)
    }

    /// Layer `over` on top of these settings.
    ///
    /// Each field set in `over` wins; unset fields fall through to `self`.
    /// `special` objects are merged key by key, recursively.
    #[must_use]
    pub fn merge(&self, over: &GenConf) -> GenConf {
        let special = match (self.special.clone(), over.special.as_ref()) {
            (Some(mut base), Some(top)) => {
                deep_merge(&mut base, top);
                Some(base)
            }
            (base, top) => top.cloned().or(base),
        };
        GenConf {
            max_tokens: over.max_tokens.or(self.max_tokens),
            temperature: over.temperature.or(self.temperature),
            top_p: over.top_p.or(self.top_p),
            stop: over.stop.as_ref().or(self.stop.as_ref()).cloned(),
            seed: over.seed.or(self.seed),
            format: over.format.or(self.format),
            special,
        }
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Merge `top` into `base` in place. Objects merge per key; anything else
/// is replaced.
pub fn deep_merge(base: &mut serde_json::Value, top: &serde_json::Value) {
    match (base, top) {
        (serde_json::Value::Object(base), serde_json::Value::Object(top)) => {
            for (key, value) in top {
                match base.get_mut(key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, top) => *base = top.clone(),
    }
}
