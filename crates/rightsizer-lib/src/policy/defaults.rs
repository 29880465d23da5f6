//! Process-wide policy defaults
//!
//! Each setting can be given a deployment-wide default through an
//! environment variable named `RIGHTSIZER_DEFAULT_<SETTING>`, with the
//! setting name upper-cased and dashes replaced by underscores, e.g.
//! `RIGHTSIZER_DEFAULT_CPU_LIMIT_APPLY_TARGET=peak`.

use anyhow::Result;
use std::collections::HashMap;

/// Environment prefix for process defaults
pub const ENV_PREFIX: &str = "RIGHTSIZER_DEFAULT";

#[derive(Debug, Clone, Default)]
pub struct ProcessDefaults {
    values: HashMap<String, String>,
}

impl ProcessDefaults {
    /// Load defaults from the environment
    pub fn from_env() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        let raw: HashMap<String, String> = config.try_deserialize()?;
        Ok(Self::from_pairs(raw))
    }

    /// Build defaults from `(setting, value)` pairs
    ///
    /// Keys are normalized so `CPU_REQUEST_APPLY_MODE` and
    /// `cpu-request-apply-mode` name the same setting.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (normalize_key(k.as_ref()), v.into()))
            .collect();
        Self { values }
    }

    /// Set `setting` unless the environment already provided it
    pub fn set_if_absent(&mut self, setting: &str, value: impl Into<String>) {
        self.values
            .entry(normalize_key(setting))
            .or_insert_with(|| value.into());
    }

    pub fn get(&self, setting: &str) -> Option<&str> {
        self.values.get(setting).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('_', "-")
}
