//! Builder-side configuration and the immutable per-build snapshot.
//!
//! # Design
//! `BuilderConfiguration` is the mutable store a `RestClientBuilder` writes
//! into. Every `build()` copies it into a `ConfigurationDraft`, lays the
//! external overrides on top, and the validator turns the draft into a
//! `ResolvedConfiguration`. The resolved snapshot owns copies of everything
//! it needs, so later builder mutations never reach a built client.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::executor::Executor;
use crate::provider::{ProviderChain, ProviderSet};

/// Connect timeout used when the builder never sets one.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read timeout used when the builder never sets one.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Boolean property that turns off the built-in exception mapper.
pub const DISABLE_DEFAULT_MAPPER: &str = "disableDefaultMapper";

/// Values accumulated by a builder before `build()`.
#[derive(Clone)]
pub struct BuilderConfiguration {
    pub(crate) base_uri: Option<Url>,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) executor: Option<Arc<dyn Executor>>,
    pub(crate) properties: HashMap<String, serde_json::Value>,
    pub(crate) providers: ProviderSet,
}

impl Default for BuilderConfiguration {
    fn default() -> Self {
        Self {
            base_uri: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            executor: None,
            properties: HashMap::new(),
            providers: ProviderSet::new(),
        }
    }
}

impl BuilderConfiguration {
    pub fn base_uri(&self) -> Option<&Url> {
        self.base_uri.as_ref()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn has_executor(&self) -> bool {
        self.executor.is_some()
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &HashMap<String, serde_json::Value> {
        &self.properties
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }
}

impl fmt::Debug for BuilderConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderConfiguration")
            .field("base_uri", &self.base_uri.as_ref().map(Url::as_str))
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("executor", &self.executor.is_some())
            .field("properties", &self.properties)
            .field("providers", &self.providers)
            .finish()
    }
}

/// A timeout as it stands after override resolution.
///
/// Overrides are read as signed milliseconds and may be negative; the
/// validator rejects those.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimeoutSetting {
    Builder(Duration),
    Override { key: String, millis: i64 },
}

/// Builder values with overrides applied, not yet validated.
pub(crate) struct ConfigurationDraft {
    pub(crate) base_uri: Option<Url>,
    pub(crate) connect_timeout: TimeoutSetting,
    pub(crate) read_timeout: TimeoutSetting,
    pub(crate) executor: Option<Arc<dyn Executor>>,
    pub(crate) properties: HashMap<String, serde_json::Value>,
    pub(crate) providers: ProviderSet,
    pub(crate) disable_default_mapper: Option<bool>,
}

impl From<&BuilderConfiguration> for ConfigurationDraft {
    fn from(config: &BuilderConfiguration) -> Self {
        Self {
            base_uri: config.base_uri.clone(),
            connect_timeout: TimeoutSetting::Builder(config.connect_timeout),
            read_timeout: TimeoutSetting::Builder(config.read_timeout),
            executor: config.executor.clone(),
            properties: config.properties.clone(),
            providers: config.providers.clone(),
            disable_default_mapper: None,
        }
    }
}

/// The merged, validated configuration of one built client.
///
/// Immutable once created and safe to share across threads.
pub struct ResolvedConfiguration {
    pub(crate) base_uri: Url,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) properties: HashMap<String, serde_json::Value>,
    pub(crate) providers: ProviderSet,
    pub(crate) default_mapper: bool,
    pub(crate) chain: ProviderChain,
}

impl ResolvedConfiguration {
    pub fn base_uri(&self) -> &Url {
        &self.base_uri
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &HashMap<String, serde_json::Value> {
        &self.properties
    }

    /// `None` when the key is absent or not a recognizable boolean.
    pub fn bool_property(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(property_as_bool)
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    pub fn default_mapper_enabled(&self) -> bool {
        self.default_mapper
    }
}

impl fmt::Debug for ResolvedConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfiguration")
            .field("base_uri", &self.base_uri.as_str())
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("properties", &self.properties)
            .field("providers", &self.providers)
            .field("default_mapper", &self.default_mapper)
            .finish_non_exhaustive()
    }
}

/// Whether `url` can anchor request paths: it must accept path segments and
/// name a host.
pub(crate) fn check_base_url(url: &Url) -> Result<(), &'static str> {
    if url.cannot_be_a_base() {
        return Err("not a base URL");
    }
    if !url.has_host() {
        return Err("base URL has no host");
    }
    Ok(())
}

/// Interpret a property value as a boolean.
///
/// Accepts JSON booleans and the strings understood by override parsing.
pub(crate) fn property_as_bool(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::String(s) => parse_bool(s),
        _ => None,
    }
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
