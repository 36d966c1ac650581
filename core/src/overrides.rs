//! External per-interface overrides.
//!
//! Keys have the form `<name>/mp-rest/<property>`, where `<name>` is the
//! interface's fully-qualified name or, failing that, its config key. A
//! well-formed override replaces the builder value in the build snapshot; a
//! malformed one aborts the build with `BuilderError::Configuration`.
//!
//! Recognized properties:
//!
//! - `uri`, `url`: base URI (`uri` wins when both are set)
//! - `connectTimeout`, `readTimeout`: integer milliseconds
//! - `providers`: comma-separated names from the factory's provider catalog
//! - `providers/<name>/priority`: integer priority for a registered provider
//! - `disableDefaultMapper`: boolean

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;
use url::Url;

use crate::config::{check_base_url, parse_bool, ConfigurationDraft, TimeoutSetting};
use crate::error::BuilderError;
use crate::interface::RestInterface;
use crate::provider::ProviderRegistration;

/// Namespace segment between the interface name and the property.
pub const NAMESPACE: &str = "mp-rest";

pub const URL: &str = "url";
pub const URI: &str = "uri";
pub const CONNECT_TIMEOUT: &str = "connectTimeout";
pub const READ_TIMEOUT: &str = "readTimeout";
pub const PROVIDERS: &str = "providers";
pub const DISABLE_DEFAULT_MAPPER: &str = "disableDefaultMapper";

/// Keyed string lookup for override values.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// A source with no values.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyConfigSource;

impl ConfigSource for EmptyConfigSource {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }
}

/// In-memory source whose values may change between builds.
#[derive(Debug, Default)]
pub struct MapConfigSource {
    values: RwLock<HashMap<String, String>>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load string, integer and boolean entries from the top level of a
    /// TOML document. Override keys contain `/`, so they must be quoted:
    ///
    /// ```toml
    /// "com.example.Api/mp-rest/url" = "http://svc:8080/service"
    /// "com.example.Api/mp-rest/connectTimeout" = 2000
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let table: toml::Table = content.parse()?;
        let values = table
            .into_iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s,
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    _ => return None,
                };
                Some((key, value))
            })
            .collect();
        Ok(Self {
            values: RwLock::new(values),
        })
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.write().remove(key)
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapConfigSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: RwLock::new(
                iter.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

/// Reads overrides from the process environment.
///
/// Each key is tried verbatim, then with every non-alphanumeric character
/// replaced by `_`, then that form upper-cased. So
/// `com.example.Api/mp-rest/url` also matches `COM_EXAMPLE_API_MP_REST_URL`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvConfigSource;

impl EnvConfigSource {
    fn candidates(key: &str) -> [String; 3] {
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let upper = sanitized.to_uppercase();
        [key.to_string(), sanitized, upper]
    }
}

impl ConfigSource for EnvConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        Self::candidates(key)
            .iter()
            .find_map(|candidate| env::var(candidate).ok())
    }
}

/// Consults sources in order; the first one with a value wins.
#[derive(Default)]
pub struct ChainedConfigSource {
    sources: Vec<Arc<dyn ConfigSource>>,
}

impl ChainedConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.sources.push(source);
        self
    }
}

impl ConfigSource for ChainedConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|s| s.get(key))
    }
}

/// Applies external overrides to a build snapshot.
#[derive(Clone)]
pub(crate) struct OverrideResolver {
    source: Arc<dyn ConfigSource>,
    catalog: Arc<HashMap<String, ProviderRegistration>>,
}

impl OverrideResolver {
    pub(crate) fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            catalog: Arc::new(HashMap::new()),
        }
    }

    /// Providers the `providers` override may name.
    pub(crate) fn with_catalog(mut self, catalog: HashMap<String, ProviderRegistration>) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Look up `property` under the interface name, then its config key.
    fn lookup(&self, interface: &RestInterface, property: &str) -> Option<(String, String)> {
        std::iter::once(interface.name())
            .chain(interface.config_key())
            .map(|prefix| format!("{prefix}/{NAMESPACE}/{property}"))
            .find_map(|key| {
                let value = self.source.get(&key)?;
                trace!(key = %key, value = %value, "override found");
                Some((key, value))
            })
    }

    pub(crate) fn apply(
        &self,
        interface: &RestInterface,
        draft: &mut ConfigurationDraft,
    ) -> Result<(), BuilderError> {
        if let Some((key, value)) = self
            .lookup(interface, URI)
            .or_else(|| self.lookup(interface, URL))
        {
            draft.base_uri = Some(parse_base_uri(&key, &value)?);
        }

        if let Some((key, value)) = self.lookup(interface, CONNECT_TIMEOUT) {
            draft.connect_timeout = parse_timeout(key, &value)?;
        }
        if let Some((key, value)) = self.lookup(interface, READ_TIMEOUT) {
            draft.read_timeout = parse_timeout(key, &value)?;
        }

        if let Some((key, value)) = self.lookup(interface, PROVIDERS) {
            for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                let registration = self.catalog.get(name).ok_or_else(|| {
                    BuilderError::configuration(&key, &value, format!("unknown provider {name}"))
                })?;
                draft.providers.insert(registration.clone());
            }
        }

        let names: Vec<String> = draft.providers.iter().map(|r| r.name().to_string()).collect();
        for name in names {
            let property = format!("{PROVIDERS}/{name}/priority");
            if let Some((key, value)) = self.lookup(interface, &property) {
                let priority: i32 = value.trim().parse().map_err(|_| {
                    BuilderError::configuration(&key, &value, "expected integer priority")
                })?;
                draft.providers.set_priority(&name, priority);
            }
        }

        if let Some((key, value)) = self.lookup(interface, DISABLE_DEFAULT_MAPPER) {
            let disabled = parse_bool(&value)
                .ok_or_else(|| BuilderError::configuration(&key, &value, "expected boolean"))?;
            draft.disable_default_mapper = Some(disabled);
        }

        Ok(())
    }
}

fn parse_base_uri(key: &str, value: &str) -> Result<Url, BuilderError> {
    let url = Url::parse(value.trim())
        .map_err(|e| BuilderError::configuration(key, value, e.to_string()))?;
    check_base_url(&url).map_err(|reason| BuilderError::configuration(key, value, reason))?;
    Ok(url)
}

fn parse_timeout(key: String, value: &str) -> Result<TimeoutSetting, BuilderError> {
    let millis: i64 = value
        .trim()
        .parse()
        .map_err(|_| BuilderError::configuration(&key, value, "expected integer milliseconds"))?;
    Ok(TimeoutSetting::Override { key, millis })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuilderConfiguration;
    use crate::http::HttpRequest;
    use crate::error::ApiError;
    use std::time::Duration;

    fn api() -> RestInterface {
        RestInterface::builder("com.example.Api").config_key("example").build()
    }

    fn resolve(source: MapConfigSource) -> Result<ConfigurationDraft, BuilderError> {
        let mut builder = BuilderConfiguration::default();
        builder.base_uri = Some(Url::parse("http://builder:1/").unwrap());
        builder.connect_timeout = Duration::from_millis(5000);
        let mut draft = ConfigurationDraft::from(&builder);
        OverrideResolver::new(Arc::new(source)).apply(&api(), &mut draft)?;
        Ok(draft)
    }

    fn noop(_: &mut HttpRequest) -> Result<(), ApiError> {
        Ok(())
    }

    #[test]
    fn absent_overrides_leave_builder_values() {
        let draft = resolve(MapConfigSource::new()).unwrap();
        assert_eq!(draft.base_uri.unwrap().as_str(), "http://builder:1/");
        assert_eq!(
            draft.connect_timeout,
            TimeoutSetting::Builder(Duration::from_millis(5000))
        );
    }

    #[test]
    fn timeout_override_replaces_builder_value() {
        let source = MapConfigSource::from_iter([("com.example.Api/mp-rest/connectTimeout", "2000")]);
        let draft = resolve(source).unwrap();
        assert_eq!(
            draft.connect_timeout,
            TimeoutSetting::Override {
                key: "com.example.Api/mp-rest/connectTimeout".to_string(),
                millis: 2000
            }
        );
    }

    #[test]
    fn negative_timeout_override_is_deferred_to_validation() {
        let source = MapConfigSource::from_iter([("com.example.Api/mp-rest/readTimeout", "-1")]);
        let draft = resolve(source).unwrap();
        assert!(matches!(draft.read_timeout, TimeoutSetting::Override { millis: -1, .. }));
    }

    #[test]
    fn non_numeric_timeout_is_a_configuration_error() {
        let source = MapConfigSource::from_iter([("com.example.Api/mp-rest/readTimeout", "fast")]);
        let err = resolve(source).err().unwrap();
        assert!(matches!(err, BuilderError::Configuration { ref key, .. } if key.ends_with("readTimeout")));
    }

    #[test]
    fn uri_wins_over_url() {
        let source = MapConfigSource::from_iter([
            ("com.example.Api/mp-rest/url", "http://from-url/"),
            ("com.example.Api/mp-rest/uri", "http://from-uri/"),
        ]);
        assert_eq!(resolve(source).unwrap().base_uri.unwrap().as_str(), "http://from-uri/");
    }

    #[test]
    fn hostless_url_override_is_rejected_like_the_setter() {
        let source = MapConfigSource::from_iter([("com.example.Api/mp-rest/url", "unix:/run/app.sock")]);
        let err = resolve(source).err().unwrap();
        assert!(matches!(err, BuilderError::Configuration { ref value, .. } if value == "unix:/run/app.sock"));
    }

    #[test]
    fn malformed_url_override_is_a_configuration_error() {
        let source = MapConfigSource::from_iter([("com.example.Api/mp-rest/url", "not a url")]);
        assert!(matches!(resolve(source), Err(BuilderError::Configuration { .. })));
    }

    #[test]
    fn config_key_is_consulted_after_interface_name() {
        let source = MapConfigSource::from_iter([
            ("example/mp-rest/url", "http://by-key/"),
            ("example/mp-rest/readTimeout", "750"),
            ("com.example.Api/mp-rest/readTimeout", "250"),
        ]);
        let draft = resolve(source).unwrap();
        assert_eq!(draft.base_uri.unwrap().as_str(), "http://by-key/");
        assert!(matches!(draft.read_timeout, TimeoutSetting::Override { millis: 250, .. }));
    }

    #[test]
    fn providers_override_pulls_from_catalog() {
        let source = MapConfigSource::from_iter([
            ("com.example.Api/mp-rest/providers", "auth, trace"),
            ("com.example.Api/mp-rest/providers/trace/priority", "7"),
        ]);
        let catalog = HashMap::from([
            ("auth".to_string(), ProviderRegistration::request_filter("auth", noop)),
            ("trace".to_string(), ProviderRegistration::request_filter("trace", noop)),
        ]);
        let mut draft = ConfigurationDraft::from(&BuilderConfiguration::default());
        OverrideResolver::new(Arc::new(source))
            .with_catalog(catalog)
            .apply(&api(), &mut draft)
            .unwrap();
        assert!(draft.providers.contains("auth"));
        assert_eq!(draft.providers.get("trace").unwrap().priority(), 7);
    }

    #[test]
    fn unknown_provider_is_a_configuration_error() {
        let source = MapConfigSource::from_iter([("com.example.Api/mp-rest/providers", "ghost")]);
        let err = resolve(source).err().unwrap();
        assert!(err.to_string().contains("unknown provider ghost"));
    }

    #[test]
    fn disable_default_mapper_parses_booleans() {
        let source = MapConfigSource::from_iter([("com.example.Api/mp-rest/disableDefaultMapper", "yes")]);
        assert_eq!(resolve(source).unwrap().disable_default_mapper, Some(true));

        let source = MapConfigSource::from_iter([("com.example.Api/mp-rest/disableDefaultMapper", "sometimes")]);
        assert!(matches!(resolve(source), Err(BuilderError::Configuration { .. })));
    }

    #[test]
    fn toml_documents_load_top_level_values() {
        let source = MapConfigSource::from_toml_str(
            r#"
            "com.example.Api/mp-rest/url" = "http://svc:8080/service"
            "com.example.Api/mp-rest/connectTimeout" = 2000
            "com.example.Api/mp-rest/disableDefaultMapper" = true
            [ignored]
            nested = 1
            "#,
        )
        .unwrap();
        assert_eq!(source.get("com.example.Api/mp-rest/connectTimeout").as_deref(), Some("2000"));
        assert_eq!(source.get("com.example.Api/mp-rest/disableDefaultMapper").as_deref(), Some("true"));
        assert!(source.get("ignored").is_none());
    }

    #[test]
    fn map_source_values_can_change() {
        let source = MapConfigSource::new();
        source.set("k", "1");
        assert_eq!(source.get("k").as_deref(), Some("1"));
        assert_eq!(source.remove("k").as_deref(), Some("1"));
        assert!(source.get("k").is_none());
    }

    #[test]
    fn env_candidates_sanitize_and_uppercase() {
        let [verbatim, sanitized, upper] = EnvConfigSource::candidates("com.example.Api/mp-rest/url");
        assert_eq!(verbatim, "com.example.Api/mp-rest/url");
        assert_eq!(sanitized, "com_example_Api_mp_rest_url");
        assert_eq!(upper, "COM_EXAMPLE_API_MP_REST_URL");
    }

    #[test]
    fn chained_sources_prefer_earlier_entries() {
        let first = Arc::new(MapConfigSource::from_iter([("a", "1")]));
        let second = Arc::new(MapConfigSource::from_iter([("a", "2"), ("b", "3")]));
        let chain = ChainedConfigSource::new().with(first).with(second);
        assert_eq!(chain.get("a").as_deref(), Some("1"));
        assert_eq!(chain.get("b").as_deref(), Some("3"));
        assert!(chain.get("c").is_none());
        assert!(EmptyConfigSource.get("a").is_none());
    }
}
