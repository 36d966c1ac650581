//! Validation of the post-override snapshot.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{
    property_as_bool, ConfigurationDraft, ResolvedConfiguration, TimeoutSetting,
    DISABLE_DEFAULT_MAPPER,
};
use crate::error::BuilderError;
use crate::executor::Executor;
use crate::interface::{RestInterface, RouteTable};
use crate::provider::ProviderChain;

/// Check a draft and freeze it.
///
/// `default_executor` fills in when neither the builder nor a listener
/// supplied one.
pub(crate) fn validate(
    draft: ConfigurationDraft,
    interface: &RestInterface,
    default_executor: &Arc<dyn Executor>,
) -> Result<(ResolvedConfiguration, RouteTable), BuilderError> {
    let base_uri = draft.base_uri.ok_or_else(|| {
        BuilderError::illegal_state(format!(
            "no base URI configured for {}; set one on the builder or via {}/mp-rest/url",
            interface.name(),
            interface.name()
        ))
    })?;

    let connect_timeout = timeout("connect timeout", draft.connect_timeout)?;
    let read_timeout = timeout("read timeout", draft.read_timeout)?;

    let routes = interface.compile()?;

    let default_mapper = match draft.disable_default_mapper {
        Some(disabled) => !disabled,
        None => !draft
            .properties
            .get(DISABLE_DEFAULT_MAPPER)
            .and_then(property_as_bool)
            .unwrap_or(false),
    };

    let executor = draft
        .executor
        .unwrap_or_else(|| Arc::clone(default_executor));
    let chain = ProviderChain::from_set(&draft.providers, default_mapper);

    let resolved = ResolvedConfiguration {
        base_uri,
        connect_timeout,
        read_timeout,
        executor,
        properties: draft.properties,
        providers: draft.providers,
        default_mapper,
        chain,
    };
    Ok((resolved, routes))
}

fn timeout(what: &str, setting: TimeoutSetting) -> Result<Duration, BuilderError> {
    match setting {
        TimeoutSetting::Builder(duration) => Ok(duration),
        TimeoutSetting::Override { key, millis } => u64::try_from(millis)
            .map(Duration::from_millis)
            .map_err(|_| {
                BuilderError::invalid_argument(format!(
                    "{what} must not be negative, got {millis}ms from {key}"
                ))
            }),
    }
}
