//! Explicit wiring of the collaborators every builder needs.
//!
//! The hosting process creates one `RestClientFactory` at startup with its
//! transport, override source, listeners and default executor, then asks it
//! for builders. Nothing is discovered implicitly.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::builder::RestClientBuilder;
use crate::error::BuilderError;
use crate::executor::{Executor, ThreadExecutor};
use crate::http::Transport;
use crate::listener::{BuilderListener, ListenerRegistry};
use crate::overrides::{ConfigSource, EnvConfigSource, OverrideResolver};
use crate::provider::ProviderRegistration;

/// Collaborators shared by every builder of one factory.
pub(crate) struct FactoryContext {
    pub(crate) resolver: OverrideResolver,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) default_executor: Arc<dyn Executor>,
}

pub struct RestClientFactory {
    listeners: ListenerRegistry,
    context: Arc<FactoryContext>,
}

impl RestClientFactory {
    pub fn builder() -> RestClientFactoryBuilder {
        RestClientFactoryBuilder::default()
    }

    /// Create a builder and let every registered listener configure it.
    pub fn new_builder(&self) -> RestClientBuilder {
        let mut builder = RestClientBuilder::new(Arc::clone(&self.context));
        let failures = self.listeners.notify(&mut builder);
        debug!(
            listeners = self.listeners.len(),
            failures, "created rest client builder"
        );
        builder
    }
}

#[derive(Default)]
pub struct RestClientFactoryBuilder {
    transport: Option<Arc<dyn Transport>>,
    source: Option<Arc<dyn ConfigSource>>,
    default_executor: Option<Arc<dyn Executor>>,
    listeners: ListenerRegistry,
    catalog: HashMap<String, ProviderRegistration>,
}

impl RestClientFactoryBuilder {
    /// The HTTP round-trip used by every built client. Required.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Where overrides are read from. Defaults to the process environment.
    pub fn config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Executor for clients whose builder never received one. Defaults to
    /// `ThreadExecutor`.
    pub fn default_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.default_executor = Some(executor);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn BuilderListener>) -> Self {
        self.listeners.register(listener);
        self
    }

    /// Add every listener in `listeners` after the ones already registered.
    pub fn listeners(mut self, listeners: ListenerRegistry) -> Self {
        self.listeners.append(listeners);
        self
    }

    /// Make a provider available to the `providers` override by name.
    pub fn provider(mut self, registration: ProviderRegistration) -> Self {
        self.catalog
            .insert(registration.name().to_string(), registration);
        self
    }

    pub fn build(self) -> Result<RestClientFactory, BuilderError> {
        let transport = self
            .transport
            .ok_or_else(|| BuilderError::illegal_state("a transport is required"))?;
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(EnvConfigSource));
        let default_executor = self
            .default_executor
            .unwrap_or_else(|| Arc::new(ThreadExecutor::new()));

        Ok(RestClientFactory {
            listeners: self.listeners,
            context: Arc::new(FactoryContext {
                resolver: OverrideResolver::new(source).with_catalog(self.catalog),
                transport,
                default_executor,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::interface::{MethodDescriptor, RestInterface};
    use crate::overrides::MapConfigSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transport(_: HttpRequest) -> Result<HttpResponse, ApiError> {
        Ok(HttpResponse {
            status: 204,
            headers: Vec::new(),
            body: String::new(),
        })
    }

    fn noop(_: &mut HttpRequest) -> Result<(), ApiError> {
        Ok(())
    }

    #[test]
    fn transport_is_required() {
        let err = RestClientFactory::builder().build().err().unwrap();
        assert!(matches!(err, BuilderError::IllegalState(_)));
    }

    #[test]
    fn listener_registries_add_to_single_listeners() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = |calls: &Arc<AtomicUsize>| -> Arc<dyn BuilderListener> {
            let calls = Arc::clone(calls);
            Arc::new(move |_: &mut RestClientBuilder| -> Result<(), BuilderError> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        let mut registry = ListenerRegistry::new();
        registry.register(counter(&calls));
        registry.register(counter(&calls));

        let factory = RestClientFactory::builder()
            .transport(Arc::new(transport))
            .listener(counter(&calls))
            .listeners(registry)
            .build()
            .unwrap();
        factory.new_builder();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn environment_is_the_default_override_source() {
        // Upper-cased, underscore-separated form of
        // `com.example.EnvBackedInventory/mp-rest/connectTimeout`.
        std::env::set_var("COM_EXAMPLE_ENVBACKEDINVENTORY_MP_REST_CONNECTTIMEOUT", "1234");
        std::env::set_var("COM_EXAMPLE_ENVBACKEDINVENTORY_MP_REST_URL", "http://from-env:9000/svc");

        let factory = RestClientFactory::builder()
            .transport(Arc::new(transport))
            .build()
            .unwrap();
        let api = RestInterface::builder("com.example.EnvBackedInventory")
            .method(MethodDescriptor::get("ping", "/ping"))
            .build();
        let proxy = factory.new_builder().build(&api).unwrap();

        let config = proxy.configuration();
        assert_eq!(config.connect_timeout(), std::time::Duration::from_millis(1234));
        assert_eq!(config.base_uri().as_str(), "http://from-env:9000/svc");
    }

    #[test]
    fn catalog_providers_are_enabled_by_override() {
        let source = Arc::new(MapConfigSource::from_iter([
            ("com.example.Api/mp-rest/url", "http://svc"),
            ("com.example.Api/mp-rest/providers", "audit"),
        ]));
        let factory = RestClientFactory::builder()
            .transport(Arc::new(transport))
            .config_source(source)
            .provider(ProviderRegistration::request_filter("audit", noop))
            .build()
            .unwrap();

        let api = RestInterface::builder("com.example.Api")
            .method(MethodDescriptor::get("ping", "/ping"))
            .build();
        let proxy = factory.new_builder().build(&api).unwrap();
        assert!(proxy.configuration().providers().contains("audit"));
        assert_eq!(proxy.configuration().base_uri().as_str(), "http://svc/");
    }
}
