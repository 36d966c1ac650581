//! The mutable builder that produces `ClientProxy` instances.
//!
//! # Design
//! Setters validate their input immediately and report `InvalidArgument` at
//! the call site. They take `&mut self` and return `Result<&mut Self, _>`,
//! so calls chain with `?`. `build()` borrows the builder immutably. It
//! copies the current configuration into a fresh snapshot, re-reads the
//! external overrides, validates, and allocates a new proxy. The builder can
//! be reused after both successful and failed builds.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::config::{check_base_url, BuilderConfiguration, ConfigurationDraft};
use crate::error::BuilderError;
use crate::executor::Executor;
use crate::factory::FactoryContext;
use crate::interface::RestInterface;
use crate::provider::ProviderRegistration;
use crate::proxy::ClientProxy;
use crate::time::TimeUnit;
use crate::validate::validate;

pub struct RestClientBuilder {
    config: BuilderConfiguration,
    context: Arc<FactoryContext>,
}

impl RestClientBuilder {
    pub(crate) fn new(context: Arc<FactoryContext>) -> Self {
        Self {
            config: BuilderConfiguration::default(),
            context,
        }
    }

    /// Set the base URL. Replaces any earlier base URL or URI.
    ///
    /// The URL must be able to act as a base and must carry a host.
    pub fn base_url(&mut self, url: Url) -> Result<&mut Self, BuilderError> {
        check_base_url(&url).map_err(|reason| {
            BuilderError::invalid_argument(format!("{url} cannot be used as a base URL: {reason}"))
        })?;
        self.config.base_uri = Some(url);
        Ok(self)
    }

    /// Parse `uri` and delegate to `base_url`.
    pub fn base_uri(&mut self, uri: &str) -> Result<&mut Self, BuilderError> {
        let url = Url::parse(uri.trim())
            .map_err(|e| BuilderError::invalid_argument(format!("malformed URI {uri:?}: {e}")))?;
        self.base_url(url)
    }

    /// Set the connect timeout. `0` disables it.
    pub fn connect_timeout(&mut self, timeout: i64, unit: TimeUnit) -> Result<&mut Self, BuilderError> {
        self.config.connect_timeout = to_timeout("connect timeout", timeout, unit)?;
        Ok(self)
    }

    /// Set the read timeout. `0` disables it.
    pub fn read_timeout(&mut self, timeout: i64, unit: TimeUnit) -> Result<&mut Self, BuilderError> {
        self.config.read_timeout = to_timeout("read timeout", timeout, unit)?;
        Ok(self)
    }

    /// Executor for `Async` interface methods.
    ///
    /// An executor that is already shut down is rejected.
    pub fn executor_service(&mut self, executor: Arc<dyn Executor>) -> Result<&mut Self, BuilderError> {
        if executor.is_shutdown() {
            return Err(BuilderError::invalid_argument("executor is shut down"));
        }
        self.config.executor = Some(executor);
        Ok(self)
    }

    /// Set an implementation- or provider-specific property.
    pub fn property(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> &mut Self {
        self.config.properties.insert(key.into(), value.into());
        self
    }

    /// Register a provider. A second registration under the same name is
    /// ignored.
    pub fn register(&mut self, registration: ProviderRegistration) -> &mut Self {
        self.config.providers.insert(registration);
        self
    }

    pub fn configuration(&self) -> &BuilderConfiguration {
        &self.config
    }

    /// Build a new client for `interface`.
    ///
    /// Every call produces an independent proxy with its own snapshot of the
    /// configuration and a fresh read of the external overrides.
    pub fn build(&self, interface: &RestInterface) -> Result<ClientProxy, BuilderError> {
        let mut draft = ConfigurationDraft::from(&self.config);
        self.context.resolver.apply(interface, &mut draft)?;
        let (resolved, routes) = validate(draft, interface, &self.context.default_executor)?;

        let proxy = ClientProxy::new(resolved, routes, Arc::clone(&self.context.transport));
        debug!(
            client = %proxy.id(),
            interface = interface.name(),
            base_uri = %proxy.configuration().base_uri(),
            connect_timeout = ?proxy.configuration().connect_timeout(),
            read_timeout = ?proxy.configuration().read_timeout(),
            "built rest client"
        );
        Ok(proxy)
    }
}

impl fmt::Debug for RestClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClientBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn to_timeout(what: &str, timeout: i64, unit: TimeUnit) -> Result<std::time::Duration, BuilderError> {
    let amount = u64::try_from(timeout).map_err(|_| {
        BuilderError::invalid_argument(format!("{what} must not be negative, got {timeout}"))
    })?;
    unit.to_duration(amount).ok_or_else(|| {
        BuilderError::invalid_argument(format!("{what} of {timeout} {unit:?} overflows"))
    })
}
