//! Providers registered on a builder: request filters, response filters and
//! response exception mappers.
//!
//! # Design
//! Providers are identified by name. A `ProviderSet` keeps at most one
//! registration per name; registering a name twice keeps the first and logs
//! a warning. Within each kind, lower priority values run first. The built-in
//! default mapper is not stored in the set. The proxy appends it after every
//! user mapper unless it was disabled.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};

/// Priority assigned by `ProviderRegistration::new`.
pub const DEFAULT_PRIORITY: i32 = 5000;

/// Mutates or vetoes an outgoing request.
pub trait RequestFilter: Send + Sync {
    fn filter(&self, request: &mut HttpRequest) -> Result<(), ApiError>;
}

impl<F> RequestFilter for F
where
    F: Fn(&mut HttpRequest) -> Result<(), ApiError> + Send + Sync,
{
    fn filter(&self, request: &mut HttpRequest) -> Result<(), ApiError> {
        self(request)
    }
}

/// Inspects or mutates a response before exception mapping.
pub trait ResponseFilter: Send + Sync {
    fn filter(&self, request: &HttpRequest, response: &mut HttpResponse) -> Result<(), ApiError>;
}

impl<F> ResponseFilter for F
where
    F: Fn(&HttpRequest, &mut HttpResponse) -> Result<(), ApiError> + Send + Sync,
{
    fn filter(&self, request: &HttpRequest, response: &mut HttpResponse) -> Result<(), ApiError> {
        self(request, response)
    }
}

/// Turns a response into an error.
///
/// Mappers are consulted in priority order for every response; the first
/// one that handles the status and returns `Some` decides the error.
pub trait ResponseExceptionMapper: Send + Sync {
    fn handles(&self, status: u16, _headers: &[(String, String)]) -> bool {
        status >= 400
    }

    fn to_error(&self, response: &HttpResponse) -> Option<ApiError>;
}

/// Maps 404 to `NotFound` and every other status >= 400 to `HttpError`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExceptionMapper;

impl ResponseExceptionMapper for DefaultExceptionMapper {
    fn to_error(&self, response: &HttpResponse) -> Option<ApiError> {
        match response.status {
            404 => Some(ApiError::NotFound),
            status if status >= 400 => Some(ApiError::HttpError {
                status,
                body: response.body.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub enum Provider {
    RequestFilter(Arc<dyn RequestFilter>),
    ResponseFilter(Arc<dyn ResponseFilter>),
    ExceptionMapper(Arc<dyn ResponseExceptionMapper>),
}

impl Provider {
    pub fn kind(&self) -> &'static str {
        match self {
            Provider::RequestFilter(_) => "request-filter",
            Provider::ResponseFilter(_) => "response-filter",
            Provider::ExceptionMapper(_) => "exception-mapper",
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// A named provider with its priority.
#[derive(Debug, Clone)]
pub struct ProviderRegistration {
    name: String,
    provider: Provider,
    priority: i32,
}

impl ProviderRegistration {
    pub fn new(name: impl Into<String>, provider: Provider) -> Self {
        Self {
            name: name.into(),
            provider,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn request_filter(name: impl Into<String>, filter: impl RequestFilter + 'static) -> Self {
        Self::new(name, Provider::RequestFilter(Arc::new(filter)))
    }

    pub fn response_filter(name: impl Into<String>, filter: impl ResponseFilter + 'static) -> Self {
        Self::new(name, Provider::ResponseFilter(Arc::new(filter)))
    }

    pub fn exception_mapper(
        name: impl Into<String>,
        mapper: impl ResponseExceptionMapper + 'static,
    ) -> Self {
        Self::new(name, Provider::ExceptionMapper(Arc::new(mapper)))
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

/// Registered providers, unique by name.
#[derive(Debug, Clone, Default)]
pub struct ProviderSet {
    entries: Vec<ProviderRegistration>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `registration` unless a provider with the same name exists.
    ///
    /// Returns whether the registration was added.
    pub fn insert(&mut self, registration: ProviderRegistration) -> bool {
        if self.contains(registration.name()) {
            warn!(
                provider = registration.name(),
                "provider already registered, ignoring duplicate"
            );
            return false;
        }
        self.entries.push(registration);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|r| r.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&ProviderRegistration> {
        self.entries.iter().find(|r| r.name == name)
    }

    pub fn set_priority(&mut self, name: &str, priority: i32) -> bool {
        match self.entries.iter_mut().find(|r| r.name == name) {
            Some(entry) => {
                entry.priority = priority;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderRegistration> {
        self.entries.iter()
    }

    /// Registrations sorted by priority, ties kept in registration order.
    pub fn by_priority(&self) -> Vec<&ProviderRegistration> {
        let mut sorted: Vec<&ProviderRegistration> = self.entries.iter().collect();
        sorted.sort_by_key(|r| r.priority);
        sorted
    }
}

/// Providers of a resolved configuration, split by kind and ordered.
#[derive(Clone, Default)]
pub(crate) struct ProviderChain {
    pub(crate) request_filters: Vec<(String, Arc<dyn RequestFilter>)>,
    pub(crate) response_filters: Vec<(String, Arc<dyn ResponseFilter>)>,
    pub(crate) mappers: Vec<Arc<dyn ResponseExceptionMapper>>,
}

impl ProviderChain {
    pub(crate) fn from_set(set: &ProviderSet, default_mapper: bool) -> Self {
        let mut chain = ProviderChain::default();
        for registration in set.by_priority() {
            let name = registration.name().to_string();
            match registration.provider() {
                Provider::RequestFilter(f) => chain.request_filters.push((name, Arc::clone(f))),
                Provider::ResponseFilter(f) => chain.response_filters.push((name, Arc::clone(f))),
                Provider::ExceptionMapper(m) => chain.mappers.push(Arc::clone(m)),
            }
        }
        if default_mapper {
            chain.mappers.push(Arc::new(DefaultExceptionMapper));
        }
        chain
    }

    pub(crate) fn map_response(&self, response: &HttpResponse) -> Option<ApiError> {
        self.mappers
            .iter()
            .filter(|m| m.handles(response.status, &response.headers))
            .find_map(|m| m.to_error(response))
    }
}
