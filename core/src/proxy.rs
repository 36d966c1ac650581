//! Built clients and their invocation pipeline.
//!
//! # Design
//! A `ClientProxy` is bound to one `ResolvedConfiguration` and one compiled
//! `RouteTable`, both behind `Arc` and never mutated, so a proxy can be
//! shared across threads and invoked concurrently. Each call runs:
//!
//! 1. route lookup by method name
//! 2. URL expansion (base URI, interface path, method template, query)
//! 3. request filters in priority order
//! 4. `Transport::execute` with the resolved timeouts on the request
//! 5. response filters, then exception mappers (first error wins)
//!
//! `Direct` methods run that pipeline on the caller's thread. `Async`
//! methods hand it to the configured executor and return a
//! `ResponseHandle`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::config::ResolvedConfiguration;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::interface::{ReturnShape, Route, RouteTable};

/// Arguments for one invocation.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    path_params: HashMap<String, String>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.path_params.insert(name.into(), value.to_string());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Serialize `body` as the JSON request payload.
    pub fn json_body<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// Outcome of `ClientProxy::invoke`, shaped by the method's `ReturnShape`.
#[derive(Debug)]
pub enum Reply {
    Ready(HttpResponse),
    Pending(ResponseHandle),
}

impl Reply {
    /// Block until the response is available.
    pub fn wait(self) -> Result<HttpResponse, ApiError> {
        match self {
            Reply::Ready(response) => Ok(response),
            Reply::Pending(handle) => handle.wait(),
        }
    }
}

/// Deferred result of an asynchronous invocation.
///
/// Usable both as a blocking handle (`wait`) and as a `Future`.
#[derive(Debug)]
pub struct ResponseHandle {
    receiver: oneshot::Receiver<Result<HttpResponse, ApiError>>,
}

impl ResponseHandle {
    pub fn wait(self) -> Result<HttpResponse, ApiError> {
        futures::executor::block_on(self)
    }
}

impl Future for ResponseHandle {
    type Output = Result<HttpResponse, ApiError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ApiError::Cancelled)))
    }
}

struct ProxyInner {
    id: Uuid,
    config: Arc<ResolvedConfiguration>,
    routes: Arc<RouteTable>,
    transport: Arc<dyn Transport>,
}

/// A built client for one REST interface.
pub struct ClientProxy {
    inner: Arc<ProxyInner>,
}

impl ClientProxy {
    /// Allocate a proxy. No I/O happens here.
    pub(crate) fn new(
        config: ResolvedConfiguration,
        routes: RouteTable,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                id: Uuid::new_v4(),
                config: Arc::new(config),
                routes: Arc::new(routes),
                transport,
            }),
        }
    }

    /// Unique per built instance.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn interface_name(&self) -> &str {
        self.inner.routes.interface()
    }

    pub fn configuration(&self) -> &ResolvedConfiguration {
        &self.inner.config
    }

    pub fn route(&self, method: &str) -> Option<&Route> {
        self.inner.routes.get(method).map(Arc::as_ref)
    }

    /// Invoke `method`. Direct methods complete before returning; async
    /// methods are submitted to the executor.
    pub fn invoke(&self, method: &str, args: CallArgs) -> Result<Reply, ApiError> {
        let route = self.inner.routes.get(method).cloned().ok_or_else(|| {
            ApiError::UnknownMethod {
                interface: self.interface_name().to_string(),
                method: method.to_string(),
            }
        })?;
        let request = self.inner.prepare(&route, args)?;

        match route.shape() {
            ReturnShape::Direct => self.inner.dispatch(request).map(Reply::Ready),
            ReturnShape::Async => {
                let (sender, receiver) = oneshot::channel();
                let inner = Arc::clone(&self.inner);
                self.inner.config.executor.execute(Box::new(move || {
                    let _ = sender.send(inner.dispatch(request));
                }))?;
                Ok(Reply::Pending(ResponseHandle { receiver }))
            }
        }
    }

    /// Invoke `method` and wait for its response regardless of shape.
    pub fn call(&self, method: &str, args: CallArgs) -> Result<HttpResponse, ApiError> {
        self.invoke(method, args)?.wait()
    }

    /// Invoke `method` and decode the JSON response body.
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<T>` work
    /// for 204 responses.
    pub fn call_json<T: DeserializeOwned>(&self, method: &str, args: CallArgs) -> Result<T, ApiError> {
        let response = self.call(method, args)?;
        decode(&response)
    }
}

impl fmt::Debug for ClientProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientProxy")
            .field("id", &self.inner.id)
            .field("interface", &self.interface_name())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ProxyInner {
    fn prepare(&self, route: &Route, args: CallArgs) -> Result<HttpRequest, ApiError> {
        let segments = route.expand(&args.path_params)?;
        let url = build_url(&self.config.base_uri, &segments, &args.query)?;

        let mut headers = args.headers;
        let body = match args.body {
            Some(value) => {
                if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
                    headers.push(("content-type".to_string(), "application/json".to_string()));
                }
                Some(
                    serde_json::to_string(&value)
                        .map_err(|e| ApiError::SerializationError(e.to_string()))?,
                )
            }
            None => None,
        };

        Ok(HttpRequest {
            method: route.http_method(),
            url: url.into(),
            headers,
            body,
            connect_timeout: self.config.connect_timeout,
            read_timeout: self.config.read_timeout,
        })
    }

    fn dispatch(&self, mut request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let chain = &self.config.chain;
        for (name, filter) in &chain.request_filters {
            filter.filter(&mut request).map_err(|e| match e {
                ApiError::Filter { .. } => e,
                other => ApiError::Filter {
                    name: name.clone(),
                    reason: other.to_string(),
                },
            })?;
        }

        debug!(
            client = %self.id,
            method = %request.method,
            url = %request.url,
            "dispatching request"
        );
        let mut response = self.transport.execute(request.clone())?;

        for (_, filter) in &chain.response_filters {
            filter.filter(&request, &mut response)?;
        }

        match chain.map_response(&response) {
            Some(err) => Err(err),
            None => Ok(response),
        }
    }
}

fn build_url(base: &Url, segments: &[String], query: &[(String, String)]) -> Result<Url, ApiError> {
    // `PathSegmentsMut::extend` silently drops dot segments, which would
    // retarget the request at a parent resource.
    if let Some(dot) = segments.iter().find(|s| matches!(s.as_str(), "." | "..")) {
        return Err(ApiError::InvalidUrl(format!(
            "path segment {dot:?} would be removed from {base}"
        )));
    }
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{base} cannot be a base")))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    let body = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };
    serde_json::from_str(body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}
