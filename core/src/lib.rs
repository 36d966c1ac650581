//! Type-safe REST client construction.
//!
//! # Overview
//! A `RestClientFactory` hands out `RestClientBuilder`s. Callers configure a
//! builder (base URI, timeouts, executor, properties, providers) and call
//! `build` with a `RestInterface` descriptor to get a `ClientProxy`. Each
//! build re-reads external per-interface overrides, validates the merged
//! snapshot and binds it immutably to the new proxy.
//!
//! # Design
//! - Host-does-IO: the proxy builds `HttpRequest` values and interprets
//!   `HttpResponse` values; a host-supplied `Transport` performs the
//!   round-trip.
//! - Collaborators (transport, override source, listeners, default executor)
//!   are registered explicitly on the factory. Nothing is discovered through
//!   global state.
//! - Interface descriptors compile to a route table at build time, so
//!   invocation is a table lookup plus template expansion.
//!
//! ```no_run
//! use std::sync::Arc;
//! use restclient_core::{
//!     ApiError, CallArgs, HttpRequest, HttpResponse, MethodDescriptor, RestClientFactory,
//!     RestInterface, TimeUnit,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = |_req: HttpRequest| -> Result<HttpResponse, ApiError> {
//!     unimplemented!("perform the HTTP round-trip")
//! };
//! let factory = RestClientFactory::builder().transport(Arc::new(transport)).build()?;
//!
//! let api = RestInterface::builder("com.example.Inventory")
//!     .path("/api")
//!     .method(MethodDescriptor::get("find", "/items/{id}"))
//!     .build();
//!
//! let mut builder = factory.new_builder();
//! builder
//!     .base_uri("http://svc:8080/service")?
//!     .connect_timeout(5, TimeUnit::Seconds)?;
//! let client = builder.build(&api)?;
//! let item: serde_json::Value = client.call_json("find", CallArgs::new().path_param("id", 42))?;
//! # let _ = item;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod executor;
pub mod factory;
pub mod http;
pub mod interface;
pub mod listener;
pub mod overrides;
pub mod provider;
pub mod proxy;
pub mod time;
mod validate;

pub use builder::RestClientBuilder;
pub use config::{BuilderConfiguration, ResolvedConfiguration};
pub use error::{ApiError, BuilderError, DefinitionError};
pub use executor::{Executor, InlineExecutor, Task, ThreadExecutor};
#[cfg(feature = "tokio")]
pub use executor::TokioExecutor;
pub use factory::{RestClientFactory, RestClientFactoryBuilder};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use interface::{MethodDescriptor, RestInterface, ReturnShape, Route, RouteTable};
pub use listener::{BuilderListener, ListenerRegistry};
pub use overrides::{
    ChainedConfigSource, ConfigSource, EmptyConfigSource, EnvConfigSource, MapConfigSource,
};
pub use provider::{
    Provider, ProviderRegistration, ProviderSet, RequestFilter, ResponseExceptionMapper,
    ResponseFilter,
};
pub use proxy::{CallArgs, ClientProxy, Reply, ResponseHandle};
pub use time::TimeUnit;
