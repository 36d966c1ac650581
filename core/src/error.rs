//! Error types for client construction and invocation.
//!
//! # Design
//! Construction and invocation fail in different places and for different
//! reasons, so they get separate enums. `BuilderError` covers everything that
//! can go wrong between `new_builder()` and a finished `ClientProxy`; setter
//! failures are reported at the call site, the rest at `build()`.
//! `ApiError` covers a single call through a built proxy. `NotFound` keeps a
//! dedicated variant because callers frequently distinguish "the resource
//! does not exist" from "the server returned an unexpected status".

use thiserror::Error;

/// Errors raised while configuring a builder or building a client.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// A setter received a value it cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `build()` was called before all prerequisites were met.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The target interface descriptor is structurally invalid.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// An external override is present but cannot be interpreted.
    #[error("invalid override {key}={value:?}: {reason}")]
    Configuration {
        key: String,
        value: String,
        reason: String,
    },
}

impl BuilderError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    pub fn configuration(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Structural problems in a `RestInterface`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("interface name must not be empty")]
    EmptyInterfaceName,

    #[error("interface {interface} declares a method with an empty name")]
    EmptyMethodName { interface: String },

    #[error("interface {interface} declares method {method} more than once")]
    DuplicateMethod { interface: String, method: String },

    #[error("method {method} has a malformed path template {template:?}: {reason}")]
    MalformedTemplate {
        method: String,
        template: String,
        reason: String,
    },

    #[error("method {method} binds path parameter {{{param}}} more than once")]
    DuplicatePathParam { method: String, param: String },

    /// Two methods resolve to the same HTTP method and path shape.
    #[error("methods {first} and {second} both bind {http_method} {path}")]
    ConflictingPaths {
        first: String,
        second: String,
        http_method: String,
        path: String,
    },
}

/// Errors returned by `ClientProxy` invocations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The interface has no method with this name.
    #[error("interface {interface} has no method {method}")]
    UnknownMethod { interface: String, method: String },

    /// A path template variable was not supplied by the caller.
    #[error("method {method} is missing path parameter {{{param}}}")]
    MissingPathParam { method: String, param: String },

    #[error("cannot build request url: {0}")]
    InvalidUrl(String),

    /// The transport collaborator failed before a response was received.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The executor refused an asynchronous invocation.
    #[error("executor rejected task: {0}")]
    Rejected(String),

    /// An asynchronous invocation was dropped before it produced a result.
    #[error("asynchronous invocation was cancelled")]
    Cancelled,

    /// A request or response filter aborted the call.
    #[error("filter {name} aborted the call: {reason}")]
    Filter { name: String, reason: String },

    /// Produced by a user-registered exception mapper.
    #[error(transparent)]
    Mapped(Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
    /// Status code carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound => Some(404),
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
