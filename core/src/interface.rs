//! Descriptors for REST interfaces and their compiled route tables.
//!
//! # Design
//! A `RestInterface` is plain data: a fully-qualified name used for override
//! lookup, an optional interface-level path, and one `MethodDescriptor` per
//! operation. `compile()` validates the structure and produces a `RouteTable`
//! that maps each method name to a parsed request template. The table is
//! built once per `build()` call so invocations never re-parse templates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{ApiError, DefinitionError};
use crate::http::HttpMethod;

/// How an interface method delivers its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnShape {
    /// The caller's thread blocks until the transport returns.
    #[default]
    Direct,
    /// The call runs on the configured executor and yields a handle.
    Async,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    http_method: HttpMethod,
    path: String,
    shape: ReturnShape,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, http_method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            http_method,
            path: path.into(),
            shape: ReturnShape::Direct,
        }
    }

    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Get, path)
    }

    pub fn post(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Post, path)
    }

    pub fn put(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Put, path)
    }

    pub fn patch(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Patch, path)
    }

    pub fn delete(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, HttpMethod::Delete, path)
    }

    pub fn returning(mut self, shape: ReturnShape) -> Self {
        self.shape = shape;
        self
    }

    /// Shorthand for `returning(ReturnShape::Async)`.
    pub fn asynchronous(self) -> Self {
        self.returning(ReturnShape::Async)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn shape(&self) -> ReturnShape {
        self.shape
    }
}

/// Structural description of a REST interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestInterface {
    name: String,
    config_key: Option<String>,
    path: String,
    methods: Vec<MethodDescriptor>,
}

impl RestInterface {
    pub fn builder(name: impl Into<String>) -> RestInterfaceBuilder {
        RestInterfaceBuilder {
            interface: RestInterface {
                name: name.into(),
                config_key: None,
                path: String::new(),
                methods: Vec::new(),
            },
        }
    }

    /// Fully-qualified name, the primary prefix for override keys.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alternative override prefix shared by several interfaces.
    pub fn config_key(&self) -> Option<&str> {
        self.config_key.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Validate the descriptor and parse every method into a route.
    pub fn compile(&self) -> Result<RouteTable, DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyInterfaceName);
        }

        let prefix = parse_template("<interface>", &self.path)?;
        let mut routes: HashMap<String, Arc<Route>> = HashMap::new();
        let mut shapes: HashMap<(HttpMethod, String), String> = HashMap::new();

        for method in &self.methods {
            if method.name.trim().is_empty() {
                return Err(DefinitionError::EmptyMethodName {
                    interface: self.name.clone(),
                });
            }
            if routes.contains_key(&method.name) {
                return Err(DefinitionError::DuplicateMethod {
                    interface: self.name.clone(),
                    method: method.name.clone(),
                });
            }

            let mut segments = prefix.clone();
            segments.extend(parse_template(&method.name, &method.path)?);

            let mut seen = HashSet::new();
            for param in segments.iter().flat_map(Segment::params) {
                if !seen.insert(param) {
                    return Err(DefinitionError::DuplicatePathParam {
                        method: method.name.clone(),
                        param: param.to_string(),
                    });
                }
            }

            let shape = render_shape(&segments);
            if let Some(first) = shapes.get(&(method.http_method, shape.clone())) {
                return Err(DefinitionError::ConflictingPaths {
                    first: first.clone(),
                    second: method.name.clone(),
                    http_method: method.http_method.to_string(),
                    path: shape,
                });
            }
            shapes.insert((method.http_method, shape), method.name.clone());

            routes.insert(
                method.name.clone(),
                Arc::new(Route {
                    name: method.name.clone(),
                    http_method: method.http_method,
                    segments,
                    shape: method.shape,
                }),
            );
        }

        Ok(RouteTable {
            interface: self.name.clone(),
            routes,
        })
    }
}

pub struct RestInterfaceBuilder {
    interface: RestInterface,
}

impl RestInterfaceBuilder {
    pub fn config_key(mut self, key: impl Into<String>) -> Self {
        self.interface.config_key = Some(key.into());
        self
    }

    /// Path prepended to every method path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.interface.path = path.into();
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.interface.methods.push(method);
        self
    }

    pub fn build(self) -> RestInterface {
        self.interface
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Param(String),
}

/// One `/`-separated piece of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    parts: Vec<Part>,
}

impl Segment {
    fn params(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            Part::Param(name) => Some(name.as_str()),
            Part::Literal(_) => None,
        })
    }
}

/// A compiled method: HTTP method, parsed path and return shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    name: String,
    http_method: HttpMethod,
    segments: Vec<Segment>,
    shape: ReturnShape,
}

impl Route {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn shape(&self) -> ReturnShape {
        self.shape
    }

    /// Path parameter names in template order.
    pub fn params(&self) -> Vec<&str> {
        self.segments.iter().flat_map(Segment::params).collect()
    }

    /// The template with parameter names, e.g. `/api/items/{id}`.
    pub fn template(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            for part in &segment.parts {
                match part {
                    Part::Literal(text) => out.push_str(text),
                    Part::Param(name) => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// Substitute path parameters, returning unencoded path segments.
    pub(crate) fn expand(&self, values: &HashMap<String, String>) -> Result<Vec<String>, ApiError> {
        self.segments
            .iter()
            .map(|segment| {
                let mut text = String::new();
                for part in &segment.parts {
                    match part {
                        Part::Literal(literal) => text.push_str(literal),
                        Part::Param(name) => {
                            let value = values.get(name).ok_or_else(|| ApiError::MissingPathParam {
                                method: self.name.clone(),
                                param: name.clone(),
                            })?;
                            text.push_str(value);
                        }
                    }
                }
                Ok(text)
            })
            .collect()
    }
}

/// Method name to route, resolved once per build.
#[derive(Debug, Clone)]
pub struct RouteTable {
    interface: String,
    routes: HashMap<String, Arc<Route>>,
}

impl RouteTable {
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn get(&self, method: &str) -> Option<&Arc<Route>> {
        self.routes.get(method)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn parse_template(method: &str, template: &str) -> Result<Vec<Segment>, DefinitionError> {
    let malformed = |reason: &str| DefinitionError::MalformedTemplate {
        method: method.to_string(),
        template: template.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = Vec::new();
    for raw in template.split('/').filter(|s| !s.is_empty()) {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut body = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(malformed("nested '{'")),
                            other => body.push(other),
                        }
                    }
                    if !closed {
                        return Err(malformed("unterminated '{'"));
                    }
                    // `{id: [0-9]+}` declares a constraint; only the name matters here.
                    let name = body.split(':').next().unwrap_or_default().trim();
                    if name.is_empty() {
                        return Err(malformed("empty parameter name"));
                    }
                    if !name
                        .chars()
                        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
                    {
                        return Err(malformed("invalid character in parameter name"));
                    }
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(Part::Param(name.to_string()));
                }
                '}' => return Err(malformed("unbalanced '}'")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }
        segments.push(Segment { parts });
    }
    Ok(segments)
}

/// Path with parameter names erased, used to detect conflicting bindings.
fn render_shape(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        for part in &segment.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Param(_) => out.push_str("{}"),
            }
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
