//! Register endpoints and the middlewares wrapping them.
//!
//! A [`Blueprint`] is the root of the registration tree.
//! Routes can be registered against it directly, or through a [`Scope`]: a scope
//! accumulates middlewares, applies them to every route registered through it and can
//! open nested scopes of its own.
//!
//! ```rust,ignore
//! use trellis::{Blueprint, GET, POST, handler, middleware};
//!
//! pub fn register(bp: &mut Blueprint) {
//!     bp.route(GET, "/health", handler!(crate::health));
//!
//!     let mut api = bp.scope("/api");
//!     api.wrap(middleware!(crate::auth::authenticate));
//!     api.route(GET, "/pets/{id}", handler!(crate::pets::get_pet))
//!         .summary("Fetch a pet by id");
//!
//!     let mut admin = api.scope("/admin");
//!     admin.wrap(middleware!(crate::auth::require_admin));
//!     // Wrapped by `authenticate` and then `require_admin`.
//!     admin.route(POST, "/pets", handler!(crate::pets::create_pet));
//! }
//! ```
use trellis_manifest::EndpointDoc;
pub use trellis_manifest::Method;

use reflection::{HandlerRef, Location, MiddlewareRef};

mod path;
pub mod reflection;

pub const GET: Method = Method::Get;
pub const POST: Method = Method::Post;
pub const PUT: Method = Method::Put;
pub const DELETE: Method = Method::Delete;

#[derive(Debug, Default)]
/// The root of the registration tree.
pub struct Blueprint {
    endpoints: Vec<RegisteredEndpoint>,
}

#[derive(Debug, Clone)]
/// An endpoint, as registered. It hasn't been validated yet.
pub struct RegisteredEndpoint {
    method: Method,
    path: String,
    handler: HandlerRef,
    middlewares: Vec<MiddlewareRef>,
    location: Location,
    doc: EndpointDoc,
}

impl RegisteredEndpoint {
    pub fn method(&self) -> Method {
        self.method
    }

    /// The normalized path, including the prefixes of the enclosing scopes.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// The middlewares wrapping this endpoint, outermost first.
    pub fn middlewares(&self) -> &[MiddlewareRef] {
        &self.middlewares
    }

    /// Where the endpoint was registered.
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn doc(&self) -> &EndpointDoc {
        &self.doc
    }
}

impl Blueprint {
    pub fn new() -> Self {
        Self::default()
    }

    #[track_caller]
    /// Register a route.
    ///
    /// # Panics
    ///
    /// Panics if `path` is empty or doesn't begin with `/`, or if `handler` carries
    /// no handler value.
    pub fn route(&mut self, method: Method, path: &str, handler: HandlerRef) -> RegisteredRoute<'_> {
        register(&mut self.endpoints, "", &[], method, path, handler)
    }

    #[track_caller]
    /// Open a scope whose routes are all prefixed with `prefix`.
    ///
    /// Use an empty prefix to group routes without changing their paths.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` is neither empty nor begins with `/`.
    pub fn scope(&mut self, prefix: &str) -> Scope<'_> {
        Scope {
            endpoints: &mut self.endpoints,
            prefix: path::join_prefix("", prefix),
            middlewares: Vec::new(),
        }
    }

    /// All registered endpoints, in registration order.
    pub fn endpoints(&self) -> &[RegisteredEndpoint] {
        &self.endpoints
    }
}

/// A group of routes sharing a path prefix and a middleware chain.
pub struct Scope<'a> {
    endpoints: &'a mut Vec<RegisteredEndpoint>,
    prefix: String,
    middlewares: Vec<MiddlewareRef>,
}

impl Scope<'_> {
    /// Wrap every route registered from now on, through this scope or one of its
    /// nested scopes, with `middleware`.
    ///
    /// Middlewares run in the order they are added: the first one is the outermost.
    pub fn wrap(&mut self, middleware: MiddlewareRef) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    #[track_caller]
    /// Register a route, wrapped by the middlewares added to this scope so far.
    ///
    /// # Panics
    ///
    /// Same as [`Blueprint::route`].
    pub fn route(&mut self, method: Method, path: &str, handler: HandlerRef) -> RegisteredRoute<'_> {
        register(
            self.endpoints,
            &self.prefix,
            &self.middlewares,
            method,
            path,
            handler,
        )
    }

    #[track_caller]
    /// Open a nested scope.
    ///
    /// The nested scope starts with a copy of this scope's middlewares: middlewares
    /// added to it are never visible from this scope.
    pub fn scope(&mut self, prefix: &str) -> Scope<'_> {
        Scope {
            prefix: path::join_prefix(&self.prefix, prefix),
            middlewares: self.middlewares.clone(),
            endpoints: self.endpoints,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn middlewares(&self) -> &[MiddlewareRef] {
        &self.middlewares
    }
}

/// A freshly registered route, to attach documentation to.
pub struct RegisteredRoute<'a> {
    endpoint: &'a mut RegisteredEndpoint,
}

impl RegisteredRoute<'_> {
    /// A one-line summary of what the endpoint does.
    pub fn summary(self, summary: impl Into<String>) -> Self {
        self.endpoint.doc.summary = Some(summary.into());
        self
    }

    /// A longer description of the endpoint.
    pub fn description(self, description: impl Into<String>) -> Self {
        self.endpoint.doc.description = Some(description.into());
        self
    }
}

#[track_caller]
fn register<'a>(
    endpoints: &'a mut Vec<RegisteredEndpoint>,
    prefix: &str,
    middlewares: &[MiddlewareRef],
    method: Method,
    path: &str,
    handler: HandlerRef,
) -> RegisteredRoute<'a> {
    if handler.shape().is_none() {
        panic!(
            "`{}` can't be registered as the handler for `{method} {path}`: there is no handler value",
            handler.identifiers().raw_path()
        );
    }
    let path = path::normalize(prefix, path);
    let index = endpoints.len();
    endpoints.push(RegisteredEndpoint {
        method,
        path,
        handler,
        middlewares: middlewares.to_vec(),
        location: Location::caller(),
        doc: EndpointDoc::default(),
    });
    RegisteredRoute {
        endpoint: &mut endpoints[index],
    }
}
