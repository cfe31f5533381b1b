//! Describe the middlewares an application uses and what they contribute to a request.
//!
//! Middlewares are attached to routes through [`Scope::wrap`](crate::Scope::wrap).
//! The registry is optional: it lists middlewares ahead of their first use and attaches
//! metadata to them, e.g. the context keys they provide.
//!
//! ```rust,ignore
//! use trellis::{MiddlewareRegistry, middleware};
//!
//! pub fn register_middleware(registry: &mut MiddlewareRegistry) {
//!     registry
//!         .register(middleware!(crate::auth::authenticate))
//!         .provides::<crate::auth::User>("user")
//!         .requires_header("Authorization")
//!         .security_scheme("bearer")
//!         .may_return(401);
//! }
//! ```
use indexmap::IndexMap;
use trellis_manifest::MiddlewareMetadata;

use crate::blueprint::reflection::MiddlewareRef;

#[derive(Debug, Default)]
/// Every middleware listed through [`MiddlewareRegistry::register`], in registration order.
pub struct MiddlewareRegistry {
    // Keyed by `(package, function name)`.
    entries: IndexMap<(String, String), RegisteredMiddleware>,
}

#[derive(Debug, Clone)]
pub struct RegisteredMiddleware {
    middleware: MiddlewareRef,
    provides: Vec<ProvidedKey>,
    metadata: MiddlewareMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A typed value a middleware stores in the request context.
pub struct ProvidedKey {
    pub key: String,
    /// As reported by [`std::any::type_name`].
    pub type_name: &'static str,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// List a middleware.
    ///
    /// Registering the same middleware twice returns a builder for the existing entry:
    /// metadata accumulates.
    pub fn register(&mut self, middleware: MiddlewareRef) -> MiddlewareBuilder<'_> {
        let key = (middleware.package(), middleware.name());
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| RegisteredMiddleware {
                middleware,
                provides: Vec::new(),
                metadata: MiddlewareMetadata::default(),
            });
        MiddlewareBuilder { entry }
    }

    /// Attach more metadata to a middleware that has already been registered.
    ///
    /// Returns `None` if there is no middleware at `package::name`.
    pub fn describe(&mut self, package: &str, name: &str) -> Option<MiddlewareBuilder<'_>> {
        self.entries
            .get_mut(&(package.to_owned(), name.to_owned()))
            .map(|entry| MiddlewareBuilder { entry })
    }

    pub fn get(&self, package: &str, name: &str) -> Option<&RegisteredMiddleware> {
        self.entries.get(&(package.to_owned(), name.to_owned()))
    }

    /// All registered middlewares, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredMiddleware> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RegisteredMiddleware {
    pub fn middleware(&self) -> &MiddlewareRef {
        &self.middleware
    }

    /// The context keys this middleware provides, in declaration order.
    pub fn provides(&self) -> &[ProvidedKey] {
        &self.provides
    }

    pub fn metadata(&self) -> &MiddlewareMetadata {
        &self.metadata
    }
}

/// The type returned by [`MiddlewareRegistry::register`].
///
/// It attaches metadata to the registered middleware.
pub struct MiddlewareBuilder<'a> {
    entry: &'a mut RegisteredMiddleware,
}

impl MiddlewareBuilder<'_> {
    /// Declare that the middleware stores a `T` under `key` in the request context.
    ///
    /// Keys are validated at discovery time: they must start with an ASCII letter
    /// and two middlewares can't provide the same key with different types.
    pub fn provides<T: 'static>(self, key: impl Into<String>) -> Self {
        self.entry.provides.push(ProvidedKey {
            key: key.into(),
            type_name: std::any::type_name::<T>(),
        });
        self
    }

    /// The middleware rejects requests without this header.
    pub fn requires_header(self, name: impl Into<String>) -> Self {
        self.entry.metadata.required_headers.push(name.into());
        self
    }

    /// The middleware rejects requests without this cookie.
    pub fn requires_cookie(self, name: impl Into<String>) -> Self {
        self.entry.metadata.required_cookies.push(name.into());
        self
    }

    /// The name of the security scheme the middleware enforces (e.g. `bearer`).
    pub fn security_scheme(self, name: impl Into<String>) -> Self {
        self.entry.metadata.security_schemes.push(name.into());
        self
    }

    /// The middleware may short-circuit the request with this status code.
    pub fn may_return(self, status: u16) -> Self {
        self.entry.metadata.may_return_statuses.push(status);
        self
    }
}
