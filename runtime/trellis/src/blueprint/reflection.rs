//! Metadata captured at registration time to identify handlers and middlewares.
use crate::reflect::TypeShape;
use crate::serve::Middleware;

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
/// A set of coordinates to identify a precise spot in a source file.
///
/// `Location` is an owned version of [`std::panic::Location`].
pub struct Location {
    /// Lines are 1-indexed.
    pub line: u32,
    /// Columns are 1-indexed.
    pub column: u32,
    pub file: String,
}

impl<'a> From<&'a std::panic::Location<'a>> for Location {
    fn from(l: &'a std::panic::Location<'a>) -> Self {
        Self {
            line: l.line(),
            column: l.column(),
            file: l.file().into(),
        }
    }
}

impl Location {
    #[track_caller]
    pub fn caller() -> Self {
        std::panic::Location::caller().into()
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
/// Information on the module where a `handler!` or `middleware!` invocation was expanded.
pub struct CreatedAt {
    /// The path to the module, obtained via [`module_path!`].
    ///
    /// Its first segment is the name of the crate, with hyphens already replaced by
    /// underscores.
    pub module_path: String,
}

#[macro_export]
#[doc(hidden)]
macro_rules! created_at {
    () => {
        $crate::blueprint::reflection::CreatedAt {
            module_path: ::std::module_path!().to_owned(),
        }
    };
}

#[derive(Debug, Hash, Eq, PartialEq, Clone)]
/// All the information required to identify a function registered against a `Blueprint`.
pub struct RawIdentifiers {
    /// Where the path was captured.
    pub created_at: CreatedAt,
    /// The path to the function, as written by the user.
    pub import_path: String,
}

impl RawIdentifiers {
    #[track_caller]
    /// # Panics
    ///
    /// Panics if `import_path` doesn't start with `crate::`, `self::`, `super::` or `::`:
    /// bare paths (`get_pet`, `pets::get_pet`) have no unambiguous absolute form.
    pub fn new(import_path: &str, created_at: CreatedAt) -> Self {
        let first = import_path.split("::").next().unwrap_or_default().trim();
        if !matches!(first, "" | "crate" | "self" | "super") {
            let path = import_path.replace(' ', "");
            panic!(
                "`{path}` is not a valid handler or middleware path: it must start with `crate::`, `self::`, `super::` or `::` (e.g. `crate::{path}`)"
            );
        }
        Self {
            created_at,
            import_path: import_path.to_owned(),
        }
    }

    /// Return an unambiguous, absolute path pointing at the function.
    ///
    /// `crate::`, `self::` and `super::` prefixes are resolved against the module where
    /// the path was captured.
    pub fn fully_qualified_path(&self) -> Vec<String> {
        let segments: Vec<String> = split_path(&self.import_path);
        let module_segments = split_path(&self.created_at.module_path);
        match segments.first().map(String::as_str) {
            Some("crate") => module_segments
                .into_iter()
                .take(1)
                .chain(segments.into_iter().skip(1))
                .collect(),
            Some("self") => module_segments
                .into_iter()
                .chain(segments.into_iter().skip(1))
                .collect(),
            Some("super") => {
                let n_super = segments.iter().take_while(|s| *s == "super").count();
                let n_kept = module_segments.len().saturating_sub(n_super);
                module_segments
                    .into_iter()
                    .take(n_kept)
                    .chain(segments.into_iter().skip(n_super))
                    .collect()
            }
            // `::`-prefixed: already absolute.
            _ => segments,
        }
    }

    /// The module path of the function: everything but the last segment.
    pub fn package(&self) -> String {
        let mut segments = self.fully_qualified_path();
        segments.pop();
        segments.join("::")
    }

    /// The name of the function: the last segment.
    pub fn name(&self) -> String {
        self.fully_qualified_path().pop().unwrap_or_default()
    }

    /// The path provided by the user, unaltered.
    pub fn raw_path(&self) -> &str {
        &self.import_path
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.trim_start_matches("::")
        .split("::")
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Clone)]
/// A handler, as captured by [`handler!`](crate::handler).
pub struct HandlerRef {
    identifiers: RawIdentifiers,
    shape: Option<TypeShape>,
}

impl HandlerRef {
    #[doc(hidden)]
    pub fn new(identifiers: RawIdentifiers, shape: TypeShape) -> Self {
        Self {
            identifiers,
            shape: Some(shape),
        }
    }

    /// Build a handler reference from its parts.
    ///
    /// `shape` is `None` when no handler value is available: registering such a
    /// handler panics.
    pub fn from_raw_parts(identifiers: RawIdentifiers, shape: Option<TypeShape>) -> Self {
        Self { identifiers, shape }
    }

    pub fn identifiers(&self) -> &RawIdentifiers {
        &self.identifiers
    }

    pub fn package(&self) -> String {
        self.identifiers.package()
    }

    pub fn name(&self) -> String {
        self.identifiers.name()
    }

    pub fn shape(&self) -> Option<&TypeShape> {
        self.shape.as_ref()
    }
}

#[derive(Debug, Clone)]
/// A middleware, as captured by [`middleware!`](crate::middleware).
pub struct MiddlewareRef {
    identifiers: RawIdentifiers,
    value: Middleware,
}

impl MiddlewareRef {
    #[doc(hidden)]
    pub fn new(identifiers: RawIdentifiers, value: Middleware) -> Self {
        Self { identifiers, value }
    }

    pub fn identifiers(&self) -> &RawIdentifiers {
        &self.identifiers
    }

    pub fn package(&self) -> String {
        self.identifiers.package()
    }

    pub fn name(&self) -> String {
        self.identifiers.name()
    }

    /// The middleware function itself.
    pub fn value(&self) -> Middleware {
        self.value
    }

    pub fn id(&self) -> trellis_manifest::MiddlewareId {
        trellis_manifest::MiddlewareId::new(self.package(), self.name())
    }
}

// Middlewares are identified by where they are defined, not by their (function pointer) value.
impl PartialEq for MiddlewareRef {
    fn eq(&self, other: &Self) -> bool {
        self.identifiers.fully_qualified_path() == other.identifiers.fully_qualified_path()
    }
}

impl Eq for MiddlewareRef {}

/// Capture a handler to be registered against a [`Blueprint`](crate::Blueprint).
///
/// The argument is the path to the handler function, e.g. `handler!(crate::pets::get_pet)`.
/// Relative paths (`crate::`, `self::`, `super::`) are resolved against the module where
/// the macro is invoked. Paths into other crates must start with `::`.
///
/// # Panics
///
/// Panics if the path has none of those prefixes, e.g. `handler!(get_pet)`.
#[macro_export]
macro_rules! handler {
    ($($path:tt)+) => {
        $crate::blueprint::reflection::HandlerRef::new(
            $crate::blueprint::reflection::RawIdentifiers::new(
                ::std::stringify!($($path)+),
                $crate::created_at!(),
            ),
            $crate::reflect::describe(&$($path)+),
        )
    };
}

/// Capture a middleware, to be attached to a [`Scope`](crate::Scope) or listed in a
/// [`MiddlewareRegistry`](crate::MiddlewareRegistry).
///
/// The function must have the signature of [`Middleware`](crate::serve::Middleware).
#[macro_export]
macro_rules! middleware {
    ($($path:tt)+) => {
        $crate::blueprint::reflection::MiddlewareRef::new(
            $crate::blueprint::reflection::RawIdentifiers::new(
                ::std::stringify!($($path)+),
                $crate::created_at!(),
            ),
            $($path)+ as $crate::serve::Middleware,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identifiers(import_path: &str, module_path: &str) -> RawIdentifiers {
        RawIdentifiers::new(
            import_path,
            CreatedAt {
                module_path: module_path.into(),
            },
        )
    }

    #[test]
    fn relative_paths_are_resolved() {
        let id = identifiers("crate :: pets :: get_pet", "petstore::routes");
        assert_eq!(id.package(), "petstore::pets");
        assert_eq!(id.name(), "get_pet");

        let id = identifiers("self::get_pet", "petstore::pets");
        assert_eq!(id.package(), "petstore::pets");

        let id = identifiers("super::super::health", "petstore::api::v1");
        assert_eq!(id.package(), "petstore");
        assert_eq!(id.name(), "health");

        let id = identifiers("::other_crate::handlers::ping", "petstore");
        assert_eq!(id.package(), "other_crate::handlers");
    }

    #[test]
    #[should_panic(expected = "`get_pet` is not a valid handler or middleware path")]
    fn bare_function_names_are_rejected() {
        identifiers("get_pet", "petstore::routes");
    }

    #[test]
    #[should_panic(expected = "`pets::get_pet` is not a valid handler or middleware path")]
    fn paths_relative_to_an_implicit_module_are_rejected() {
        identifiers("pets :: get_pet", "petstore");
    }

    #[test]
    #[should_panic(expected = "must start with `crate::`, `self::`, `super::` or `::`")]
    fn the_handler_macro_rejects_unqualified_paths() {
        use self::ping as imported_ping;
        let _ = crate::handler!(imported_ping);
    }

    fn ping(_ctx: crate::Context) -> Result<(), crate::Error> {
        Ok(())
    }

    #[test]
    fn handler_macro_captures_path_and_shape() {
        let handler = crate::handler!(self::ping);
        assert_eq!(handler.name(), "ping");
        assert_eq!(
            handler.package(),
            "trellis::blueprint::reflection::tests"
        );
        assert!(matches!(
            handler.shape().unwrap().kind,
            crate::reflect::Kind::Function(_)
        ));
    }
}
