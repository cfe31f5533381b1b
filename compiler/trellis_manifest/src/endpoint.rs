use std::fmt::{Display, Formatter};

use crate::Method;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// A validated endpoint, as reported by discovery.
pub struct Endpoint {
    pub method: Method,
    /// The normalized route pattern (e.g. `/pets/{id}`).
    pub path: String,
    /// The module path where the handler is defined (e.g. `petstore::pets`).
    pub handler_pkg: String,
    /// The name of the handler function, without its module path.
    pub handler_name: String,
    pub shape: Shape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resp_type: Option<String>,
    /// The middlewares wrapping this endpoint, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middlewares: Vec<MiddlewareId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Bindings>,
}

impl Endpoint {
    /// The key endpoints are ordered by: method, path, handler package, handler name.
    pub fn sort_key(&self) -> (Method, &str, &str, &str) {
        (
            self.method,
            &self.path,
            &self.handler_pkg,
            &self.handler_name,
        )
    }

    /// `METHOD /path`, the key used to look up endpoint documentation.
    pub fn route_key(&self) -> String {
        route_key(self.method, &self.path)
    }

    /// The fully qualified path of the handler function.
    pub fn handler_path(&self) -> String {
        format!("{}::{}", self.handler_pkg, self.handler_name)
    }
}

/// `METHOD /path`.
pub fn route_key(method: Method, path: &str) -> String {
    format!("{method} {path}")
}

/// Sort endpoints in place according to [`Endpoint::sort_key`].
///
/// The sort is stable and idempotent.
pub fn sort_endpoints(endpoints: &mut [Endpoint]) {
    endpoints.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
/// The signature family of a handler.
pub enum Shape {
    /// `fn(Context) -> Result<(), Error>`
    CtxErr,
    /// `fn(Context) -> Result<Resp, Error>`
    CtxRespErr,
    /// `fn(Context, Req) -> Result<(), Error>`
    CtxReqErr,
    /// `fn(Context, Req) -> Result<Resp, Error>`
    CtxReqRespErr,
}

impl Shape {
    pub fn new(has_request: bool, has_response: bool) -> Self {
        match (has_request, has_response) {
            (false, false) => Shape::CtxErr,
            (false, true) => Shape::CtxRespErr,
            (true, false) => Shape::CtxReqErr,
            (true, true) => Shape::CtxReqRespErr,
        }
    }

    pub fn has_request(&self) -> bool {
        matches!(self, Shape::CtxReqErr | Shape::CtxReqRespErr)
    }

    pub fn has_response(&self) -> bool {
        matches!(self, Shape::CtxRespErr | Shape::CtxReqRespErr)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::CtxErr => "ctx_err",
            Shape::CtxRespErr => "ctx_resp_err",
            Shape::CtxReqErr => "ctx_req_err",
            Shape::CtxReqRespErr => "ctx_req_resp_err",
        }
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
/// A reference to a middleware function.
pub struct MiddlewareId {
    /// The module path where the middleware is defined.
    pub pkg: String,
    pub name: String,
}

impl MiddlewareId {
    pub fn new(pkg: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pkg: pkg.into(),
            name: name.into(),
        }
    }

    /// The fully qualified path of the middleware function, used as key for
    /// its metadata.
    pub fn path(&self) -> String {
        format!("{}::{}", self.pkg, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// How the fields of a request type are populated from an incoming request.
pub struct Bindings {
    /// `true` if at least one field is populated from the JSON body.
    pub has_json_body: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_bindings: Vec<Binding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_bindings: Vec<Binding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header_bindings: Vec<Binding>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Binding {
    /// The name of the struct field.
    pub field_name: String,
    /// The external name: path variable, query parameter or header name.
    pub tag_value: String,
    /// The kind of the field type (e.g. `string`, `option`, `list`).
    pub type_kind: String,
    /// The field is an `Option<T>`: a missing value is not an error.
    #[serde(rename = "is_pointer")]
    pub optional: bool,
    /// The field is a `Vec<T>`: every occurrence of the parameter is collected.
    #[serde(rename = "is_slice")]
    pub multi: bool,
    /// The kind of `T` for `Option<T>` and `Vec<T>` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elem_kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(method: Method, path: &str, pkg: &str, name: &str) -> Endpoint {
        Endpoint {
            method,
            path: path.into(),
            handler_pkg: pkg.into(),
            handler_name: name.into(),
            shape: Shape::CtxErr,
            req_type: None,
            resp_type: None,
            middlewares: vec![],
            bindings: None,
        }
    }

    fn keys(endpoints: &[Endpoint]) -> Vec<String> {
        endpoints
            .iter()
            .map(|e| format!("{} {}", e.route_key(), e.handler_path()))
            .collect()
    }

    fn fixture() -> Vec<Endpoint> {
        vec![
            endpoint(Method::Post, "/pets", "app::pets", "create"),
            endpoint(Method::Get, "/pets/{id}", "app::pets", "get"),
            endpoint(Method::Get, "/pets", "app::pets", "list"),
            endpoint(Method::Delete, "/pets/{id}", "app::pets", "delete"),
            endpoint(Method::Get, "/pets", "app::legacy", "list"),
        ]
    }

    #[test]
    fn sorting_uses_the_full_key() {
        let mut endpoints = fixture();
        sort_endpoints(&mut endpoints);
        insta::assert_debug_snapshot!(keys(&endpoints), @r#"
        [
            "DELETE /pets/{id} app::pets::delete",
            "GET /pets app::legacy::list",
            "GET /pets app::pets::list",
            "GET /pets/{id} app::pets::get",
            "POST /pets app::pets::create",
        ]
        "#);
    }

    #[test]
    fn sorting_is_idempotent() {
        let mut once = fixture();
        sort_endpoints(&mut once);
        let mut twice = once.clone();
        sort_endpoints(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn sorting_is_insensitive_to_input_order() {
        let mut forward = fixture();
        let mut backward = fixture();
        backward.reverse();
        let mut rotated = fixture();
        rotated.rotate_left(2);
        sort_endpoints(&mut forward);
        sort_endpoints(&mut backward);
        sort_endpoints(&mut rotated);
        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);
    }

    #[test]
    fn shape_flags() {
        for has_request in [false, true] {
            for has_response in [false, true] {
                let shape = Shape::new(has_request, has_response);
                assert_eq!(shape.has_request(), has_request);
                assert_eq!(shape.has_response(), has_response);
            }
        }
        assert_eq!(Shape::CtxReqRespErr.to_string(), "ctx_req_resp_err");
    }
}
