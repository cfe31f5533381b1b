//! The contract generated dispatch code is written against.
//!
//! It covers the request/response types, the middleware chain, the extraction of typed
//! values from path, query and headers, JSON encoding and a small [`Dispatcher`] to route
//! requests to the generated functions.
use std::fmt::Display;
use std::str::FromStr;

use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::analysis::RoutePath;
use crate::blueprint::Method;
use crate::{Context, Error};

#[derive(Debug, Clone)]
/// An incoming request.
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Vec<u8>,
    path_params: Vec<(String, String)>,
}

impl Request {
    /// Build a request for `target`, a path optionally followed by a query string
    /// (e.g. `/pets?limit=10`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        Self {
            method,
            path: path.to_owned(),
            query: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            path_params: Vec::new(),
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The decoded query parameters, in the order they appear in the query string.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// The values captured by the route's path variables.
    ///
    /// Empty until the request has been routed by a [`Dispatcher`].
    pub fn path_params(&self) -> &[(String, String)] {
        &self.path_params
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An outgoing response.
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// A plain-text response.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut response = Self::new(status);
        response.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.body = body.into().into_bytes();
        response
    }
}

/// A middleware: it can inspect the request, enrich the context and decide whether to
/// call the rest of the chain through `next`.
pub type Middleware = fn(Context, &Request, Next<'_>) -> Result<Response, Error>;

/// The signature of the functions registered against a [`Dispatcher`].
pub type RouteHandler = fn(Context, &Request) -> Result<Response, Error>;

/// The rest of a middleware chain, ending with the endpoint itself.
pub struct Next<'a> {
    request: &'a Request,
    rest: &'a [Middleware],
    endpoint: &'a dyn Fn(Context) -> Result<Response, Error>,
}

impl Next<'_> {
    /// Invoke the next middleware in the chain or, if there is none left, the endpoint.
    pub fn run(self, ctx: Context) -> Result<Response, Error> {
        match self.rest.split_first() {
            Some((middleware, rest)) => middleware(
                ctx,
                self.request,
                Next {
                    request: self.request,
                    rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(ctx),
        }
    }
}

/// Run `middlewares` in order, outermost first, and then `endpoint`.
pub fn run_chain(
    ctx: Context,
    request: &Request,
    middlewares: &[Middleware],
    endpoint: &dyn Fn(Context) -> Result<Response, Error>,
) -> Result<Response, Error> {
    Next {
        request,
        rest: middlewares,
        endpoint,
    }
    .run(ctx)
}

#[derive(Debug, thiserror::Error)]
/// A request that doesn't match what the endpoint expects.
pub enum BindingError {
    #[error("the `{0}` path parameter is missing")]
    MissingPathParam(String),
    #[error("the `{0}` query parameter is missing")]
    MissingQueryParam(String),
    #[error("the `{0}` header is missing")]
    MissingHeader(String),
    #[error("the `{0}` header is not valid UTF-8")]
    NonUtf8Header(String),
    #[error("the {location} `{name}` can't be parsed from `{value}`: {reason}")]
    InvalidValue {
        location: &'static str,
        name: String,
        value: String,
        reason: String,
    },
    #[error("the request body is not valid JSON for this endpoint")]
    InvalidBody(#[source] serde_json::Error),
}

fn bad_request(e: BindingError) -> Error {
    Error::new(e).with_status(StatusCode::BAD_REQUEST)
}

fn parse<T>(location: &'static str, name: &str, value: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse::<T>().map_err(|e| {
        bad_request(BindingError::InvalidValue {
            location,
            name: name.to_owned(),
            value: value.to_owned(),
            reason: e.to_string(),
        })
    })
}

/// Extract and parse the value captured by the `name` path variable.
pub fn path_param<T>(request: &Request, name: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
{
    let value = request
        .path_params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
        .ok_or_else(|| bad_request(BindingError::MissingPathParam(name.to_owned())))?;
    parse("path parameter", name, value)
}

/// Extract and parse the first value of the `name` query parameter, which must be present.
pub fn query_param<T>(request: &Request, name: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
{
    optional_query_param(request, name)?
        .ok_or_else(|| bad_request(BindingError::MissingQueryParam(name.to_owned())))
}

pub fn optional_query_param<T>(request: &Request, name: &str) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: Display,
{
    request
        .query
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| parse("query parameter", name, value))
        .transpose()
}

/// Every value of the `name` query parameter, in order of appearance.
pub fn query_params<T>(request: &Request, name: &str) -> Result<Vec<T>, Error>
where
    T: FromStr,
    T::Err: Display,
{
    request
        .query
        .iter()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| parse("query parameter", name, value))
        .collect()
}

pub fn header<T>(request: &Request, name: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: Display,
{
    optional_header(request, name)?
        .ok_or_else(|| bad_request(BindingError::MissingHeader(name.to_owned())))
}

pub fn optional_header<T>(request: &Request, name: &str) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(value) = request.headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| bad_request(BindingError::NonUtf8Header(name.to_owned())))?;
    parse("header", name, value).map(Some)
}

/// Deserialize the request body as JSON.
pub fn json_body<T: DeserializeOwned>(request: &Request) -> Result<T, Error> {
    serde_json::from_slice(&request.body).map_err(|e| bad_request(BindingError::InvalidBody(e)))
}

/// A `200 OK` response with `value` serialized as JSON.
pub fn json_response<T: Serialize>(value: &T) -> Result<Response, Error> {
    let mut response = Response::new(StatusCode::OK);
    response.body = serde_json::to_vec(value)?;
    response
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

/// A `204 No Content` response.
pub fn no_content() -> Response {
    Response::new(StatusCode::NO_CONTENT)
}

struct Route {
    method: Method,
    path: RoutePath,
    handler: RouteHandler,
}

#[derive(Default)]
/// Routes requests to the functions registered by the generated `register_routes`.
pub struct Dispatcher {
    routes: Vec<Route>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    #[track_caller]
    /// Route requests matching `method` and `path` to `handler`.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route pattern or if the same method and path
    /// have already been registered.
    pub fn register(&mut self, method: Method, path: &str, handler: RouteHandler) {
        let path = match RoutePath::parse(path) {
            Ok(path) => path,
            Err(e) => panic!("{e}"),
        };
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.path == path)
        {
            panic!("`{method} {path}` has already been registered");
        }
        self.routes.push(Route {
            method,
            path,
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Route `request` and invoke the matching handler.
    ///
    /// When several patterns match, the most specific one wins: literal segments beat
    /// variables, variables beat wildcards.
    /// Handler errors are turned into a plain-text response using the error's status code.
    pub fn dispatch(&self, ctx: Context, mut request: Request) -> Response {
        let mut allowed = Vec::new();
        let mut best: Option<(&Route, Vec<(String, String)>)> = None;
        for route in &self.routes {
            let Some(captures) = route.path.matches(&request.path) else {
                continue;
            };
            if route.method != request.method {
                allowed.push(route.method);
                continue;
            }
            let is_better = best
                .as_ref()
                .is_none_or(|(b, _)| route.path.specificity() > b.path.specificity());
            if is_better {
                best = Some((route, captures));
            }
        }
        let Some((route, captures)) = best else {
            if allowed.is_empty() {
                tracing::debug!(path = %request.path, "No route matches the request path");
                return Response::text(StatusCode::NOT_FOUND, "not found");
            }
            allowed.sort();
            allowed.dedup();
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            let mut response = Response::text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers.insert(ALLOW, value);
            }
            return response;
        };
        request.path_params = captures;
        match (route.handler)(ctx, &request) {
            Ok(response) => response,
            Err(e) => {
                let status = e.status();
                if status.is_server_error() {
                    tracing::error!(
                        error.msg = %e,
                        error.details = ?e,
                        route = %route.path,
                        "Request handling failed"
                    );
                } else {
                    tracing::debug!(error.msg = %e, route = %route.path, "Request rejected");
                }
                Response::text(status, e.to_string())
            }
        }
    }
}
