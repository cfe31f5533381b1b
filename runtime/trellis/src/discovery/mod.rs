//! Turn a registered [`Blueprint`] into a validated [`Manifest`].
//!
//! This module runs inside the throwaway driver program synthesized by `trellisc`:
//! the driver calls [`run`] with the application's registration functions and
//! `trellisc` reads the outcome back from the process output.
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::io::Write;
use std::process::ExitCode;

use indexmap::{IndexMap, IndexSet};
use trellis_manifest::{
    Bindings, ContextKey, Endpoint, Manifest, MiddlewareId, MiddlewareMetadata, route_key,
};

use crate::analysis::{
    ErrorCode, RoutePath, ValidationError, ValidationErrors, analyze_bindings, classify_handler,
};
use crate::blueprint::RegisteredEndpoint;
use crate::blueprint::reflection::Location;
use crate::{Blueprint, MiddlewareRegistry};

use types::TypeGraph;

mod types;

/// The exit code used by the driver when the application fails validation.
///
/// The validation errors are printed on `stderr`, one `error[<code>]: <message>` line each.
pub const VALIDATION_FAILURE_EXIT_CODE: u8 = 2;

/// Validate every registered endpoint and middleware and assemble the manifest.
///
/// All problems are collected, in registration order: no manifest is produced if there
/// is at least one.
pub fn collect(
    blueprint: &Blueprint,
    registry: Option<&MiddlewareRegistry>,
) -> Result<Manifest, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let mut graph = TypeGraph::default();
    let mut endpoints = Vec::with_capacity(blueprint.endpoints().len());
    let mut endpoint_docs = BTreeMap::new();
    // `METHOD /path` -> where it was first registered.
    let mut routes: IndexMap<String, &Location> = IndexMap::new();

    for registered in blueprint.endpoints() {
        let key = route_key(registered.method(), registered.path());
        if let Some(first) = routes.get(&key) {
            errors.push(
                ValidationError::new(
                    ErrorCode::DuplicateRoute,
                    format!("the same route was already registered at {first}"),
                )
                .within(site(registered)),
            );
            continue;
        }
        routes.insert(key.clone(), registered.location());

        match validate_endpoint(registered, &mut graph) {
            Ok(endpoint) => {
                let doc = registered.doc();
                if doc.summary.is_some() || doc.description.is_some() {
                    endpoint_docs.insert(key, doc.clone());
                }
                endpoints.push(endpoint);
            }
            Err(e) => errors.push(e.within(site(registered))),
        }
    }

    let mut middlewares: IndexSet<MiddlewareId> = IndexSet::new();
    let mut context_keys: BTreeMap<String, (String, String)> = BTreeMap::new();
    let mut middleware_metadata = BTreeMap::new();
    if let Some(registry) = registry {
        for entry in registry.iter() {
            let id = entry.middleware().id();
            for provided in entry.provides() {
                if let Err(e) = register_context_key(
                    &mut context_keys,
                    &provided.key,
                    provided.type_name,
                    &id,
                ) {
                    errors.push(e.within(format_args!("middleware `{}`", id.path())));
                }
            }
            if !entry.metadata().is_empty() {
                middleware_metadata.insert(id.path(), normalize_metadata(entry.metadata()));
            }
            middlewares.insert(id);
        }
    }
    for registered in blueprint.endpoints() {
        middlewares.extend(registered.middlewares().iter().map(|m| m.id()));
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(Manifest {
        endpoints,
        middlewares: middlewares.into_iter().collect(),
        context_keys: context_keys
            .into_iter()
            .map(|(key, (type_name, _))| ContextKey { key, type_name })
            .collect(),
        middleware_metadata,
        types: graph.into_nodes(),
        endpoint_docs,
    })
}

/// The entry point of the discovery driver.
///
/// On success, the manifest is printed on `stdout` and the process exits with `0`.
/// On validation failure, every error is printed on `stderr` and the process exits with
/// [`VALIDATION_FAILURE_EXIT_CODE`].
pub fn run(
    register: fn(&mut Blueprint),
    register_middleware: Option<fn(&mut MiddlewareRegistry)>,
) -> ExitCode {
    let mut blueprint = Blueprint::new();
    register(&mut blueprint);
    let registry = register_middleware.map(|register_middleware| {
        let mut registry = MiddlewareRegistry::new();
        register_middleware(&mut registry);
        registry
    });

    let manifest = match collect(&blueprint, registry.as_ref()) {
        Ok(manifest) => manifest,
        Err(errors) => {
            eprintln!("{errors}");
            return ExitCode::from(VALIDATION_FAILURE_EXIT_CODE);
        }
    };
    let encoded = match manifest.encode() {
        Ok(encoded) => encoded,
        Err(e) => {
            eprintln!("failed to serialize the manifest: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout
        .write_all(encoded.as_bytes())
        .and_then(|_| stdout.flush())
    {
        eprintln!("failed to write the manifest to stdout: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn validate_endpoint(
    registered: &RegisteredEndpoint,
    graph: &mut TypeGraph,
) -> Result<Endpoint, ValidationError> {
    let handler = registered.handler();
    let info = classify_handler(handler.shape())?;
    let path = RoutePath::parse(registered.path())?;
    let bindings = analyze_bindings(&path, info.request.as_ref())?;

    let req_type = info.request.as_ref().map(|shape| graph.add(shape));
    let resp_type = info.response.as_ref().map(|shape| graph.add(shape));
    Ok(Endpoint {
        method: registered.method(),
        path: registered.path().to_owned(),
        handler_pkg: handler.package(),
        handler_name: handler.name(),
        shape: info.shape,
        bindings: req_type.as_ref().map(|_| Bindings::from(&bindings)),
        req_type,
        resp_type,
        middlewares: registered.middlewares().iter().map(|m| m.id()).collect(),
    })
}

/// How an endpoint is referred to in error messages.
fn site(registered: &RegisteredEndpoint) -> String {
    format!(
        "`{} {}` (`{}`, registered at {})",
        registered.method(),
        registered.path(),
        registered
            .handler()
            .identifiers()
            .fully_qualified_path()
            .join("::"),
        registered.location()
    )
}

fn register_context_key(
    keys: &mut BTreeMap<String, (String, String)>,
    key: &str,
    type_name: &str,
    provider: &MiddlewareId,
) -> Result<(), ValidationError> {
    if !is_valid_context_key(key) {
        return Err(ValidationError::new(
            ErrorCode::InvalidContextKey,
            format!(
                "`{key}` is not a valid context key: it must start with an ASCII letter and contain only ASCII letters, digits, `_`, `-` and `.`"
            ),
        ));
    }
    match keys.entry(key.to_owned()) {
        Entry::Vacant(entry) => {
            entry.insert((type_name.to_owned(), provider.path()));
            Ok(())
        }
        Entry::Occupied(entry) => {
            let (existing_type, existing_provider) = entry.get();
            if existing_type == type_name {
                return Ok(());
            }
            Err(ValidationError::new(
                ErrorCode::ConflictingContextKey,
                format!(
                    "`{key}` is provided as `{type_name}`, but `{existing_provider}` already provides it as `{existing_type}`"
                ),
            ))
        }
    }
}

fn is_valid_context_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Sort and deduplicate every list, so that the manifest doesn't depend on the order
/// metadata was attached in.
fn normalize_metadata(metadata: &MiddlewareMetadata) -> MiddlewareMetadata {
    fn sorted<T: Ord + Clone>(values: &[T]) -> Vec<T> {
        let mut values = values.to_vec();
        values.sort();
        values.dedup();
        values
    }
    MiddlewareMetadata {
        required_headers: sorted(&metadata.required_headers),
        required_cookies: sorted(&metadata.required_cookies),
        security_schemes: sorted(&metadata.security_schemes),
        may_return_statuses: sorted(&metadata.may_return_statuses),
    }
}

#[cfg(test)]
mod tests {
    use trellis_manifest::Shape;

    use super::*;
    use crate::reflect::Reflect;
    use crate::serve::{Next, Request, Response};
    use crate::{Context, Error, GET, POST, handler, middleware};

    #[derive(Reflect, Default)]
    #[allow(dead_code)]
    struct GetPet {
        #[bind(path = "id")]
        id: String,
    }

    #[derive(Reflect)]
    #[allow(dead_code)]
    /// A pet.
    struct Pet {
        name: String,
    }

    #[derive(Reflect)]
    #[allow(dead_code)]
    struct Conflicting {
        #[bind(path = "id", body = "id")]
        id: String,
    }

    #[derive(Reflect)]
    #[allow(dead_code)]
    struct User {
        id: u64,
    }

    fn get_pet(_ctx: Context, _req: GetPet) -> Result<Pet, Error> {
        unimplemented!()
    }

    fn health(_ctx: Context) -> Result<(), Error> {
        Ok(())
    }

    fn conflicting(_ctx: Context, _req: Conflicting) -> Result<(), Error> {
        Ok(())
    }

    fn two_values(_ctx: Context) -> Result<(Pet, Pet), Error> {
        unimplemented!()
    }

    fn auth(ctx: Context, _request: &Request, next: Next<'_>) -> Result<Response, Error> {
        next.run(ctx)
    }

    fn audit(ctx: Context, _request: &Request, next: Next<'_>) -> Result<Response, Error> {
        next.run(ctx)
    }

    fn blueprint() -> Blueprint {
        let mut bp = Blueprint::new();
        bp.route(GET, "/health", handler!(self::health))
            .summary("Health check");
        let mut api = bp.scope("/api");
        api.wrap(middleware!(self::audit));
        api.wrap(middleware!(self::auth));
        api.route(GET, "/pets/{id}", handler!(self::get_pet));
        bp
    }

    #[test]
    fn a_valid_blueprint_yields_a_manifest() {
        let mut registry = MiddlewareRegistry::new();
        registry
            .register(middleware!(self::auth))
            .provides::<User>("user")
            .may_return(403)
            .may_return(401)
            .may_return(401);
        let manifest = collect(&blueprint(), Some(&registry)).unwrap();

        let get_pet = &manifest.endpoints[1];
        assert_eq!(get_pet.path, "/api/pets/{id}");
        assert_eq!(get_pet.shape, Shape::CtxReqRespErr);
        assert_eq!(get_pet.handler_pkg, "trellis::discovery::tests");
        assert_eq!(get_pet.handler_name, "get_pet");
        let bindings = get_pet.bindings.as_ref().unwrap();
        assert_eq!(bindings.path_bindings[0].tag_value, "id");
        assert!(!bindings.has_json_body);
        assert_eq!(manifest.endpoints[0].bindings, None);

        // Registry first, then first use.
        let middlewares: Vec<_> = manifest.middlewares.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(middlewares, vec!["auth", "audit"]);
        let chain: Vec<_> = get_pet.middlewares.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(chain, vec!["audit", "auth"]);

        assert_eq!(manifest.context_keys.len(), 1);
        assert_eq!(manifest.context_keys[0].key, "user");
        assert!(manifest.context_keys[0].type_name.ends_with("::User"));
        assert_eq!(
            manifest.middleware_metadata["trellis::discovery::tests::auth"].may_return_statuses,
            vec![401, 403]
        );
        assert_eq!(
            manifest.endpoint_docs["GET /health"].summary.as_deref(),
            Some("Health check")
        );
        assert!(manifest.types.iter().any(|t| t.doc.as_deref() == Some("A pet.")));
    }

    #[test]
    fn collection_is_deterministic() {
        let first = collect(&blueprint(), None).unwrap().encode().unwrap();
        let second = collect(&blueprint(), None).unwrap().encode().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn every_error_is_reported_in_registration_order() {
        let mut bp = Blueprint::new();
        bp.route(POST, "/pets/{id}", handler!(self::conflicting));
        bp.route(GET, "/health", handler!(self::health));
        bp.route(GET, "/health/", handler!(self::health));
        bp.route(GET, "/pair", handler!(self::two_values));
        let errors = collect(&bp, None).unwrap_err();
        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(
            codes,
            vec![
                ErrorCode::DuplicateBinding,
                ErrorCode::DuplicateRoute,
                ErrorCode::TooManyReturns
            ]
        );
        assert!(errors.iter().next().unwrap().message().starts_with(
            "`POST /pets/{id}` (`trellis::discovery::tests::conflicting`, registered at "
        ));
    }

    #[test]
    fn context_keys_are_validated() {
        let mut registry = MiddlewareRegistry::new();
        registry
            .register(middleware!(self::auth))
            .provides::<User>("user")
            .provides::<u64>("1st-user");
        registry
            .register(middleware!(self::audit))
            .provides::<String>("user")
            .provides::<User>("user");
        let errors = collect(&Blueprint::new(), Some(&registry)).unwrap_err();
        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(
            codes,
            vec![ErrorCode::InvalidContextKey, ErrorCode::ConflictingContextKey]
        );
        insta::assert_snapshot!(errors.iter().next().unwrap(), @"middleware `trellis::discovery::tests::auth`: `1st-user` is not a valid context key: it must start with an ASCII letter and contain only ASCII letters, digits, `_`, `-` and `.`");
    }

    #[test]
    fn context_key_names() {
        assert!(is_valid_context_key("user"));
        assert!(is_valid_context_key("request.id"));
        assert!(is_valid_context_key("X-Tenant_2"));
        assert!(!is_valid_context_key(""));
        assert!(!is_valid_context_key("_user"));
        assert!(!is_valid_context_key("user id"));
    }
}
