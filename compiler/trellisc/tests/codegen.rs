use std::collections::BTreeMap;

use trellis_manifest::{
    Binding, Bindings, ContextKey, Endpoint, Manifest, Method, MiddlewareId, Shape,
};
use trellisc::persistence::SourceWriter;
use trellisc::{CodegenError, generate};

fn binding(field: &str, tag: &str, optional: bool, multi: bool) -> Binding {
    Binding {
        field_name: field.into(),
        tag_value: tag.into(),
        type_kind: if multi {
            "list".into()
        } else if optional {
            "option".into()
        } else {
            "string".into()
        },
        optional,
        multi,
        elem_kind: (optional || multi).then(|| "string".into()),
    }
}

fn endpoint(method: Method, path: &str, name: &str, shape: Shape) -> Endpoint {
    Endpoint {
        method,
        path: path.into(),
        handler_pkg: "petstore::pets".into(),
        handler_name: name.into(),
        shape,
        req_type: None,
        resp_type: None,
        middlewares: vec![],
        bindings: None,
    }
}

fn petstore() -> Manifest {
    let auth = MiddlewareId::new("petstore", "authenticate");

    let health = Endpoint {
        handler_pkg: "petstore".into(),
        ..endpoint(Method::Get, "/health", "health", Shape::CtxErr)
    };

    let mut list = endpoint(Method::Get, "/api/pets", "list_pets", Shape::CtxReqRespErr);
    list.req_type = Some("petstore::pets::ListPets".into());
    list.resp_type = Some("petstore::pets::PetList".into());
    list.middlewares = vec![auth.clone()];
    list.bindings = Some(Bindings {
        has_json_body: false,
        path_bindings: vec![],
        query_bindings: vec![
            binding("tags", "tag", false, true),
            binding("limit", "limit", true, false),
        ],
        header_bindings: vec![],
    });

    let mut get = endpoint(Method::Get, "/api/pets/{id}", "get_pet", Shape::CtxReqRespErr);
    get.req_type = Some("petstore::pets::GetPet".into());
    get.resp_type = Some("petstore::pets::Pet".into());
    get.middlewares = vec![auth.clone()];
    get.bindings = Some(Bindings {
        has_json_body: false,
        path_bindings: vec![binding("id", "id", false, false)],
        query_bindings: vec![],
        header_bindings: vec![binding("request_id", "X-Request-Id", true, false)],
    });

    let mut create = endpoint(Method::Post, "/api/pets", "create_pet", Shape::CtxReqRespErr);
    create.req_type = Some("petstore::pets::CreatePet".into());
    create.resp_type = Some("petstore::pets::Pet".into());
    create.middlewares = vec![auth.clone()];
    create.bindings = Some(Bindings {
        has_json_body: true,
        ..Default::default()
    });

    let mut delete = endpoint(Method::Delete, "/api/pets/{id}", "delete_pet", Shape::CtxReqErr);
    delete.req_type = Some("petstore::pets::DeletePet".into());
    delete.middlewares = vec![auth.clone()];
    delete.bindings = Some(Bindings {
        has_json_body: false,
        path_bindings: vec![binding("id", "id", false, false)],
        query_bindings: vec![],
        header_bindings: vec![],
    });

    Manifest {
        endpoints: vec![health, list, get, create, delete],
        middlewares: vec![auth],
        context_keys: vec![
            ContextKey {
                key: "requestID".into(),
                type_name: "alloc::string::String".into(),
            },
            ContextKey {
                key: "user".into(),
                type_name: "petstore::User".into(),
            },
        ],
        middleware_metadata: BTreeMap::new(),
        types: vec![],
        endpoint_docs: BTreeMap::new(),
    }
}

/// Compare generated code ignoring layout: whitespace and trailing commas depend on
/// line width.
fn squash(code: &str) -> String {
    code.split_whitespace().collect::<String>().replace(",)", ")")
}

fn assert_contains(code: &str, needle: &str) {
    assert!(
        squash(code).contains(&squash(needle)),
        "`{needle}` is missing from:\n{code}"
    );
}

#[test]
fn dispatch_code_covers_every_endpoint() {
    let code = generate(&petstore(), "petstore").unwrap();
    let dispatch = code.dispatch;
    syn::parse_file(&dispatch).unwrap();

    for registration in [
        "dispatcher.register(::trellis::Method::Delete, \"/api/pets/{id}\", delete_api_pets_id);",
        "dispatcher.register(::trellis::Method::Get, \"/api/pets\", get_api_pets);",
        "dispatcher.register(::trellis::Method::Get, \"/api/pets/{id}\", get_api_pets_id);",
        "dispatcher.register(::trellis::Method::Get, \"/health\", get_health);",
        "dispatcher.register(::trellis::Method::Post, \"/api/pets\", post_api_pets);",
    ] {
        assert_contains(&dispatch, registration);
    }
    // Registrations follow the endpoint sort key.
    let squashed = squash(&dispatch);
    let delete = squashed.find("delete_api_pets_id);").unwrap();
    let health = squashed.find("get_health);").unwrap();
    let post = squashed.find("post_api_pets);").unwrap();
    assert!(delete < health && health < post);

    assert_contains(&dispatch, "input.id = ::trellis::serve::path_param(request, \"id\")?;");
    assert_contains(&dispatch, "input.tags = ::trellis::serve::query_params(request, \"tag\")?;");
    assert_contains(
        &dispatch,
        "input.limit = ::trellis::serve::optional_query_param(request, \"limit\")?;",
    );
    assert_contains(
        &dispatch,
        "input.request_id = ::trellis::serve::optional_header(request, \"X-Request-Id\")?;",
    );
    assert_contains(
        &dispatch,
        "let input: crate::pets::CreatePet = ::trellis::serve::json_body(request)?;",
    );
    assert_contains(&dispatch, "crate::authenticate as ::trellis::serve::Middleware");
    assert_contains(&dispatch, "crate::health(ctx)?;");
    assert_contains(&dispatch, "Ok(::trellis::serve::no_content())");
    assert_contains(&dispatch, "::trellis::serve::json_response(&output)");
}

#[test]
fn context_helpers_are_generated_for_every_key() {
    let code = generate(&petstore(), "petstore").unwrap();
    let context_keys = code.context_keys.unwrap();
    syn::parse_file(&context_keys).unwrap();
    for item in [
        "pub const REQUEST_ID: ::trellis::context::Key<::std::string::String>",
        "pub fn with_request_id(",
        "pub fn request_id(",
        "pub fn must_request_id(",
        "pub const USER: ::trellis::context::Key<crate::User>",
        "pub fn with_user(",
        "pub fn user(",
        "pub fn must_user(",
    ] {
        assert_contains(&context_keys, item);
    }
}

#[test]
fn output_is_byte_identical_across_runs() {
    let manifest = petstore();
    let first = generate(&manifest, "petstore").unwrap();
    let second = generate(&manifest, "petstore").unwrap();
    assert_eq!(first, second);
}

#[test]
fn output_does_not_depend_on_input_order() {
    let forward = petstore();
    let mut backward = petstore();
    backward.endpoints.reverse();
    backward.context_keys.reverse();
    assert_eq!(
        generate(&forward, "petstore").unwrap(),
        generate(&backward, "petstore").unwrap()
    );
}

#[test]
fn colliding_context_keys_abort_generation() {
    let mut manifest = petstore();
    manifest.context_keys.push(ContextKey {
        key: "request_id".into(),
        type_name: "u64".into(),
    });
    let error: CodegenError = generate(&manifest, "petstore").unwrap_err();
    insta::assert_snapshot!(error, @"the context keys `requestID` and `request_id` both map to `request_id`: rename one of them");
}

#[test]
fn a_request_shape_without_a_request_type_is_rejected() {
    let mut manifest = petstore();
    manifest.endpoints[1].req_type = None;
    let error = generate(&manifest, "petstore").unwrap_err();
    insta::assert_snapshot!(error, @"`GET /api/pets` takes a request value but its type is missing from the manifest");
}

#[test]
fn generated_files_are_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let code = generate(&petstore(), "petstore").unwrap();

    let mut writer = SourceWriter::update_mode();
    code.persist(dir.path(), &mut writer).unwrap();
    assert!(dir.path().join("routes.rs").exists());
    assert!(dir.path().join("context_keys.rs").exists());

    let mut checker = SourceWriter::check_mode();
    code.persist(dir.path(), &mut checker).unwrap();
    assert!(checker.verify().is_ok());

    let mut manifest = petstore();
    manifest.endpoints.pop();
    let outdated = generate(&manifest, "petstore").unwrap();
    let mut checker = SourceWriter::check_mode();
    outdated.persist(dir.path(), &mut checker).unwrap();
    let error = checker.verify().unwrap_err();
    assert_eq!(error.outdated, vec![dir.path().join("routes.rs")]);
}
