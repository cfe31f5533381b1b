//! End-to-end discovery against the fixture application.
//!
//! These tests build a crate from scratch: run them with `cargo test -- --ignored`.
use camino::Utf8PathBuf;
use trellis_manifest::Method;
use trellisc::{DiscoveryConfig, DiscoveryError, discover};

fn fixture_config() -> DiscoveryConfig {
    let manifest_path = Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("petstore")
        .join("Cargo.toml");
    let mut config = DiscoveryConfig::new("petstore");
    config.middleware_path = Some("petstore".into());
    config.manifest_path = Some(manifest_path);
    config
}

#[test]
#[ignore = "builds the fixture application"]
fn the_fixture_application_is_discovered() {
    let manifest = discover(&fixture_config()).unwrap();

    let routes: Vec<_> = manifest
        .endpoints
        .iter()
        .map(|e| (e.method, e.path.as_str()))
        .collect();
    assert_eq!(
        routes,
        vec![
            (Method::Get, "/health"),
            (Method::Get, "/api/pets"),
            (Method::Get, "/api/pets/{id}"),
            (Method::Post, "/api/pets"),
            (Method::Delete, "/api/pets/{id}"),
        ]
    );
    assert_eq!(manifest.context_keys.len(), 1);
    assert_eq!(manifest.context_keys[0].key, "user");
    assert_eq!(manifest.context_keys[0].type_name, "petstore::User");
    assert!(manifest.middleware_metadata.contains_key("petstore::authenticate"));
    assert_eq!(
        manifest.endpoint_docs["GET /api/pets"].summary.as_deref(),
        Some("List pets")
    );

    let code = trellisc::generate(&manifest, "petstore").unwrap();
    assert!(code.dispatch.contains("register_routes"));
    assert!(code.context_keys.unwrap().contains("must_user"));
}

#[test]
#[ignore = "builds the fixture application"]
fn discovering_twice_yields_identical_bytes() {
    let config = fixture_config();
    let first = discover(&config).unwrap().encode().unwrap();
    let second = discover(&config).unwrap().encode().unwrap();
    assert_eq!(first, second);
}

#[test]
#[ignore = "invokes cargo metadata"]
fn unknown_crates_are_reported() {
    let mut config = fixture_config();
    config.registration_path = "not_a_member::api".into();
    config.middleware_path = None;
    let error = discover(&config).unwrap_err();
    assert!(matches!(error, DiscoveryError::PackageNotFound { .. }));
    assert!(error.validation_errors().is_none());
}
