//! Discover the endpoints of an application by building and running a throwaway driver.
//!
//! Endpoints are registered by ordinary Rust code: the only reliable way to enumerate
//! them is to compile that code and run it. Discovery synthesizes a tiny binary crate
//! depending on the target package, runs it with `cargo run` and reads the manifest
//! back from its output.
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use trellis::analysis::ValidationErrors;
use trellis::discovery::VALIDATION_FAILURE_EXIT_CODE;
use trellis_manifest::Manifest;

pub use errors::{DiscoveryError, ValidationDiagnostic};
use sandbox::Sandbox;

mod errors;
mod package_graph;
mod process;
mod sandbox;

/// 16 MiB.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// The module exposing `pub fn register(bp: &mut Blueprint)`, e.g. `petstore::api`.
    pub registration_path: String,
    /// The module exposing `pub fn register_middleware(registry: &mut MiddlewareRegistry)`.
    pub middleware_path: Option<String>,
    /// The `Cargo.toml` of the workspace to search for the target package.
    /// Defaults to the workspace enclosing the current directory.
    pub manifest_path: Option<Utf8PathBuf>,
    pub offline: bool,
    /// Where the driver is built.
    /// Defaults to `trellis-discovery` inside the workspace's target directory.
    pub target_dir: Option<Utf8PathBuf>,
    /// The maximum number of bytes captured on each of `stdout` and `stderr`.
    pub max_output_bytes: usize,
    pub cargo: Utf8PathBuf,
}

impl DiscoveryConfig {
    pub fn new(registration_path: impl Into<String>) -> Self {
        Self {
            registration_path: registration_path.into(),
            middleware_path: None,
            manifest_path: None,
            offline: false,
            target_dir: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            cargo: std::env::var("CARGO")
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|_| Utf8PathBuf::from("cargo")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An import-style path to a module, starting with a crate name.
pub(crate) struct RegistrationPath {
    segments: Vec<String>,
}

impl RegistrationPath {
    pub(crate) fn parse(path: &str) -> Result<Self, DiscoveryError> {
        let invalid = |reason: &str| DiscoveryError::InvalidRegistrationPath {
            path: path.to_owned(),
            reason: reason.to_owned(),
        };
        let path_ = path.trim().trim_start_matches("::");
        if path_.is_empty() {
            return Err(invalid("it is empty"));
        }
        let segments: Vec<String> = path_.split("::").map(str::to_owned).collect();
        for segment in &segments {
            if syn::parse_str::<syn::Ident>(segment).is_err() {
                return Err(invalid(&format!("`{segment}` is not a valid identifier")));
            }
        }
        Ok(Self { segments })
    }

    pub(crate) fn crate_name(&self) -> &str {
        &self.segments[0]
    }

    /// The absolute path to the function called `name` inside this module.
    pub(crate) fn function(&self, name: &str) -> Result<syn::Path, syn::Error> {
        syn::parse_str(&format!("::{}::{name}", self.segments.join("::")))
    }
}

#[tracing::instrument(skip_all, fields(registration_path = %config.registration_path))]
/// Build and run the discovery driver for the configured package.
///
/// The sandbox is removed before returning, whatever the outcome.
/// There is no timeout: wrap the call if you need one.
pub fn discover(config: &DiscoveryConfig) -> Result<Manifest, DiscoveryError> {
    let registration = RegistrationPath::parse(&config.registration_path)?;
    let middleware = config
        .middleware_path
        .as_deref()
        .map(RegistrationPath::parse)
        .transpose()?;
    if let Some(middleware) = &middleware
        && middleware.crate_name() != registration.crate_name()
    {
        return Err(DiscoveryError::InvalidRegistrationPath {
            path: middleware.segments.join("::"),
            reason: format!(
                "middlewares must be registered by the same crate as endpoints, `{}`",
                registration.crate_name()
            ),
        });
    }

    let graph = package_graph::compute_package_graph(config.manifest_path.as_deref(), &config.cargo)?;
    let target = package_graph::find_target(&graph, registration.crate_name())?;
    let workspace = graph.workspace();
    let workspace_root = workspace.root();
    let target_dir = config
        .target_dir
        .clone()
        .unwrap_or_else(|| workspace.target_directory().join("trellis-discovery"));
    tracing::debug!(package = %target.package_name, %target_dir, "Located the target package");

    let sandbox = Sandbox::create(&target, &registration, middleware.as_ref(), workspace_root)?;
    let mut command = Command::new(config.cargo.as_std_path());
    command
        .arg("run")
        .arg("--quiet")
        .arg("--manifest-path")
        .arg(sandbox.manifest_path())
        .env("CARGO_TARGET_DIR", target_dir.as_std_path());
    if config.offline {
        command.arg("--offline");
    }
    let captured = tracing::info_span!("Build and run the discovery driver")
        .in_scope(|| process::run_bounded(command, config.max_output_bytes))?;
    drop(sandbox);

    if captured.status.success() {
        let stdout = String::from_utf8_lossy(&captured.stdout);
        return Manifest::decode(&stdout).map_err(DiscoveryError::InvalidManifest);
    }
    let stderr = String::from_utf8_lossy(&captured.stderr).into_owned();
    if captured.status.code() == Some(i32::from(VALIDATION_FAILURE_EXIT_CODE)) {
        let (errors, _) = ValidationErrors::parse_report(&stderr);
        if !errors.is_empty() {
            return Err(DiscoveryError::validation(errors));
        }
    }
    Err(DiscoveryError::BuildFailed {
        status: captured.status,
        stderr,
    })
}

/// Like [`discover`], rooted at the workspace containing `manifest_path`.
pub fn discover_in(
    manifest_path: &Utf8Path,
    registration_path: &str,
) -> Result<Manifest, DiscoveryError> {
    let mut config = DiscoveryConfig::new(registration_path);
    config.manifest_path = Some(manifest_path.to_path_buf());
    discover(&config)
}
