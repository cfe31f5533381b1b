//! Synthesize the throwaway driver crate that runs discovery in-process.
use anyhow::Context;
use camino::Utf8Path;
use quote::quote;
use toml::toml;

use super::package_graph::TargetPackage;
use super::{DiscoveryError, RegistrationPath};

/// The name of the synthesized driver package.
pub(super) const DRIVER_PACKAGE_NAME: &str = "trellis-discovery-driver";

/// A temporary crate whose binary prints the manifest of the target package.
///
/// The directory is removed when the sandbox is dropped.
pub(super) struct Sandbox {
    directory: tempfile::TempDir,
}

impl Sandbox {
    #[tracing::instrument(name = "Set up the discovery sandbox", skip_all)]
    pub(super) fn create(
        target: &TargetPackage,
        registration: &RegistrationPath,
        middleware: Option<&RegistrationPath>,
        workspace_root: &Utf8Path,
    ) -> Result<Self, DiscoveryError> {
        Self::create_(target, registration, middleware, workspace_root)
            .map_err(DiscoveryError::Sandbox)
    }

    fn create_(
        target: &TargetPackage,
        registration: &RegistrationPath,
        middleware: Option<&RegistrationPath>,
        workspace_root: &Utf8Path,
    ) -> Result<Self, anyhow::Error> {
        let directory = tempfile::Builder::new()
            .prefix("trellis-discovery-")
            .tempdir()
            .context("Failed to create a temporary directory for the discovery driver")?;
        let src = directory.path().join("src");
        fs_err::create_dir_all(&src)?;

        let patches = caller_patches(workspace_root)?;
        let cargo_toml = cargo_toml(target, patches);
        fs_err::write(
            directory.path().join("Cargo.toml"),
            toml::to_string(&cargo_toml)?,
        )?;
        fs_err::write(src.join("main.rs"), main_rs(registration, middleware)?)?;

        // Resolve the same versions the caller's workspace resolved.
        let lockfile = workspace_root.join("Cargo.lock");
        if lockfile.exists() {
            fs_err::copy(&lockfile, directory.path().join("Cargo.lock"))?;
        }
        tracing::debug!(path = %directory.path().display(), "Discovery sandbox is ready");
        Ok(Self { directory })
    }

    pub(super) fn manifest_path(&self) -> std::path::PathBuf {
        self.directory.path().join("Cargo.toml")
    }
}

fn main_rs(
    registration: &RegistrationPath,
    middleware: Option<&RegistrationPath>,
) -> Result<String, anyhow::Error> {
    let register = registration.function("register")?;
    let register_middleware = match middleware {
        Some(middleware) => {
            let path = middleware.function("register_middleware")?;
            quote! { ::std::option::Option::Some(#path as fn(&mut ::trellis::MiddlewareRegistry)) }
        }
        None => quote! { ::std::option::Option::None },
    };
    let code = quote! {
        fn main() -> ::std::process::ExitCode {
            ::trellis::discovery::run(#register, #register_middleware)
        }
    };
    let file: syn::File = syn::parse2(code).context("The discovery driver doesn't parse")?;
    Ok(prettyplease::unparse(&file))
}

fn cargo_toml(target: &TargetPackage, patches: Option<toml::Value>) -> toml::Table {
    let mut cargo_toml = toml! {
        [package]
        name = "dummy"
        version = "0.0.0"
        edition = "2024"
        publish = false
    };
    cargo_toml["package"]["name"] = DRIVER_PACKAGE_NAME.into();

    let mut target_dependency = toml::Table::new();
    target_dependency.insert("path".into(), target.directory.as_str().into());
    target_dependency.insert("package".into(), target.package_name.clone().into());
    let mut dependencies = toml::Table::new();
    dependencies.insert(target.crate_name.clone(), target_dependency.into());
    dependencies.insert("trellis".into(), target.runtime.to_toml().into());
    cargo_toml.insert("dependencies".into(), dependencies.into());

    // Keep the sandbox out of any enclosing workspace.
    cargo_toml.insert("workspace".into(), toml::Table::new().into());
    if let Some(patches) = patches {
        cargo_toml.insert("patch".into(), patches);
    }
    cargo_toml
}

/// The `[patch]` tables of the caller's workspace manifest, with relative paths made
/// absolute.
fn caller_patches(workspace_root: &Utf8Path) -> Result<Option<toml::Value>, anyhow::Error> {
    let manifest_path = workspace_root.join("Cargo.toml");
    let contents = fs_err::read_to_string(&manifest_path)?;
    let mut manifest: toml::Table = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse `{manifest_path}`"))?;
    let Some(mut patches) = manifest.remove("patch") else {
        return Ok(None);
    };
    absolutize_patches(&mut patches, workspace_root);
    Ok(Some(patches))
}

fn absolutize_patches(patches: &mut toml::Value, workspace_root: &Utf8Path) {
    let Some(sources) = patches.as_table_mut() else {
        return;
    };
    for (_, crates) in sources.iter_mut() {
        let Some(crates) = crates.as_table_mut() else {
            continue;
        };
        for (_, dependency) in crates.iter_mut() {
            let Some(dependency) = dependency.as_table_mut() else {
                continue;
            };
            let Some(path) = dependency.get("path").and_then(toml::Value::as_str) else {
                continue;
            };
            if Utf8Path::new(path).is_relative() {
                let absolute = workspace_root.join(path);
                dependency.insert("path".into(), absolute.as_str().into());
            }
        }
    }
}
