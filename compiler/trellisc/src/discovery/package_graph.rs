//! Locate the target package and the `trellis` version it resolved in the caller's workspace.
use camino::{Utf8Path, Utf8PathBuf};
use guppy::graph::{
    BuildTargetId, DependencyDirection, ExternalSource, GitReq, PackageGraph, PackageMetadata,
    PackageSource,
};

use super::DiscoveryError;

pub(super) fn compute_package_graph(
    manifest_path: Option<&Utf8Path>,
    cargo: &Utf8Path,
) -> Result<PackageGraph, DiscoveryError> {
    let mut command = guppy::MetadataCommand::new();
    command.cargo_path(cargo.to_path_buf());
    if let Some(manifest_path) = manifest_path {
        command.manifest_path(manifest_path.to_path_buf());
    }
    let metadata = tracing::info_span!("Invoke 'cargo metadata'")
        .in_scope(|| command.exec())
        .map_err(DiscoveryError::Metadata)?;
    tracing::info_span!("Build package graph")
        .in_scope(|| metadata.build_graph())
        .map_err(DiscoveryError::Metadata)
}

/// What the sandbox needs to know about the package exposing the registration functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct TargetPackage {
    pub(super) package_name: String,
    /// The name `use` statements refer to the library by.
    pub(super) crate_name: String,
    pub(super) directory: Utf8PathBuf,
    pub(super) runtime: RuntimeDependency,
}

/// How the sandbox should depend on `trellis`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum RuntimeDependency {
    Path(Utf8PathBuf),
    Registry {
        version: String,
        /// `None` for crates.io.
        registry: Option<String>,
    },
    Git {
        repository: String,
        req: Option<(&'static str, String)>,
    },
}

impl RuntimeDependency {
    pub(super) fn to_toml(&self) -> toml::Table {
        let mut table = toml::Table::new();
        match self {
            RuntimeDependency::Path(path) => {
                table.insert("path".into(), path.as_str().into());
            }
            RuntimeDependency::Registry { version, registry } => {
                table.insert("version".into(), format!("={version}").into());
                if let Some(registry) = registry {
                    table.insert("registry-index".into(), registry.clone().into());
                }
            }
            RuntimeDependency::Git { repository, req } => {
                table.insert("git".into(), repository.clone().into());
                if let Some((kind, value)) = req {
                    table.insert((*kind).into(), value.clone().into());
                }
            }
        }
        table
    }
}

/// Find the workspace member whose library is called `crate_name`.
pub(super) fn find_target(
    graph: &PackageGraph,
    crate_name: &str,
) -> Result<TargetPackage, DiscoveryError> {
    let package = graph
        .workspace()
        .iter()
        .find(|p| library_name(p).as_deref() == Some(crate_name))
        .ok_or_else(|| DiscoveryError::PackageNotFound {
            crate_name: crate_name.to_owned(),
        })?;
    let directory = package
        .manifest_path()
        .parent()
        .map(Utf8Path::to_path_buf)
        .unwrap_or_else(|| graph.workspace().root().to_path_buf());
    let runtime = runtime_dependency(graph, &package)?;
    Ok(TargetPackage {
        package_name: package.name().to_owned(),
        crate_name: crate_name.to_owned(),
        directory,
        runtime,
    })
}

fn library_name(package: &PackageMetadata<'_>) -> Option<String> {
    package
        .build_target(&BuildTargetId::Library)
        .map(|target| target.name().replace('-', "_"))
}

fn runtime_dependency(
    graph: &PackageGraph,
    package: &PackageMetadata<'_>,
) -> Result<RuntimeDependency, DiscoveryError> {
    let runtime_not_found = || DiscoveryError::RuntimeNotFound {
        package: package.name().to_owned(),
    };
    let dependencies = graph
        .query_forward([package.id()])
        .map_err(|_| runtime_not_found())?
        .resolve();
    let runtime = dependencies
        .packages(DependencyDirection::Forward)
        .find(|p| p.name() == "trellis")
        .ok_or_else(runtime_not_found)?;

    let source = runtime.source();
    match source {
        PackageSource::Workspace(p) | PackageSource::Path(p) => {
            let path = if p.is_relative() {
                graph.workspace().root().join(p)
            } else {
                p.to_owned()
            };
            Ok(RuntimeDependency::Path(path))
        }
        PackageSource::External(_) => {
            let unsupported = || DiscoveryError::UnsupportedSource {
                source_: source.to_string(),
            };
            match source.parse_external().ok_or_else(unsupported)? {
                ExternalSource::Registry(registry) => Ok(RuntimeDependency::Registry {
                    version: runtime.version().to_string(),
                    registry: (registry != ExternalSource::CRATES_IO_URL)
                        .then(|| registry.to_owned()),
                }),
                ExternalSource::Git {
                    repository, req, ..
                } => {
                    let req = match req {
                        GitReq::Branch(branch) => Some(("branch", branch.to_owned())),
                        GitReq::Tag(tag) => Some(("tag", tag.to_owned())),
                        GitReq::Rev(rev) => Some(("rev", rev.to_owned())),
                        GitReq::Default => None,
                        _ => return Err(unsupported()),
                    };
                    Ok(RuntimeDependency::Git {
                        repository: repository.to_owned(),
                        req,
                    })
                }
                _ => Err(unsupported()),
            }
        }
    }
}
