//! Settings layered from `trellis.toml` and `TRELLIS_*` environment variables.
//!
//! Command-line flags take precedence over both.
use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Toml};

pub const CONFIG_FILENAME: &str = "trellis.toml";
const ENV_PREFIX: &str = "TRELLIS_";

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoverySettings,
    pub codegen: CodegenSettings,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// The module exposing `register`, e.g. `petstore::api`.
    pub package: Option<String>,
    /// The module exposing `register_middleware`.
    pub middleware: Option<String>,
    pub manifest_path: Option<String>,
    pub offline: bool,
    pub target_dir: Option<String>,
    pub max_output_bytes: Option<usize>,
    pub cargo: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct CodegenSettings {
    pub crate_name: Option<String>,
    pub output: Option<PathBuf>,
}

impl Config {
    /// Load `trellis.toml` from `directory`, if it exists, then apply environment overrides.
    pub fn load(directory: &Path) -> Result<Self, anyhow::Error> {
        let path = directory.join(CONFIG_FILENAME);
        let span = tracing::info_span!(
            "Loading configuration",
            configuration.path = %path.display(),
        );
        let _guard = span.enter();
        let env_source = Env::prefixed(ENV_PREFIX)
            .split("__")
            // Global flags read these directly.
            .ignore(&["color", "log", "log_filter"]);
        Figment::new()
            .merge(Toml::file(path))
            .merge(env_source)
            .extract()
            .context("Failed to load the configuration for `trellisc`")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_missing_file_yields_the_defaults() {
        figment::Jail::expect_with(|jail| {
            let config = Config::load(jail.directory()).unwrap();
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn environment_variables_override_the_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILENAME,
                r#"
                [discovery]
                package = "petstore::api"
                offline = false

                [codegen]
                crate_name = "petstore"
                output = "src/generated"
                "#,
            )?;
            jail.set_env("TRELLIS_DISCOVERY__OFFLINE", "true");
            jail.set_env("TRELLIS_CODEGEN__CRATE_NAME", "pet_store");
            jail.set_env("TRELLIS_LOG", "true");

            let config = Config::load(jail.directory()).unwrap();
            assert_eq!(config.discovery.package.as_deref(), Some("petstore::api"));
            assert!(config.discovery.offline);
            assert_eq!(config.codegen.crate_name.as_deref(), Some("pet_store"));
            assert_eq!(config.codegen.output, Some(PathBuf::from("src/generated")));
            Ok(())
        });
    }
}
