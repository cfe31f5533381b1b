use std::fmt::Display;
use std::process::ExitStatus;

use trellis::analysis::{ErrorCode, ValidationError, ValidationErrors};

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
/// Discovery couldn't produce a manifest.
///
/// Every variant is terminal: discovery is never retried and never returns a partial
/// manifest.
pub enum DiscoveryError {
    #[error("`{path}` is not a valid registration path: {reason}")]
    #[diagnostic(
        code(trellisc::invalid_registration_path),
        help("Registration paths look like `my_crate::api`: a crate name followed by a module path.")
    )]
    InvalidRegistrationPath { path: String, reason: String },
    #[error("failed to collect the package graph for the current workspace")]
    #[diagnostic(code(trellisc::metadata))]
    Metadata(#[source] guppy::Error),
    #[error("there is no library crate named `{crate_name}` in the current workspace")]
    #[diagnostic(code(trellisc::package_not_found))]
    PackageNotFound { crate_name: String },
    #[error("`{package}` doesn't depend on `trellis`")]
    #[diagnostic(
        code(trellisc::runtime_not_found),
        help("Add `trellis` to the dependencies of `{package}`.")
    )]
    RuntimeNotFound { package: String },
    #[error("`trellis` is pulled from a source that can't be replicated in the discovery sandbox: {source_}")]
    #[diagnostic(code(trellisc::unsupported_source))]
    UnsupportedSource { source_: String },
    #[error("failed to set up the discovery sandbox")]
    #[diagnostic(code(trellisc::sandbox))]
    Sandbox(#[source] anyhow::Error),
    #[error("failed to spawn `cargo`")]
    #[diagnostic(code(trellisc::spawn))]
    Spawn(#[source] std::io::Error),
    #[error("the discovery driver wrote more than {limit} bytes on {stream}")]
    #[diagnostic(code(trellisc::output_too_large))]
    OutputTooLarge { stream: &'static str, limit: usize },
    #[error("discovery failed: {status}\n{stderr}")]
    #[diagnostic(code(trellisc::build_failed))]
    BuildFailed { status: ExitStatus, stderr: String },
    #[error("discovery found {} validation error(s)", .errors.len())]
    #[diagnostic(code(trellisc::validation))]
    Validation {
        errors: ValidationErrors,
        #[related]
        diagnostics: Vec<ValidationDiagnostic>,
    },
    #[error("the discovery driver emitted an invalid manifest")]
    #[diagnostic(code(trellisc::invalid_manifest))]
    InvalidManifest(#[source] serde_json::Error),
}

impl DiscoveryError {
    pub(crate) fn validation(errors: ValidationErrors) -> Self {
        let diagnostics = errors.iter().map(ValidationDiagnostic::from).collect();
        DiscoveryError::Validation {
            errors,
            diagnostics,
        }
    }

    /// The validation errors, if discovery failed because of them.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            DiscoveryError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
/// A single validation error, reported with its code as diagnostic code.
pub struct ValidationDiagnostic {
    code: ErrorCode,
    message: String,
}

impl From<&ValidationError> for ValidationDiagnostic {
    fn from(error: &ValidationError) -> Self {
        Self {
            code: error.code(),
            message: error.message().to_owned(),
        }
    }
}

impl miette::Diagnostic for ValidationDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(self.code.as_str()))
    }
}
