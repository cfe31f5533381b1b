//! Turn a [`Manifest`] into Rust source code.
//!
//! Two files are generated:
//!
//! - `routes.rs`, with a `register_routes` function that wires every endpoint into a
//!   `trellis::serve::Dispatcher`;
//! - `context_keys.rs`, with typed accessors for the context keys provided by
//!   middlewares. It is only generated when there is at least one key.
//!
//! Generation is referentially transparent: the same manifest always yields the same
//! bytes, regardless of the order endpoints were registered in.
use std::path::Path;

use quote::quote;
use trellis_manifest::Manifest;

use crate::persistence::SourceWriter;

mod context_keys;
mod dispatch;
mod idents;
mod paths;

pub const DISPATCH_FILENAME: &str = "routes.rs";
pub const CONTEXT_KEYS_FILENAME: &str = "context_keys.rs";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
#[error("{message}")]
#[diagnostic(code(generator))]
/// The manifest can't be turned into valid Rust code.
///
/// Code generation fails as a whole: no file is written.
pub struct CodegenError {
    message: String,
}

impl CodegenError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The generated sources, formatted.
pub struct GeneratedCode {
    pub dispatch: String,
    /// `None` if no middleware provides a context key.
    pub context_keys: Option<String>,
}

impl GeneratedCode {
    /// Write the generated files into `directory`.
    pub fn persist(
        &self,
        directory: &Path,
        writer: &mut SourceWriter,
    ) -> Result<(), anyhow::Error> {
        writer.persist_if_changed(
            &directory.join(DISPATCH_FILENAME),
            self.dispatch.as_bytes(),
        )?;
        if let Some(context_keys) = &self.context_keys {
            writer.persist_if_changed(
                &directory.join(CONTEXT_KEYS_FILENAME),
                context_keys.as_bytes(),
            )?;
        }
        Ok(())
    }
}

#[tracing::instrument(skip_all, fields(crate_name = package_name, n_endpoints = manifest.endpoints.len()))]
/// Generate the sources for the crate called `package_name`.
///
/// Paths into `package_name` are spelled `crate::...` in the generated code.
pub fn generate(manifest: &Manifest, package_name: &str) -> Result<GeneratedCode, CodegenError> {
    let rewriter = paths::PathRewriter::new(package_name);
    let dispatch = dispatch::generate(manifest, &rewriter)?;
    let context_keys = if manifest.context_keys.is_empty() {
        None
    } else {
        Some(context_keys::generate(&manifest.context_keys, &rewriter)?)
    };
    Ok(GeneratedCode {
        dispatch: render(dispatch)?,
        context_keys: context_keys.map(render).transpose()?,
    })
}

fn render(items: proc_macro2::TokenStream) -> Result<String, CodegenError> {
    let code = quote! {
        //! Generated by `trellisc`. Do not edit by hand.
        #items
    };
    let file: syn::File = syn::parse2(code)
        .map_err(|e| CodegenError::new(format!("the generated code doesn't parse: {e}")))?;
    Ok(prettyplease::unparse(&file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_empty_manifest_yields_an_empty_router() {
        let code = generate(&Manifest::default(), "petstore").unwrap();
        assert_eq!(code.context_keys, None);
        insta::assert_snapshot!(code.dispatch, @r"
        //! Generated by `trellisc`. Do not edit by hand.
        /// Route every discovered endpoint through `dispatcher`.
        pub fn register_routes(dispatcher: &mut ::trellis::serve::Dispatcher) {}
        ");
    }
}
