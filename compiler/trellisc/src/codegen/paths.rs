//! Rewrite the paths reported by discovery so that they resolve from the generated crate.
use syn::visit_mut::VisitMut;

use super::CodegenError;

/// Rewrites the paths of types and functions recorded in the manifest.
///
/// - Paths into the generated crate's own package start with `crate::`.
/// - `alloc::` becomes `::std::`: `alloc` is not in scope for most crates.
/// - Every other multi-segment path is made absolute.
///
/// Single-segment paths (`u32`, `bool`) are left untouched.
pub(super) struct PathRewriter {
    crate_name: String,
}

impl PathRewriter {
    pub(super) fn new(package_name: &str) -> Self {
        Self {
            crate_name: package_name.replace('-', "_"),
        }
    }

    /// Parse a type name, as reported by `std::any::type_name`, and rewrite its paths.
    pub(super) fn type_(&self, type_name: &str) -> Result<syn::Type, CodegenError> {
        let mut ty: syn::Type = syn::parse_str(type_name).map_err(|e| {
            CodegenError::new(format!(
                "`{type_name}` can't be spelled out in generated code: {e}"
            ))
        })?;
        self.visitor().visit_type_mut(&mut ty);
        Ok(ty)
    }

    /// Parse the path to a function and rewrite it.
    pub(super) fn path(&self, path: &str) -> Result<syn::Path, CodegenError> {
        let mut parsed: syn::Path = syn::parse_str(path).map_err(|e| {
            CodegenError::new(format!("`{path}` is not a valid path: {e}"))
        })?;
        self.visitor().visit_path_mut(&mut parsed);
        Ok(parsed)
    }

    fn visitor(&self) -> Visitor<'_> {
        Visitor {
            crate_name: &self.crate_name,
        }
    }
}

struct Visitor<'a> {
    crate_name: &'a str,
}

impl VisitMut for Visitor<'_> {
    fn visit_path_mut(&mut self, path: &mut syn::Path) {
        if path.leading_colon.is_none() && path.segments.len() > 1 {
            let first = &mut path.segments[0];
            if first.ident == self.crate_name {
                first.ident = syn::Ident::new("crate", first.ident.span());
            } else {
                if first.ident == "alloc" {
                    first.ident = syn::Ident::new("std", first.ident.span());
                }
                path.leading_colon = Some(Default::default());
            }
        }
        // Generic arguments are visited too.
        syn::visit_mut::visit_path_mut(self, path);
    }
}
