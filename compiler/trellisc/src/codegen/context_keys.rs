use std::collections::BTreeMap;

use heck::ToShoutySnakeCase;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use trellis_manifest::ContextKey;

use super::CodegenError;
use super::idents::{ident, snake_case};

/// Generate a typed token plus `with_*`, `*` and `must_*` accessors for every key.
///
/// Every item emitted for every key must have a distinct name: `foo` and `with_foo`,
/// for example, would both define `with_foo`.
pub(super) fn generate(
    keys: &[ContextKey],
    rewriter: &super::paths::PathRewriter,
) -> Result<TokenStream, CodegenError> {
    let mut sorted: Vec<&ContextKey> = keys.iter().collect();
    sorted.sort();

    let mut by_ident: BTreeMap<String, &ContextKey> = BTreeMap::new();
    // Item name -> the key it was generated for.
    let mut emitted: BTreeMap<String, &ContextKey> = BTreeMap::new();
    for key in sorted {
        let name = snake_case(&key.key);
        if name.is_empty() {
            return Err(CodegenError::new(format!(
                "the context key `{}` has no alphanumeric characters: no accessor can be named after it",
                key.key
            )));
        }
        if let Some(previous) = by_ident.insert(name.clone(), key) {
            return Err(CodegenError::new(format!(
                "the context keys `{}` and `{}` both map to `{name}`: rename one of them",
                previous.key, key.key
            )));
        }
        for item in item_names(&name) {
            if let Some(previous) = emitted.insert(item.clone(), key) {
                return Err(CodegenError::new(format!(
                    "the context keys `{}` and `{}` both generate an item called `{item}`: rename one of them",
                    previous.key, key.key
                )));
            }
        }
    }

    let mut items = Vec::with_capacity(by_ident.len());
    for (name, key) in by_ident {
        let ty = rewriter.type_(&key.type_name)?;
        let raw_key = &key.key;
        let getter = ident(&name)?;
        let token = format_ident!("{}", name.to_shouty_snake_case());
        let setter = format_ident!("with_{}", name);
        let must = format_ident!("must_{}", name);
        let token_doc = format!(" The `{raw_key}` context key.");
        items.push(quote! {
            #[doc = #token_doc]
            pub const #token: ::trellis::context::Key<#ty> = ::trellis::context::Key::new(#raw_key);

            pub fn #setter(ctx: &::trellis::Context, value: #ty) -> ::trellis::Context {
                #token.put(ctx, value)
            }

            pub fn #getter(ctx: &::trellis::Context) -> ::std::option::Option<&#ty> {
                #token.get(ctx)
            }

            #[track_caller]
            pub fn #must(ctx: &::trellis::Context) -> &#ty {
                #token.must_get(ctx)
            }
        });
    }
    Ok(quote! { #(#items)* })
}

/// The names of the items generated for a key whose snake case rendition is `name`.
fn item_names(name: &str) -> [String; 4] {
    [
        name.to_shouty_snake_case(),
        format!("with_{name}"),
        name.to_owned(),
        format!("must_{name}"),
    ]
}
