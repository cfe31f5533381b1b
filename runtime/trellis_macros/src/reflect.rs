use darling::{FromDeriveInput, FromField, FromMeta, util::Ignored, util::Override};
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::spanned::Spanned;
use syn::{DeriveInput, Ident, Type, ext::IdentExt, parse_macro_input};

#[derive(FromDeriveInput)]
#[darling(supports(struct_named), forward_attrs(doc, serde))]
struct ReflectInput {
    data: darling::ast::Data<Ignored, ParsedField>,
    generics: syn::Generics,
    ident: Ident,
    attrs: Vec<syn::Attribute>,
}

#[derive(Debug)]
struct ParsedField {
    ident: Ident,
    ty: Type,
    sources: Vec<Source>,
    doc: Option<String>,
    /// `#[serde(rename = "..")]`, if any.
    serde_rename: Option<String>,
}

#[derive(Debug)]
enum Source {
    Path(String),
    Query(String),
    Header(String),
    /// `None` for a bare `#[bind(body)]`.
    Body { name: Option<String>, span: Span },
}

// Nested meta for `#[bind(path = "...", query = "...", header = "...", body = "...")]`
#[derive(Default, Debug, FromMeta)]
#[darling(default)]
struct BindAttr {
    path: Option<String>,
    query: Option<String>,
    header: Option<String>,
    body: Option<Override<String>>,
}

impl FromField for ParsedField {
    fn from_field(field: &syn::Field) -> darling::Result<Self> {
        let Some(ident) = field.ident.clone() else {
            return Err(darling::Error::unsupported_shape("tuple field"));
        };
        let mut sources = Vec::new();
        for attr in &field.attrs {
            if !attr.path().is_ident("bind") {
                continue;
            }
            let bind = BindAttr::from_meta(&attr.meta)?;
            // Every declared source is recorded, even when there is more than one:
            // conflicting declarations are reported when the binding plan is analyzed.
            if let Some(name) = bind.path {
                sources.push(Source::Path(name));
            }
            if let Some(name) = bind.query {
                sources.push(Source::Query(name));
            }
            if let Some(name) = bind.header {
                sources.push(Source::Header(name));
            }
            if let Some(name) = bind.body {
                sources.push(Source::Body {
                    name: name.explicit(),
                    span: attr.span(),
                });
            }
        }
        Ok(Self {
            ident,
            ty: field.ty.clone(),
            sources,
            doc: doc_comment(&field.attrs),
            serde_rename: serde_attribute(&field.attrs, "rename")?,
        })
    }
}

/// Collect `///` comments into a single string, one line per attribute.
fn doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(syn::MetaNameValue {
                value:
                    syn::Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(s),
                        ..
                    }),
                ..
            }) => Some(s.value()),
            _ => None,
        })
        .map(|line| line.strip_prefix(' ').unwrap_or(&line).trim_end().to_owned())
        .collect();
    let doc = lines.join("\n").trim().to_owned();
    if doc.is_empty() { None } else { Some(doc) }
}

/// The value of `#[serde(<key> = "..")]` or `#[serde(<key>(deserialize = ".."))]`.
fn serde_attribute(attrs: &[syn::Attribute], key: &str) -> syn::Result<Option<String>> {
    let mut value = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if !meta.path.is_ident(key) {
                // Skip `default`, `with = ".."`, `bound(..)` and friends.
                if meta.input.peek(syn::Token![=]) {
                    meta.value()?.parse::<syn::Expr>()?;
                } else if meta.input.peek(syn::token::Paren) {
                    meta.input.parse::<proc_macro2::TokenTree>()?;
                }
                return Ok(());
            }
            if meta.input.peek(syn::Token![=]) {
                value = Some(meta.value()?.parse::<syn::LitStr>()?.value());
                return Ok(());
            }
            meta.parse_nested_meta(|inner| {
                let name = inner.value()?.parse::<syn::LitStr>()?.value();
                if inner.path.is_ident("deserialize") {
                    value = Some(name);
                }
                Ok(())
            })
        })?;
    }
    Ok(value)
}

/// The JSON key serde deserializes a field from, following serde's own renaming rules.
fn serde_key(field_name: &str, rename: Option<&str>, rename_all: Option<&str>) -> String {
    if let Some(rename) = rename {
        return rename.to_owned();
    }
    match rename_all {
        Some("UPPERCASE" | "SCREAMING_SNAKE_CASE") => field_name.to_ascii_uppercase(),
        Some("PascalCase") => {
            let mut key = String::with_capacity(field_name.len());
            let mut capitalize = true;
            for c in field_name.chars() {
                if c == '_' {
                    capitalize = true;
                } else if capitalize {
                    key.push(c.to_ascii_uppercase());
                    capitalize = false;
                } else {
                    key.push(c);
                }
            }
            key
        }
        Some("camelCase") => {
            let pascal = serde_key(field_name, None, Some("PascalCase"));
            let mut chars = pascal.chars();
            chars
                .next()
                .map(|first| first.to_ascii_lowercase().to_string() + chars.as_str())
                .unwrap_or_default()
        }
        Some("kebab-case") => field_name.replace('_', "-"),
        Some("SCREAMING-KEBAB-CASE") => field_name.to_ascii_uppercase().replace('_', "-"),
        // `lowercase`, `snake_case` and unknown rules (which serde rejects) leave it as is.
        _ => field_name.to_owned(),
    }
}

fn option_tokens(value: Option<&str>) -> proc_macro2::TokenStream {
    match value {
        Some(v) => quote! { ::core::option::Option::Some(#v) },
        None => quote! { ::core::option::Option::None },
    }
}

fn body_key(field: &ParsedField, rename_all: Option<&str>) -> String {
    serde_key(
        &field.ident.unraw().to_string(),
        field.serde_rename.as_deref(),
        rename_all,
    )
}

pub fn derive_reflect(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let input = match ReflectInput::from_derive_input(&input) {
        Ok(input) => input,
        Err(e) => return e.write_errors().into(),
    };
    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            &input.generics,
            "`Reflect` can't be derived for generic types.\n\
             Implement `trellis::reflect::Reflect` manually for each concrete instantiation instead.",
        )
        .to_compile_error()
        .into();
    }
    let darling::ast::Data::Struct(fields) = input.data else {
        unreachable!("darling only accepts structs with named fields")
    };

    let rename_all = match serde_attribute(&input.attrs, "rename_all") {
        Ok(rename_all) => rename_all,
        Err(e) => return e.to_compile_error().into(),
    };
    let mut errors = Vec::new();
    for field in &fields.fields {
        let key = body_key(field, rename_all.as_deref());
        for source in &field.sources {
            if let Source::Body {
                name: Some(name),
                span,
            } = source
                && *name != key
            {
                errors.push(syn::Error::new(
                    *span,
                    format!(
                        "`{name}` doesn't match the JSON key `{key}` this field is deserialized from.\n\
                         Add `#[serde(rename = \"{name}\")]` to the field, or use `#[bind(body)]`."
                    ),
                ));
            }
        }
    }
    if let Some(error) = errors.into_iter().reduce(|mut all, e| {
        all.combine(e);
        all
    }) {
        return error.to_compile_error().into();
    }

    let ident = &input.ident;
    let struct_doc = option_tokens(doc_comment(&input.attrs).as_deref());
    let fields = fields.fields.iter().map(|field| {
        let name = field.ident.unraw().to_string();
        let ty = &field.ty;
        let doc = option_tokens(field.doc.as_deref());
        let sources = field.sources.iter().map(|source| match source {
            Source::Path(n) => quote! { ::trellis::reflect::BindingSource::Path(#n.into()) },
            Source::Query(n) => quote! { ::trellis::reflect::BindingSource::Query(#n.into()) },
            Source::Header(n) => quote! { ::trellis::reflect::BindingSource::Header(#n.into()) },
            Source::Body { .. } => {
                let key = body_key(field, rename_all.as_deref());
                quote! { ::trellis::reflect::BindingSource::Body(#key.into()) }
            }
        });
        quote! {
            ::trellis::reflect::FieldShape::new(
                #name,
                <#ty as ::trellis::reflect::Reflect>::shape(),
                ::std::vec![#(#sources),*],
                #doc,
            )
        }
    });

    quote! {
        impl ::trellis::reflect::Reflect for #ident {
            fn shape() -> ::trellis::reflect::TypeShape {
                ::trellis::reflect::describe_struct::<Self>(#struct_doc, || {
                    ::std::vec![#(#fields),*]
                })
            }
        }
    }
    .into()
}
