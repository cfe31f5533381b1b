use std::collections::BTreeSet;

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use trellis_manifest::{Binding, Endpoint, Manifest, Method};

use super::CodegenError;
use super::idents::{ident, route_fn_name};
use super::paths::PathRewriter;

/// Generate `register_routes` and one function per endpoint.
///
/// Endpoints are emitted in sort-key order, never in registration order.
pub(super) fn generate(
    manifest: &Manifest,
    rewriter: &PathRewriter,
) -> Result<TokenStream, CodegenError> {
    let mut taken = BTreeSet::new();
    let mut registrations = Vec::new();
    let mut route_fns = Vec::new();
    for endpoint in manifest.sorted_endpoints() {
        let fn_name = unique_name(route_fn_name(endpoint.method.as_str(), &endpoint.path), &mut taken);
        let fn_ident = format_ident!("{}", fn_name);
        let method = method(endpoint.method);
        let path = &endpoint.path;
        registrations.push(quote! {
            dispatcher.register(#method, #path, #fn_ident);
        });
        route_fns.push(route_fn(endpoint, &fn_ident, rewriter)?);
    }
    Ok(quote! {
        /// Route every discovered endpoint through `dispatcher`.
        pub fn register_routes(dispatcher: &mut ::trellis::serve::Dispatcher) {
            #(#registrations)*
        }
        #(#route_fns)*
    })
}

/// Different routes can collapse to the same function name (e.g. `/pets/{id}` and
/// `/pets/id`): later ones get a numeric suffix.
fn unique_name(name: String, taken: &mut BTreeSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let mut i = 2;
    loop {
        let candidate = format!("{name}_{i}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        i += 1;
    }
}

fn method(method: Method) -> TokenStream {
    match method {
        Method::Delete => quote! { ::trellis::Method::Delete },
        Method::Get => quote! { ::trellis::Method::Get },
        Method::Post => quote! { ::trellis::Method::Post },
        Method::Put => quote! { ::trellis::Method::Put },
    }
}

fn route_fn(
    endpoint: &Endpoint,
    fn_ident: &proc_macro2::Ident,
    rewriter: &PathRewriter,
) -> Result<TokenStream, CodegenError> {
    let handler = rewriter.path(&endpoint.handler_path())?;
    let middlewares = endpoint
        .middlewares
        .iter()
        .map(|m| {
            let path = rewriter.path(&m.path())?;
            Ok(quote! { #path as ::trellis::serve::Middleware })
        })
        .collect::<Result<Vec<_>, CodegenError>>()?;

    let (input, call) = if endpoint.shape.has_request() {
        let input = request_input(endpoint, rewriter)?;
        (input, quote! { #handler(ctx, input)? })
    } else {
        (quote! {}, quote! { #handler(ctx)? })
    };
    let respond = if endpoint.shape.has_response() {
        quote! {
            let output = #call;
            ::trellis::serve::json_response(&output)
        }
    } else {
        quote! {
            #call;
            Ok(::trellis::serve::no_content())
        }
    };
    let doc = format!(" `{} {}`", endpoint.method, endpoint.path);
    Ok(quote! {
        #[doc = #doc]
        fn #fn_ident(
            ctx: ::trellis::Context,
            request: &::trellis::serve::Request,
        ) -> ::std::result::Result<::trellis::serve::Response, ::trellis::Error> {
            ::trellis::serve::run_chain(ctx, request, &[#(#middlewares),*], &|ctx| {
                #input
                #respond
            })
        }
    })
}

/// Build the request value: decode the JSON body, if any, then populate every bound field.
fn request_input(endpoint: &Endpoint, rewriter: &PathRewriter) -> Result<TokenStream, CodegenError> {
    let Some(req_type) = &endpoint.req_type else {
        return Err(CodegenError::new(format!(
            "`{} {}` takes a request value but its type is missing from the manifest",
            endpoint.method, endpoint.path
        )));
    };
    let req_type = rewriter.type_(req_type)?;
    let bindings = endpoint.bindings.clone().unwrap_or_default();

    let mut assignments = Vec::new();
    for binding in &bindings.path_bindings {
        assignments.push(assignment(binding, quote! { ::trellis::serve::path_param })?);
    }
    for binding in &bindings.query_bindings {
        let extract = if binding.multi {
            quote! { ::trellis::serve::query_params }
        } else if binding.optional {
            quote! { ::trellis::serve::optional_query_param }
        } else {
            quote! { ::trellis::serve::query_param }
        };
        assignments.push(assignment(binding, extract)?);
    }
    for binding in &bindings.header_bindings {
        let extract = if binding.optional {
            quote! { ::trellis::serve::optional_header }
        } else {
            quote! { ::trellis::serve::header }
        };
        assignments.push(assignment(binding, extract)?);
    }

    let init = if bindings.has_json_body {
        quote! { ::trellis::serve::json_body(request)? }
    } else {
        quote! { ::std::default::Default::default() }
    };
    Ok(if assignments.is_empty() {
        quote! { let input: #req_type = #init; }
    } else {
        quote! {
            let mut input: #req_type = #init;
            #(#assignments)*
        }
    })
}

fn assignment(binding: &Binding, extract: TokenStream) -> Result<TokenStream, CodegenError> {
    let field = ident(&binding.field_name)?;
    let name = &binding.tag_value;
    Ok(quote! { input.#field = #extract(request, #name)?; })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colliding_names_get_a_suffix() {
        let mut taken = BTreeSet::new();
        assert_eq!(unique_name("get_pets_id".into(), &mut taken), "get_pets_id");
        assert_eq!(unique_name("get_pets_id".into(), &mut taken), "get_pets_id_2");
        assert_eq!(unique_name("get_pets_id".into(), &mut taken), "get_pets_id_3");
    }
}
