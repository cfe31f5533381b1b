use proc_macro::TokenStream;

mod reflect;

/// Derive `trellis::reflect::Reflect` for a struct with named fields.
///
/// Each field can declare where its value comes from when the struct is used
/// as a request type:
///
/// ```rust,ignore
/// #[derive(trellis::Reflect)]
/// pub struct GetPet {
///     #[bind(path = "id")]
///     pub id: String,
///     #[bind(query = "expand")]
///     pub expand: Vec<String>,
///     #[bind(header = "X-Request-Id")]
///     pub request_id: Option<String>,
/// }
/// ```
///
/// `#[bind(body)]` (or `#[bind(body = "name")]`) marks a field as populated from the
/// JSON body. The body is decoded with serde, so an explicit name must match the key serde
/// reads the field from (`#[serde(rename = "..")]` or the container's `rename_all`):
/// a mismatch is a compile error.
/// Doc comments on the struct and on its fields are captured as well.
#[proc_macro_derive(Reflect, attributes(bind))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    reflect::derive_reflect(input)
}
