#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
/// A node of the type graph reachable from request and response types.
///
/// Nodes reference each other by `id`, the type name reported by `std::any::type_name`.
pub struct TypeNode {
    pub id: String,
    /// The kind of the type (e.g. `struct`, `list`, `string`).
    pub underlying_kind: String,
    /// `true` for `Option<T>`.
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<TypeField>,
    /// The element type of lists and options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elem: Option<String>,
    /// The key type of maps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// The value type of maps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Problems a documentation renderer should be aware of (e.g. opaque types).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TypeField {
    pub name: String,
    /// The `id` of the field's type node.
    #[serde(rename = "type")]
    pub type_id: String,
    /// Where the field is populated from (e.g. `path:id`), if bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}
