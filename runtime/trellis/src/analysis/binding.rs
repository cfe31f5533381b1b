use trellis_manifest::{Binding, Bindings};

use super::{ErrorCode, RoutePath, ValidationError};
use crate::reflect::{BindingSource, Kind, TypeShape};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// How each field of a request type is populated.
pub struct BindingInfo {
    /// At least one field is populated from the JSON body.
    pub has_body: bool,
    pub path: Vec<FieldBinding>,
    pub query: Vec<FieldBinding>,
    pub header: Vec<FieldBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub field_name: &'static str,
    /// The path variable, query parameter or header name.
    pub name: String,
    pub shape: TypeShape,
    /// `Option<T>`: the value may be absent.
    pub optional: bool,
    /// `Vec<T>`: every occurrence is collected.
    pub multi: bool,
}

impl FieldBinding {
    fn new(field_name: &'static str, name: &str, shape: &TypeShape) -> Self {
        Self {
            field_name,
            name: name.to_owned(),
            optional: matches!(shape.kind, Kind::Option(_)),
            multi: matches!(shape.kind, Kind::List(_)),
            shape: shape.clone(),
        }
    }
}

/// Check that a request type can be populated from requests matching `path`.
///
/// Every path variable must be bound to exactly one field, every field declares at most
/// one binding source, and every bound field has a type that can be parsed from the
/// corresponding part of the request.
/// `request` is `None` for handlers that don't take a request value.
pub fn analyze_bindings(
    path: &RoutePath,
    request: Option<&TypeShape>,
) -> Result<BindingInfo, ValidationError> {
    let Some(request) = request else {
        if let Some(variable) = path.variables().next() {
            return Err(ValidationError::new(
                ErrorCode::MissingPathBinding,
                format!(
                    "`{path}` has a `{variable}` variable, but the handler doesn't take a request value to bind it to"
                ),
            ));
        }
        return Ok(BindingInfo::default());
    };
    let Kind::Struct(fields) = &request.kind else {
        return Err(ValidationError::new(
            ErrorCode::UnsupportedRequestType,
            format!(
                "`{}` is a {}: request types must be structs with named fields",
                request.name,
                request.kind.name()
            ),
        ));
    };

    let mut info = BindingInfo::default();
    for field in fields {
        let source = match field.sources.as_slice() {
            [] => continue,
            [source] => source,
            sources => {
                let declared = sources
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(ValidationError::new(
                    ErrorCode::DuplicateBinding,
                    format!(
                        "`{}::{}` declares more than one binding source ({declared}): a field can only be populated from one place",
                        request.name, field.name
                    ),
                ));
            }
        };
        let field_path = format!("{}::{}", request.name, field.name);
        if source.name().is_empty() {
            return Err(ValidationError::new(
                ErrorCode::EmptyBindingName,
                format!(
                    "`{field_path}` is bound to an empty {} name",
                    source.kind()
                ),
            ));
        }
        let shape = &field.shape;
        match source {
            BindingSource::Path(variable) => {
                if !path.has_variable(variable) {
                    return Err(ValidationError::new(
                        ErrorCode::UnknownPathVariable,
                        format!(
                            "`{field_path}` is bound to the `{variable}` path variable, but `{path}` doesn't declare it"
                        ),
                    ));
                }
                let supported = if path.is_wildcard(variable) {
                    shape.kind == Kind::String
                } else {
                    matches!(shape.kind, Kind::String | Kind::Int | Kind::Uint)
                };
                if !supported {
                    return Err(ValidationError::new(
                        ErrorCode::UnsupportedPathType,
                        format!(
                            "`{field_path}` is a `{}`: path variables can only be bound to strings or integers, and wildcards to strings",
                            shape.name
                        ),
                    ));
                }
                if let Some(other) = info.path.iter().find(|b| b.name == *variable) {
                    return Err(ValidationError::new(
                        ErrorCode::DuplicatePathBinding,
                        format!(
                            "the `{variable}` path variable is bound to both `{}` and `{}`",
                            other.field_name, field.name
                        ),
                    ));
                }
                info.path.push(FieldBinding::new(field.name, variable, shape));
            }
            BindingSource::Query(name) => {
                if !is_scalar_or_wrapped(shape, true) {
                    return Err(ValidationError::new(
                        ErrorCode::UnsupportedQueryType,
                        format!(
                            "`{field_path}` is a `{}`: query parameters can only be bound to scalars, `Option`s of scalars or `Vec`s of scalars",
                            shape.name
                        ),
                    ));
                }
                info.query.push(FieldBinding::new(field.name, name, shape));
            }
            BindingSource::Header(name) => {
                if !is_scalar_or_wrapped(shape, false) {
                    return Err(ValidationError::new(
                        ErrorCode::UnsupportedHeaderType,
                        format!(
                            "`{field_path}` is a `{}`: headers can only be bound to scalars or `Option`s of scalars",
                            shape.name
                        ),
                    ));
                }
                info.header.push(FieldBinding::new(field.name, name, shape));
            }
            BindingSource::Body(_) => info.has_body = true,
        }
    }

    if let Some(variable) = path
        .variables()
        .find(|v| !info.path.iter().any(|b| b.name == *v))
    {
        return Err(ValidationError::new(
            ErrorCode::MissingPathBinding,
            format!(
                "no field of `{}` is bound to the `{variable}` path variable of `{path}`",
                request.name
            ),
        ));
    }
    Ok(info)
}

fn is_scalar_or_wrapped(shape: &TypeShape, allow_multi: bool) -> bool {
    match &shape.kind {
        kind if kind.is_scalar() => true,
        Kind::Option(inner) => inner.kind.is_scalar(),
        Kind::List(inner) => allow_multi && inner.kind.is_scalar(),
        _ => false,
    }
}

impl From<&FieldBinding> for Binding {
    fn from(b: &FieldBinding) -> Self {
        Binding {
            field_name: b.field_name.to_owned(),
            tag_value: b.name.clone(),
            type_kind: b.shape.kind.name().to_owned(),
            optional: b.optional,
            multi: b.multi,
            elem_kind: b.shape.element().map(|e| e.kind.name().to_owned()),
        }
    }
}

impl From<&BindingInfo> for Bindings {
    fn from(info: &BindingInfo) -> Self {
        Bindings {
            has_json_body: info.has_body,
            path_bindings: info.path.iter().map(Into::into).collect(),
            query_bindings: info.query.iter().map(Into::into).collect(),
            header_bindings: info.header.iter().map(Into::into).collect(),
        }
    }
}
