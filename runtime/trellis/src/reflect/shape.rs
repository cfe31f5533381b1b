use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
/// The description of a type.
pub struct TypeShape {
    /// The type name, as reported by [`std::any::type_name`].
    pub name: &'static str,
    pub kind: Kind,
    /// The doc comment attached to the type definition, if any.
    pub doc: Option<&'static str>,
}

impl TypeShape {
    pub fn new<T: ?Sized>(kind: Kind) -> Self {
        Self {
            name: std::any::type_name::<T>(),
            kind,
            doc: None,
        }
    }

    pub fn with_doc(mut self, doc: Option<&'static str>) -> Self {
        self.doc = doc;
        self
    }

    /// The element type of `Option<T>` and `Vec<T>`.
    pub fn element(&self) -> Option<&TypeShape> {
        match &self.kind {
            Kind::Option(inner) | Kind::List(inner) => Some(inner),
            _ => None,
        }
    }
}

impl Display for TypeShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Unit,
    Bool,
    /// A signed integer.
    Int,
    /// An unsigned integer.
    Uint,
    Float,
    String,
    Option(Box<TypeShape>),
    List(Box<TypeShape>),
    Map {
        key: Box<TypeShape>,
        value: Box<TypeShape>,
    },
    Tuple(Vec<TypeShape>),
    Struct(Vec<FieldShape>),
    Result {
        ok: Box<TypeShape>,
        err: Box<TypeShape>,
    },
    Function(Signature),
    /// `trellis::Context`.
    Context,
    /// `trellis::Error`.
    Error,
    /// A type whose structure can't be described.
    Opaque,
    /// A struct that is already being described further up: a back-edge in the type graph.
    Recursive,
}

impl Kind {
    /// The name used for this kind in the manifest.
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Unit => "unit",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Option(_) => "option",
            Kind::List(_) => "list",
            Kind::Map { .. } => "map",
            Kind::Tuple(_) => "tuple",
            Kind::Struct(_) => "struct",
            Kind::Result { .. } => "result",
            Kind::Function(_) => "function",
            Kind::Context => "context",
            Kind::Error => "error",
            Kind::Opaque => "opaque",
            Kind::Recursive => "recursive",
        }
    }

    /// Booleans, numbers and strings: values that can be parsed from a single string.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Kind::Bool | Kind::Int | Kind::Uint | Kind::Float | Kind::String
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The signature of a function.
pub struct Signature {
    pub inputs: Vec<TypeShape>,
    pub output: Box<TypeShape>,
    /// `true` for C-variadic functions (e.g. `unsafe extern "C" fn(A, ...)`).
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A named field of a struct.
pub struct FieldShape {
    pub name: &'static str,
    pub shape: TypeShape,
    /// Every binding annotation declared on the field, in declaration order.
    pub sources: Vec<BindingSource>,
    pub doc: Option<&'static str>,
}

impl FieldShape {
    pub fn new(
        name: &'static str,
        shape: TypeShape,
        sources: Vec<BindingSource>,
        doc: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            shape,
            sources,
            doc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Where a request field gets its value from.
pub enum BindingSource {
    /// A route variable, e.g. `{id}` in `/pets/{id}`.
    Path(String),
    /// A query parameter.
    Query(String),
    /// A request header.
    Header(String),
    /// A property of the JSON body.
    Body(String),
}

impl BindingSource {
    /// The annotation key, e.g. `path`.
    pub fn kind(&self) -> &'static str {
        match self {
            BindingSource::Path(_) => "path",
            BindingSource::Query(_) => "query",
            BindingSource::Header(_) => "header",
            BindingSource::Body(_) => "body",
        }
    }

    /// The external name, e.g. `id`.
    pub fn name(&self) -> &str {
        match self {
            BindingSource::Path(n)
            | BindingSource::Query(n)
            | BindingSource::Header(n)
            | BindingSource::Body(n) => n,
        }
    }
}

impl Display for BindingSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = \"{}\"", self.kind(), self.name())
    }
}
