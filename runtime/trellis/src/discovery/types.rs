use std::collections::BTreeMap;

use trellis_manifest::{TypeField, TypeNode};

use crate::reflect::{Kind, TypeShape};

#[derive(Debug, Default)]
/// The graph of every type reachable from request and response types.
///
/// Nodes are keyed by type name, so each type is described once no matter how many
/// endpoints reference it.
pub(super) struct TypeGraph {
    nodes: BTreeMap<String, TypeNode>,
}

impl TypeGraph {
    /// Add `shape` and everything it references. Returns the id of its node.
    pub(super) fn add(&mut self, shape: &TypeShape) -> String {
        let id = shape.name.to_owned();
        if self.nodes.contains_key(&id) {
            return id;
        }
        let mut node = TypeNode {
            id: id.clone(),
            underlying_kind: shape.kind.name().to_owned(),
            nullable: false,
            fields: vec![],
            elem: None,
            key: None,
            value: None,
            doc: shape.doc.map(str::to_owned),
            warnings: vec![],
        };
        // Inserted before descending, so that cycles terminate.
        self.nodes.insert(id.clone(), node.clone());

        match &shape.kind {
            Kind::Option(inner) => {
                node.nullable = true;
                node.elem = Some(self.add(inner));
            }
            Kind::List(inner) => {
                node.elem = Some(self.add(inner));
            }
            Kind::Map { key, value } => {
                node.key = Some(self.add(key));
                node.value = Some(self.add(value));
                if !matches!(key.kind, Kind::String | Kind::Int | Kind::Uint) {
                    node.warnings.push(format!(
                        "map keys of type `{}` can't be represented as JSON object keys",
                        key.name
                    ));
                }
            }
            Kind::Struct(fields) => {
                node.fields = fields
                    .iter()
                    .map(|field| TypeField {
                        name: field.name.to_owned(),
                        type_id: self.add(&field.shape),
                        binding: field
                            .sources
                            .first()
                            .map(|source| format!("{}:{}", source.kind(), source.name())),
                        doc: field.doc.map(str::to_owned),
                    })
                    .collect();
            }
            Kind::Tuple(elements) => {
                node.fields = elements
                    .iter()
                    .enumerate()
                    .map(|(i, element)| TypeField {
                        name: i.to_string(),
                        type_id: self.add(element),
                        binding: None,
                        doc: None,
                    })
                    .collect();
            }
            Kind::Result { ok, err } => {
                node.fields = vec![
                    TypeField {
                        name: "ok".into(),
                        type_id: self.add(ok),
                        binding: None,
                        doc: None,
                    },
                    TypeField {
                        name: "err".into(),
                        type_id: self.add(err),
                        binding: None,
                        doc: None,
                    },
                ];
            }
            Kind::Opaque => {
                node.warnings.push(format!(
                    "`{id}` has no structural description: documentation will treat it as an arbitrary JSON value"
                ));
            }
            Kind::Function(_) => {
                node.warnings
                    .push("functions can't be serialized".to_owned());
            }
            Kind::Recursive
            | Kind::Unit
            | Kind::Bool
            | Kind::Int
            | Kind::Uint
            | Kind::Float
            | Kind::String
            | Kind::Context
            | Kind::Error => {}
        }
        self.nodes.insert(id.clone(), node);
        id
    }

    /// The nodes, sorted by id.
    pub(super) fn into_nodes(self) -> Vec<TypeNode> {
        self.nodes.into_values().collect()
    }
}
