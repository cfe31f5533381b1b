//! The schema of the manifest produced by endpoint discovery and consumed by `trellisc`'s
//! code generator.
//!
//! The manifest is a plain data snapshot: it is produced once per discovery run,
//! consumed once by the generator and never mutated in between.
//! Serialization is deterministic: every collection is either an ordered `Vec` whose
//! order is fixed by the producer, or a `BTreeMap`.
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub use endpoint::{Binding, Bindings, Endpoint, MiddlewareId, Shape, route_key, sort_endpoints};
pub use method::{Method, UnknownMethod};
pub use types::{TypeField, TypeNode};

mod endpoint;
mod method;
mod types;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Manifest {
    /// All discovered endpoints, in the order they were registered.
    pub endpoints: Vec<Endpoint>,
    /// All known middlewares, in registration order.
    #[serde(default)]
    pub middlewares: Vec<MiddlewareId>,
    /// The context keys provided by middlewares, sorted by name.
    #[serde(default)]
    pub context_keys: Vec<ContextKey>,
    /// Descriptive metadata attached to middlewares, keyed by their fully qualified path.
    #[serde(default)]
    pub middleware_metadata: BTreeMap<String, MiddlewareMetadata>,
    /// The type graph reachable from request and response types, sorted by id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeNode>,
    /// Human-readable documentation, keyed by `METHOD /path`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoint_docs: BTreeMap<String, EndpointDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
/// A typed value a middleware stores in the request context.
pub struct ContextKey {
    pub key: String,
    /// The type of the stored value, as reported by `std::any::type_name`.
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MiddlewareMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_headers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_cookies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_schemes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub may_return_statuses: Vec<u16>,
}

impl MiddlewareMetadata {
    /// `true` if no piece of metadata has been attached.
    pub fn is_empty(&self) -> bool {
        self.required_headers.is_empty()
            && self.required_cookies.is_empty()
            && self.security_schemes.is_empty()
            && self.may_return_statuses.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EndpointDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Manifest {
    /// Serialize the manifest as pretty-printed JSON, terminated by a newline.
    ///
    /// The output is byte-for-byte identical for equal manifests.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let mut encoded = serde_json::to_string_pretty(self)?;
        encoded.push('\n');
        Ok(encoded)
    }

    /// Deserialize a manifest previously produced by [`Manifest::encode`].
    pub fn decode(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    /// The endpoints, sorted by their sort key.
    pub fn sorted_endpoints(&self) -> Vec<&Endpoint> {
        let mut endpoints: Vec<&Endpoint> = self.endpoints.iter().collect();
        endpoints.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        endpoints
    }
}

impl Display for ContextKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "`{}` ({})", self.key, self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(method: Method, path: &str, name: &str) -> Endpoint {
        Endpoint {
            method,
            path: path.into(),
            handler_pkg: "petstore::pets".into(),
            handler_name: name.into(),
            shape: Shape::CtxErr,
            req_type: None,
            resp_type: None,
            middlewares: vec![],
            bindings: None,
        }
    }

    fn sample() -> Manifest {
        let mut get_pet = endpoint(Method::Get, "/pets/{id}", "get_pet");
        get_pet.shape = Shape::CtxReqRespErr;
        get_pet.req_type = Some("petstore::pets::GetPet".into());
        get_pet.resp_type = Some("petstore::pets::Pet".into());
        get_pet.middlewares = vec![MiddlewareId::new("petstore::mw", "auth")];
        get_pet.bindings = Some(Bindings {
            has_json_body: false,
            path_bindings: vec![Binding {
                field_name: "id".into(),
                tag_value: "id".into(),
                type_kind: "string".into(),
                optional: false,
                multi: false,
                elem_kind: None,
            }],
            query_bindings: vec![],
            header_bindings: vec![],
        });
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "petstore::mw::auth".to_string(),
            MiddlewareMetadata {
                required_headers: vec!["Authorization".into()],
                may_return_statuses: vec![401],
                ..Default::default()
            },
        );
        Manifest {
            endpoints: vec![endpoint(Method::Get, "/health", "health"), get_pet],
            middlewares: vec![MiddlewareId::new("petstore::mw", "auth")],
            context_keys: vec![ContextKey {
                key: "user".into(),
                type_name: "petstore::mw::User".into(),
            }],
            middleware_metadata: metadata,
            types: vec![],
            endpoint_docs: BTreeMap::new(),
        }
    }

    #[test]
    fn encoding_round_trips() {
        let manifest = sample();
        let encoded = manifest.encode().unwrap();
        let decoded = Manifest::decode(&encoded).unwrap();
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn encoding_is_byte_identical_across_calls() {
        let manifest = sample();
        assert_eq!(manifest.encode().unwrap(), manifest.encode().unwrap());
        assert_eq!(manifest.encode().unwrap(), manifest.clone().encode().unwrap());
    }

    #[test]
    fn absent_optional_fields_are_omitted() {
        let manifest = Manifest {
            endpoints: vec![endpoint(Method::Post, "/pets", "create_pet")],
            ..Default::default()
        };
        insta::assert_snapshot!(manifest.encode().unwrap().trim_end(), @r#"
        {
          "endpoints": [
            {
              "method": "POST",
              "path": "/pets",
              "handler_pkg": "petstore::pets",
              "handler_name": "create_pet",
              "shape": "ctx_err"
            }
          ],
          "middlewares": [],
          "context_keys": [],
          "middleware_metadata": {}
        }
        "#);
    }

    #[test]
    fn decoding_tolerates_missing_collections() {
        let manifest = Manifest::decode(r#"{"endpoints": []}"#).unwrap();
        assert_eq!(manifest, Manifest::default());
    }

    #[test]
    fn sorted_endpoints_ignore_registration_order() {
        let mut manifest = sample();
        let forward: Vec<_> = manifest
            .sorted_endpoints()
            .into_iter()
            .map(Endpoint::route_key)
            .collect();
        manifest.endpoints.reverse();
        let backward: Vec<_> = manifest
            .sorted_endpoints()
            .into_iter()
            .map(Endpoint::route_key)
            .collect();
        assert_eq!(forward, backward);
        assert_eq!(forward, vec!["GET /health", "GET /pets/{id}"]);
    }
}
