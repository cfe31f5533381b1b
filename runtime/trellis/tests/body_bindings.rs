//! Body-bound fields are decoded by serde under the key recorded in their binding.
use trellis::Reflect;
use trellis::reflect::{BindingSource, Kind};
use trellis::serve::{Request, json_body};

#[derive(Debug, Reflect, serde::Deserialize)]
pub struct TagPet {
    #[bind(body)]
    pub name: String,
    #[bind(body = "tags")]
    #[serde(rename = "tags")]
    pub labels: Vec<String>,
}

#[derive(Debug, Reflect, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenamePet {
    #[bind(body)]
    pub new_name: String,
    #[bind(body = "ownerId")]
    pub owner_id: u64,
}

fn body_keys<T: Reflect>() -> Vec<String> {
    let Kind::Struct(fields) = T::shape().kind else {
        panic!("not a struct")
    };
    fields
        .into_iter()
        .flat_map(|f| f.sources)
        .map(|source| match source {
            BindingSource::Body(key) => key,
            other => panic!("unexpected source {other}"),
        })
        .collect()
}

#[test]
fn renamed_fields_are_decoded_from_their_bound_key() {
    let request = Request::new(trellis::POST, "/pets").body(r#"{"name": "Rex", "tags": ["a", "b"]}"#);
    let pet: TagPet = json_body(&request).unwrap();
    assert_eq!(pet.name, "Rex");
    assert_eq!(pet.labels, vec!["a", "b"]);
    assert_eq!(body_keys::<TagPet>(), vec!["name", "tags"]);
}

#[test]
fn container_renames_apply_to_bare_body_bindings() {
    let request =
        Request::new(trellis::POST, "/pets").body(r#"{"newName": "Rex", "ownerId": 3}"#);
    let pet: RenamePet = json_body(&request).unwrap();
    assert_eq!((pet.new_name.as_str(), pet.owner_id), ("Rex", 3));
    assert_eq!(body_keys::<RenamePet>(), vec!["newName", "ownerId"]);
}
