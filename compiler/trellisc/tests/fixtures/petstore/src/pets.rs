use serde::{Deserialize, Serialize};
use trellis::{Context, Error, Reflect};

#[derive(Debug, Clone, Serialize, Reflect)]
/// A pet available in the store.
pub struct Pet {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Reflect)]
pub struct ListPets {
    #[bind(query = "tag")]
    pub tags: Vec<String>,
    #[bind(query = "limit")]
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Reflect)]
pub struct GetPet {
    #[bind(path = "id")]
    pub id: String,
    #[bind(header = "X-Request-Id")]
    pub request_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, Reflect)]
pub struct CreatePet {
    #[bind(body = "name")]
    pub name: String,
    #[bind(body = "tags")]
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Reflect)]
pub struct DeletePet {
    #[bind(path = "id")]
    pub id: String,
}

#[derive(Debug, Serialize, Reflect)]
pub struct PetList {
    pub pets: Vec<Pet>,
}

pub fn list_pets(_ctx: Context, input: ListPets) -> Result<PetList, Error> {
    let limit = input.limit.unwrap_or(10) as usize;
    let pets = (0..limit)
        .map(|i| Pet {
            id: i.to_string(),
            name: format!("pet-{i}"),
            tags: input.tags.clone(),
        })
        .collect();
    Ok(PetList { pets })
}

pub fn get_pet(_ctx: Context, input: GetPet) -> Result<Pet, Error> {
    Ok(Pet {
        id: input.id,
        name: "Rex".into(),
        tags: vec![],
    })
}

pub fn create_pet(ctx: Context, input: CreatePet) -> Result<Pet, Error> {
    let owner = ctx.get::<crate::User>("user").map(|u| u.name.clone());
    Ok(Pet {
        id: owner.unwrap_or_default(),
        name: input.name,
        tags: input.tags,
    })
}

pub fn delete_pet(_ctx: Context, _input: DeletePet) -> Result<(), Error> {
    Ok(())
}
