use trellis::serve::{Next, Request, Response};
use trellis::{Blueprint, Context, DELETE, Error, GET, MiddlewareRegistry, POST, middleware};

pub mod pets;

#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
}

pub fn register(bp: &mut Blueprint) {
    bp.route(GET, "/health", trellis::handler!(crate::health));
    let mut api = bp.scope("/api");
    api.wrap(middleware!(crate::authenticate));
    api.route(GET, "/pets", trellis::handler!(crate::pets::list_pets))
        .summary("List pets");
    api.route(GET, "/pets/{id}", trellis::handler!(crate::pets::get_pet));
    api.route(POST, "/pets", trellis::handler!(crate::pets::create_pet));
    api.route(DELETE, "/pets/{id}", trellis::handler!(crate::pets::delete_pet));
}

pub fn register_middleware(registry: &mut MiddlewareRegistry) {
    registry
        .register(middleware!(crate::authenticate))
        .provides::<User>("user")
        .requires_header("Authorization")
        .security_scheme("bearer")
        .may_return(401);
}

pub fn health(_ctx: Context) -> Result<(), Error> {
    Ok(())
}

pub fn authenticate(ctx: Context, request: &Request, next: Next<'_>) -> Result<Response, Error> {
    let Some(token) = request.headers().get(http::header::AUTHORIZATION) else {
        return Err(Error::new("missing credentials").with_status(http::StatusCode::UNAUTHORIZED));
    };
    let name = token
        .to_str()
        .map_err(|e| Error::new(e).with_status(http::StatusCode::UNAUTHORIZED))?
        .trim_start_matches("Bearer ")
        .to_owned();
    next.run(ctx.put("user", User { name }))
}
