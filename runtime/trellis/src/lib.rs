//! Declare HTTP endpoints as plain typed functions.
//!
//! An application registers its endpoints against a [`Blueprint`]:
//!
//! ```rust,ignore
//! use trellis::{Blueprint, GET, handler, middleware};
//!
//! pub fn register(bp: &mut Blueprint) {
//!     bp.route(GET, "/health", handler!(crate::health));
//!     let mut api = bp.scope("/api");
//!     api.wrap(middleware!(crate::auth::authenticate));
//!     api.route(GET, "/pets/{id}", handler!(crate::pets::get_pet));
//! }
//! ```
//!
//! `trellisc` builds a throwaway driver program that calls `register`, validates every
//! endpoint (see [`analysis`]) and emits a manifest that is then turned into dispatch code.

// Allows `#[derive(Reflect)]` to be used inside this crate.
extern crate self as trellis;

pub mod analysis;
pub mod blueprint;
pub mod context;
pub mod discovery;
mod error;
pub mod middleware;
pub mod reflect;
pub mod serve;

pub use blueprint::{Blueprint, DELETE, GET, Method, POST, PUT, Scope};
pub use context::Context;
pub use error::Error;
pub use middleware::MiddlewareRegistry;
pub use reflect::Reflect;
