//! Discovery and code generation for `trellis` applications.
//!
//! The pipeline has two stages:
//!
//! 1. [`discovery::discover`] builds and runs a driver program against the application,
//!    producing a validated [`Manifest`](trellis_manifest::Manifest);
//! 2. [`codegen::generate`] turns the manifest into dispatch code, which
//!    [`persistence::SourceWriter`] writes to disk.
pub mod codegen;
pub mod discovery;
pub mod persistence;

pub use codegen::{CodegenError, GeneratedCode, generate};
pub use discovery::{DiscoveryConfig, DiscoveryError, discover};
pub use persistence::{OutdatedFiles, SourceWriter};
