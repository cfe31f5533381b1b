//! Validation of handlers and request types.
//!
//! Every problem is reported as a [`ValidationError`] with a stable [`ErrorCode`].
pub use binding::{BindingInfo, FieldBinding, analyze_bindings};
pub use errors::{ErrorCode, UnknownErrorCode, ValidationError, ValidationErrors};
pub use handler::{HandlerInfo, classify_handler};
pub use route_path::{InterpolationError, RoutePath};

mod binding;
mod errors;
mod handler;
mod route_path;
