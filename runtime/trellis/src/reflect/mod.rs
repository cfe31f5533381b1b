//! Type descriptors for handlers, request types and response types.
//!
//! Rust has no runtime reflection: descriptors are produced by the [`Reflect`] trait,
//! implemented in this crate for primitives, standard collections and function pointers,
//! and derived for application structs via `#[derive(Reflect)]`.
use std::any::TypeId;
use std::cell::RefCell;

pub use describe::{Describe, FnMarker, ValueMarker, describe};
pub use shape::{BindingSource, FieldShape, Kind, Signature, TypeShape};
/// Derive [`Reflect`] for a struct with named fields.
pub use trellis_macros::Reflect;

mod describe;
mod impls;
mod shape;

/// Types that can describe their own shape.
pub trait Reflect {
    fn shape() -> TypeShape;
}

thread_local! {
    static IN_PROGRESS: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

/// Removes a type from the in-progress stack, even if describing its fields panicked.
struct InProgressGuard(TypeId);

impl Drop for InProgressGuard {
    fn drop(&mut self) {
        IN_PROGRESS.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().rposition(|id| *id == self.0) {
                stack.remove(position);
            }
        });
    }
}

/// Build the shape of a struct.
///
/// Used by the code generated by `#[derive(Reflect)]`.
/// If `T` is already being described further up the stack (i.e. the struct is recursive),
/// a [`Kind::Recursive`] reference is returned instead of descending into its fields again.
pub fn describe_struct<T: 'static>(
    doc: Option<&'static str>,
    fields: impl FnOnce() -> Vec<FieldShape>,
) -> TypeShape {
    let id = TypeId::of::<T>();
    let reentrant = IN_PROGRESS.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.contains(&id) {
            true
        } else {
            stack.push(id);
            false
        }
    });
    if reentrant {
        return TypeShape::new::<T>(Kind::Recursive).with_doc(doc);
    }
    let _guard = InProgressGuard(id);
    TypeShape::new::<T>(Kind::Struct(fields())).with_doc(doc)
}
