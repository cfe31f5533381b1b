use std::marker::PhantomData;

use super::{Reflect, TypeShape};

/// Values that can describe their own type.
///
/// It is implemented for:
///
/// - functions and closures with up to four reflectable inputs and a reflectable output
///   (e.g. `fn get_pet(ctx: Context, req: GetPet) -> Result<Pet, Error>`);
/// - any value whose type implements [`Reflect`].
///
/// The `Marker` type parameter keeps the two families of implementations apart: you never
/// have to name it, it is always inferred.
pub trait Describe<Marker> {
    fn describe(&self) -> TypeShape;
}

#[doc(hidden)]
pub struct ValueMarker;

#[doc(hidden)]
pub struct FnMarker<Signature>(PhantomData<fn() -> Signature>);

impl<T: Reflect> Describe<ValueMarker> for T {
    fn describe(&self) -> TypeShape {
        T::shape()
    }
}

macro_rules! describe_fn {
    ($($arg:ident),*) => {
        impl<F, R, $($arg),*> Describe<FnMarker<(R, $($arg,)*)>> for F
        where
            F: Fn($($arg),*) -> R,
            R: Reflect,
            $($arg: Reflect,)*
        {
            fn describe(&self) -> TypeShape {
                <fn($($arg),*) -> R as Reflect>::shape()
            }
        }
    };
}

describe_fn!();
describe_fn!(A1);
describe_fn!(A1, A2);
describe_fn!(A1, A2, A3);
describe_fn!(A1, A2, A3, A4);

/// Describe a value. Used by the `handler!` macro.
pub fn describe<M, T: Describe<M>>(value: &T) -> TypeShape {
    value.describe()
}
