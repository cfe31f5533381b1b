use std::collections::{BTreeMap, HashMap};

use super::{Kind, Reflect, Signature, TypeShape};
use crate::{Context, Error};

macro_rules! reflect_as {
    ($kind:ident => $($t:ty),+ $(,)?) => {
        $(
            impl Reflect for $t {
                fn shape() -> TypeShape {
                    TypeShape::new::<$t>(Kind::$kind)
                }
            }
        )+
    };
}

reflect_as!(Unit => ());
reflect_as!(Bool => bool);
reflect_as!(Int => i8, i16, i32, i64, i128, isize);
reflect_as!(Uint => u8, u16, u32, u64, u128, usize);
reflect_as!(Float => f32, f64);
reflect_as!(String => String);
reflect_as!(Context => Context);
reflect_as!(Error => Error);

impl<T: Reflect> Reflect for Option<T> {
    fn shape() -> TypeShape {
        TypeShape::new::<Self>(Kind::Option(Box::new(T::shape())))
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn shape() -> TypeShape {
        TypeShape::new::<Self>(Kind::List(Box::new(T::shape())))
    }
}

// Boxes are transparent: they describe the type they point to.
impl<T: Reflect> Reflect for Box<T> {
    fn shape() -> TypeShape {
        T::shape()
    }
}

impl<K: Reflect, V: Reflect, S> Reflect for HashMap<K, V, S> {
    fn shape() -> TypeShape {
        TypeShape::new::<Self>(Kind::Map {
            key: Box::new(K::shape()),
            value: Box::new(V::shape()),
        })
    }
}

impl<K: Reflect, V: Reflect> Reflect for BTreeMap<K, V> {
    fn shape() -> TypeShape {
        TypeShape::new::<Self>(Kind::Map {
            key: Box::new(K::shape()),
            value: Box::new(V::shape()),
        })
    }
}

impl<T: Reflect, E: Reflect> Reflect for Result<T, E> {
    fn shape() -> TypeShape {
        TypeShape::new::<Self>(Kind::Result {
            ok: Box::new(T::shape()),
            err: Box::new(E::shape()),
        })
    }
}

impl Reflect for serde_json::Value {
    fn shape() -> TypeShape {
        TypeShape::new::<Self>(Kind::Opaque)
    }
}

macro_rules! reflect_tuple {
    ($($t:ident),+) => {
        impl<$($t: Reflect),+> Reflect for ($($t,)+) {
            fn shape() -> TypeShape {
                TypeShape::new::<Self>(Kind::Tuple(vec![$($t::shape()),+]))
            }
        }
    };
}

reflect_tuple!(A1, A2);
reflect_tuple!(A1, A2, A3);
reflect_tuple!(A1, A2, A3, A4);

macro_rules! reflect_fn_pointer {
    ($($arg:ident),*) => {
        impl<R: Reflect, $($arg: Reflect),*> Reflect for fn($($arg),*) -> R {
            fn shape() -> TypeShape {
                TypeShape::new::<Self>(Kind::Function(Signature {
                    inputs: vec![$($arg::shape()),*],
                    output: Box::new(R::shape()),
                    variadic: false,
                }))
            }
        }
    };
}

reflect_fn_pointer!();
reflect_fn_pointer!(A1);
reflect_fn_pointer!(A1, A2);
reflect_fn_pointer!(A1, A2, A3);
reflect_fn_pointer!(A1, A2, A3, A4);

macro_rules! reflect_variadic_fn_pointer {
    ($($arg:ident),+) => {
        impl<R: Reflect, $($arg: Reflect),+> Reflect for unsafe extern "C" fn($($arg),+, ...) -> R {
            fn shape() -> TypeShape {
                TypeShape::new::<Self>(Kind::Function(Signature {
                    inputs: vec![$($arg::shape()),+],
                    output: Box::new(R::shape()),
                    variadic: true,
                }))
            }
        }
    };
}

reflect_variadic_fn_pointer!(A1);
reflect_variadic_fn_pointer!(A1, A2);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_kinds() {
        assert_eq!(u64::shape().kind, Kind::Uint);
        assert_eq!(i32::shape().kind, Kind::Int);
        assert_eq!(f32::shape().kind, Kind::Float);
        assert_eq!(String::shape().kind, Kind::String);
        assert!(bool::shape().kind.is_scalar());
        assert!(!<()>::shape().kind.is_scalar());
    }

    #[test]
    fn function_pointers_describe_their_signature() {
        let shape = <fn(Context, u32) -> Result<String, Error> as Reflect>::shape();
        let Kind::Function(signature) = shape.kind else {
            panic!("expected a function")
        };
        assert!(!signature.variadic);
        assert_eq!(signature.inputs.len(), 2);
        assert_eq!(signature.inputs[0].kind, Kind::Context);
        assert_eq!(
            signature.output.kind,
            Kind::Result {
                ok: Box::new(String::shape()),
                err: Box::new(Error::shape()),
            }
        );
    }

    #[test]
    fn variadic_function_pointers_are_flagged() {
        let shape = <unsafe extern "C" fn(Context, ...) -> Result<(), Error> as Reflect>::shape();
        let Kind::Function(signature) = shape.kind else {
            panic!("expected a function")
        };
        assert!(signature.variadic);
    }

    #[test]
    fn boxes_are_transparent() {
        assert_eq!(<Box<u8>>::shape(), u8::shape());
    }
}
