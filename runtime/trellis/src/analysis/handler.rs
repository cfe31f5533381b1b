use trellis_manifest::Shape;

use super::{ErrorCode, ValidationError};
use crate::reflect::{Kind, TypeShape};

#[derive(Debug, Clone, PartialEq, Eq)]
/// What the classifier learned about a handler.
pub struct HandlerInfo {
    pub shape: Shape,
    /// The type of the second parameter, if any.
    pub request: Option<TypeShape>,
    /// The type wrapped by `Ok`, unless it is `()`.
    pub response: Option<TypeShape>,
}

/// Classify a handler signature.
///
/// A valid handler takes `trellis::Context` as first parameter, optionally followed by
/// a request value, and returns `Result<T, trellis::Error>`, with `T = ()` when there is
/// no response value.
/// `handler` is `None` when no handler value was provided.
pub fn classify_handler(handler: Option<&TypeShape>) -> Result<HandlerInfo, ValidationError> {
    let Some(handler) = handler else {
        return Err(ValidationError::new(
            ErrorCode::NilHandler,
            "no handler was provided: expected a function",
        ));
    };
    let Kind::Function(signature) = &handler.kind else {
        return Err(ValidationError::new(
            ErrorCode::NotAFunction,
            format!(
                "`{}` is a {}, not a function: handlers must be functions",
                handler.name,
                handler.kind.name()
            ),
        ));
    };
    if signature.variadic {
        return Err(ValidationError::new(
            ErrorCode::VariadicNotSupported,
            format!(
                "`{}` is variadic: handlers must take a fixed number of parameters",
                handler.name
            ),
        ));
    }

    let mut inputs = signature.inputs.iter();
    match inputs.next() {
        Some(first) if first.kind == Kind::Context => {}
        Some(first) => {
            return Err(ValidationError::new(
                ErrorCode::MissingContext,
                format!(
                    "the first parameter of `{}` must be `trellis::Context`, found `{}`",
                    handler.name, first.name
                ),
            ));
        }
        None => {
            return Err(ValidationError::new(
                ErrorCode::MissingContext,
                format!(
                    "`{}` takes no parameters: handlers must take `trellis::Context` as their first parameter",
                    handler.name
                ),
            ));
        }
    }
    let request = inputs.next().cloned();
    if signature.inputs.len() > 2 {
        return Err(ValidationError::new(
            ErrorCode::TooManyArgs,
            format!(
                "`{}` takes {} parameters: handlers take a `trellis::Context` and, optionally, a single request value",
                handler.name,
                signature.inputs.len()
            ),
        ));
    }

    let Kind::Result { ok, err } = &signature.output.kind else {
        return Err(missing_error_return(handler, &signature.output));
    };
    if err.kind != Kind::Error {
        return Err(missing_error_return(handler, &signature.output));
    }
    let response = match &ok.kind {
        Kind::Unit => None,
        Kind::Tuple(values) if values.len() > 1 => {
            return Err(ValidationError::new(
                ErrorCode::TooManyReturns,
                format!(
                    "`{}` returns {} values on success: handlers return at most one response value",
                    handler.name,
                    values.len()
                ),
            ));
        }
        _ => Some(ok.as_ref().clone()),
    };

    Ok(HandlerInfo {
        shape: Shape::new(request.is_some(), response.is_some()),
        request,
        response,
    })
}

fn missing_error_return(handler: &TypeShape, output: &TypeShape) -> ValidationError {
    ValidationError::new(
        ErrorCode::MissingErrorReturn,
        format!(
            "`{}` returns `{}`: handlers must return `Result<_, trellis::Error>`",
            handler.name, output.name
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::Reflect;
    use crate::{Context, Error};

    #[derive(crate::Reflect)]
    struct GetPet {
        #[bind(path = "id")]
        #[allow(dead_code)]
        id: String,
    }

    #[derive(crate::Reflect)]
    struct Pet {
        #[allow(dead_code)]
        name: String,
    }

    fn shape_of<F: Reflect>() -> TypeShape {
        F::shape()
    }

    fn classify<F: Reflect>() -> Result<HandlerInfo, ValidationError> {
        classify_handler(Some(&shape_of::<F>()))
    }

    fn error_of<F: Reflect>() -> ValidationError {
        classify::<F>().expect_err("classification should have failed")
    }

    #[test]
    fn every_valid_shape_is_recognized() {
        let info = classify::<fn(Context) -> Result<(), Error>>().unwrap();
        assert_eq!(info.shape, Shape::CtxErr);
        assert_eq!((info.request, info.response), (None, None));

        let info = classify::<fn(Context) -> Result<Pet, Error>>().unwrap();
        assert_eq!(info.shape, Shape::CtxRespErr);
        assert_eq!(info.response.unwrap().name, std::any::type_name::<Pet>());

        let info = classify::<fn(Context, GetPet) -> Result<(), Error>>().unwrap();
        assert_eq!(info.shape, Shape::CtxReqErr);
        assert_eq!(info.request.unwrap().name, std::any::type_name::<GetPet>());

        let info = classify::<fn(Context, GetPet) -> Result<Pet, Error>>().unwrap();
        assert_eq!(info.shape, Shape::CtxReqRespErr);
    }

    #[test]
    fn nil_handlers_are_rejected() {
        let error = classify_handler(None).unwrap_err();
        assert_eq!(error.code(), ErrorCode::NilHandler);
    }

    #[test]
    fn non_functions_are_rejected() {
        let error = error_of::<Pet>();
        assert_eq!(error.code(), ErrorCode::NotAFunction);
        insta::assert_snapshot!(error, @"`trellis::analysis::handler::tests::Pet` is a struct, not a function: handlers must be functions");
    }

    #[test]
    fn variadic_functions_are_rejected() {
        let error = error_of::<unsafe extern "C" fn(Context, ...) -> Result<(), Error>>();
        assert_eq!(error.code(), ErrorCode::VariadicNotSupported);
    }

    #[test]
    fn context_must_come_first() {
        let error = error_of::<fn() -> Result<(), Error>>();
        assert_eq!(error.code(), ErrorCode::MissingContext);
        let error = error_of::<fn(GetPet, Context) -> Result<(), Error>>();
        assert_eq!(error.code(), ErrorCode::MissingContext);
    }

    #[test]
    fn at_most_one_request_value() {
        let error = error_of::<fn(Context, GetPet, u32) -> Result<(), Error>>();
        assert_eq!(error.code(), ErrorCode::TooManyArgs);
    }

    #[test]
    fn error_return_is_required() {
        let error = error_of::<fn(Context) -> Pet>();
        assert_eq!(error.code(), ErrorCode::MissingErrorReturn);
        let error = error_of::<fn(Context) -> Result<Pet, String>>();
        assert_eq!(error.code(), ErrorCode::MissingErrorReturn);
        // The error is there, but in the wrong place.
        let error = error_of::<fn(Context) -> (Result<(), Error>, Pet)>();
        assert_eq!(error.code(), ErrorCode::MissingErrorReturn);
        assert!(
            error
                .message()
                .ends_with("handlers must return `Result<_, trellis::Error>`")
        );
    }

    #[test]
    fn at_most_one_response_value() {
        let error = error_of::<fn(Context) -> Result<(Pet, String), Error>>();
        assert_eq!(error.code(), ErrorCode::TooManyReturns);
    }

    #[test]
    fn classification_is_deterministic() {
        let inputs = [
            shape_of::<fn(Context) -> Result<(), Error>>(),
            shape_of::<fn(Context, GetPet) -> Result<Pet, Error>>(),
            shape_of::<Pet>(),
            shape_of::<fn(GetPet) -> Result<(), Error>>(),
            shape_of::<fn(Context, GetPet, u32) -> Result<(), Error>>(),
            shape_of::<fn(Context) -> Pet>(),
            shape_of::<fn(Context) -> Result<(Pet, Pet), Error>>(),
        ];
        for input in &inputs {
            let first = classify_handler(Some(input));
            for _ in 0..10 {
                assert_eq!(classify_handler(Some(input)), first);
            }
        }
    }
}
