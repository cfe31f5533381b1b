use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A stable, machine-readable identifier for each kind of validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    NilHandler,
    NotAFunction,
    VariadicNotSupported,
    MissingContext,
    TooManyArgs,
    MissingErrorReturn,
    TooManyReturns,
    InvalidPath,
    DuplicatePathVariable,
    UnsupportedRequestType,
    DuplicateBinding,
    EmptyBindingName,
    UnknownPathVariable,
    UnsupportedPathType,
    DuplicatePathBinding,
    UnsupportedQueryType,
    UnsupportedHeaderType,
    MissingPathBinding,
    DuplicateRoute,
    InvalidContextKey,
    ConflictingContextKey,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 21] = [
        ErrorCode::NilHandler,
        ErrorCode::NotAFunction,
        ErrorCode::VariadicNotSupported,
        ErrorCode::MissingContext,
        ErrorCode::TooManyArgs,
        ErrorCode::MissingErrorReturn,
        ErrorCode::TooManyReturns,
        ErrorCode::InvalidPath,
        ErrorCode::DuplicatePathVariable,
        ErrorCode::UnsupportedRequestType,
        ErrorCode::DuplicateBinding,
        ErrorCode::EmptyBindingName,
        ErrorCode::UnknownPathVariable,
        ErrorCode::UnsupportedPathType,
        ErrorCode::DuplicatePathBinding,
        ErrorCode::UnsupportedQueryType,
        ErrorCode::UnsupportedHeaderType,
        ErrorCode::MissingPathBinding,
        ErrorCode::DuplicateRoute,
        ErrorCode::InvalidContextKey,
        ErrorCode::ConflictingContextKey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NilHandler => "nil_handler",
            ErrorCode::NotAFunction => "not_a_function",
            ErrorCode::VariadicNotSupported => "variadic_not_supported",
            ErrorCode::MissingContext => "missing_context",
            ErrorCode::TooManyArgs => "too_many_args",
            ErrorCode::MissingErrorReturn => "missing_error_return",
            ErrorCode::TooManyReturns => "too_many_returns",
            ErrorCode::InvalidPath => "invalid_path",
            ErrorCode::DuplicatePathVariable => "duplicate_path_variable",
            ErrorCode::UnsupportedRequestType => "unsupported_request_type",
            ErrorCode::DuplicateBinding => "duplicate_binding",
            ErrorCode::EmptyBindingName => "empty_binding_name",
            ErrorCode::UnknownPathVariable => "unknown_path_variable",
            ErrorCode::UnsupportedPathType => "unsupported_path_type",
            ErrorCode::DuplicatePathBinding => "duplicate_path_binding",
            ErrorCode::UnsupportedQueryType => "unsupported_query_type",
            ErrorCode::UnsupportedHeaderType => "unsupported_header_type",
            ErrorCode::MissingPathBinding => "missing_path_binding",
            ErrorCode::DuplicateRoute => "duplicate_route",
            ErrorCode::InvalidContextKey => "invalid_context_key",
            ErrorCode::ConflictingContextKey => "conflicting_context_key",
        }
    }
}

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownErrorCode(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` is not a known validation error code")]
pub struct UnknownErrorCode(pub String);

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
/// A handler, request type or registration that can't be turned into an endpoint.
///
/// Messages are deterministic: validating the same input twice yields the same
/// code and the same message.
pub struct ValidationError {
    code: ErrorCode,
    message: String,
}

impl ValidationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with a description of where the error was found.
    pub fn within(mut self, location: impl Display) -> Self {
        self.message = format!("{location}: {}", self.message);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// All the validation errors found in a single discovery run, in registration order.
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    /// Parse a report produced by the [`Display`] implementation of [`ValidationErrors`].
    ///
    /// Lines that don't look like `error[<code>]: <message>` are returned separately,
    /// untouched.
    pub fn parse_report(report: &str) -> (Self, Vec<&str>) {
        let mut errors = Vec::new();
        let mut unparsed = Vec::new();
        for line in report.lines() {
            match parse_report_line(line) {
                Some(error) => errors.push(error),
                None if line.trim().is_empty() => {}
                None => unparsed.push(line),
            }
        }
        (Self(errors), unparsed)
    }
}

fn parse_report_line(line: &str) -> Option<ValidationError> {
    let rest = line.strip_prefix("error[")?;
    let (code, message) = rest.split_once("]: ")?;
    let code = code.parse::<ErrorCode>().ok()?;
    Some(ValidationError::new(code, message))
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Extend<ValidationError> for ValidationErrors {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "error[{}]: {}", error.code, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_their_string_form() {
        for code in ErrorCode::ALL {
            assert_eq!(code.as_str().parse::<ErrorCode>(), Ok(code));
        }
        assert!("not_a_code".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn reports_can_be_parsed_back() {
        let errors = ValidationErrors::from(vec![
            ValidationError::new(ErrorCode::DuplicateRoute, "`GET /pets` is registered twice"),
            ValidationError::new(ErrorCode::NilHandler, "no handler was provided"),
        ]);
        let report = format!("{errors}\nwarning: unused import\n");
        let (parsed, unparsed) = ValidationErrors::parse_report(&report);
        assert_eq!(parsed, errors);
        assert_eq!(unparsed, vec!["warning: unused import"]);
        insta::assert_snapshot!(errors, @r"
        error[duplicate_route]: `GET /pets` is registered twice
        error[nil_handler]: no handler was provided
        ");
    }
}
