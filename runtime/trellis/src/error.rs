use std::fmt::{Debug, Display, Formatter};

use http::StatusCode;

/// The error type returned by handlers and middlewares.
///
/// It wraps an arbitrary error together with the status code that should be used
/// when it is turned into a response.
/// It defaults to `500 Internal Server Error`.
///
/// Any type implementing [`std::error::Error`] can be converted into an [`Error`],
/// so the `?` operator works out of the box inside handlers.
pub struct Error {
    inner: Box<dyn std::error::Error + Send + Sync>,
    status: StatusCode,
}

impl Error {
    /// Create a new [`Error`] from an arbitrary error, or from a string message.
    pub fn new(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            inner: error.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Set the status code of the response this error will be converted into.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// A reference to the underlying error.
    pub fn inner_ref(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.inner.as_ref()
    }
}

impl<E> From<E> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Error::new(error)
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.inner, f)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}
