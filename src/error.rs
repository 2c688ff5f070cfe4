//! Status/error discipline used as the result channel everywhere in the core.

use thiserror::Error;

/// One of the five error kinds the core ever surfaces. `Ok` is never a
/// member of this enum — it is `Result::Ok(T)`, so the "Ok costs nothing"
/// property spec.md asks of the C++ `Status` type falls out of `Result`
/// itself rather than needing a hand-rolled tagged union.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("NotFound: {0}")]
    NotFound(String),
    #[error("Corruption: {0}")]
    Corruption(String),
    #[error("NotSupported: {0}")]
    NotSupported(String),
    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),
    #[error("IOError: {0}")]
    IOError(String),
}

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IOError(msg.into())
    }

    /// Two-fragment form from spec.md §4.B: joins the fragments with `": "`.
    pub fn not_found2(msg: &str, msg2: &str) -> Self {
        Self::NotFound(join(msg, msg2))
    }

    pub fn corruption2(msg: &str, msg2: &str) -> Self {
        Self::Corruption(join(msg, msg2))
    }

    pub fn io_error2(msg: &str, msg2: &str) -> Self {
        Self::IOError(join(msg, msg2))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_))
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::IOError(_))
    }
}

fn join(msg: &str, msg2: &str) -> String {
    if msg2.is_empty() {
        msg.to_owned()
    } else {
        format!("{}: {}", msg, msg2)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
