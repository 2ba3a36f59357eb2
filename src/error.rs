//! Error types for the public interface of this library.
//!
//! Internally we use `anyhow` (see `Res`). At the edges, errors are converted into the public
//! `Error` type, which carries an `ErrorType` so that callers (the CLI and the MCP server) can
//! tell an access problem from a bad model response without parsing strings.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The result type used inside the crate.
pub(crate) type Res<T> = std::result::Result<T, anyhow::Error>;

/// The result type of the public interface.
pub type Result<T> = std::result::Result<T, Error>;

/// The broad category of a failure.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// A spreadsheet was unreachable or we lacked permission to use it.
    Access,
    /// A referenced spreadsheet or tab does not exist.
    NotFound,
    /// The model's answer to the column question was not the JSON we asked for.
    Classification,
    /// The model's answer to the category question was not the JSON we asked for.
    Normalization,
    /// The home directory, config file or credentials are missing or invalid.
    Config,
    /// The caller supplied unusable input.
    Request,
    /// The MCP service could not start or stopped unexpectedly.
    Service,
    /// Anything else.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// The public error type.
#[derive(Debug)]
pub struct Error {
    error_type: ErrorType,
    source: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, source: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            source: source.into(),
        }
    }

    /// The category of this failure.
    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // The alternate form prints the whole context chain on one line.
        write!(f, "{:#}", self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.source()
    }
}

/// A failure whose kind is already known where it is raised, e.g. an HTTP 404 from the Sheets
/// API. It travels as the root of an `anyhow` chain and wins over the fallback `ErrorType` given
/// to `pub_result`.
#[derive(Debug)]
pub(crate) struct Tagged {
    error_type: ErrorType,
    message: String,
}

impl Display for Tagged {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Tagged {}

/// Creates an `anyhow::Error` whose root carries `error_type`.
pub(crate) fn tagged(error_type: ErrorType, message: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(Tagged {
        error_type,
        message: message.into(),
    })
}

/// Converts an internal result into a public `Result`.
pub(crate) trait IntoResult<T> {
    /// Converts the error, if any, into the public `Error` type. `error_type` is used unless the
    /// error already carries a more specific kind.
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| {
            let e = e.into();
            let error_type = e
                .downcast_ref::<Tagged>()
                .map(|t| t.error_type)
                .unwrap_or(error_type);
            Error::new(error_type, e)
        })
    }
}
