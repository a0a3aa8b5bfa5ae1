//! Error type shared by every part of the forecast pipeline.

use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or missing configuration (unit, API keys, config file).
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied a value outside its domain.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream answered with a non-success status.
    #[error("upstream replied with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode upstream payload: {0}")]
    Decode(String),

    #[error("no locations found for query {0:?}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("could not write output: {0}")]
    Output(String),

    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Coarse classification of an [`Error`], ignoring any context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    InvalidInput,
    Transport,
    Decode,
    NotFound,
    Cancelled,
    DeadlineExceeded,
    Output,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Config => "config",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::Transport => "transport",
            ErrorKind::Decode => "decode",
            ErrorKind::NotFound => "not found",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::DeadlineExceeded => "deadline exceeded",
            ErrorKind::Output => "output",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            // A non-2xx reply is a failed round-trip as far as callers care.
            Error::Transport(_) | Error::Status { .. } => ErrorKind::Transport,
            Error::Decode(_) => ErrorKind::Decode,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Error::Output(_) => ErrorKind::Output,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// True for the two ways a [`crate::Context`] can end an operation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind(), ErrorKind::Cancelled | ErrorKind::DeadlineExceeded)
    }

    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Attach a human-readable message to the error side of a [`Result`].
pub trait ResultExt<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T>;

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.context(f()))
    }
}
