//! Conversion and host-boundary errors

use std::fmt;

/// Category of a conversion failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Structurally invalid host input (shape, key type, cardinality)
    ValueConvert,
    /// Foreign object of an unexpected type, or no object at all
    ObjectConvert,
    /// The foreign runtime raised during a call, eval or exec
    ForeignRuntimeError,
    /// Failure on the host side of the boundary
    HostRuntimeError,
    /// A foreign code string failed to parse
    ParseError,
    /// A name that cannot be a struct field
    InvalidIdentifier,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ValueConvert => "value conversion error",
            Self::ObjectConvert => "object conversion error",
            Self::ForeignRuntimeError => "foreign runtime error",
            Self::HostRuntimeError => "host runtime error",
            Self::ParseError => "parse error",
            Self::InvalidIdentifier => "invalid identifier",
        };
        f.write_str(name)
    }
}

/// Error raised inside the conversion core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    pub kind: ErrorKind,
    pub message: String,
}

pub type ConvResult<T> = Result<T, ConversionError>;

impl ConversionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn value_convert(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValueConvert, message)
    }

    pub fn object_convert(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ObjectConvert, message)
    }

    pub fn foreign(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ForeignRuntimeError, message)
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HostRuntimeError, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message)
    }

    pub fn invalid_identifier(name: &str) -> Self {
        Self::new(
            ErrorKind::InvalidIdentifier,
            format!("'{name}' is not a valid struct field name"),
        )
    }

    /// Surface at the command boundary as `command: message`
    pub fn in_command(self, command: &str) -> HostError {
        HostError::new(command, self)
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConversionError {}

/// The single-line error a host command raises
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    pub command: String,
    pub kind: ErrorKind,
    message: String,
}

impl HostError {
    pub fn new(command: &str, error: ConversionError) -> Self {
        Self {
            command: command.to_string(),
            kind: error.kind,
            message: single_line(&error.message),
        }
    }

    /// Host-side usage error with no conversion behind it
    pub fn usage(command: &str, message: impl Into<String>) -> Self {
        Self::new(command, ConversionError::host(message))
    }

    /// Message without the command prefix
    pub fn message(&self) -> &str {
        &self.message
    }
}

fn single_line(message: &str) -> String {
    message.trim_end_matches('\n').replace('\n', " ")
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.command, self.message)
    }
}

impl std::error::Error for HostError {}

/// Attach a command name to conversion results
pub trait CommandContext<T> {
    fn command(self, name: &str) -> Result<T, HostError>;
}

impl<T> CommandContext<T> for ConvResult<T> {
    fn command(self, name: &str) -> Result<T, HostError> {
        self.map_err(|error| error.in_command(name))
    }
}
