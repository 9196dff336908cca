use std::fmt;

/// Error kind for converter errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source value has a shape the converter cannot read.
    Source,
    /// Target type is unknown or cannot be built.
    Target,
    /// Declared type conflicts with the requested one.
    DataType,
    /// Mapping configuration forbids the operation.
    Configuration,
    /// Access denied. Never wrapped by the mapper.
    Security,
    Logic,
}

/// Converter error — the hard-fault channel of all converter trait methods.
///
/// Soft, user-correctable failures are returned as
/// [`Outcome::Error`](crate::converter::Outcome) instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ConverterError {
    pub fn source(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Source, message: msg.into() }
    }

    pub fn target(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Target, message: msg.into() }
    }

    pub fn data_type(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::DataType, message: msg.into() }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Configuration, message: msg.into() }
    }

    pub fn security(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Security, message: msg.into() }
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    pub fn is_security(&self) -> bool {
        self.kind == ErrorKind::Security
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for ConverterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ConverterError {}

impl From<serde_json::Error> for ConverterError {
    fn from(e: serde_json::Error) -> Self {
        Self::source(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_kind() {
        let err = ConverterError::security("denied").with_context("property 'owner'");
        assert!(err.is_security());
        assert_eq!(err.message, "property 'owner': denied");
        assert_eq!(err.to_string(), "Security: property 'owner': denied");
    }
}
