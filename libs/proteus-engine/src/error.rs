use proteus_api::error::ConverterError;

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("config error: {0}")]
    Config(String),

    #[error("converter error: {0}")]
    Converter(ConverterError),

    /// Raised by a converter as access-denied. Passed through the mapper unwrapped.
    #[error("security error: {0}")]
    Security(ConverterError),

    #[error(
        "converters '{existing}' and '{duplicate}' both convert from '{source_type}' to '{target_type}' with priority {priority}"
    )]
    DuplicateConverter {
        source_type: String,
        target_type: String,
        priority: i32,
        existing: String,
        duplicate: String,
    },

    #[error(
        "converters '{first}' and '{second}' both convert to an interface of the target with priority {priority}"
    )]
    DuplicateInterfaceConverter {
        priority: i32,
        first: String,
        second: String,
    },

    #[error("no converter found which can convert from \"{}\" to \"{target_type}\"", .source_types.join("\" or \""))]
    NoConverterFound {
        source_types: Vec<String>,
        target_type: String,
    },

    #[error("target type '{0}' is neither a simple type nor a known class or interface")]
    InvalidTarget(String),

    #[error("mapping property '{property}' is not allowed; allow it in the mapping configuration")]
    UnconfiguredProperty { property: String },

    #[error("converter '{0}' is catalogued but not provided")]
    ConverterUnavailable(String),

    /// Hard fault of a `convert` call, tagged with the property path it occurred at.
    #[error("mapping to '{target_type}' failed at property path '{path}': {error}")]
    Mapping {
        target_type: String,
        path: String,
        #[source]
        error: Box<MappingError>,
    },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MappingError {
    pub fn is_security(&self) -> bool {
        matches!(self, MappingError::Security(_))
    }

    /// Innermost fault, unwrapping `Mapping`.
    pub fn root_cause(&self) -> &MappingError {
        match self {
            MappingError::Mapping { error, .. } => error.root_cause(),
            other => other,
        }
    }

    /// Add context to the error.
    ///
    /// For `Converter` variant, context is added to the inner `ConverterError`.
    /// For `Config` and `Cache`, context is prepended to the message.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            MappingError::Converter(e) => MappingError::Converter(e.with_context(ctx)),
            MappingError::Config(msg) => MappingError::Config(format!("{ctx}: {msg}")),
            MappingError::Cache(msg) => MappingError::Cache(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}

/// Security-classified converter errors keep their own channel.
impl From<ConverterError> for MappingError {
    fn from(e: ConverterError) -> Self {
        if e.is_security() {
            MappingError::Security(e)
        } else {
            MappingError::Converter(e)
        }
    }
}
