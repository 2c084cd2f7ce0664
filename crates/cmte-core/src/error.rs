use thiserror::Error;

/// Main error type for the CMTE translation engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CmteError {
    // ========================================
    // Lookup Errors
    // ========================================
    #[error("NOT_FOUND")]
    NotFound,

    #[error("NOT_FOUND:{0}")]
    NotFoundField(String),

    #[error("wrong path <{0}>")]
    WrongPath(String),

    #[error("empty field path")]
    EmptyPath,

    // ========================================
    // Template / Configuration Errors
    // ========================================
    #[error("unsupported type: <{0}>")]
    UnsupportedFieldKind(String),

    #[error("unsupported field prefix: <{0}>")]
    UnsupportedFieldPrefix(String),

    #[error("invalid expression: <{0}>")]
    InvalidExpression(String),

    #[error("unsupported converter: <{0}>")]
    UnsupportedConverter(String),

    #[error("configuration error: {0}")]
    Config(String),

    // ========================================
    // Value Errors
    // ========================================
    #[error("Empty source value for fieldID: <{0}>")]
    EmptySourceValue(String),

    #[error("invalid arguments <{args}> to {kind}")]
    InvalidArguments { kind: &'static str, args: String },

    #[error("cannot parse <{value}> as integer to {kind}")]
    InvalidInteger { kind: &'static str, value: String },

    #[error("invalid value <{0}> to *value_exponent")]
    InvalidExponentValue(String),

    #[error("invalid exponent <{0}> to *value_exponent")]
    InvalidExponent(String),

    #[error("invalid requestNumber <{0}> to *cc_usage")]
    InvalidRequestNumber(String),

    #[error("invalid usedTime <{0}> to *cc_usage")]
    InvalidUsedTime(String),

    #[error("invalid debitInterval <{0}> to *cc_usage")]
    InvalidDebitInterval(String),

    #[error("divide by zero to *divide")]
    DivideByZero,

    #[error("invalid duration <{0}>")]
    InvalidDuration(String),

    #[error("Unsupported time format")]
    UnsupportedTimeFormat,
}

impl CmteError {
    /// Classify the error per the engine's recovery policy
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound | Self::NotFoundField(_) => ErrorClass::NotFound,
            Self::UnsupportedFieldKind(_)
            | Self::UnsupportedFieldPrefix(_)
            | Self::InvalidExpression(_)
            | Self::UnsupportedConverter(_)
            | Self::Config(_) => ErrorClass::Configuration,
            _ => ErrorClass::Data,
        }
    }

    /// Check if the error is a plain lookup miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound | Self::NotFoundField(_))
    }
}

/// Error classes from the engine's recovery policy: configuration errors
/// should be caught by template validation at load time, data errors abort
/// only the current message, not-found misses are recoverable locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Data,
    NotFound,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Data => write!(f, "data"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}

/// Result type alias for CMTE operations
pub type Result<T> = std::result::Result<T, CmteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(CmteError::NotFound.to_string(), "NOT_FOUND");
        assert_eq!(
            CmteError::NotFoundField("*vars.Test".to_string()).to_string(),
            "NOT_FOUND:*vars.Test"
        );
        assert_eq!(
            CmteError::UnsupportedFieldKind(String::new()).to_string(),
            "unsupported type: <>"
        );
        assert_eq!(
            CmteError::UnsupportedFieldPrefix("wrong".to_string()).to_string(),
            "unsupported field prefix: <wrong>"
        );
        assert_eq!(
            CmteError::EmptySourceValue("MandatoryTrue".to_string()).to_string(),
            "Empty source value for fieldID: <MandatoryTrue>"
        );
        assert_eq!(
            CmteError::InvalidRequestNumber("abc".to_string()).to_string(),
            "invalid requestNumber <abc> to *cc_usage"
        );
        assert_eq!(
            CmteError::UnsupportedTimeFormat.to_string(),
            "Unsupported time format"
        );
    }

    #[test]
    fn test_error_class() {
        assert_eq!(CmteError::NotFound.class(), ErrorClass::NotFound);
        assert_eq!(
            CmteError::UnsupportedFieldKind("*bad".to_string()).class(),
            ErrorClass::Configuration
        );
        assert_eq!(CmteError::DivideByZero.class(), ErrorClass::Data);
        assert_eq!(
            CmteError::WrongPath("Account.Sub".to_string()).class(),
            ErrorClass::Data
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(CmteError::NotFound.is_not_found());
        assert!(CmteError::NotFoundField("x".to_string()).is_not_found());
        assert!(!CmteError::DivideByZero.is_not_found());
    }

    #[test]
    fn test_class_display() {
        assert_eq!(ErrorClass::Configuration.to_string(), "configuration");
        assert_eq!(ErrorClass::NotFound.to_string(), "not_found");
    }
}
