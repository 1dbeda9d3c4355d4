use thiserror::Error;

/// Top-level error type shared by the wrench crates.
///
/// Subsystem crates define their own error enums and convert from this one
/// so `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WrenchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for WrenchError {
    fn from(err: toml::de::Error) -> Self {
        WrenchError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for WrenchError {
    fn from(err: toml::ser::Error) -> Self {
        WrenchError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for WrenchError {
    fn from(err: serde_json::Error) -> Self {
        WrenchError::Serialization(err.to_string())
    }
}

impl From<regex::Error> for WrenchError {
    fn from(err: regex::Error) -> Self {
        WrenchError::Config(format!("invalid pattern: {}", err))
    }
}

/// A specialized `Result` type for wrench operations.
pub type Result<T> = std::result::Result<T, WrenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let cases: Vec<(WrenchError, &str)> = vec![
            (
                WrenchError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                WrenchError::Validation("duplicate priority".to_string()),
                "Validation error: duplicate priority",
            ),
            (
                WrenchError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                WrenchError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
            (WrenchError::ShuttingDown, "Shutdown in progress"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WrenchError = io_err.into();
        assert!(matches!(err, WrenchError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let parsed: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: WrenchError = parsed.unwrap_err().into();
        assert!(matches!(err, WrenchError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: WrenchError = parsed.unwrap_err().into();
        assert!(matches!(err, WrenchError::Serialization(_)));
    }

    #[test]
    fn test_error_from_regex() {
        let err: WrenchError = regex::Regex::new("(unclosed").unwrap_err().into();
        assert!(matches!(err, WrenchError::Config(_)));
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
