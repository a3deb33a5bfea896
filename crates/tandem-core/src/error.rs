use miette::Diagnostic;

/// Errors that can occur across the tandem workspace.
///
/// The analysis errors (`Format`, `InsufficientData`, `UnsupportedMethod`,
/// `InvalidParameter`) are raised synchronously by the clustering and scoring
/// engine and never leave partial results behind. The remaining variants wrap
/// I/O, serialization and git failures from the ingestion side. The binary
/// crate renders all of them as `miette` diagnostics.
///
/// # Examples
///
/// ```
/// use tandem_core::TandemError;
///
/// let err = TandemError::Format("4x".into());
/// assert!(err.to_string().contains("4x"));
/// ```
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum TandemError {
    /// Malformed duration string.
    #[error("invalid duration '{0}': expected digits followed by s, m or h")]
    #[diagnostic(
        code(tandem::format),
        help("durations look like 30s, 15m or 4h")
    )]
    Format(String),

    /// Density estimation requested on an empty event stream.
    #[error("insufficient data: {0}")]
    #[diagnostic(code(tandem::insufficient_data))]
    InsufficientData(String),

    /// Unknown coupling scoring method.
    #[error("scoring method '{0}' is not supported")]
    #[diagnostic(
        code(tandem::unsupported_method),
        help("supported methods are jaccard and sorensen")
    )]
    UnsupportedMethod(String),

    /// A numeric analysis parameter outside its valid range.
    #[error("invalid parameter: {0}")]
    #[diagnostic(code(tandem::invalid_parameter))]
    InvalidParameter(String),

    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TandemError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn format_error_names_the_input() {
        let err = TandemError::Format("10d".into());
        assert_eq!(
            err.to_string(),
            "invalid duration '10d': expected digits followed by s, m or h"
        );
    }

    #[test]
    fn unsupported_method_displays_method() {
        let err = TandemError::UnsupportedMethod("cosine".into());
        assert_eq!(err.to_string(), "scoring method 'cosine' is not supported");
    }

    #[test]
    fn diagnostics_carry_codes() {
        let err = TandemError::InsufficientData("no events".into());
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("tandem::insufficient_data"));
    }
}
