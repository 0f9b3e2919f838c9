use crate::signer::SignerError;

/// Application-level errors for the presigned URL cache.
///
/// This enum wraps the error types that can occur while the cache runtime is
/// assembled and while it serves URLs.
pub enum ApplicationError {
    /// I/O error (e.g., metrics textfile writes).
    Io(std::io::Error),
    /// OpenTelemetry OTLP exporter build error.
    Otlp(opentelemetry_otlp::ExporterBuildError),
    /// The object-storage signer failed to produce a URL.
    Signer(SignerError),
    /// Internal application error with description.
    Internal(String),
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(io_error) => Some(io_error),
            Self::Otlp(otlp_error) => Some(otlp_error),
            Self::Signer(signer_error) => Some(signer_error),
            Self::Internal(_) => None,
        }
    }
}

impl std::fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            ApplicationError::Io(io_error) => write!(f, "IO error: {io_error:?}"),
            ApplicationError::Otlp(otlp_error) => write!(f, "Otlp error: {otlp_error:?}"),
            ApplicationError::Signer(signer_error) => write!(f, "Signer error: {signer_error}"),
            Self::Internal(message) => write!(f, "Internal error: {message}"),
        }
    }
}

impl std::fmt::Debug for ApplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self, f)
    }
}

impl From<std::io::Error> for ApplicationError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<opentelemetry_otlp::ExporterBuildError> for ApplicationError {
    fn from(value: opentelemetry_otlp::ExporterBuildError) -> Self {
        Self::Otlp(value)
    }
}

impl From<SignerError> for ApplicationError {
    fn from(value: SignerError) -> Self {
        Self::Signer(value)
    }
}
