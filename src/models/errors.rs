//! Centralized Error Handling Module
//!
//! Every failure carries a unique, stable error code so detector failures
//! can be told apart in logs and in the per-detector verdict entries.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - DETECTOR_xxx: failures raised while a detector runs
//! - TX_xxx: malformed transaction records
//! - CFG_xxx: configuration errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Detector Errors (1xx)
    // ============================================
    /// Detector raised an error during analysis
    DetectorFailed,
    /// Detector did not finish within the configured timeout
    DetectorTimeout,
    /// Detector task panicked
    DetectorPanicked,

    // ============================================
    // Transaction Errors (2xx)
    // ============================================
    /// A field is present but has the wrong type or format
    TxInvalidField,
    /// The record as a whole cannot be interpreted
    TxMalformed,

    // ============================================
    // Configuration Errors (4xx)
    // ============================================
    /// Invalid configuration value
    ConfigInvalidValue,

    // ============================================
    // Generic Errors (9xx)
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DetectorFailed => "DETECTOR_FAILED",
            Self::DetectorTimeout => "DETECTOR_TIMEOUT",
            Self::DetectorPanicked => "DETECTOR_PANICKED",

            Self::TxInvalidField => "TX_INVALID_FIELD",
            Self::TxMalformed => "TX_MALFORMED",

            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Errors caused by the input rather than by the detector itself
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::TxInvalidField | Self::TxMalformed)
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Detector failed
    pub fn detector_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DetectorFailed, msg)
    }

    /// Detector timed out
    pub fn detector_timeout(detector_id: &str) -> Self {
        Self::new(
            ErrorCode::DetectorTimeout,
            format!("Detector {} timed out", detector_id),
        )
    }

    /// Detector task panicked
    pub fn detector_panicked(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DetectorPanicked, msg)
    }

    /// Invalid transaction field
    pub fn invalid_field(field: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::TxInvalidField,
            format!("Invalid field '{}': {}", field, reason),
        )
    }

    /// Malformed transaction record
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::TxMalformed, msg)
    }

    /// Invalid configuration value
    pub fn invalid_config(key: &str, value: &str) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid value for {}: {:?}", key, value),
        )
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::TxMalformed, "JSON parse error", err)
    }
}
