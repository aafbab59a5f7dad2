//! Result and error types produced by the input validator.

use crate::locale::Locale;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Closed set of reasons a chat message can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorCode {
    /// Message exceeded the length budget before or after sanitization.
    TooLong,
    /// Message was empty or collapsed to nothing.
    InvalidContent,
    /// Symbols outweigh letters and digits beyond the allowed ratio.
    TooManySpecialChars,
    /// Flooding or a prompt-injection heuristic matched.
    SuspiciousPattern,
}

impl ValidationErrorCode {
    /// Stable identifier used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TooLong => "TOO_LONG",
            Self::InvalidContent => "INVALID_CONTENT",
            Self::TooManySpecialChars => "TOO_MANY_SPECIAL_CHARS",
            Self::SuspiciousPattern => "SUSPICIOUS_PATTERN",
        }
    }

    /// User-facing explanation in the requested locale.
    pub fn message(self, locale: Locale) -> &'static str {
        let messages = locale.messages();
        match self {
            Self::TooLong => messages.too_long,
            Self::InvalidContent => messages.invalid_content,
            Self::TooManySpecialChars => messages.too_many_special_chars,
            Self::SuspiciousPattern => messages.suspicious_pattern,
        }
    }
}

impl fmt::Display for ValidationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejection reason plus an operator-facing detail string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {detail}")]
pub struct ValidationError {
    /// Machine-readable rejection kind.
    pub code: ValidationErrorCode,
    /// Human-readable detail for logs.
    pub detail: String,
}

/// Outcome of validating one raw message.
///
/// A sanitized string is present exactly when the message is valid; the constructors are the
/// only way to build a value, so the pairing cannot drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    sanitized_input: Option<String>,
    error: Option<ValidationError>,
}

impl ValidationResult {
    pub(crate) fn valid(sanitized: String) -> Self {
        Self {
            sanitized_input: Some(sanitized),
            error: None,
        }
    }

    pub(crate) fn invalid(code: ValidationErrorCode, detail: impl Into<String>) -> Self {
        Self {
            sanitized_input: None,
            error: Some(ValidationError {
                code,
                detail: detail.into(),
            }),
        }
    }

    /// Whether the message may be forwarded to the model.
    pub fn is_valid(&self) -> bool {
        self.sanitized_input.is_some()
    }

    /// Cleaned message text, present only when valid.
    pub fn sanitized_input(&self) -> Option<&str> {
        self.sanitized_input.as_deref()
    }

    /// Rejection details, present only when invalid.
    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    /// Rejection code, present only when invalid.
    pub fn error_code(&self) -> Option<ValidationErrorCode> {
        self.error.as_ref().map(|error| error.code)
    }

    /// Convert into a `Result` for `?`-style handling.
    pub fn into_result(self) -> Result<String, ValidationError> {
        match (self.sanitized_input, self.error) {
            (Some(sanitized), _) => Ok(sanitized),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ValidationError {
                code: ValidationErrorCode::InvalidContent,
                detail: "validation produced no outcome".into(),
            }),
        }
    }
}
