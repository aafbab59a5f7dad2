//! Input validation for chat messages.
//!
//! [`validate_input`] is a pure function: it either yields a cleaned string safe to forward to
//! the hosted model or rejects the message with one of four [`ValidationErrorCode`]s. Checks run
//! in a fixed order and the first failure wins:
//!
//! 1. empty / whitespace-only input → `INVALID_CONTENT`
//! 2. raw length over budget → `TOO_LONG` (before sanitization, so padding that collapses away
//!    cannot sneak an oversized payload through)
//! 3. sanitization; nothing left → `INVALID_CONTENT`
//! 4. a character repeated [`MAX_REPEATED_CHARS`] or more times → `SUSPICIOUS_PATTERN`
//! 5. symbol ratio above [`MAX_SPECIAL_CHAR_RATIO`] → `TOO_MANY_SPECIAL_CHARS`
//! 6. prompt-injection heuristic → `SUSPICIOUS_PATTERN`
//! 7. sanitized length over budget → `TOO_LONG`

mod patterns;
pub mod sanitize;
mod types;

pub use patterns::find_injection;
pub use sanitize::sanitize;
pub use types::{ValidationError, ValidationErrorCode, ValidationResult};

/// Default length budget for a chat message, in characters.
pub const MAX_INPUT_LENGTH: usize = 800;
/// Consecutive repeats of one character treated as flooding.
pub const MAX_REPEATED_CHARS: usize = 6;
/// Highest accepted share of symbols among non-whitespace characters.
pub const MAX_SPECIAL_CHAR_RATIO: f64 = 0.30;

/// Validate a message against the default length budget.
pub fn validate(raw: &str) -> ValidationResult {
    validate_input(raw, MAX_INPUT_LENGTH)
}

/// Validate a message against an explicit length budget.
pub fn validate_input(raw: &str, max_length: usize) -> ValidationResult {
    if raw.trim().is_empty() {
        return ValidationResult::invalid(
            ValidationErrorCode::InvalidContent,
            "message is empty",
        );
    }

    let raw_length = raw.chars().count();
    if raw_length > max_length {
        return ValidationResult::invalid(
            ValidationErrorCode::TooLong,
            format!("message has {raw_length} characters (limit {max_length})"),
        );
    }

    let sanitized = sanitize(raw);
    if sanitized.is_empty() {
        return ValidationResult::invalid(
            ValidationErrorCode::InvalidContent,
            "message is empty after sanitization",
        );
    }

    let repeat_run = sanitize::longest_repeat_run(&sanitized);
    if repeat_run >= MAX_REPEATED_CHARS {
        return ValidationResult::invalid(
            ValidationErrorCode::SuspiciousPattern,
            format!("character repeated {repeat_run} times in a row"),
        );
    }

    let ratio = sanitize::special_char_ratio(&sanitized);
    if ratio > MAX_SPECIAL_CHAR_RATIO {
        return ValidationResult::invalid(
            ValidationErrorCode::TooManySpecialChars,
            format!("special character ratio {ratio:.2} exceeds {MAX_SPECIAL_CHAR_RATIO:.2}"),
        );
    }

    if let Some(pattern) = find_injection(&sanitized) {
        return ValidationResult::invalid(
            ValidationErrorCode::SuspiciousPattern,
            format!("matched injection heuristic '{pattern}'"),
        );
    }

    let sanitized_length = sanitized.chars().count();
    if sanitized_length > max_length {
        return ValidationResult::invalid(
            ValidationErrorCode::TooLong,
            format!("sanitized message has {sanitized_length} characters (limit {max_length})"),
        );
    }

    ValidationResult::valid(sanitized)
}
