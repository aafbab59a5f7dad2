//! Locale tags and the localized strings shown to chat users.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Request header carrying the storefront locale.
pub const LOCALE_HEADER: &str = "x-locale";

/// Language partition used for both knowledge chunks and user-facing messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English.
    En,
    /// Bulgarian; the storefront default.
    #[default]
    Bg,
}

/// Raised when a locale tag is not one of `en`/`bg`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported locale '{0}' (expected 'en' or 'bg')")]
pub struct UnknownLocale(pub String);

impl Locale {
    /// Every supported locale, in indexing order.
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Bg];

    /// Lowercase tag as stored in payloads and URLs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Bg => "bg",
        }
    }

    /// Resolve the locale from an optional header value, defaulting to Bulgarian.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::parse::<Locale>) {
            Some(Ok(locale)) => locale,
            Some(Err(error)) => {
                tracing::debug!(error = %error, "Falling back to default locale");
                Self::default()
            }
            None => Self::default(),
        }
    }

    /// Localized strings for this locale.
    pub fn messages(self) -> &'static Messages {
        match self {
            Self::En => &EN_MESSAGES,
            Self::Bg => &BG_MESSAGES,
        }
    }
}

impl FromStr for Locale {
    type Err = UnknownLocale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Self::En),
            "bg" => Ok(Self::Bg),
            other => Err(UnknownLocale(other.to_string())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing strings for one locale.
#[derive(Debug)]
pub struct Messages {
    /// Message exceeded the length budget.
    pub too_long: &'static str,
    /// Message was empty or unreadable.
    pub invalid_content: &'static str,
    /// Message was dominated by punctuation and symbols.
    pub too_many_special_chars: &'static str,
    /// Message looked like flooding or prompt injection.
    pub suspicious_pattern: &'static str,
    /// Request carried no user message.
    pub missing_message: &'static str,
    /// Generic upstream failure.
    pub processing_failed: &'static str,
    /// Scripted reply to questions outside the shop's topics.
    pub off_topic: &'static str,
    /// Placeholder used when retrieval found nothing.
    pub no_context: &'static str,
}

static EN_MESSAGES: Messages = Messages {
    too_long: "Your message is too long. Please keep it under 800 characters.",
    invalid_content: "Please enter a valid message.",
    too_many_special_chars: "Your message contains too many special characters. Please rephrase it.",
    suspicious_pattern: "Your message could not be processed. Please rephrase your question about our flooring.",
    missing_message: "No message was provided.",
    processing_failed: "Sorry, something went wrong while processing your request. Please try again.",
    off_topic: "I can only help with questions about flooring, our products and interior design. Is there anything about floors I can help you with?",
    no_context: "No relevant information was found in the knowledge base.",
};

static BG_MESSAGES: Messages = Messages {
    too_long: "Съобщението ви е твърде дълго. Моля, ограничете го до 800 символа.",
    invalid_content: "Моля, въведете валидно съобщение.",
    too_many_special_chars: "Съобщението ви съдържа твърде много специални символи. Моля, преформулирайте го.",
    suspicious_pattern: "Съобщението ви не може да бъде обработено. Моля, преформулирайте въпроса си за нашите подови настилки.",
    missing_message: "Не е изпратено съобщение.",
    processing_failed: "Съжаляваме, възникна грешка при обработката на заявката ви. Моля, опитайте отново.",
    off_topic: "Мога да помагам само с въпроси за подови настилки, нашите продукти и интериорен дизайн. С какво мога да ви помогна относно подовете?",
    no_context: "Не беше открита подходяща информация в базата знания.",
};
