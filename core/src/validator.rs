/// Entry validators applied between extraction and writing
use crate::entry::ExtractionEntry;
use crate::factories::{FactoryError, Role};
use crate::formats::TranslationIndex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    NonEmpty,
    HasAlphanumeric,
    NoInvalidChars,
    SkipTranslated,
}

impl ValidatorKind {
    pub const ALL: [ValidatorKind; 4] = [
        ValidatorKind::NonEmpty,
        ValidatorKind::HasAlphanumeric,
        ValidatorKind::NoInvalidChars,
        ValidatorKind::SkipTranslated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonEmpty => "non_empty",
            Self::HasAlphanumeric => "has_alphanumeric",
            Self::NoInvalidChars => "no_invalid_chars",
            Self::SkipTranslated => "skip_translated",
        }
    }

    pub fn build(&self) -> Box<dyn EntryValidator> {
        match self {
            Self::NonEmpty => Box::new(NonEmpty),
            Self::HasAlphanumeric => Box::new(HasAlphanumeric),
            Self::NoInvalidChars => Box::new(NoInvalidChars),
            Self::SkipTranslated => Box::new(SkipTranslated),
        }
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidatorKind {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| FactoryError::unknown(Role::Validator, s))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// Only whitespace
    EmptyValue,

    /// No letters or digits at all
    NoAlphanumeric,

    /// NUL or U+FFFD replacement character
    InvalidChars,

    /// The translation file already has text for this key
    AlreadyTranslated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Data validators may consult
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub translations: &'a TranslationIndex,
}

impl<'a> ValidationContext<'a> {
    pub fn new(translations: &'a TranslationIndex) -> Self {
        Self { translations }
    }
}

pub trait EntryValidator: Send + Sync {
    fn kind(&self) -> ValidatorKind;

    fn validate(&self, entry: &ExtractionEntry, ctx: &ValidationContext<'_>) -> Verdict;
}

pub struct NonEmpty;

impl EntryValidator for NonEmpty {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::NonEmpty
    }

    fn validate(&self, entry: &ExtractionEntry, _ctx: &ValidationContext<'_>) -> Verdict {
        if entry.value.trim().is_empty() {
            Verdict::Reject(RejectReason::EmptyValue)
        } else {
            Verdict::Accept
        }
    }
}

pub struct HasAlphanumeric;

impl EntryValidator for HasAlphanumeric {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::HasAlphanumeric
    }

    fn validate(&self, entry: &ExtractionEntry, _ctx: &ValidationContext<'_>) -> Verdict {
        if entry.value.chars().any(char::is_alphanumeric) {
            Verdict::Accept
        } else {
            Verdict::Reject(RejectReason::NoAlphanumeric)
        }
    }
}

pub struct NoInvalidChars;

impl EntryValidator for NoInvalidChars {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::NoInvalidChars
    }

    fn validate(&self, entry: &ExtractionEntry, _ctx: &ValidationContext<'_>) -> Verdict {
        if entry.value.contains(['\0', '\u{FFFD}']) {
            Verdict::Reject(RejectReason::InvalidChars)
        } else {
            Verdict::Accept
        }
    }
}

pub struct SkipTranslated;

impl EntryValidator for SkipTranslated {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::SkipTranslated
    }

    fn validate(&self, entry: &ExtractionEntry, ctx: &ValidationContext<'_>) -> Verdict {
        if ctx.translations.is_translated(&entry.key()) {
            Verdict::Reject(RejectReason::AlreadyTranslated)
        } else {
            Verdict::Accept
        }
    }
}
