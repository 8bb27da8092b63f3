//! Internationalization (i18n) of report text using Fluent
//!
//! Only the human-readable run report is translated; log lines stay in
//! English.
//!
//! Currently supported locales:
//! - `en-US` - English (United States) - default
//! - `qaa` - Pirate speak (ISO 639-2 private-use code)

use fluent::{FluentBundle, FluentResource};
use std::sync::{LazyLock, RwLock};
use unic_langid::LanguageIdentifier;

/// Errors that can occur during internationalization operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum I18nError {
    /// The locale lock is poisoned (another thread panicked while holding the lock)
    LockPoisoned,
}

impl std::fmt::Display for I18nError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LockPoisoned => write!(f, "locale lock is poisoned"),
        }
    }
}

impl std::error::Error for I18nError {}

const EN_US: &str = "en-US";

/// Pirate language identifier (qaa is reserved for private use per ISO 639-2)
const EN_X_PIRATE: &str = "qaa";

static EN_US_FTL: &str = include_str!("../locales/en-US/main.ftl");

static X_PIRATE_FTL: &str = include_str!("../locales/qaa/main.ftl");

/// Current active locale
static CURRENT_LOCALE: LazyLock<RwLock<String>> = LazyLock::new(|| RwLock::new(EN_US.to_string()));

/// Build a bundle for `locale`
///
/// # Panics
/// Panics if the locale identifier or the bundled FTL text is malformed. Both
/// are compile-time constants covered by the tests below.
#[allow(clippy::expect_used)]
fn create_bundle(locale: &str, ftl_string: &'static str) -> FluentBundle<FluentResource> {
    let langid: LanguageIdentifier = locale.parse().expect("Failed to parse language identifier");
    let resource =
        FluentResource::try_new(ftl_string.to_string()).expect("Failed to parse fluent resource");

    let mut bundle = FluentBundle::new(vec![langid]);
    bundle
        .add_resource(resource)
        .expect("Failed to add fluent resource");

    bundle
}

fn get_ftl_for_locale(locale: &str) -> &'static str {
    match locale {
        EN_X_PIRATE => X_PIRATE_FTL,
        _ => EN_US_FTL,
    }
}

/// Supported languages for report output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Pirate,
}

impl Language {
    /// BCP 47 locale identifier for this language
    #[must_use]
    pub const fn locale_id(self) -> &'static str {
        match self {
            Self::English => EN_US,
            Self::Pirate => EN_X_PIRATE,
        }
    }
}

/// Set the language used by all subsequent translations
pub fn set_language(lang: Language) {
    if let Ok(mut current) = CURRENT_LOCALE.write() {
        *current = lang.locale_id().to_string();
    }
}

/// Translatable report messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::missing_docs_in_private_items)]
pub enum TranslationKey {
    ReportStart,
    ReportTo,
    ReportRemoving,
    ReportAdding,
    ReportUpdating,
    ReportDryRun,
    StatusComplete,
    StatusPartial,
    ErrorRootsRequired,
}

impl TranslationKey {
    /// Every key, for coverage checks
    pub const ALL: [Self; 9] = [
        Self::ReportStart,
        Self::ReportTo,
        Self::ReportRemoving,
        Self::ReportAdding,
        Self::ReportUpdating,
        Self::ReportDryRun,
        Self::StatusComplete,
        Self::StatusPartial,
        Self::ErrorRootsRequired,
    ];

    const fn message_id(self) -> &'static str {
        match self {
            Self::ReportStart => "report-start",
            Self::ReportTo => "report-to",
            Self::ReportRemoving => "report-removing",
            Self::ReportAdding => "report-adding",
            Self::ReportUpdating => "report-updating",
            Self::ReportDryRun => "report-dry-run",
            Self::StatusComplete => "status-complete",
            Self::StatusPartial => "status-partial",
            Self::ErrorRootsRequired => "error-roots-required",
        }
    }

    /// Translated string in the current language
    ///
    /// # Errors
    /// Returns `I18nError::LockPoisoned` if the locale lock is poisoned
    pub fn get(self) -> Result<String, I18nError> {
        let locale = CURRENT_LOCALE.read().map_err(|_| I18nError::LockPoisoned)?;
        Ok(self.translate(locale.as_str()))
    }

    /// Translated string in a specific locale
    #[must_use]
    pub fn translate(self, locale: &str) -> String {
        let bundle = create_bundle(locale, get_ftl_for_locale(locale));
        let msg_id = self.message_id();

        if let Some(pattern) = bundle.get_message(msg_id).and_then(|m| m.value()) {
            let mut errors = vec![];
            return bundle.format_pattern(pattern, None, &mut errors).to_string();
        }

        format!("[Missing translation: {msg_id}]")
    }

    /// Translated string in the current language, falling back to English
    #[must_use]
    pub fn text(self) -> String {
        self.get().unwrap_or_else(|_| self.translate(EN_US))
    }
}
