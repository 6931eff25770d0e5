//! Languages offered for translation.

use serde::Serialize;

/// A supported language: ISO 639-1 code and English display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

const LANGUAGES: &[Language] = &[
    Language { code: "en", name: "English" },
    Language { code: "es", name: "Spanish" },
    Language { code: "fr", name: "French" },
    Language { code: "de", name: "German" },
    Language { code: "it", name: "Italian" },
    Language { code: "pt", name: "Portuguese" },
    Language { code: "zh", name: "Chinese" },
    Language { code: "ja", name: "Japanese" },
    Language { code: "ko", name: "Korean" },
    Language { code: "ar", name: "Arabic" },
    Language { code: "hi", name: "Hindi" },
    Language { code: "ru", name: "Russian" },
];

impl Language {
    pub fn all() -> &'static [Language] {
        LANGUAGES
    }

    /// Look up a language by code, case-insensitively.
    pub fn from_code(code: &str) -> Option<Language> {
        let code = code.trim();
        LANGUAGES
            .iter()
            .find(|l| l.code.eq_ignore_ascii_case(code))
            .copied()
    }

    /// Languages a document written in `source` can be translated into.
    pub fn targets_for(source: &str) -> impl Iterator<Item = &'static Language> + '_ {
        LANGUAGES
            .iter()
            .filter(move |l| !l.code.eq_ignore_ascii_case(source.trim()))
    }
}
