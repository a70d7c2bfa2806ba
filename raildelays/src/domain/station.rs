//! Station identity types.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Error returned when parsing an unknown language code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid language: {code} (expected EN, FR or NL)")]
pub struct InvalidLanguage {
    code: String,
}

/// Language in which station names are scraped and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    #[default]
    En,
    Fr,
    Nl,
}

impl Language {
    /// Parse a two-letter language code, ignoring case.
    pub fn parse(s: &str) -> Result<Self, InvalidLanguage> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EN" => Ok(Language::En),
            "FR" => Ok(Language::Fr),
            "NL" => Ok(Language::Nl),
            _ => Err(InvalidLanguage {
                code: s.to_string(),
            }),
        }
    }

    /// Lowercase two-letter code, as used in source URLs.
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Nl => "nl",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A train station, known by up to three names.
///
/// Two stations are the same entity when their identity keys match. The
/// key is the English name with accents stripped and case folded, so
/// `"Liège-Guillemins"` and `"LIEGE-guillemins"` are the same station.
/// Stations observed in a single language only fall back to that name.
///
/// # Examples
///
/// ```
/// use raildelays::domain::Station;
///
/// let a = Station::new("Liège-Guillemins");
/// let b = Station::new("LIEGE-GUILLEMINS");
/// assert_eq!(a, b);
/// assert_eq!(a.key(), "liege-guillemins");
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct Station {
    english_name: String,
    #[serde(default)]
    french_name: String,
    #[serde(default)]
    dutch_name: String,
}

impl Station {
    /// Create a station from its English name.
    pub fn new(english_name: impl Into<String>) -> Self {
        Self {
            english_name: english_name.into(),
            french_name: String::new(),
            dutch_name: String::new(),
        }
    }

    /// Create a station carrying all three names.
    pub fn with_names(
        english_name: impl Into<String>,
        french_name: impl Into<String>,
        dutch_name: impl Into<String>,
    ) -> Self {
        Self {
            english_name: english_name.into(),
            french_name: french_name.into(),
            dutch_name: dutch_name.into(),
        }
    }

    /// Create a station from a name observed in one language.
    pub fn named(name: impl Into<String>, language: Language) -> Self {
        let name = name.into();
        match language {
            Language::En => Self::with_names(name, "", ""),
            Language::Fr => Self::with_names("", name, ""),
            Language::Nl => Self::with_names("", "", name),
        }
    }

    pub fn english_name(&self) -> &str {
        &self.english_name
    }

    pub fn french_name(&self) -> &str {
        &self.french_name
    }

    pub fn dutch_name(&self) -> &str {
        &self.dutch_name
    }

    /// Returns the name in the given language, if one is known.
    pub fn name_in(&self, language: Language) -> Option<&str> {
        let name = match language {
            Language::En => &self.english_name,
            Language::Fr => &self.french_name,
            Language::Nl => &self.dutch_name,
        };
        (!name.trim().is_empty()).then_some(name.as_str())
    }

    /// Returns the name used for identity: English first, then French, then Dutch.
    pub fn primary_name(&self) -> &str {
        self.name_in(Language::En)
            .or_else(|| self.name_in(Language::Fr))
            .or_else(|| self.name_in(Language::Nl))
            .unwrap_or("")
    }

    /// Returns the normalized identity key.
    pub fn key(&self) -> String {
        normalize_name(self.primary_name())
    }
}

/// Strip accents, fold case and trim surrounding whitespace.
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    folded.trim().to_string()
}

impl PartialEq for Station {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Station {}

impl Hash for Station {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Ord for Station {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Station {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Station({})", self.primary_name())
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.primary_name())
    }
}
