//! Query text preprocessing.
//!
//! Pure, allocation-light transforms applied before any strategy runs:
//!
//! - [`normalize`]: lowercase, strip trailing punctuation, collapse whitespace.
//! - [`validate`]: reject empty, too-short, or symbol-only input.
//! - [`convert_layout`]: remap text typed on a US keyboard as if the Russian
//!   ЙЦУКЕН layout had been active (`"vjkbndf"` → `"молитва"`).
//! - [`transliterate`]: Cyrillic → Latin, for callers doing cross-script matching.
//!
//! # Example
//!
//! ```
//! use pg_smart_search::search::normalize::{convert_layout, normalize, validate};
//!
//! assert_eq!(normalize("  Prayer   TIMES?! ").as_str(), "prayer times");
//! assert!(validate("ab").is_valid());
//! assert_eq!(convert_layout("hfvflfy"), "рамадан");
//! ```

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Punctuation stripped from the end of a query.
pub const TRAILING_PUNCTUATION: [char; 6] = ['.', ',', '!', '?', ';', ':'];

/// Minimum trimmed length (in characters) of a searchable query.
pub const MIN_QUERY_CHARS: usize = 2;

/// US QWERTY key sequence, lower row then shifted row.
const LATIN_KEYS: &str = "qwertyuiop[]asdfghjkl;'zxcvbnm,./QWERTYUIOP{}ASDFGHJKL:\"ZXCVBNM<>?";
/// Characters the same physical keys produce on the Russian layout.
const CYRILLIC_KEYS: &str = "йцукенгшщзхъфывапролджэячсмитьбю.ЙЦУКЕНГШЩЗХЪФЫВАПРОЛДЖЭЯЧСМИТЬБЮ,";

static LAYOUT_MAP: Lazy<HashMap<char, char>> =
    Lazy::new(|| LATIN_KEYS.chars().zip(CYRILLIC_KEYS.chars()).collect());

/// A query after [`normalize`]. Strategies and cache keys only ever see this form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedQuery(String);

impl NormalizedQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Character count (not bytes).
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// Number of space-delimited words.
    pub fn word_count(&self) -> usize {
        self.0.split(' ').count()
    }
}

impl fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedQuery {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize raw query text.
///
/// Lowercases, drops any run of trailing punctuation (`. , ! ? ; :`) together
/// with surrounding whitespace, and collapses internal whitespace runs to a
/// single space. The output is a fixed point: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> NormalizedQuery {
    let lowered = raw.to_lowercase();
    let stripped = lowered
        .trim_end_matches(|c: char| c.is_whitespace() || TRAILING_PUNCTUATION.contains(&c));
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    NormalizedQuery(collapsed)
}

/// Why a query was rejected by [`validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    Empty,
    TooShort,
    NoValidChars,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::TooShort => write!(f, "too_short"),
            Self::NoValidChars => write!(f, "no_valid_chars"),
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Validation {
    pub reason: Option<InvalidReason>,
}

impl Validation {
    fn rejected(reason: InvalidReason) -> Self {
        Self {
            reason: Some(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.reason.is_none()
    }
}

/// Check whether raw query text is worth sending to a backend.
pub fn validate(raw: &str) -> Validation {
    if raw.is_empty() {
        return Validation::rejected(InvalidReason::Empty);
    }
    let trimmed = raw.trim();
    if trimmed.chars().count() < MIN_QUERY_CHARS {
        return Validation::rejected(InvalidReason::TooShort);
    }
    if !trimmed.chars().any(is_searchable_char) {
        return Validation::rejected(InvalidReason::NoValidChars);
    }
    Validation::default()
}

/// Latin letters/digits, Cyrillic letters, or any Arabic-block code point.
fn is_searchable_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || (('\u{0400}'..='\u{04FF}').contains(&c) && c.is_alphabetic())
        || ('\u{0600}'..='\u{06FF}').contains(&c)
}

/// Re-type `text` as if the Russian keyboard layout had been active.
///
/// Case is preserved by the table itself (shifted keys map to upper-case
/// Cyrillic). Characters without a key mapping pass through unchanged.
pub fn convert_layout(text: &str) -> String {
    text.chars()
        .map(|c| LAYOUT_MAP.get(&c).copied().unwrap_or(c))
        .collect()
}

/// True when the query could plausibly be Russian typed on a Latin layout:
/// only ASCII letters, digits, whitespace, and basic punctuation.
pub fn is_layout_candidate(query: &str) -> bool {
    !query.is_empty()
        && query.chars().all(|c| {
            c.is_ascii_alphanumeric() || c.is_whitespace() || TRAILING_PUNCTUATION.contains(&c)
        })
}

/// Lowercase and transliterate Cyrillic letters to Latin.
pub fn transliterate(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        match cyrillic_to_latin(c) {
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

fn cyrillic_to_latin(c: char) -> Option<&'static str> {
    let latin = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    };
    Some(latin)
}
