//! Document body and markup classification.

use regex::Regex;
use std::sync::LazyLock;

/// Default body mime type.
pub const DEFAULT_MIME_TYPE: &str = "text/html";

/// Matches a markup tag, comment, or processing instruction.
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<!\[CDATA\[|\]\]>|<[^>]*>").unwrap_or_else(|_| unreachable!())
});

/// Matches a character or named entity reference.
static ENTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap_or_else(|_| unreachable!())
});

/// The text payload of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    /// Mime type of `text`.
    pub mime_type: String,
    /// Raw body text.
    pub text: String,
    /// Include the body in the full-text index.
    pub indexable: bool,
    /// Hint that `text` is itself a nested structured document.
    pub parseable: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            text: String::new(),
            indexable: true,
            parseable: false,
        }
    }
}

impl Body {
    /// Creates an indexable body with the given mime type and text.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Creates a `text/plain` body.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new("text/plain", text)
    }

    /// Creates a `text/html` body.
    #[must_use]
    pub fn html(text: impl Into<String>) -> Self {
        Self::new(DEFAULT_MIME_TYPE, text)
    }

    /// Sets the indexable flag.
    #[must_use]
    pub const fn indexable(mut self, indexable: bool) -> Self {
        self.indexable = indexable;
        self
    }

    /// Sets the parseable flag.
    #[must_use]
    pub const fn parseable(mut self, parseable: bool) -> Self {
        self.parseable = parseable;
        self
    }

    /// Returns true for tagged text (xml, html, xhtml).
    #[must_use]
    pub fn is_tagged(&self) -> bool {
        is_tagged_mime_type(&self.mime_type)
    }

    /// Returns the text to feed the full-text index, if any.
    ///
    /// Tagged bodies have their markup stripped and entities decoded;
    /// plaintext is returned as is.
    #[must_use]
    pub fn indexable_text(&self) -> Option<String> {
        if !self.indexable || self.text.is_empty() {
            return None;
        }
        if self.is_tagged() {
            Some(strip_markup(&self.text))
        } else {
            Some(self.text.clone())
        }
    }
}

/// Returns true if the mime type denotes tagged text.
#[must_use]
pub fn is_tagged_mime_type(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.contains("xml") || essence.contains("html")
}

/// Removes markup from tagged text and decodes entity references.
#[must_use]
pub fn strip_markup(text: &str) -> String {
    let without_tags = TAG_PATTERN.replace_all(text, " ");
    let decoded = ENTITY_PATTERN.replace_all(&without_tags, |caps: &regex::Captures<'_>| {
        decode_entity(&caps[1]).map_or_else(|| caps[0].to_string(), String::from)
    });
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = entity.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32);
    }
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}
