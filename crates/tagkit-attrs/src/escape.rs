//! # Escaping
//!
//! Attribute keys and values that come from template data are untrusted. Every
//! fragment that ends up between `<` and `>` goes through an [`Escaper`], except
//! content that was explicitly wrapped in a [`SafeString`].
//!
//! The escaper is a capability that the caller passes in. Nothing in this crate
//! looks it up from a global registry.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::fmt;

/// String whose content is emitted verbatim, bypassing escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SafeString(String);

impl SafeString {
    pub fn new(html: impl Into<String>) -> Self {
        SafeString(html.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SafeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<SafeString> for String {
    fn from(safe: SafeString) -> Self {
        safe.0
    }
}

/// The escape and mark-safe pair that a render context supplies.
///
/// Both operations are required. There is no no-op fallback: an integration
/// that cannot provide them must fail instead of emitting unescaped markup.
pub trait Escaper: Send + Sync {
    /// Escape untrusted text for inclusion in markup.
    fn escape(&self, text: &str) -> String;

    /// Wrap already-rendered markup so that later escaping passes leave it alone.
    fn mark_safe(&self, html: String) -> SafeString;
}

/// Escapes the five HTML-significant characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlEscaper;

impl Escaper for HtmlEscaper {
    fn escape(&self, text: &str) -> String {
        escape_html(text)
    }

    fn mark_safe(&self, html: String) -> SafeString {
        SafeString::new(html)
    }
}

/// `&`, `"`, `'`, `<` and `>` become `&amp;`, `&quot;`, `&#39;`, `&lt;` and `&gt;`.
pub fn escape_html(text: &str) -> String {
    lazy_static! {
        static ref HTML_SPECIAL: Regex = Regex::new(r#"[&"'<>]"#).unwrap();
    }

    HTML_SPECIAL
        .replace_all(text, |caps: &Captures| match &caps[0] {
            "&" => "&amp;",
            "\"" => "&quot;",
            "'" => "&#39;",
            "<" => "&lt;",
            ">" => "&gt;",
            other => unreachable!("Unexpected HTML special character {:?}", other),
        })
        .into_owned()
}
