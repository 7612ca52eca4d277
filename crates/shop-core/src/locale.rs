//! Supported storefront locales.

use serde::{Deserialize, Serialize};

/// Locales the storefront renders and emails in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Fr,
}

impl Locale {
    /// All supported locales
    pub const SUPPORTED: [Locale; 2] = [Locale::En, Locale::Fr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Fr => "fr",
        }
    }

    /// Parse a locale tag; `None` when it is not supported
    pub fn parse(tag: &str) -> Option<Self> {
        Self::SUPPORTED
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(tag.trim()))
    }

    /// Pick the locale recorded on an event, falling back to the default
    pub fn resolve(tag: Option<&str>) -> Self {
        tag.and_then(Self::parse).unwrap_or_default()
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::En
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
