//! Markup normalization
//!
//! Rewrites captured markup into a canonical form before diffing so that
//! expected environment differences (host names, CSP nonces) do not count
//! as divergence. Normalization is pure string rewriting and never fails.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// Placeholder substituted for every base URL occurrence
pub const BASE_URL_PLACEHOLDER: &str = "__BASE_URL__";

/// Redacted nonce attribute
pub const NONCE_PLACEHOLDER: &str = r#"nonce="__NONCE__""#;

static NONCE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"nonce=(?:"[^"]*"|'[^']*')"#).expect("nonce pattern is valid")
});

/// Normalize markup against a set of base URLs
///
/// Returns the input unchanged when `strict` is set.
#[must_use]
pub fn normalize(markup: &str, base_urls: &[&str], strict: bool) -> String {
    Normalizer::new(base_urls, strict).normalize(markup)
}

/// Reusable normalizer with its URL matcher compiled once
#[derive(Debug, Clone)]
pub struct Normalizer {
    strict: bool,
    /// URL forms, longest first
    forms: Vec<String>,
    matcher: Option<Regex>,
}

impl Normalizer {
    /// Create normalizer for the given base URLs
    ///
    /// Empty URLs are ignored. Each URL is matched both as given and with
    /// its trailing slash toggled.
    #[must_use]
    pub fn new(base_urls: &[&str], strict: bool) -> Self {
        let mut forms: Vec<String> = base_urls
            .iter()
            .filter(|url| !url.is_empty())
            .flat_map(|url| [(*url).to_string(), toggle_trailing_slash(url)])
            .filter(|form| !form.is_empty())
            .collect();
        forms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        forms.dedup();

        let matcher = if forms.is_empty() {
            None
        } else {
            let pattern = forms
                .iter()
                .map(|form| regex::escape(form))
                .collect::<Vec<_>>()
                .join("|");
            match Regex::new(&pattern) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::debug!(%err, "base URL matcher unavailable, using literal replacement");
                    None
                }
            }
        };

        Self {
            strict,
            forms,
            matcher,
        }
    }

    /// Check if normalization is disabled
    #[inline]
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Normalize one markup blob
    #[must_use]
    pub fn normalize(&self, markup: &str) -> String {
        if self.strict {
            return markup.to_string();
        }

        let rewritten: Cow<'_, str> = match &self.matcher {
            Some(re) => re.replace_all(markup, BASE_URL_PLACEHOLDER),
            None if self.forms.is_empty() => Cow::Borrowed(markup),
            None => {
                let mut out = markup.to_string();
                for form in &self.forms {
                    out = out.replace(form.as_str(), BASE_URL_PLACEHOLDER);
                }
                Cow::Owned(out)
            }
        };

        NONCE_ATTR
            .replace_all(&rewritten, NONCE_PLACEHOLDER)
            .into_owned()
    }
}

fn toggle_trailing_slash(url: &str) -> String {
    match url.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => format!("{url}/"),
    }
}
