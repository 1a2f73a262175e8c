//! URL allow/skip lists.

use std::sync::Arc;

/// A small fixed list of URL fragments.
///
/// A URL matches when it contains any of the fragments. This is what the
/// auth allow-list and the cache/loading skip-lists use.
///
/// # Example
///
/// ```
/// use relay::PathMatcher;
///
/// let public = PathMatcher::new(["/api/auth/login", "/api/public"]);
/// assert!(public.matches("https://shop.example.com/api/auth/login"));
/// assert!(!public.matches("https://shop.example.com/api/protected"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatcher {
    fragments: Arc<[String]>,
}

impl PathMatcher {
    /// Create a matcher from URL fragments.
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if `url` contains any of the fragments.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.fragments
            .iter()
            .any(|fragment| url.contains(fragment.as_str()))
    }

    /// The configured fragments.
    #[must_use]
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }
}
