//! Structured composite cache keys.

use std::fmt;

/// Deterministic cache key built from a namespace and an ordered field list.
///
/// Renders as `namespace:name=value:name=value`. Separators and glob
/// metacharacters inside components are percent-escaped, so two different
/// field lists never render to the same key and a rendered key never matches
/// a pattern by accident.
///
/// ```
/// use ballast::domain::CacheKey;
///
/// let key = CacheKey::new("candles")
///     .field("symbol", "BTC:USDT")
///     .field("interval", "1h");
/// assert_eq!(key.as_str(), "candles:symbol=BTC%3AUSDT:interval=1h");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    rendered: String,
}

impl CacheKey {
    #[must_use]
    pub fn new(namespace: &str) -> Self {
        let mut rendered = String::with_capacity(namespace.len() + 16);
        escape_into(&mut rendered, namespace);
        Self { rendered }
    }

    /// Append a named field. Order is significant.
    #[must_use]
    pub fn field(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.rendered.push(':');
        escape_into(&mut self.rendered, name);
        self.rendered.push('=');
        escape_into(&mut self.rendered, &value.to_string());
        self
    }

    /// Glob pattern matching every key built from `namespace`.
    #[must_use]
    pub fn namespace_pattern(namespace: &str) -> String {
        let mut pattern = String::with_capacity(namespace.len() + 2);
        escape_into(&mut pattern, namespace);
        pattern.push_str(":*");
        pattern
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

/// Append `component` with separators and glob metacharacters percent-escaped.
pub(crate) fn escape_into(out: &mut String, component: &str) {
    for ch in component.chars() {
        match ch {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '=' => out.push_str("%3D"),
            '*' => out.push_str("%2A"),
            '?' => out.push_str("%3F"),
            '[' => out.push_str("%5B"),
            ']' => out.push_str("%5D"),
            '\\' => out.push_str("%5C"),
            c => out.push(c),
        }
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.rendered
    }
}
