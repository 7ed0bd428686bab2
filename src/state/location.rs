//! Location Module - current path, host and query parameters.
//!
//! The provider keeps the current [`Location`] in a signal so effects
//! reading it re-run on navigation. The runtime snapshots it into each
//! node's render context at the start of every pass.
//!
//! # Example
//!
//! ```ignore
//! let location = Location::parse("https://example.com/items?page=2");
//! assert_eq!(location.path, "/items");
//! let page: Option<u32> = location.param("page")?;
//! ```

use std::str::FromStr;

use spark_signals::{signal, Signal};

use crate::error::DataError;

// =============================================================================
// LOCATION
// =============================================================================

/// Snapshot of where the application is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub host: String,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Location {
    /// Parse an absolute URL or a path with optional query.
    pub fn parse(href: &str) -> Self {
        let href = href.split('#').next().unwrap_or_default();
        let (before_query, query) = match href.split_once('?') {
            Some((head, query)) => (head, query),
            None => (href, ""),
        };

        let (host, path) = match before_query.split_once("://") {
            Some((_, rest)) => match rest.find('/') {
                Some(slash) => (&rest[..slash], &rest[slash..]),
                None => (rest, "/"),
            },
            None => ("", before_query),
        };

        let path = if path.is_empty() { "/" } else { path };

        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect();

        Self { host: host.to_string(), path: path.to_string(), query }
    }

    /// Resolve an in-app `href` against this location. A path-only href
    /// keeps the current host.
    pub fn join(&self, href: &str) -> Self {
        let mut next = Self::parse(href);
        if next.host.is_empty() {
            next.host = self.host.clone();
        }
        next
    }

    /// Raw value of the first query parameter with this name.
    pub fn raw_param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Typed query parameter. A present but malformed value is a
    /// [`DataError::Param`].
    pub fn param<T: FromStr>(&self, name: &str) -> Result<Option<T>, DataError> {
        match self.raw_param(name) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| DataError::Param {
                name: name.to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

// =============================================================================
// PROVIDER
// =============================================================================

/// Holds the current location.
pub struct LocationProvider {
    current: Signal<Location>,
}

impl LocationProvider {
    pub fn new(initial: Location) -> Self {
        Self { current: signal(initial) }
    }

    pub fn current(&self) -> Location {
        self.current.get()
    }

    /// Replace the location. Returns false if nothing changed.
    pub fn set(&self, location: Location) -> bool {
        if self.current.get() == location {
            return false;
        }
        self.current.set(location);
        true
    }
}

impl Default for LocationProvider {
    fn default() -> Self {
        Self::new(Location::parse("/"))
    }
}

impl std::fmt::Debug for LocationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationProvider").field("current", &self.current()).finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute() {
        let loc = Location::parse("https://example.com/items/4?page=2&sort=asc#top");
        assert_eq!(loc.host, "example.com");
        assert_eq!(loc.path, "/items/4");
        assert_eq!(loc.raw_param("page"), Some("2"));
        assert_eq!(loc.raw_param("sort"), Some("asc"));
    }

    #[test]
    fn test_parse_relative() {
        let loc = Location::parse("/about?flag");
        assert_eq!(loc.host, "");
        assert_eq!(loc.path, "/about");
        assert_eq!(loc.raw_param("flag"), Some(""));

        assert_eq!(Location::parse("").path, "/");
        assert_eq!(Location::parse("http://host").path, "/");
    }

    #[test]
    fn test_join_keeps_host() {
        let base = Location::parse("https://example.com/start?x=1");
        let next = base.join("/next?y=2");
        assert_eq!(next.host, "example.com");
        assert_eq!(next.path, "/next");
        assert_eq!(next.raw_param("y"), Some("2"));
        assert_eq!(next.raw_param("x"), None);

        let other = base.join("https://other.org/a");
        assert_eq!(other.host, "other.org");
    }

    #[test]
    fn test_typed_param() {
        let loc = Location::parse("/list?page=3&size=big");
        assert_eq!(loc.param::<u32>("page"), Ok(Some(3)));
        assert_eq!(loc.param::<u32>("missing"), Ok(None));
        assert_eq!(
            loc.param::<u32>("size"),
            Err(DataError::Param { name: "size".into(), value: "big".into() })
        );
    }

    #[test]
    fn test_provider_set() {
        let provider = LocationProvider::default();
        assert_eq!(provider.current().path, "/");
        assert!(provider.set(Location::parse("/next")));
        assert!(!provider.set(Location::parse("/next")));
        assert_eq!(provider.current().path, "/next");
    }
}
