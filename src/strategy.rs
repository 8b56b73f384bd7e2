//! Cache-control decision for read operations.
//!
//! Reads honor a single directive taken from the `Cache-Control` request
//! header:
//!
//! | Header value      | Strategy         | Cache hit  | Cache miss            |
//! |-------------------|------------------|------------|-----------------------|
//! | `must-revalidate` | `MustRevalidate` | ignored    | store, then refresh   |
//! | anything else     | `PreferCache`    | returned   | store, then populate  |
//!
//! ```
//! use carrent_core::strategy::CacheControl;
//!
//! assert_eq!(CacheControl::from("must-revalidate"), CacheControl::MustRevalidate);
//! assert_eq!(CacheControl::from(""), CacheControl::PreferCache);
//! assert_eq!(CacheControl::from("no-cache"), CacheControl::PreferCache);
//! ```

/// Header value forcing a store read.
pub const MUST_REVALIDATE: &str = "must-revalidate";

/// Strategy for a single read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheControl {
    /// Cache first; the store is only queried on a miss.
    ///
    /// Flow:
    /// 1. Check cache
    /// 2. If hit: return cached value
    /// 3. If miss: fetch from store
    /// 4. Delete then set the cache entry
    /// 5. Return value
    #[default]
    PreferCache,

    /// Always query the store and rewrite the cache entry.
    ///
    /// Flow:
    /// 1. Fetch from store
    /// 2. Delete then set the cache entry
    /// 3. Return value
    MustRevalidate,
}

impl CacheControl {
    /// Parse a raw `Cache-Control` header value. Only an exact
    /// `must-revalidate` forces revalidation.
    pub fn parse(header: &str) -> Self {
        if header == MUST_REVALIDATE {
            CacheControl::MustRevalidate
        } else {
            CacheControl::PreferCache
        }
    }

    pub fn must_revalidate(self) -> bool {
        self == CacheControl::MustRevalidate
    }
}

impl From<&str> for CacheControl {
    fn from(header: &str) -> Self {
        CacheControl::parse(header)
    }
}

impl From<Option<&str>> for CacheControl {
    fn from(header: Option<&str>) -> Self {
        header.map_or(CacheControl::PreferCache, CacheControl::parse)
    }
}

impl std::fmt::Display for CacheControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheControl::PreferCache => write!(f, "PreferCache"),
            CacheControl::MustRevalidate => write!(f, "MustRevalidate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefers_cache() {
        assert_eq!(CacheControl::default(), CacheControl::PreferCache);
        assert!(!CacheControl::default().must_revalidate());
    }

    #[test]
    fn test_parse_is_exact() {
        assert!(CacheControl::parse("must-revalidate").must_revalidate());
        assert!(!CacheControl::parse("Must-Revalidate").must_revalidate());
        assert!(!CacheControl::parse("max-age=0, must-revalidate").must_revalidate());
        assert!(!CacheControl::from(None).must_revalidate());
        assert!(CacheControl::from(Some(MUST_REVALIDATE)).must_revalidate());
    }

    #[test]
    fn test_display() {
        assert_eq!(CacheControl::MustRevalidate.to_string(), "MustRevalidate");
    }
}
