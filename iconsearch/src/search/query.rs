//! Search query validation and matching.

use std::fmt;

use super::SearchError;

/// Minimum query length, in characters.
///
/// One-character queries match most of a folder and make every search
/// resolve hundreds of addresses.
pub const MIN_QUERY_LEN: usize = 2;

/// A validated search query.
///
/// Matching is a case-sensitive substring test on the handle name; the query
/// is used exactly as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    /// Validate a raw query.
    pub fn parse(raw: &str) -> Result<Self, SearchError> {
        let len = raw.chars().count();
        if len < MIN_QUERY_LEN {
            return Err(SearchError::QueryTooShort {
                len,
                min: MIN_QUERY_LEN,
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// Whether a filename matches.
    pub fn matches(&self, name: &str) -> bool {
        name.contains(self.0.as_str())
    }

    /// The query text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
