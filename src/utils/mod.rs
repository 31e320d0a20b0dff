//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Resolve a page name against the index base URL.
///
/// Page names may contain characters such as parentheses; they are kept as
/// given apart from the percent-encoding `Url` applies.
pub fn page_url(base: &Url, page: &str) -> crate::error::Result<Url> {
    Ok(base.join(page)?)
}

/// Parse a base URL, making sure it ends with a slash so joins append.
pub fn base_url(raw: &str) -> crate::error::Result<Url> {
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{raw}/"))?)
    }
}
