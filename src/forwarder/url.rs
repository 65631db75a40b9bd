//! URL rewriting between the mirror and the upstream.
//!
//! Paths and query strings are spliced as raw text: nothing is decoded on
//! the way through. The only re-encoding is what URL parsing applies to
//! characters outside the URL code points (`{`, `}`, `'` in queries, ...).

use thiserror::Error;
use url::Url;

/// Prefix under which the mirror exposes the upstream.
pub const API_PREFIX: &str = "/api";

/// Build the upstream URL for an inbound path and raw query.
///
/// An absent or empty query produces no trailing `?`.
pub fn upstream_url(base: &str, path: &str, query: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    let mut url = String::with_capacity(base.len() + path.len() + 2);
    url.push_str(base);
    url.push('/');
    url.push_str(path);

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Extract the forwarded segment from an inbound request path.
///
/// `/api/list` yields `list`, `/api` and `/api/` yield an empty path,
/// anything outside the prefix (including `/apix`) yields `None`.
pub fn api_path(request_path: &str) -> Option<&str> {
    let rest = request_path.strip_prefix(API_PREFIX)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}

/// True when any path segment is `.` or `..`, percent-encoded or not.
///
/// Such segments would be resolved away by URL parsing and could walk out of
/// the upstream base path.
pub fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

/// True when `target` has the origin of `base` and stays under its path.
pub fn within_base(base: &Url, target: &Url) -> bool {
    if base.origin() != target.origin() {
        return false;
    }

    let base_path = base.path().trim_end_matches('/');
    match target.path().strip_prefix(base_path) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// The URL with its query replaced by a marker, for logging.
pub fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((head, _)) => format!("{}?<redacted>", head),
        None => url.to_string(),
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid URL: {0}")]
    Parse(#[from] url::ParseError),

    #[error("'{url}' is not served by upstream {upstream}")]
    ForeignOrigin { url: String, upstream: String },
}

/// Rewrite an original upstream URL into the equivalent mirror URL.
///
/// The upstream origin (and base path) is replaced by `<mirror_base>/api`;
/// the remaining path and the query string are kept untouched.
pub fn mirror_url_for(
    upstream_base: &str,
    mirror_base: &str,
    original: &str,
) -> Result<String, ConvertError> {
    let upstream = Url::parse(upstream_base)?;
    let target = Url::parse(original)?;

    let foreign = || ConvertError::ForeignOrigin {
        url: original.to_string(),
        upstream: upstream_base.to_string(),
    };

    if upstream.origin() != target.origin() {
        return Err(foreign());
    }

    let base_path = upstream.path().trim_end_matches('/');
    let rest = target.path().strip_prefix(base_path).ok_or_else(foreign)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return Err(foreign());
    }

    let rest = rest.trim_start_matches('/');
    let mut mirrored = upstream_url(
        &format!("{}{}", mirror_base.trim_end_matches('/'), API_PREFIX),
        rest,
        target.query(),
    );
    if rest.is_empty() && target.query().is_none() {
        mirrored.pop();
    }
    Ok(mirrored)
}
