//! URL helpers: resolution, origin comparison, normalisation.

use url::Url;

/// Resolve `href` against `base`. Absolute hrefs ignore the base.
pub fn resolve(base: &str, href: &str) -> Option<Url> {
    match Url::parse(href) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(href).ok(),
        Err(_) => None,
    }
}

/// True when both URLs parse and share scheme, host and port.
pub fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

/// Whether `href`, as seen from `page_url`, leaves the page's origin.
///
/// Non-web schemes (`mailto:`, `tel:`, `javascript:`) count as external;
/// hrefs that cannot be resolved do not.
pub fn is_external(page_url: &str, href: &str) -> bool {
    match resolve(page_url, href) {
        Some(target) => {
            !matches!(target.scheme(), "http" | "https") || !same_origin(page_url, target.as_str())
        }
        None => false,
    }
}

/// Canonical form used for visited-set membership: fragment dropped, trailing
/// slash trimmed from non-root paths.
pub fn normalize_url(url: &str) -> Option<String> {
    let mut url = Url::parse(url).ok()?;
    url.set_fragment(None);
    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }
    Some(url.to_string())
}

/// Path component for route comparison. Accepts full URLs or bare paths;
/// query and fragment are dropped, a trailing slash is trimmed, and the
/// empty path becomes `/`.
pub fn normalize_path(url_or_path: &str) -> String {
    let path = match Url::parse(url_or_path) {
        Ok(url) => url.path().to_string(),
        Err(_) => url_or_path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
