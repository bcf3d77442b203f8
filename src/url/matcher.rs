/// Checks if a host belongs to a configured domain
///
/// Patterns match the host itself and any of its subdomains. A leading
/// `*.` is accepted and means the same thing.
///
/// # Arguments
///
/// * `pattern` - The configured domain, e.g. `uniqlo.com` or `*.uniqlo.com`
/// * `host` - The lowercase host of a request
///
/// # Examples
///
/// ```
/// use catalog_sweep::url::host_matches;
///
/// assert!(host_matches("uniqlo.com", "uniqlo.com"));
/// assert!(host_matches("uniqlo.com", "image.uniqlo.com"));
/// assert!(host_matches("*.uniqlo.com", "www.uniqlo.com"));
/// assert!(!host_matches("uniqlo.com", "notuniqlo.com"));
/// ```
pub fn host_matches(pattern: &str, host: &str) -> bool {
    let base = pattern.strip_prefix("*.").unwrap_or(pattern);
    if base.is_empty() {
        return false;
    }

    let (host, base) = (host.as_bytes(), base.as_bytes());
    if host.eq_ignore_ascii_case(base) {
        return true;
    }

    let split = match host.len().checked_sub(base.len() + 1) {
        Some(split) => split,
        None => return false,
    };
    host[split] == b'.' && host[split + 1..].eq_ignore_ascii_case(base)
}
