use url::Url;

/// Resolves an image or link reference found in a page
///
/// Protocol-relative references get `https:`, relative ones are joined to
/// the page URL, and `data:` URIs or non-HTTP schemes are dropped.
///
/// # Arguments
///
/// * `raw` - The attribute value as found in the HTML
/// * `base` - The URL of the page the value was found on
///
/// # Returns
///
/// * `Some(String)` - An absolute HTTP(S) URL
/// * `None` - Empty input, a `data:` URI, or an unusable reference
pub fn absolutize(raw: &str, base: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return None;
    }

    let resolved = if let Some(rest) = raw.strip_prefix("//") {
        Url::parse(&format!("https://{}", rest)).ok()?
    } else {
        base.join(raw).ok()?
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Drops the query string and fragment of a URL
pub fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Replaces the whole query string of a URL
///
/// An empty `query` simply strips the existing one.
pub fn replace_query(url: &str, query: &str) -> String {
    let base = strip_query(url);
    let query = query.trim_start_matches('?');
    if query.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, query)
    }
}

/// Sets query parameters on a URL, replacing existing values of the same keys
///
/// Parameters that are not overridden keep their position; new ones are
/// appended in the given order.
pub fn set_query_params(url: &str, params: &[(&str, &str)]) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(url)?;
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !params.iter().any(|(name, _)| name == key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    {
        let mut pairs = parsed.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }

    Ok(parsed.to_string())
}
