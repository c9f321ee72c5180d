use url::Url;

/// Query parameters that never identify an item
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "yclid",
    "mc_eid",
    "_ga",
    "ref",
];

/// Canonicalizes an item link so equivalent addresses compare equal
///
/// # Canonicalization Steps
///
/// 1. Parse the link; reject if malformed or not http(s)
/// 2. Lowercase the host and remove a `www.` prefix
/// 3. Remove dot segments, duplicate slashes and the trailing slash
/// 4. Remove the fragment
/// 5. Remove tracking query parameters and sort the remaining ones
///
/// The scheme is kept as is; affiliate sites serve the same item over both.
///
/// # Examples
///
/// ```
/// use catalog_sweep::identity::canonicalize_link;
///
/// let link = canonicalize_link("https://WWW.Shop.test/ad/12/?utm_source=x#top").unwrap();
/// assert_eq!(link, "https://shop.test/ad/12");
/// ```
pub fn canonicalize_link(link: &str) -> Option<String> {
    let mut url = Url::parse(link.trim()).ok()?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host)).ok()?;

    let path = normalize_path(url.path());
    url.set_path(&path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Some(url.to_string())
}

/// Resolves a possibly relative link against the page it was found on
pub fn absolutize_link(base: &str, link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() || link.starts_with("javascript:") || link.starts_with('#') {
        return None;
    }

    match Url::parse(link) {
        Ok(url) => Some(url.to_string()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(base).ok()?;
            base.join(link).ok().map(|u| u.to_string())
        }
        Err(_) => None,
    }
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
