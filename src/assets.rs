/// Make a stored image URL servable by prepending `prefix`.
///
/// Empty URLs, URLs that already carry the prefix and URLs with a scheme
/// (`https://...`, `data:image/png;base64,...`) come back unchanged, so
/// applying this twice is the same as applying it once. A URL that carries
/// the prefix minus its leading slashes (`static/x.png` for `/static/`) only
/// gets those slashes back.
pub fn prefix_image_url(url: &str, prefix: &str) -> String {
    if url.is_empty() || prefix.is_empty() || url.starts_with(prefix) || has_scheme(url) {
        return url.to_string();
    }
    let bare_prefix = prefix.trim_start_matches('/');
    let bare_url = url.trim_start_matches('/');
    if carries_prefix(bare_url, bare_prefix) {
        let slashes = &prefix[..prefix.len() - bare_prefix.len()];
        return format!("{slashes}{bare_url}");
    }
    // Avoid "//" when the prefix ends with the separator the URL starts with.
    if prefix.ends_with('/') {
        return format!("{prefix}{}", url.trim_start_matches('/'));
    }
    format!("{prefix}{url}")
}

/// `url` starts with `prefix` at a path boundary.
fn carries_prefix(url: &str, prefix: &str) -> bool {
    if prefix.is_empty() || !url.starts_with(prefix) {
        return false;
    }
    prefix.ends_with('/') || url[prefix.len()..].is_empty() || url[prefix.len()..].starts_with('/')
}

fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        // Single letters are Windows drive letters, not schemes.
        && scheme.len() > 1
}
