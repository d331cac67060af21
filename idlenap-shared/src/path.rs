use url::Url;

/// Extracts `(host, port)` from a reachability URL such as
/// `https://example.com/ping`. A bare `example.com/ping` is read as http.
/// Returns `None` when no host can be found.
pub fn host_and_port(raw: &str) -> Option<(String, u16)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = if trimmed.contains("://") {
        Url::parse(trimmed).ok()?
    } else {
        Url::parse(&format!("http://{trimmed}")).ok()?
    };
    let host = parsed.host_str()?.trim_matches(|c| c == '[' || c == ']');
    if host.is_empty() {
        return None;
    }
    let port = parsed.port_or_known_default()?;
    Some((host.to_string(), port))
}

/// Normalizes a URL for HTTP use: adds `http://` when no scheme is given.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_from_various_forms() {
        assert_eq!(
            host_and_port("https://baidu.com"),
            Some(("baidu.com".into(), 443))
        );
        assert_eq!(
            host_and_port("example.org/ping"),
            Some(("example.org".into(), 80))
        );
        assert_eq!(
            host_and_port("http://10.0.0.1:8080/x"),
            Some(("10.0.0.1".into(), 8080))
        );
        assert_eq!(host_and_port(""), None);
        assert_eq!(host_and_port("https://"), None);
    }

    #[test]
    fn normalize_adds_scheme() {
        assert_eq!(normalize_url(" example.org "), "http://example.org");
        assert_eq!(normalize_url("https://a.b/c"), "https://a.b/c");
    }
}
