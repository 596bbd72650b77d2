//! Small URL helpers shared by the transports, the sanitizer and settings.

const JAVASCRIPT_SCHEME: &str = "javascript:";

/// Strips trailing slashes so endpoints can be appended without doubling them.
///
/// ```
/// use chatpane::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://api.mistral.ai/v1/"), "https://api.mistral.ai/v1");
/// assert_eq!(normalize_base_url("http://localhost:11434//"), "http://localhost:11434");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Joins a provider base URL and an endpoint path with exactly one slash.
///
/// ```
/// use chatpane::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.groq.com/openai/v1/", "/chat/completions"),
///     "https://api.groq.com/openai/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        endpoint.trim_start_matches('/')
    )
}

/// True when `value` would execute script if followed as a link.
///
/// Browsers drop tabs and newlines anywhere in a URL, ignore leading
/// whitespace and control characters, and match the scheme
/// case-insensitively, so this does too.
pub fn is_javascript_url(value: &str) -> bool {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    cleaned
        .trim_start_matches(|c: char| c.is_whitespace() || c.is_control())
        .get(..JAVASCRIPT_SCHEME.len())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(JAVASCRIPT_SCHEME))
}

/// True for absolute `http://` or `https://` URLs with a non-empty host part.
pub fn is_http_url(value: &str) -> bool {
    let lowered = value.trim().to_ascii_lowercase();
    ["http://", "https://"].iter().any(|scheme| {
        lowered
            .strip_prefix(scheme)
            .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_without_double_slashes() {
        for base in [
            "http://localhost:8000",
            "http://localhost:8000/",
            "http://localhost:8000///",
        ] {
            for endpoint in ["chat/", "/chat/", "///chat/"] {
                assert_eq!(
                    construct_api_url(base, endpoint),
                    "http://localhost:8000/chat/"
                );
            }
        }
        assert_eq!(normalize_base_url(""), "");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn detects_javascript_links() {
        assert!(is_javascript_url("javascript:alert(1)"));
        assert!(is_javascript_url("  JavaScript:void(0)"));
        assert!(is_javascript_url("\u{1}\tjavascript:x"));
        assert!(is_javascript_url("java\tscript:alert(1)"));
        assert!(is_javascript_url("jav\nascript:alert(1)"));
        assert!(is_javascript_url(" j\ra\tv\nascript:x"));
        assert!(!is_javascript_url("java script:alert(1)"));
        assert!(!is_javascript_url("https://example.com/javascript:"));
        assert!(!is_javascript_url("java"));
        assert!(!is_javascript_url(""));
    }

    #[test]
    fn accepts_only_absolute_http_urls() {
        assert!(is_http_url("http://localhost:8000/chat/"));
        assert!(is_http_url("HTTPS://api.openai.com/v1"));
        assert!(!is_http_url("localhost:8000"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("http://"));
        assert!(!is_http_url("https:///path"));
    }
}
