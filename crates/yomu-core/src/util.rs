//! Small helpers shared by the store, client, and config layers

/// Longest backend error body carried into an error message.
pub const ERROR_EXCERPT_CHARS: usize = 180;

/// Trimmed copy of `value`, or `None` when nothing but whitespace remains.
pub fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Whether `value` names an `http` or `https` endpoint.
pub fn has_http_scheme(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.trim_start().starts_with(scheme))
}

/// First line-folded characters of a response body, for error messages.
pub fn body_excerpt(body: &str) -> String {
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(ERROR_EXCERPT_CHARS)
        .collect()
}

/// Wall clock in Unix milliseconds.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
