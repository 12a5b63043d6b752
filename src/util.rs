//! Shared utility functions used across the codebase.

use std::time::Duration;

/// Read an environment variable, treating blank values as unset.
pub fn env_var_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an environment variable, returning `default` if unset.
///
/// Returns the raw value alongside the parse error so callers can report it.
pub fn env_var_parse<T>(name: &str, default: T) -> Result<T, (String, String)>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_var_non_empty(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| (raw.clone(), e.to_string())),
        None => Ok(default),
    }
}

/// Build a reqwest client with a request timeout.
///
/// Falls back to a default client if the builder fails (TLS backend init).
pub fn http_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("Failed to build HTTP client with timeout: {}", e);
            reqwest::Client::new()
        }
    }
}

/// Truncate `text` to at most `max_chars` characters for log output.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview("hello", 10), "hello");
        assert_eq!(preview("hello", 5), "hello");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("héllo wörld", 4), "héll...");
    }

    #[test]
    fn test_env_var_parse_default_and_error() {
        std::env::remove_var("EOD_TEST_PARSE_UNSET");
        assert_eq!(env_var_parse("EOD_TEST_PARSE_UNSET", 7u32), Ok(7));

        std::env::set_var("EOD_TEST_PARSE_BAD", "seven");
        let err = env_var_parse::<u32>("EOD_TEST_PARSE_BAD", 7).unwrap_err();
        assert_eq!(err.0, "seven");
        std::env::remove_var("EOD_TEST_PARSE_BAD");
    }

    #[test]
    fn test_env_var_non_empty_ignores_blank() {
        std::env::set_var("EOD_TEST_BLANK", "   ");
        assert_eq!(env_var_non_empty("EOD_TEST_BLANK"), None);
        std::env::remove_var("EOD_TEST_BLANK");
    }
}
