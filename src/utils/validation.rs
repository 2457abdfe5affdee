// file: src/utils/validation.rs
// description: data validation utilities and helpers
// reference: input validation patterns

use crate::error::{PipelineError, Result};

pub struct Validator;

impl Validator {
    /// GitHub usernames: alphanumeric and hyphens, no leading/trailing
    /// hyphen, at most 39 characters.
    pub fn validate_username(username: &str) -> Result<()> {
        let valid = !username.is_empty()
            && username.len() <= 39
            && !username.starts_with('-')
            && !username.ends_with('-')
            && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

        if !valid {
            return Err(PipelineError::Validation(format!(
                "Invalid GitHub username: {username}"
            )));
        }
        Ok(())
    }

    pub fn validate_url(url: &str) -> Result<()> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(PipelineError::Validation(format!(
                "Invalid URL format: {url}"
            )));
        }
        Ok(())
    }

}

/// Truncate on a character boundary, appending "..." when text was cut.
/// Summaries are mostly Chinese; slicing bytes would split code points.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate_username() {
        assert!(Validator::validate_username("octocat").is_ok());
        assert!(Validator::validate_username("octo-cat42").is_ok());
        assert!(Validator::validate_username("").is_err());
        assert!(Validator::validate_username("-leading").is_err());
        assert!(Validator::validate_username("trailing-").is_err());
        assert!(Validator::validate_username("no/slash").is_err());
        assert!(Validator::validate_username(&"a".repeat(40)).is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(Validator::validate_url("https://api.github.com").is_ok());
        assert!(Validator::validate_url("http://localhost:8080").is_ok());
        assert!(Validator::validate_url("api.github.com").is_err());
        assert!(Validator::validate_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_truncate_text_short_input_unchanged() {
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn test_truncate_text_cuts_on_char_boundary() {
        assert_eq!(truncate_text("一个快速的键值缓存系统", 4), "一个快速...");
    }

    #[test]
    fn test_truncate_text_ascii() {
        assert_eq!(truncate_text("this is a very long text", 10), "this is a ...");
    }
}
