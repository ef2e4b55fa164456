//! Input sanitization for prompts and free-form options.

use promptova_models::{MAX_PROMPT_LENGTH, MIN_REFINE_PROMPT_LENGTH};

use crate::error::{ApiError, ApiResult};

/// Maximum length of short options such as style, template or content type.
pub const MAX_OPTION_LENGTH: usize = 64;

/// Sanitize a user-provided string for safe logging and storage.
///
/// Control characters other than newline and tab are removed.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Sanitize and validate a generation prompt.
pub fn clean_prompt(input: &str) -> ApiResult<String> {
    let prompt = sanitize_string(input).trim().to_string();
    if prompt.is_empty() {
        return Err(ApiError::bad_request("Prompt cannot be empty"));
    }
    if prompt.chars().count() > MAX_PROMPT_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Prompt exceeds maximum length of {} characters",
            MAX_PROMPT_LENGTH
        )));
    }
    Ok(prompt)
}

/// Sanitize a prompt sent to the refiner, which needs a few characters to judge.
pub fn clean_refine_prompt(input: &str) -> ApiResult<String> {
    let prompt = sanitize_string(input).trim().to_string();
    if prompt.chars().count() < MIN_REFINE_PROMPT_LENGTH {
        return Err(ApiError::bad_request("Prompt is too short to be valid."));
    }
    clean_prompt(&prompt)
}

/// Sanitize an optional short option; blank values become `None`.
pub fn clean_option(input: Option<&str>) -> Option<String> {
    input
        .map(|s| sanitize_string(s).trim().chars().take(MAX_OPTION_LENGTH).collect::<String>())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_prompt_strips_control_chars_and_trims() {
        let prompt = clean_prompt("  a cat\u{0007} in a\that\n ").unwrap();
        assert_eq!(prompt, "a cat in a\that");
    }

    #[test]
    fn test_clean_prompt_rejects_blank_and_long() {
        assert!(clean_prompt("   \u{0000} ").is_err());
        assert!(clean_prompt(&"x".repeat(MAX_PROMPT_LENGTH)).is_ok());
        assert!(clean_prompt(&"x".repeat(MAX_PROMPT_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_refine_prompt_minimum() {
        assert!(clean_refine_prompt("ab").is_err());
        assert!(clean_refine_prompt("  ab  ").is_err());
        assert_eq!(clean_refine_prompt("cat").unwrap(), "cat");
    }

    #[test]
    fn test_clean_option() {
        assert_eq!(clean_option(None), None);
        assert_eq!(clean_option(Some("  ")), None);
        assert_eq!(clean_option(Some(" anime ")), Some("anime".to_string()));
        assert_eq!(
            clean_option(Some(&"y".repeat(100))).map(|s| s.len()),
            Some(MAX_OPTION_LENGTH)
        );
    }
}
