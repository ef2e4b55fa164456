//! System prompts.

/// Marker the refiner returns for gibberish input.
pub const INVALID_MARKER: &str = "[INVALID]";

/// Validator and refiner instructions for a prompt of the given kind
/// (`image`, `video`, ...).
pub fn refine_system_prompt(kind: &str) -> String {
    format!(
        "You are an AI Prompt Validator and Refiner.\n\
         1. FIRST: Check if the user's prompt is a valid request, even if there are spelling mistakes.\n\
         2. IF the prompt is total gibberish, random characters (like 'asdfgh'), or completely nonsensical, return ONLY the word '{marker}'.\n\
         3. IF it's valid, fix the spelling and refine it into a high-quality, cinematic {kind} prompt.\n\
         - Keep the core idea.\n\
         - Add artistic details.\n\
         - Keep it under 75 words.\n\
         - Return ONLY the refined prompt text (or {marker}), no explanations.",
        marker = INVALID_MARKER,
        kind = kind,
    )
}

/// Instructions for writing a CV in the requested template style.
pub fn cv_system_prompt(template: Option<&str>) -> String {
    let template = template.filter(|t| !t.trim().is_empty()).unwrap_or("modern");
    format!(
        "You are a professional CV writer. Write a complete, well-structured CV in a {} style \
         from the details the user provides. Use clear section headings (Summary, Experience, \
         Education, Skills) in Markdown. Do not invent employers, dates or degrees that were not \
         given; leave a placeholder in brackets instead.",
        template
    )
}

/// Instructions for writing content of the requested type (blog, script, code, ...).
pub fn content_system_prompt(content_type: Option<&str>) -> String {
    match content_type.map(str::trim).filter(|t| !t.is_empty()) {
        Some(kind) => format!(
            "You are an expert content creator. Write a high-quality {} based on the user's \
             request. Match the tone the request implies and return only the content.",
            kind
        ),
        None => "You are an expert content creator. Write high-quality content based on the \
                 user's request and return only the content."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refine_prompt_mentions_kind_and_marker() {
        let p = refine_system_prompt("video");
        assert!(p.contains("cinematic video prompt"));
        assert!(p.contains("'[INVALID]'"));
        assert!(p.contains("under 75 words"));
    }

    #[test]
    fn test_cv_prompt_defaults_template() {
        assert!(cv_system_prompt(None).contains("modern style"));
        assert!(cv_system_prompt(Some("  ")).contains("modern style"));
        assert!(cv_system_prompt(Some("academic")).contains("academic style"));
    }

    #[test]
    fn test_content_prompt_uses_type() {
        assert!(content_system_prompt(Some("blog post")).contains("high-quality blog post"));
        assert!(!content_system_prompt(None).contains("{}"));
    }
}
