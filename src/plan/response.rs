// src/plan/response.rs

use regex::RegexBuilder;

/// Content of the first `<tag>...</tag>` block in an LLM response.
///
/// Matching is case-insensitive and spans lines. The content is trimmed,
/// and a surrounding Markdown code fence is removed. Returns `None` when the
/// tag is absent.
pub fn extract_tag_content(text: &str, tag: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    let tag = regex::escape(tag);
    let pattern = RegexBuilder::new(&format!("<{tag}>(.*?)</{tag}>"))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .ok()?;

    let content = pattern.captures(text)?.get(1)?.as_str().trim();
    Some(strip_code_fence(content))
}

fn strip_code_fence(content: &str) -> String {
    if content.len() >= 6 && content.starts_with("```") && content.ends_with("```") {
        let lines: Vec<&str> = content.lines().collect();
        if lines.len() >= 2 {
            return lines[1..lines.len() - 1].join("\n").trim().to_string();
        }
    }
    content.to_string()
}
