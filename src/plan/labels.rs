// src/plan/labels.rs

/// Prefix every workflow step with a `[n]` label, starting at 1.
///
/// Blank lines and comment-only lines (`#` or `//`) are kept unlabeled, and
/// lines that already start with a `[digits]` label are left alone so the
/// operation can be applied twice. Indentation is preserved.
pub fn label_workflow(workflow: &str) -> String {
    if workflow.is_empty() {
        return String::new();
    }

    let mut next = 1usize;
    let labeled: Vec<String> = workflow
        .lines()
        .map(|line| {
            let body = line.trim_start();
            if body.is_empty() || is_comment(body) || has_label(body) {
                return line.to_string();
            }
            let indent = &line[..line.len() - body.len()];
            let out = format!("{indent}[{next}]{body}");
            next += 1;
            out
        })
        .collect();

    labeled.join("\n")
}

fn is_comment(body: &str) -> bool {
    body.starts_with('#') || body.starts_with("//")
}

/// `[12]...` style prefix.
fn has_label(body: &str) -> bool {
    let Some(rest) = body.strip_prefix('[') else {
        return false;
    };
    match rest.find(']') {
        Some(end) if end > 0 => rest[..end].chars().all(|c| c.is_ascii_digit()),
        _ => false,
    }
}
