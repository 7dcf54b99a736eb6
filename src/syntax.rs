// src/syntax.rs

//! Static syntax check of rendered script text.
//!
//! Two passes. A lexical scan over comments, string literals (single,
//! double and triple quoted, with backslash escapes) and bracket nesting
//! reports the first imbalance the way the interpreter phrases it. Source
//! that is balanced is then parsed as a Python module, which catches
//! indentation and statement errors. Neither pass needs an interpreter.

use std::fmt;

use rustpython_parser::{Mode, ParseError, parse};

/// Problem found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub kind: String,
    pub message: String,
    /// 1-based line.
    pub line: usize,
    /// 1-based column, in characters.
    pub column: usize,
    /// Text of the offending line.
    pub source_snippet: String,
}

impl fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (line {}, column {})",
            self.kind, self.message, self.line, self.column
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxReport {
    pub ok: bool,
    pub error: Option<SyntaxIssue>,
}

impl SyntaxReport {
    pub fn passed() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(issue: SyntaxIssue) -> Self {
        Self {
            ok: false,
            error: Some(issue),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pos {
    line: usize,
    column: usize,
}

#[derive(Debug, Clone, Copy)]
struct OpenString {
    quote: char,
    triple: bool,
    start: Pos,
}

/// Name the parsed source is reported under.
const SOURCE_NAME: &str = "<script>";

/// Check `source` for unbalanced brackets, unterminated strings and
/// anything else the Python grammar rejects.
pub fn syntax_check(source: &str) -> SyntaxReport {
    if let Err((message, pos)) = scan(source) {
        return SyntaxReport::failed(issue(source, "SyntaxError", message, pos));
    }

    match parse(source, Mode::Module, SOURCE_NAME) {
        Ok(_) => SyntaxReport::passed(),
        Err(err) => {
            let pos = position_at(source, u32::from(err.offset) as usize);
            SyntaxReport::failed(issue(source, error_kind(&err), err.error.to_string(), pos))
        }
    }
}

fn issue(source: &str, kind: &str, message: String, pos: Pos) -> SyntaxIssue {
    SyntaxIssue {
        kind: kind.to_string(),
        message,
        line: pos.line,
        column: pos.column,
        source_snippet: source
            .lines()
            .nth(pos.line - 1)
            .unwrap_or_default()
            .to_string(),
    }
}

fn error_kind(err: &ParseError) -> &'static str {
    if err.error.is_tab_error() {
        "TabError"
    } else if err.error.is_indentation_error() {
        "IndentationError"
    } else {
        "SyntaxError"
    }
}

/// 1-based line and character column of a byte offset. Offsets in trailing
/// whitespace (end-of-input errors) are pulled back onto the last line.
fn position_at(source: &str, offset: usize) -> Pos {
    let mut offset = offset.min(source.trim_end().len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }

    let before = &source[..offset];
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    Pos {
        line: before.matches('\n').count() + 1,
        column: before[line_start..].chars().count() + 1,
    }
}

fn scan(source: &str) -> Result<(), (String, Pos)> {
    let chars: Vec<char> = source.chars().collect();
    let mut brackets: Vec<(char, Pos)> = Vec::new();
    let mut string: Option<OpenString> = None;
    let mut in_comment = false;

    let mut line = 1;
    let mut column = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let here = Pos { line, column };
        let mut width = 1;

        if in_comment {
            if c == '\n' {
                in_comment = false;
            }
        } else if let Some(open) = string {
            if c == '\\' {
                // Escapes consume the next character, newline included.
                width = 2;
            } else if c == '\n' && !open.triple {
                return Err((
                    format!("unterminated string literal (detected at line {line})"),
                    open.start,
                ));
            } else if c == open.quote {
                if !open.triple {
                    string = None;
                } else if starts_triple(&chars, i, open.quote) {
                    string = None;
                    width = 3;
                }
            }
        } else {
            match c {
                '#' => in_comment = true,
                '\'' | '"' => {
                    let triple = starts_triple(&chars, i, c);
                    string = Some(OpenString {
                        quote: c,
                        triple,
                        start: here,
                    });
                    if triple {
                        width = 3;
                    }
                }
                '(' | '[' | '{' => brackets.push((c, here)),
                ')' | ']' | '}' => match brackets.pop() {
                    None => return Err((format!("unmatched '{c}'"), here)),
                    Some((open, at)) if closing_for(open) != c => {
                        let message = if at.line == line {
                            format!(
                                "closing parenthesis '{c}' does not match opening parenthesis '{open}'"
                            )
                        } else {
                            format!(
                                "closing parenthesis '{c}' does not match opening parenthesis '{open}' on line {}",
                                at.line
                            )
                        };
                        return Err((message, here));
                    }
                    Some(_) => {}
                },
                _ => {}
            }
        }

        for &consumed in chars.iter().skip(i).take(width) {
            if consumed == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        i += width;
    }

    if let Some(open) = string {
        let message = if open.triple {
            format!("unterminated triple-quoted string literal (detected at line {line})")
        } else {
            format!("unterminated string literal (detected at line {line})")
        };
        return Err((message, open.start));
    }

    // Python reports the innermost bracket that was left open.
    if let Some((open, at)) = brackets.pop() {
        return Err((format!("'{open}' was never closed"), at));
    }

    Ok(())
}

fn starts_triple(chars: &[char], i: usize, quote: char) -> bool {
    chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote)
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}
