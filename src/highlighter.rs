// ABOUTME: Syntax highlighter for the REPL with ANSI color support
// Implements rustyline's Highlighter trait to color Mrya syntax elements
// while preserving display width

use rustyline::highlight::{CmdKind, Highlighter};
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;

// ANSI color codes (3-bit/4-bit colors for maximum terminal compatibility)
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_KEYWORD: &str = "\x1b[1;35m"; // Bold magenta
const COLOR_NUMBER: &str = "\x1b[33m"; // Yellow
const COLOR_STRING: &str = "\x1b[32m"; // Green
const COLOR_COMMENT: &str = "\x1b[90m"; // Bright black (gray)
const COLOR_DECORATOR: &str = "\x1b[36m"; // Cyan

const KEYWORDS: &[&str] = &[
    "let", "const", "as", "func", "define", "return", "if", "else", "while", "for", "in", "break",
    "continue", "true", "false", "nil", "and", "or", "output", "input", "request", "import",
    "using", "try", "catch", "end", "class", "this", "inherit",
];

/// REPL helper providing syntax-aware color highlighting for Mrya code.
#[derive(Completer, Helper, Hinter, Validator)]
pub struct MryaHelper;

impl MryaHelper {
    pub fn new() -> Self {
        MryaHelper
    }
}

impl Default for MryaHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlighter for MryaHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let highlighted = highlight_line(line);
        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn highlight_line(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut result = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            // Comments run to end of line
            '/' if i + 1 < chars.len() && chars[i + 1] == '/' => {
                result.push_str(COLOR_COMMENT);
                while i < chars.len() {
                    result.push(chars[i]);
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }

            // Strings keep exact content, escape aware
            '"' => {
                result.push_str(COLOR_STRING);
                result.push('"');
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        result.push(chars[i]);
                        result.push(chars[i + 1]);
                        i += 2;
                    } else if chars[i] == '"' {
                        result.push('"');
                        i += 1;
                        break;
                    } else {
                        result.push(chars[i]);
                        i += 1;
                    }
                }
                result.push_str(COLOR_RESET);
            }

            '%' => {
                result.push_str(COLOR_DECORATOR);
                result.push('%');
                result.push_str(COLOR_RESET);
                i += 1;
            }

            c if c.is_ascii_digit() => {
                result.push_str(COLOR_NUMBER);
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    result.push(chars[i]);
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }

            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if KEYWORDS.contains(&word.as_str()) {
                    result.push_str(COLOR_KEYWORD);
                    result.push_str(&word);
                    result.push_str(COLOR_RESET);
                } else {
                    result.push_str(&word);
                }
            }

            c => {
                result.push(c);
                i += 1;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_colored() {
        let highlighted = highlight_line("let x = 1");
        assert!(highlighted.contains(COLOR_KEYWORD));
        assert!(highlighted.contains("let"));
    }

    #[test]
    fn test_plain_identifiers_untouched() {
        assert_eq!(highlight_line("foo"), "foo");
    }

    #[test]
    fn test_strings_and_comments() {
        assert!(highlight_line("\"hi\"").contains(COLOR_STRING));
        assert!(highlight_line("// note").contains(COLOR_COMMENT));
    }

    #[test]
    fn test_content_is_preserved() {
        let line = "let msg = \"a // not comment\" // real comment";
        let highlighted = highlight_line(line);
        let stripped: String = {
            // Remove ANSI sequences to compare content
            let mut out = String::new();
            let mut chars = highlighted.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '\x1b' {
                    for c in chars.by_ref() {
                        if c == 'm' {
                            break;
                        }
                    }
                } else {
                    out.push(c);
                }
            }
            out
        };
        assert_eq!(stripped, line);
    }
}
