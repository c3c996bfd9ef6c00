//! Strips leftover LaTeX artifacts from extracted resume text before diffing.
//!
//! The diff engine compares raw lines; this pass runs at the call site so that
//! `\textbf{Rust}` and `Rust` do not show up as a change.
//!
//! Text without a single `\command` is not LaTeX source and is returned as is,
//! so `40%` and `C++ {templates}` in plain resumes survive. In LaTeX source an
//! unescaped `%` starts a comment and braces are grouping.

use crate::diff::engine::split_lines;

/// Commands whose braced arguments are dropped together with the command.
const DROP_ARGS: &[(&str, usize)] = &[
    ("begin", 1),
    ("end", 1),
    ("documentclass", 1),
    ("usepackage", 1),
    ("pagestyle", 1),
    ("thispagestyle", 1),
    ("vspace", 1),
    ("hspace", 1),
    ("label", 1),
    ("href", 1),
    ("setlength", 2),
];

pub fn clean_markup(text: &str) -> String {
    if !is_latex_source(text) {
        return text.to_string();
    }

    let mut out: Vec<String> = Vec::new();
    for line in split_lines(text) {
        if !has_markup(line) {
            out.push(line.to_string());
            continue;
        }
        let cleaned = clean_line(line);
        if cleaned.trim().is_empty() {
            continue;
        }
        out.push(cleaned.trim_end().to_string());
    }
    out.join("\n")
}

/// True when some backslash is followed by a command name.
fn is_latex_source(text: &str) -> bool {
    text.as_bytes()
        .windows(2)
        .any(|pair| pair[0] == b'\\' && pair[1].is_ascii_alphabetic())
}

fn has_markup(line: &str) -> bool {
    line.contains(['\\', '{', '}', '%'])
}

fn clean_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '%' => break,
            '{' | '}' => {}
            '\\' => match chars.peek().copied() {
                Some('\\') => {
                    chars.next();
                }
                Some(escaped @ ('&' | '%' | '$' | '#' | '_' | '{' | '}')) => {
                    chars.next();
                    out.push(escaped);
                }
                Some(l) if l.is_ascii_alphabetic() => {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if !n.is_ascii_alphabetic() {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    if name == "item" {
                        skip_optional(&mut chars);
                        while chars.peek() == Some(&' ') {
                            chars.next();
                        }
                        out.push_str("• ");
                    } else if let Some(&(_, groups)) = DROP_ARGS.iter().find(|(n, _)| *n == name) {
                        skip_optional(&mut chars);
                        for _ in 0..groups {
                            skip_group(&mut chars);
                        }
                    } else {
                        skip_optional(&mut chars);
                    }
                }
                _ => {}
            },
            other => out.push(other),
        }
    }
    out
}

fn skip_optional(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    if chars.peek() != Some(&'[') {
        return;
    }
    for c in chars.by_ref() {
        if c == ']' {
            break;
        }
    }
}

fn skip_group(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    if chars.peek() != Some(&'{') {
        return;
    }
    let mut depth = 0usize;
    for c in chars.by_ref() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_untouched() {
        let text = "Jane Doe\n\n  Indented line  \nC++ & Rust";
        assert_eq!(clean_markup(text), text);
    }

    #[test]
    fn test_formatting_commands_are_unwrapped() {
        assert_eq!(
            clean_markup("\\textbf{Senior} \\emph{Software} Engineer"),
            "Senior Software Engineer"
        );
    }

    #[test]
    fn test_structural_lines_are_dropped() {
        let text = "\\documentclass[11pt]{article}\n\\begin{itemize}\nText\n\\end{itemize}";
        assert_eq!(clean_markup(text), "Text");
    }

    #[test]
    fn test_items_become_bullets_and_escapes_resolve() {
        assert_eq!(
            clean_markup("\\item Grew revenue 30\\% \\& cut costs\\\\"),
            "• Grew revenue 30% & cut costs"
        );
    }

    #[test]
    fn test_comments_are_removed_from_latex_source() {
        assert_eq!(
            clean_markup("% layout tweak\n\\section{Experience} % todo\nLed a team"),
            "Experience\nLed a team"
        );
    }

    #[test]
    fn test_percent_and_braces_survive_in_plain_text() {
        let text = "Cut build times by 40% across 12 teams\nSkills: C++ {templates}";
        assert_eq!(clean_markup(text), text);
    }

    #[test]
    fn test_plain_text_keeps_terminators() {
        let text = "Summary\r\nRust 100%\n";
        assert_eq!(clean_markup(text), text);
    }

    #[test]
    fn test_escaped_percent_is_not_a_comment() {
        assert_eq!(
            clean_markup("\\textbf{Grew} revenue 30\\% in a year"),
            "Grew revenue 30% in a year"
        );
    }

    #[test]
    fn test_href_keeps_link_text() {
        assert_eq!(
            clean_markup("Portfolio: \\href{https://example.com}{example.com}"),
            "Portfolio: example.com"
        );
    }

    #[test]
    fn test_nested_groups_in_dropped_arguments() {
        assert_eq!(clean_markup("\\setlength{\\parskip}{0pt}\nBody"), "Body");
    }
}
