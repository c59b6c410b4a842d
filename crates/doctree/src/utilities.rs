//! Utility functions for scanning marked-up text.

use doctree_core::HighlightKind;

use crate::service::Dialect;

/// Commands whose presence marks a document as LaTeX
pub const LATEX_MARKERS: &[&str] = &[
    "\\documentclass",
    "\\chapter",
    "\\section",
    "\\subsection",
    "\\begin{",
    "\\item",
    "\\textbf{",
    "\\textit{",
    "\\emph{",
];

/// Keywords that mark a highlight box as important
pub const IMPORTANT_CUES: &[&str] = &["importante", "atenção"];

/// Keywords that mark a highlight box as a warning
pub const WARNING_CUES: &[&str] = &["observação", "nota"];

/// Guess the dialect of a document from its markers
pub fn detect_dialect(text: &str) -> Dialect {
    if LATEX_MARKERS.iter().any(|marker| text.contains(marker)) {
        Dialect::Latex
    } else {
        Dialect::Markdown
    }
}

/// Best-effort highlight kind from keyword cues in the box text
pub fn classify_highlight(text: &str) -> HighlightKind {
    let lower = text.to_lowercase();
    if IMPORTANT_CUES.iter().any(|cue| lower.contains(cue)) {
        HighlightKind::Important
    } else if WARNING_CUES.iter().any(|cue| lower.contains(cue)) {
        HighlightKind::Warning
    } else {
        HighlightKind::Info
    }
}

/// Check if the byte at `index` is escaped by an odd run of backslashes
pub fn is_escaped(text: &str, index: usize) -> bool {
    text.as_bytes()[..index]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count()
        % 2
        == 1
}

/// Cut a LaTeX line at its first unescaped `%`
pub fn strip_comment(line: &str) -> &str {
    for (i, b) in line.bytes().enumerate() {
        if b == b'%' && !is_escaped(line, i) {
            return &line[..i];
        }
    }
    line
}

/// Split on an ASCII separator that is not preceded by a backslash
pub fn split_unescaped(text: &str, separator: char) -> Vec<&str> {
    debug_assert!(separator.is_ascii());
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == separator && !is_escaped(text, i) {
            parts.push(&text[start..i]);
            start = i + 1;
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Net count of unescaped opening minus closing braces
pub fn brace_delta(text: &str) -> i32 {
    let bytes = text.as_bytes();
    let mut delta = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => delta += 1,
            b'}' => delta -= 1,
            _ => {}
        }
        i += 1;
    }
    delta
}

/// Index just past the `}` matching the `{` at `open`
pub fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Skip spaces, then one brace group; returns the group's inner text and the
/// index after it
pub fn take_group(text: &str, pos: usize) -> Option<(&str, usize)> {
    let open = skip_spaces(text, pos);
    let end = matching_brace(text, open)?;
    Some((&text[open + 1..end - 1], end))
}

/// Skip a `*` and any `[...]` optional arguments
pub fn skip_optional(text: &str, pos: usize) -> usize {
    let mut pos = skip_spaces(text, pos);
    if text[pos..].starts_with('*') {
        pos += 1;
    }
    loop {
        let at = skip_spaces(text, pos);
        if !text[at..].starts_with('[') {
            return pos;
        }
        match text[at..].find(']') {
            Some(close) => pos = at + close + 1,
            None => return pos,
        }
    }
}

fn skip_spaces(text: &str, pos: usize) -> usize {
    pos + text[pos..].len() - text[pos..].trim_start_matches([' ', '\t']).len()
}

/// Find `\name` as a whole command (not a prefix of a longer name, not escaped)
///
/// Returns the command's start index and the index just past its name.
pub fn find_command(text: &str, name: &str, from: usize) -> Option<(usize, usize)> {
    let needle = format!("\\{name}");
    let mut search = from;
    while let Some(found) = text.get(search..)?.find(&needle) {
        let start = search + found;
        let end = start + needle.len();
        let boundary = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_alphabetic());
        if boundary && !is_escaped(text, start) {
            return Some((start, end));
        }
        search = start + 1;
    }
    None
}

/// Replace every `\name[opt]{a1}...{aN}` by `replace(args)`.
///
/// Occurrences missing some of their groups are left untouched. Returns `None`
/// when nothing was replaced.
pub fn replace_command<F>(text: &str, name: &str, arity: usize, replace: F) -> Option<String>
where
    F: Fn(&[&str]) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut search = 0;
    let mut changed = false;

    while let Some((start, name_end)) = find_command(text, name, search) {
        let mut pos = skip_optional(text, name_end);
        let mut args = Vec::with_capacity(arity);
        for _ in 0..arity {
            match take_group(text, pos) {
                Some((arg, end)) => {
                    args.push(arg);
                    pos = end;
                }
                None => break,
            }
        }

        if args.len() == arity {
            out.push_str(&text[cursor..start]);
            out.push_str(&replace(&args));
            cursor = pos;
            changed = true;
        }
        search = if args.len() == arity { pos } else { name_end };
    }

    if !changed {
        return None;
    }
    out.push_str(&text[cursor..]);
    Some(out)
}

/// Repeatedly apply [`replace_command`] so nested uses are unwrapped too
pub fn replace_command_nested<F>(text: &str, name: &str, arity: usize, replace: F) -> (String, bool)
where
    F: Fn(&[&str]) -> String,
{
    let mut current = text.to_string();
    let mut changed = false;
    // Nesting depth in hand-written documents stays small
    for _ in 0..16 {
        match replace_command(&current, name, arity, &replace) {
            Some(next) => {
                current = next;
                changed = true;
            }
            None => break,
        }
    }
    (current, changed)
}

/// Collapse whitespace runs into single spaces and trim
pub fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_whitespace = false;

    for c in s.trim().chars() {
        if c.is_whitespace() {
            if !prev_was_whitespace {
                result.push(' ');
                prev_was_whitespace = true;
            }
        } else {
            result.push(c);
            prev_was_whitespace = false;
        }
    }

    result
}

/// Width of the leading indentation, counting a tab as four columns
pub fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_dialect() {
        assert_eq!(detect_dialect("\\chapter{Juros}\nTexto"), Dialect::Latex);
        assert_eq!(detect_dialect("# Juros\n\n- item"), Dialect::Markdown);
        assert_eq!(detect_dialect("plain text"), Dialect::Markdown);
    }

    #[test]
    fn test_classify_highlight() {
        assert_eq!(classify_highlight("ATENÇÃO: risco"), HighlightKind::Important);
        assert_eq!(classify_highlight("Isto é importante"), HighlightKind::Important);
        assert_eq!(classify_highlight("Nota: ver tabela"), HighlightKind::Warning);
        assert_eq!(classify_highlight("Observação final"), HighlightKind::Warning);
        assert_eq!(classify_highlight("Dica do dia"), HighlightKind::Info);
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("Taxa de 10\\% ao ano % comentário"), "Taxa de 10\\% ao ano ");
        assert_eq!(strip_comment("% só comentário"), "");
        assert_eq!(strip_comment("sem comentário"), "sem comentário");
    }

    #[test]
    fn test_split_unescaped() {
        assert_eq!(split_unescaped("A \\& B & C", '&'), vec!["A \\& B ", " C"]);
        assert_eq!(split_unescaped("a|b\\|c", '|'), vec!["a", "b\\|c"]);
    }

    #[test]
    fn test_brace_helpers() {
        assert_eq!(brace_delta("\\fbox{\\parbox{5cm}{"), 2);
        assert_eq!(brace_delta("\\{ literal \\}"), 0);
        assert_eq!(matching_brace("{a{b}c}d", 0), Some(7));
        assert_eq!(matching_brace("{open", 0), None);
        assert_eq!(take_group(" {x} rest", 0), Some(("x", 4)));
    }

    #[test]
    fn test_find_command_respects_names() {
        assert_eq!(find_command("\\smallskip \\small x", "small", 0), Some((11, 17)));
        assert_eq!(find_command("\\\\textbf", "textbf", 0), None);
    }

    #[test]
    fn test_replace_command_nested() {
        let (text, changed) =
            replace_command_nested("\\textbf{a \\textbf{b}} c", "textbf", 1, |args| args[0].to_string());
        assert!(changed);
        assert_eq!(text, "a b c");

        let (text, changed) =
            replace_command_nested("\\textcolor{red}{alerta}", "textcolor", 2, |args| args[1].to_string());
        assert!(changed);
        assert_eq!(text, "alerta");
    }

    #[test]
    fn test_replace_command_leaves_incomplete() {
        assert_eq!(replace_command("\\textbf{aberto", "textbf", 1, |a| a[0].to_string()), None);
    }

    #[test]
    fn test_skip_optional() {
        let text = "\\item[Termo] texto";
        assert_eq!(&text[skip_optional(text, 5)..], " texto");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }

    #[test]
    fn test_indent_width() {
        assert_eq!(indent_width("    - x"), 4);
        assert_eq!(indent_width("\t- x"), 4);
        assert_eq!(indent_width("- x"), 0);
    }
}
