//! Built-in formatting rules for LaTeX and Markdown fragments.
//!
//! Rules run in the order returned by [`builtin_rules`]: layout noise first,
//! then emphasis (which sets style flags), then escapes and typography. Each
//! rule handles one concern so a fragment can be traced rule by rule.

use doctree_core::SizeClass;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{Filter, Rule};
use crate::service::Dialect;
use crate::utilities::{find_command, is_escaped, replace_command_nested, skip_optional, take_group};

/// Create all built-in rules
pub fn builtin_rules() -> Vec<Rule> {
    vec![
        latex_layout_rule(),
        latex_size_rule(),
        latex_emphasis_rule(),
        latex_group_rule(),
        markdown_emphasis_rule(),
        markdown_inline_rule(),
        latex_unescape_rule(),
        markdown_unescape_rule(),
        dash_rule(),
        quote_rule(),
        stray_brace_rule(),
    ]
}

/// Commands dropped together with their arguments
const DROPPED_WITH_ARGUMENTS: &[(&str, usize)] = &[
    ("vspace", 1),
    ("hspace", 1),
    ("label", 1),
    ("ref", 1),
    ("eqref", 1),
    ("pageref", 1),
    ("footnote", 1),
    ("hypertarget", 2),
    ("index", 1),
    ("cite", 1),
    ("phantom", 1),
    ("setlength", 2),
    ("addcontentsline", 3),
    ("includegraphics", 1),
];

/// Argument-less layout commands
const LAYOUT_COMMANDS: &[&str] = &[
    "noindent",
    "indent",
    "centering",
    "newline",
    "linebreak",
    "pagebreak",
    "newpage",
    "clearpage",
    "par",
    "smallskip",
    "medskip",
    "bigskip",
    "hfill",
    "vfill",
    "raggedright",
    "raggedleft",
    "item",
    "hline",
    "toprule",
    "midrule",
    "bottomrule",
    "maketitle",
    "tableofcontents",
    "normalfont",
    "selectfont",
    "textwidth",
    "linewidth",
    "columnwidth",
];

/// Environments whose `\begin` carries width or layout groups
const ENVIRONMENT_GROUPS: &[(&str, usize)] = &[
    ("minipage", 1),
    ("multicols", 1),
    ("wrapfigure", 2),
    ("tabular", 1),
    ("tabular*", 2),
    ("tabularx", 2),
];

static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\\\\*?(\[[^\]]*\])?").unwrap());

static ENVIRONMENT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(begin|end)\{([A-Za-z]+\*?)\}").unwrap());

fn latex_layout_rule() -> Rule {
    Rule::for_dialect(Dialect::Latex, |text, _| {
        let mut current = LINE_BREAK.replace_all(text, " ").into_owned();
        current = strip_environment_markers(&current);

        for (name, arity) in DROPPED_WITH_ARGUMENTS {
            let (next, _) = replace_command_nested(&current, name, *arity, |_| " ".to_string());
            current = next;
        }
        remove_bare(&current, LAYOUT_COMMANDS, " ")
    })
}

fn strip_environment_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(caps) = ENVIRONMENT_MARKER.captures_at(text, cursor) {
        let whole = caps.get(0).map_or(cursor..cursor, |m| m.range());
        let mut end = whole.end;
        if &caps[1] == "begin" {
            end = skip_optional(text, end);
            let groups = ENVIRONMENT_GROUPS
                .iter()
                .find(|(name, _)| *name == &caps[2])
                .map_or(0, |(_, groups)| *groups);
            for _ in 0..groups {
                match take_group(text, end) {
                    Some((_, after)) => end = after,
                    None => break,
                }
            }
        }
        out.push_str(&text[cursor..whole.start]);
        out.push(' ');
        cursor = end;
    }

    out.push_str(&text[cursor..]);
    out
}

/// Replace whole-word commands without touching what follows them
fn remove_bare(text: &str, names: &[&str], with: &str) -> String {
    let mut current = text.to_string();
    for name in names {
        while let Some((start, end)) = find_command(&current, name, 0) {
            current.replace_range(start..end, with);
        }
    }
    current
}

const SIZE_DECLARATIONS: &[(&str, SizeClass)] = &[
    ("tiny", SizeClass::Small),
    ("scriptsize", SizeClass::Small),
    ("footnotesize", SizeClass::Small),
    ("small", SizeClass::Small),
    ("normalsize", SizeClass::Normal),
    ("large", SizeClass::Large),
    ("Large", SizeClass::Large),
    ("LARGE", SizeClass::Heading),
    ("huge", SizeClass::Heading),
    ("Huge", SizeClass::Title),
];

fn latex_size_rule() -> Rule {
    Rule::for_dialect(Dialect::Latex, |text, style| {
        let first = SIZE_DECLARATIONS
            .iter()
            .filter_map(|(name, size)| find_command(text, name, 0).map(|(pos, _)| (pos, *size)))
            .min_by_key(|(pos, _)| *pos);
        if let Some((_, size)) = first {
            style.size.get_or_insert(size);
        }
        let names: Vec<&str> = SIZE_DECLARATIONS.iter().map(|(name, _)| *name).collect();
        let current = remove_bare(text, &names, " ");

        // Old-style declarations such as `{\bf ...}`
        let bold = ["bfseries", "bf"];
        let italic = ["itshape", "it", "em", "slshape"];
        if bold.iter().any(|name| find_command(&current, name, 0).is_some()) {
            style.bold = true;
        }
        if italic.iter().any(|name| find_command(&current, name, 0).is_some()) {
            style.italic = true;
        }
        let current = remove_bare(&current, &bold, " ");
        remove_bare(&current, &italic, " ")
    })
}

const BOLD_COMMANDS: &[&str] = &["textbf"];
const ITALIC_COMMANDS: &[&str] = &["textit", "emph", "textsl"];
/// Commands unwrapped to their last argument without a style flag
const UNWRAPPED_COMMANDS: &[(&str, usize)] = &[
    ("underline", 1),
    ("uline", 1),
    ("texttt", 1),
    ("textsc", 1),
    ("textrm", 1),
    ("textsf", 1),
    ("textup", 1),
    ("textnormal", 1),
    ("text", 1),
    ("mbox", 1),
    ("hbox", 1),
    ("fbox", 1),
    ("framebox", 1),
    ("makebox", 1),
    ("centerline", 1),
    ("caption", 1),
    ("url", 1),
    ("textcolor", 2),
    ("colorbox", 2),
    ("href", 2),
    ("parbox", 2),
    ("fcolorbox", 3),
];

fn latex_emphasis_rule() -> Rule {
    Rule::for_dialect(Dialect::Latex, |text, style| {
        let mut current = text.to_string();
        // Alternating nesting like \textbf{\textcolor{c}{\emph{x}}} settles within a few rounds
        for _ in 0..4 {
            let mut changed = false;
            for name in BOLD_COMMANDS {
                let (next, hit) = replace_command_nested(&current, name, 1, |args| args[0].to_string());
                style.bold |= hit;
                changed |= hit;
                current = next;
            }
            for name in ITALIC_COMMANDS {
                let (next, hit) = replace_command_nested(&current, name, 1, |args| args[0].to_string());
                style.italic |= hit;
                changed |= hit;
                current = next;
            }
            for (name, arity) in UNWRAPPED_COMMANDS {
                let (next, hit) = replace_command_nested(&current, name, *arity, |args| {
                    args.last().map_or_else(String::new, |arg| arg.to_string())
                });
                changed |= hit;
                current = next;
            }
            if !changed {
                break;
            }
        }
        current
    })
}

fn latex_group_rule() -> Rule {
    Rule::for_dialect(Dialect::Latex, |text, _| strip_grouping_braces(text))
}

/// Remove braces that only group text, plus unmatched ones.
///
/// Braces that carry a command argument (`\foo{x}`, `x^{2}`) are kept.
fn strip_grouping_braces(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut remove = vec![false; bytes.len()];
    let mut open: Vec<usize> = Vec::new();

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => open.push(i),
            b'}' => match open.pop() {
                Some(start) => {
                    if !is_argument(text, start) {
                        remove[start] = true;
                        remove[i] = true;
                    }
                }
                None => remove[i] = true,
            },
            _ => {}
        }
        i += 1;
    }
    for start in open {
        remove[start] = true;
    }

    text.char_indices()
        .filter(|(i, _)| !remove[*i])
        .map(|(_, c)| c)
        .collect()
}

fn is_argument(text: &str, open: usize) -> bool {
    let before = &text[..open];
    match before.bytes().last() {
        Some(b'}' | b']' | b'^' | b'_') => true,
        Some(c) if c.is_ascii_alphabetic() => {
            let name_start = before.trim_end_matches(|c: char| c.is_ascii_alphabetic()).len();
            name_start > 0
                && before.as_bytes()[name_start - 1] == b'\\'
                && !is_escaped(text, name_start - 1)
        }
        _ => false,
    }
}

static MD_BOLD_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(\S(?:.*?\S)?)\*\*").unwrap());
static MD_BOLD_UNDERSCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|\W)__(\S(?:.*?\S)?)__(\W|$)").unwrap());
static MD_ITALIC_STAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(\S(?:[^*]*?\S)?)\*").unwrap());
static MD_ITALIC_UNDERSCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|\W)_(\S(?:[^_]*?\S)?)_(\W|$)").unwrap());

// Escaped markers are parked on private-use characters while emphasis runs
const ESCAPED_STAR: char = '\u{E000}';
const ESCAPED_UNDERSCORE: char = '\u{E001}';

fn markdown_emphasis_rule() -> Rule {
    Rule::for_dialect(Dialect::Markdown, |text, style| {
        let mut current = text
            .replace("\\*", &ESCAPED_STAR.to_string())
            .replace("\\_", &ESCAPED_UNDERSCORE.to_string());

        style.bold |= replace_until_stable(&mut current, &MD_BOLD_STAR, "${1}");
        style.bold |= replace_until_stable(&mut current, &MD_BOLD_UNDERSCORE, "${1}${2}${3}");
        style.italic |= replace_until_stable(&mut current, &MD_ITALIC_STAR, "${1}");
        style.italic |= replace_until_stable(&mut current, &MD_ITALIC_UNDERSCORE, "${1}${2}${3}");

        current
            .replace(ESCAPED_STAR, "\\*")
            .replace(ESCAPED_UNDERSCORE, "\\_")
    })
}

fn replace_until_stable(text: &mut String, pattern: &Regex, replacement: &str) -> bool {
    let mut hit = false;
    for _ in 0..8 {
        if !pattern.is_match(text) {
            break;
        }
        *text = pattern.replace_all(text, replacement).into_owned();
        hit = true;
    }
    hit
}

static MD_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static MD_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").unwrap());
static MD_AUTOLINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(https?://[^>\s]+)>").unwrap());
static MD_STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~(.+?)~~").unwrap());
static HTML_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"<br\s*/?>").unwrap());

fn markdown_inline_rule() -> Rule {
    Rule::for_dialect(Dialect::Markdown, |text, _| {
        let current = MD_CODE.replace_all(text, "${1}");
        let current = MD_LINK.replace_all(&current, "${1}");
        let current = MD_AUTOLINK.replace_all(&current, "${1}");
        let current = MD_STRIKE.replace_all(&current, "${1}");
        let current = HTML_BREAK.replace_all(&current, " ");
        current.replace("&nbsp;", " ")
    })
}

static LATEX_ACCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\\([`'^~"])(?:\{([A-Za-z])\}|([A-Za-z]))"#).unwrap());
static LATEX_CEDILLA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\c(?:\{([cC])\}|\s+([cC]))").unwrap());
static LATEX_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[,;: ]").unwrap());
static LATEX_SILENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[!\-/@]").unwrap());
static LATEX_SYMBOL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(ldots|dots|textbackslash|textasciitilde|textdollar|textdegree|euro|quad|qquad)(\{\})?")
        .unwrap()
});

const LATEX_ESCAPES: &[(&str, &str)] = &[
    ("\\%", "%"),
    ("\\_", "_"),
    ("\\&", "&"),
    ("\\#", "#"),
    ("\\$", "$"),
    ("\\{", "{"),
    ("\\}", "}"),
];

fn latex_unescape_rule() -> Rule {
    Rule::for_dialect(Dialect::Latex, |text, _| {
        let current = LATEX_ACCENT.replace_all(text, |caps: &Captures| {
            let mark = caps[1].chars().next();
            let letter = caps.get(2).or_else(|| caps.get(3)).and_then(|m| m.as_str().chars().next());
            match (mark, letter) {
                (Some(mark), Some(letter)) => accented(mark, letter)
                    .map_or_else(|| caps[0].to_string(), |c| c.to_string()),
                _ => caps[0].to_string(),
            }
        });
        let current = LATEX_CEDILLA.replace_all(&current, |caps: &Captures| {
            let upper = caps.get(1).or_else(|| caps.get(2)).is_some_and(|m| m.as_str() == "C");
            let letter = if upper { "Ç" } else { "ç" };
            letter.to_string()
        });

        let mut current = replace_unescaped_tilde(&current);
        current = LATEX_SPACE.replace_all(&current, " ").into_owned();
        current = LATEX_SILENT.replace_all(&current, "").into_owned();
        current = current.replace("{,}", ",").replace("``", "“").replace("''", "”");
        for (escaped, plain) in LATEX_ESCAPES {
            current = current.replace(escaped, plain);
        }

        LATEX_SYMBOL
            .replace_all(&current, |caps: &Captures| {
                let symbol = match &caps[1] {
                    "ldots" | "dots" => "…",
                    "textbackslash" => "\\",
                    "textasciitilde" => "~",
                    "textdollar" => "$",
                    "textdegree" => "°",
                    "euro" => "€",
                    _ => " ",
                };
                symbol.to_string()
            })
            .into_owned()
    })
}

fn replace_unescaped_tilde(text: &str) -> String {
    text.char_indices()
        .map(|(i, c)| if c == '~' && !is_escaped(text, i) { ' ' } else { c })
        .collect()
}

fn accented(mark: char, letter: char) -> Option<char> {
    let c = match (mark, letter) {
        ('\'', 'a') => 'á',
        ('\'', 'e') => 'é',
        ('\'', 'i') => 'í',
        ('\'', 'o') => 'ó',
        ('\'', 'u') => 'ú',
        ('\'', 'A') => 'Á',
        ('\'', 'E') => 'É',
        ('\'', 'I') => 'Í',
        ('\'', 'O') => 'Ó',
        ('\'', 'U') => 'Ú',
        ('`', 'a') => 'à',
        ('`', 'A') => 'À',
        ('^', 'a') => 'â',
        ('^', 'e') => 'ê',
        ('^', 'o') => 'ô',
        ('^', 'A') => 'Â',
        ('^', 'E') => 'Ê',
        ('^', 'O') => 'Ô',
        ('~', 'a') => 'ã',
        ('~', 'o') => 'õ',
        ('~', 'n') => 'ñ',
        ('~', 'A') => 'Ã',
        ('~', 'O') => 'Õ',
        ('"', 'u') => 'ü',
        ('"', 'U') => 'Ü',
        _ => return None,
    };
    Some(c)
}

static MD_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([\\`*_{}\[\]()#+\-.!|>~<])").unwrap());

fn markdown_unescape_rule() -> Rule {
    Rule::for_dialect(Dialect::Markdown, |text, _| {
        MD_ESCAPE.replace_all(text, "${1}").into_owned()
    })
}

fn dash_rule() -> Rule {
    Rule::any(|text, _| text.replace("---", "—").replace("--", "–"))
}

fn quote_rule() -> Rule {
    Rule::new(
        Filter::predicate(|_, options| options.straighten_quotes),
        |text, _| {
            text.chars()
                .map(|c| match c {
                    '“' | '”' | '„' => '"',
                    '‘' | '’' | '‚' => '\'',
                    other => other,
                })
                .collect()
        },
    )
}

fn stray_brace_rule() -> Rule {
    Rule::any(|text, _| trim_stray_braces(text).to_string())
}

/// Trim unbalanced braces left at either end of a fragment
fn trim_stray_braces(text: &str) -> &str {
    let mut current = text.trim();
    loop {
        let before = current.len();
        if let Some(rest) = current.strip_prefix('}') {
            current = rest.trim_start();
        }
        if current.ends_with('{') && !current.ends_with("\\{") {
            current = current[..current.len() - 1].trim_end();
        }
        if current.starts_with('{') && !current.contains('}') {
            current = current[1..].trim_start();
        }
        if current.ends_with('}') && !current.ends_with("\\}") && !current.contains('{') {
            current = current[..current.len() - 1].trim_end();
        }
        if current.len() == before {
            return current;
        }
    }
}
