//! Builders for highlight boxes, formulas and figures.

use doctree_core::{HighlightKind, ImageNode};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::InlineFormatter;
use crate::service::Dialect;
use crate::utilities::{find_command, replace_command_nested, skip_optional, take_group};

static FORMULA_BEGIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\\begin\{[A-Za-z]+\*?\}").unwrap());
static FORMULA_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\end\{[A-Za-z]+\*?\}$").unwrap());

/// Raw math of a display formula, without its delimiters and labels
pub(crate) fn formula_content(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let inner = if let Some(rest) = raw.strip_prefix("$$") {
        rest.strip_suffix("$$").unwrap_or(rest)
    } else if let Some(rest) = raw.strip_prefix("\\[") {
        rest.strip_suffix("\\]").unwrap_or(rest)
    } else if let Some(begin) = FORMULA_BEGIN.find(raw) {
        let rest = &raw[begin.end()..];
        match FORMULA_END.find(rest) {
            Some(end) => &rest[..end.start()],
            None => rest,
        }
    } else {
        raw
    };

    let (content, _) = replace_command_nested(inner, "label", 1, |_| String::new());
    let content = content.trim();
    (!content.is_empty()).then(|| content.to_string())
}

static MD_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^!\[([^\]]*)\]\(([^)]*)\)").unwrap());
static SVG_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<title>(.*?)</title>").unwrap());

/// Build an image from a figure block; `None` when it has neither data nor caption
pub(crate) fn figure_node(raw: &str, fmt: &InlineFormatter) -> Option<ImageNode> {
    let raw = raw.trim();
    let image = if raw.starts_with("<svg") {
        ImageNode {
            data: Some(raw.to_string()),
            caption: SVG_TITLE.captures(raw).map(|caps| fmt.text(&caps[1])),
        }
    } else {
        let caption = match fmt.dialect {
            Dialect::Latex => find_command(raw, "caption", 0)
                .and_then(|(_, end)| take_group(raw, skip_optional(raw, end)))
                .map(|(caption, _)| fmt.text(caption)),
            Dialect::Markdown => MD_IMAGE.captures(raw).map(|caps| fmt.text(&caps[1])),
        };
        ImageNode {
            data: None,
            caption,
        }
    };

    let ImageNode { data, caption } = image;
    let caption = caption.filter(|caption| !caption.is_empty());
    if data.is_none() && caption.is_none() {
        debug!("dropping figure without caption or data");
        return None;
    }
    Some(ImageNode { data, caption })
}

static BOX_BEGIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\\begin\{(minipage|tcolorbox|mdframed|framed)\}").unwrap());

static MD_ALERT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\[!(note|tip|important|warning|caution)\]\s*(.*)$").unwrap()
});

/// Box wrappers unwrapped down to their last argument
const BOX_COMMANDS: &[(&str, usize)] = &[
    ("fbox", 1),
    ("framebox", 1),
    ("colorbox", 2),
    ("fcolorbox", 3),
    ("parbox", 2),
];

/// Inner source of a highlight box and the kind its markers name, if any
pub(crate) fn box_body(raw: &str, dialect: Dialect) -> (String, Option<HighlightKind>) {
    match dialect {
        Dialect::Latex => (latex_box_body(raw), None),
        Dialect::Markdown => markdown_box_body(raw),
    }
}

fn latex_box_body(raw: &str) -> String {
    let mut body = raw.trim().to_string();
    while let Some(inner) = strip_box_environment(&body).or_else(|| strip_box_command(&body)) {
        body = inner.trim().to_string();
    }
    body
}

fn strip_box_environment(text: &str) -> Option<String> {
    let caps = BOX_BEGIN.captures(text)?;
    let name = &caps[1];
    let mut pos = skip_optional(text, caps.get(0)?.end());
    if name == "minipage" {
        if let Some((_, after)) = take_group(text, pos) {
            pos = after;
        }
    }

    let body = &text[pos..];
    let closing = format!("\\end{{{name}}}");
    Some(match body.rfind(&closing) {
        Some(end) => body[..end].to_string(),
        None => body.to_string(),
    })
}

fn strip_box_command(text: &str) -> Option<String> {
    let (name, groups) = BOX_COMMANDS
        .iter()
        .find(|(name, _)| matches!(find_command(text, name, 0), Some((0, _))))?;
    let mut pos = skip_optional(text, 1 + name.len());

    for _ in 1..*groups {
        match take_group(text, pos) {
            Some((_, after)) => pos = after,
            None => return Some(unopened(&text[pos..])),
        }
    }
    Some(match take_group(text, pos) {
        Some((content, after)) => format!("{content}{}", &text[after..]),
        None => unopened(&text[pos..]),
    })
}

/// Rest of an unterminated group, without its opening brace
fn unopened(text: &str) -> String {
    let text = text.trim_start();
    text.strip_prefix('{').unwrap_or(text).to_string()
}

fn markdown_box_body(raw: &str) -> (String, Option<HighlightKind>) {
    let mut lines: Vec<&str> = raw
        .lines()
        .map(|line| {
            let line = line.trim_start();
            let line = line.strip_prefix('>').unwrap_or(line);
            line.strip_prefix(' ').unwrap_or(line)
        })
        .collect();

    let mut kind = None;
    let first = lines.first().copied().unwrap_or_default();
    if let Some(caps) = MD_ALERT.captures(first.trim()) {
        kind = Some(match caps[1].to_ascii_lowercase().as_str() {
            "warning" => HighlightKind::Warning,
            "important" | "caution" => HighlightKind::Important,
            _ => HighlightKind::Info,
        });
        lines[0] = caps.get(2).map_or("", |m| m.as_str());
    }

    (lines.join("\n"), kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rules;
    use crate::service::DoctreeOptions;

    fn with_formatter<T>(dialect: Dialect, f: impl FnOnce(&InlineFormatter) -> T) -> T {
        let rules = Rules::new();
        let options = DoctreeOptions::default();
        let fmt = InlineFormatter {
            rules: &rules,
            dialect,
            options: &options,
        };
        f(&fmt)
    }

    #[test]
    fn test_formula_delimiters() {
        assert_eq!(formula_content("$$ x^2 $$").as_deref(), Some("x^2"));
        assert_eq!(formula_content("\\[ a = b \\]").as_deref(), Some("a = b"));
        assert_eq!(
            formula_content("\\begin{equation}\\label{eq:m}\nM = C(1+i)^n\n\\end{equation}").as_deref(),
            Some("M = C(1+i)^n")
        );
        assert_eq!(
            formula_content("\\begin{align*}\na &= b \\\\\nc &= d\n\\end{align*}").as_deref(),
            Some("a &= b \\\\\nc &= d")
        );
    }

    #[test]
    fn test_formula_empty_and_unterminated() {
        assert_eq!(formula_content("$$ $$"), None);
        assert_eq!(formula_content("\\begin{equation}\\label{x}\\end{equation}"), None);
        assert_eq!(formula_content("$$ y = 2x").as_deref(), Some("y = 2x"));
    }

    #[test]
    fn test_latex_figure_caption() {
        let raw = "\\begin{figure}[h]\n\\centering\n\\includegraphics[width=5cm]{grafico.png}\n\\caption{Evolução dos \\textit{juros}}\n\\end{figure}";
        let image = with_formatter(Dialect::Latex, |fmt| figure_node(raw, fmt)).unwrap();
        assert_eq!(image.caption.as_deref(), Some("Evolução dos juros"));
        assert_eq!(image.data, None);
    }

    #[test]
    fn test_figure_without_caption_is_dropped() {
        let raw = "\\begin{figure}\n\\includegraphics{a.png}\n\\end{figure}";
        assert_eq!(with_formatter(Dialect::Latex, |fmt| figure_node(raw, fmt)), None);
        assert_eq!(with_formatter(Dialect::Markdown, |fmt| figure_node("![](a.png)", fmt)), None);
    }

    #[test]
    fn test_markdown_figure_and_svg() {
        let image = with_formatter(Dialect::Markdown, |fmt| figure_node("![Gráfico *anual*](g.png)", fmt)).unwrap();
        assert_eq!(image.caption.as_deref(), Some("Gráfico anual"));

        let svg = "<svg viewBox=\"0 0 10 10\">\n<title>Curva</title>\n<path d=\"M0 0\"/>\n</svg>";
        let image = with_formatter(Dialect::Markdown, |fmt| figure_node(svg, fmt)).unwrap();
        assert_eq!(image.data.as_deref(), Some(svg));
        assert_eq!(image.caption.as_deref(), Some("Curva"));
    }

    #[test]
    fn test_latex_box_body() {
        let (body, kind) = box_body("\\fbox{\\parbox{0.9\\textwidth}{Importante: pague em dia.}}", Dialect::Latex);
        assert_eq!(body, "Importante: pague em dia.");
        assert_eq!(kind, None);

        let (body, _) = box_body("\\colorbox{yellow}{Nota}", Dialect::Latex);
        assert_eq!(body, "Nota");

        let raw = "\\begin{minipage}[t]{0.8\\textwidth}\nTexto\n\\end{minipage}";
        assert_eq!(box_body(raw, Dialect::Latex).0, "Texto");

        let raw = "\\begin{tcolorbox}[colback=blue]\n\\fbox{Dentro}\n\\end{tcolorbox}";
        assert_eq!(box_body(raw, Dialect::Latex).0, "Dentro");
    }

    #[test]
    fn test_latex_unterminated_box() {
        assert_eq!(box_body("\\fbox{Texto sem fim", Dialect::Latex).0, "Texto sem fim");
        assert_eq!(box_body("\\begin{framed}\nAberto", Dialect::Latex).0, "Aberto");
    }

    #[test]
    fn test_markdown_box_body() {
        let (body, kind) = box_body("> Primeira\n> segunda\n>\n> - item", Dialect::Markdown);
        assert_eq!(body, "Primeira\nsegunda\n\n- item");
        assert_eq!(kind, None);

        let (body, kind) = box_body("> [!WARNING]\n> Cuidado", Dialect::Markdown);
        assert_eq!(body, "\nCuidado");
        assert_eq!(kind, Some(HighlightKind::Warning));

        let (_, kind) = box_body("> [!tip] Dica", Dialect::Markdown);
        assert_eq!(kind, Some(HighlightKind::Info));
        let (_, kind) = box_body("> [!CAUTION]", Dialect::Markdown);
        assert_eq!(kind, Some(HighlightKind::Important));
    }
}
