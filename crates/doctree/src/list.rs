//! List parsing for both dialects.

use doctree_core::{ListItem, ListNode, Node};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::InlineFormatter;
use crate::utilities::indent_width;

static LATEX_LIST_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\begin\{(itemize|enumerate|description)\}(?:\[[^\]]*\])?|\\end\{(itemize|enumerate|description)\}|\\item\b(?:\s*\[([^\]]*)\])?",
    )
    .unwrap()
});

static MD_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:([-*+])|\d{1,9}[.)])(?:\s+(.*))?$").unwrap());

/// Recognize a Markdown list item line, returning `(ordered, text)`
pub(crate) fn markdown_item(line: &str) -> Option<(bool, &str)> {
    let caps = MD_ITEM.captures(line)?;
    let ordered = caps.get(1).is_none();
    let text = caps.get(2).map_or("", |m| m.as_str());
    Some((ordered, text))
}

#[derive(Default)]
struct ItemBuffer {
    label: Option<String>,
    text: String,
    nested: Vec<ListNode>,
}

impl ItemBuffer {
    fn append(slot: &mut Option<ItemBuffer>, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let item = slot.get_or_insert_with(ItemBuffer::default);
        item.text.push(' ');
        item.text.push_str(text);
    }

    /// Emit the item's text (if any) followed by its nested lists
    fn finish(self, fmt: &InlineFormatter, items: &mut Vec<ListItem>) {
        let text = fmt.text(&self.text);
        let text = match self.label.map(|label| fmt.text(&label)) {
            Some(label) if !label.is_empty() && !text.is_empty() => format!("{label}: {text}"),
            Some(label) if !label.is_empty() => label,
            _ => text,
        };

        if !text.is_empty() {
            items.push(ListItem::Text(text));
        }
        items.extend(
            self.nested
                .into_iter()
                .map(|list| ListItem::Node(Node::List(list))),
        );
    }
}

/// Parse an `itemize`/`enumerate`/`description` block
pub(crate) fn parse_latex_list(raw: &str, ordered: bool, fmt: &InlineFormatter) -> Option<ListNode> {
    let items = latex_items(latex_list_body(raw), fmt);
    if items.is_empty() {
        debug!("dropping list without items");
        return None;
    }
    Some(ListNode { items, ordered })
}

/// Text between the outermost `\begin{..}` and its matching `\end{..}`
fn latex_list_body(raw: &str) -> &str {
    let mut depth = 0usize;
    let mut start = None;

    for caps in LATEX_LIST_TOKEN.captures_iter(raw) {
        let Some(token) = caps.get(0) else { continue };
        if caps.get(1).is_some() {
            start.get_or_insert(token.end());
            depth += 1;
        } else if caps.get(2).is_some() && depth > 0 {
            depth -= 1;
            if let (0, Some(begin)) = (depth, start) {
                return &raw[begin..token.start()];
            }
        }
    }

    match start {
        Some(begin) => &raw[begin..],
        None => raw,
    }
}

fn latex_items(body: &str, fmt: &InlineFormatter) -> Vec<ListItem> {
    let mut items = Vec::new();
    let mut current: Option<ItemBuffer> = None;
    let mut cursor = 0;
    let mut depth = 0usize;
    let mut nested_start = 0;
    let mut nested_ordered = false;

    for caps in LATEX_LIST_TOKEN.captures_iter(body) {
        let Some(token) = caps.get(0) else { continue };

        if let Some(name) = caps.get(1) {
            if depth == 0 {
                ItemBuffer::append(&mut current, &body[cursor..token.start()]);
                nested_start = token.start();
                nested_ordered = name.as_str() == "enumerate";
            }
            depth += 1;
        } else if caps.get(2).is_some() {
            if depth == 0 {
                // Stray \end without a matching \begin
                ItemBuffer::append(&mut current, &body[cursor..token.start()]);
                cursor = token.end();
                continue;
            }
            depth -= 1;
            if depth == 0 {
                let nested = &body[nested_start..token.end()];
                if let Some(list) = parse_latex_list(nested, nested_ordered, fmt) {
                    current.get_or_insert_with(ItemBuffer::default).nested.push(list);
                }
                cursor = token.end();
            }
        } else if depth == 0 {
            ItemBuffer::append(&mut current, &body[cursor..token.start()]);
            if let Some(item) = current.take() {
                item.finish(fmt, &mut items);
            }
            current = Some(ItemBuffer {
                label: caps.get(3).map(|label| label.as_str().to_string()),
                ..Default::default()
            });
            cursor = token.end();
        }
    }

    if depth > 0 {
        if let Some(list) = parse_latex_list(&body[nested_start..], nested_ordered, fmt) {
            current.get_or_insert_with(ItemBuffer::default).nested.push(list);
        }
    } else {
        ItemBuffer::append(&mut current, &body[cursor..]);
    }
    if let Some(item) = current {
        item.finish(fmt, &mut items);
    }
    items
}

#[derive(Default)]
struct MarkdownItem<'a> {
    text: String,
    nested: Vec<&'a str>,
}

/// Parse a block of Markdown list lines; deeper-indented items form nested lists
pub(crate) fn parse_markdown_list(raw: &str, ordered: bool, fmt: &InlineFormatter) -> Option<ListNode> {
    let lines: Vec<&str> = raw.lines().filter(|line| !line.trim().is_empty()).collect();
    let base = lines
        .iter()
        .find(|line| markdown_item(line.trim_start()).is_some())
        .map_or(0, |line| indent_width(line));

    let mut items = Vec::new();
    let mut current: Option<MarkdownItem> = None;

    for line in lines {
        let indent = indent_width(line);
        let trimmed = line.trim();
        match markdown_item(trimmed) {
            Some((_, text)) if indent <= base => {
                if let Some(item) = current.take() {
                    finish_markdown_item(item, fmt, &mut items);
                }
                current = Some(MarkdownItem {
                    text: text.to_string(),
                    nested: Vec::new(),
                });
            }
            marker => {
                let item = current.get_or_insert_with(MarkdownItem::default);
                if indent > base && (marker.is_some() || !item.nested.is_empty()) {
                    item.nested.push(line);
                } else {
                    item.text.push(' ');
                    item.text.push_str(trimmed);
                }
            }
        }
    }
    if let Some(item) = current {
        finish_markdown_item(item, fmt, &mut items);
    }

    if items.is_empty() {
        debug!("dropping list without items");
        return None;
    }
    Some(ListNode { items, ordered })
}

fn finish_markdown_item(item: MarkdownItem, fmt: &InlineFormatter, items: &mut Vec<ListItem>) {
    let text = fmt.text(&item.text);
    if !text.is_empty() {
        items.push(ListItem::Text(text));
    }

    if item.nested.is_empty() {
        return;
    }
    let ordered = item
        .nested
        .first()
        .and_then(|line| markdown_item(line.trim_start()))
        .is_some_and(|(ordered, _)| ordered);
    if let Some(list) = parse_markdown_list(&item.nested.join("\n"), ordered, fmt) {
        items.push(ListItem::Node(Node::List(list)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rules;
    use crate::service::{Dialect, DoctreeOptions};

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

    fn text(item: &str) -> ListItem {
        ListItem::Text(item.to_string())
    }

    #[test]
    fn test_markdown_item() {
        assert_eq!(markdown_item("- x"), Some((false, "x")));
        assert_eq!(markdown_item("12. y"), Some((true, "y")));
        assert_eq!(markdown_item("3) z"), Some((true, "z")));
        assert_eq!(markdown_item("-"), Some((false, "")));
        assert_eq!(markdown_item("-5% ao mês"), None);
        assert_eq!(markdown_item("**forte**"), None);
        assert_eq!(markdown_item("1.5 ponto"), None);
    }

    #[test]
    fn test_latex_items_and_labels() {
        let raw = "\\begin{itemize}\n\\item Primeiro \\textbf{item}\n\\item[Taxa] juros ao mês\n\\item \n\\end{itemize}";
        let list = with_formatter(Dialect::Latex, |fmt| parse_latex_list(raw, false, fmt)).unwrap();
        assert!(!list.ordered);
        assert_eq!(list.items, vec![text("Primeiro item"), text("Taxa: juros ao mês")]);
    }

    #[test]
    fn test_latex_nested_list() {
        let raw = "\\begin{enumerate}\n\\item A\n\\begin{itemize}\n\\item A1\n\\end{itemize}\n\\item B\n\\end{enumerate}";
        let list = with_formatter(Dialect::Latex, |fmt| parse_latex_list(raw, true, fmt)).unwrap();
        assert!(list.ordered);
        assert_eq!(
            list.items,
            vec![
                text("A"),
                ListItem::Node(Node::List(ListNode {
                    items: vec![text("A1")],
                    ordered: false,
                })),
                text("B"),
            ]
        );
    }

    #[test]
    fn test_latex_empty_list() {
        let list = with_formatter(Dialect::Latex, |fmt| {
            parse_latex_list("\\begin{itemize}\\end{itemize}", false, fmt)
        });
        assert_eq!(list, None);

        let list = with_formatter(Dialect::Latex, |fmt| {
            parse_latex_list("\\begin{itemize}\n\\item \\vspace{1em}\n\\end{itemize}", false, fmt)
        });
        assert_eq!(list, None);
    }

    #[test]
    fn test_latex_unterminated_nested_list() {
        let raw = "\\begin{itemize}\n\\item a\n\\begin{itemize}\n\\item b";
        let list = with_formatter(Dialect::Latex, |fmt| parse_latex_list(raw, false, fmt)).unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0], text("a"));
    }

    #[test]
    fn test_markdown_nested_list() {
        let raw = "- um\n- **dois**\n    - dois.a\n    - dois.b\n- três";
        let list = with_formatter(Dialect::Markdown, |fmt| parse_markdown_list(raw, false, fmt)).unwrap();
        assert_eq!(
            list.items,
            vec![
                text("um"),
                text("dois"),
                ListItem::Node(Node::List(ListNode {
                    items: vec![text("dois.a"), text("dois.b")],
                    ordered: false,
                })),
                text("três"),
            ]
        );
    }

    #[test]
    fn test_markdown_continuation_and_empty_items() {
        let raw = "1. primeira\n   linha\n2.\n3. terceira";
        let list = with_formatter(Dialect::Markdown, |fmt| parse_markdown_list(raw, true, fmt)).unwrap();
        assert!(list.ordered);
        assert_eq!(list.items, vec![text("primeira linha"), text("terceira")]);
    }
}
