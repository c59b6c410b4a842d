//! Document tree serialization
//!
//! Writes a [`Document`] as the renderer's JSON, or as a Markdown outline that
//! is easier to proof-read than the JSON.

use crate::ast::{
    Document, HighlightContent, HighlightKind, ListItem, ListNode, Node, TableNode, TextNode,
};
use crate::options::{Options, OutputFormat};

/// Serialize a document in the format selected by `options`
pub fn serialize(document: &Document, options: &Options) -> serde_json::Result<String> {
    match options.format {
        OutputFormat::Json => to_json(document, options.pretty),
        OutputFormat::Markdown => Ok(to_markdown(document, options)),
    }
}

/// Serialize a document to JSON
pub fn to_json(document: &Document, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(document)
    } else {
        serde_json::to_string(document)
    }
}

/// Parse a document back from its JSON form
pub fn from_json(json: &str) -> serde_json::Result<Document> {
    serde_json::from_str(json)
}

/// Serialize a document to a Markdown outline
pub fn to_markdown(document: &Document, options: &Options) -> String {
    let mut output = String::with_capacity(4096);
    serialize_nodes(&document.nodes, options, &mut output);

    collapse_and_trim(&mut output);
    output
}

fn serialize_nodes(nodes: &[Node], options: &Options, out: &mut String) {
    for node in nodes {
        if !node.is_blank() {
            serialize_node(node, options, out);
        }
    }
}

fn serialize_node(node: &Node, options: &Options, out: &mut String) {
    match node {
        Node::Section(section) => {
            for _ in 0..section.level.clamp(1, 6) {
                out.push('#');
            }
            out.push(' ');
            out.push_str(&section.title);
            out.push_str("\n\n");
            serialize_nodes(&section.children, options, out);
        }

        Node::Text(text) => {
            serialize_text(text, out);
            out.push_str("\n\n");
        }

        Node::List(list) => {
            serialize_list(list, options, 0, out);
            out.push('\n');
        }

        Node::Table(table) => serialize_table(table, out),

        Node::Highlight(highlight) => {
            let start_len = out.len();
            out.push_str(match highlight.kind {
                HighlightKind::Info => "[!NOTE]\n",
                HighlightKind::Warning => "[!WARNING]\n",
                HighlightKind::Important => "[!IMPORTANT]\n",
            });
            match &highlight.content {
                HighlightContent::Text(text) => out.push_str(text),
                HighlightContent::Nodes(nodes) => serialize_nodes(nodes, options, out),
            }

            // Process the content we just wrote to add > prefixes
            let content = out[start_len..].trim_end().to_string();
            out.truncate(start_len);

            for (i, line) in content.lines().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                out.push('>');
                if !line.is_empty() {
                    out.push(' ');
                    out.push_str(line);
                }
            }
            out.push_str("\n\n");
        }

        Node::Formula(formula) => {
            out.push_str("$$\n");
            out.push_str(formula.content.trim());
            out.push_str("\n$$\n\n");
        }

        Node::Image(image) => {
            out.push_str("![");
            out.push_str(image.caption.as_deref().unwrap_or(""));
            out.push(']');
            if image.data.is_some() {
                out.push_str("(embedded.svg)");
            }
            out.push_str("\n\n");
        }
    }
}

fn serialize_text(text: &TextNode, out: &mut String) {
    let delimiter = match (text.style.bold, text.style.italic) {
        (true, true) => "***",
        (true, false) => "**",
        (false, true) => "_",
        (false, false) => "",
    };
    out.push_str(delimiter);
    out.push_str(&text.content);
    out.push_str(delimiter);
}

fn serialize_list(list: &ListNode, options: &Options, depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    let mut number = 1;

    for item in &list.items {
        match item {
            ListItem::Text(text) => {
                out.push_str(&indent);
                if list.ordered {
                    out.push_str(&number.to_string());
                    out.push_str(". ");
                    number += 1;
                } else {
                    out.push(options.bullet_list_marker);
                    out.push(' ');
                }
                out.push_str(text);
                out.push('\n');
            }
            ListItem::Node(Node::List(nested)) => serialize_list(nested, options, depth + 1, out),
            ListItem::Node(node) => {
                // Other nested nodes are written as an indented block
                let start_len = out.len();
                serialize_node(node, options, out);
                let content = out[start_len..].trim_end().to_string();
                out.truncate(start_len);
                for line in content.lines() {
                    out.push_str(&indent);
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }
}

fn serialize_table(table: &TableNode, out: &mut String) {
    let col_count = table.column_count();
    if col_count == 0 {
        return;
    }

    // Calculate column widths
    let mut widths = vec![3usize; col_count];
    let header_cells = table.headers.iter().flatten();
    for (i, cell) in header_cells.enumerate() {
        if i < widths.len() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let empty_header = vec![String::new(); col_count];
    let headers = table.headers.as_ref().unwrap_or(&empty_header);
    serialize_row(headers, &widths, out);

    // Separator row
    out.push('|');
    for &width in &widths {
        out.push(' ');
        for _ in 0..width {
            out.push('-');
        }
        out.push_str(" |");
    }
    out.push('\n');

    for row in &table.rows {
        serialize_row(row, &widths, out);
    }

    if let Some(caption) = &table.caption {
        out.push_str("\nTable: ");
        out.push_str(caption);
        out.push('\n');
    }

    out.push('\n');
}

fn serialize_row(cells: &[String], widths: &[usize], out: &mut String) {
    out.push('|');
    for (i, cell) in cells.iter().enumerate() {
        out.push(' ');
        out.push_str(&cell.replace('|', "\\|"));
        let width = widths.get(i).copied().unwrap_or(3);
        let padding = width.saturating_sub(cell.chars().count());
        for _ in 0..padding {
            out.push(' ');
        }
        out.push_str(" |");
    }
    out.push('\n');
}

/// Collapse multiple consecutive newlines into at most two, in place
fn collapse_and_trim(s: &mut String) {
    let mut result = String::with_capacity(s.len());
    let mut newline_count = 0;

    for c in s.trim_matches('\n').chars() {
        if c == '\n' {
            newline_count += 1;
            if newline_count <= 2 {
                result.push(c);
            }
        } else {
            newline_count = 0;
            result.push(c);
        }
    }

    *s = result;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FormulaNode, HighlightNode, ImageNode, SectionNode, TextStyle};

    fn markdown(nodes: Vec<Node>) -> String {
        to_markdown(&Document::new(nodes), &Options::default())
    }

    #[test]
    fn test_json_wire_names() {
        let mut section = SectionNode::new("Title", 1);
        section.children.push(Node::Text(TextNode::new(
            "Some bold text.",
            TextStyle {
                bold: true,
                ..Default::default()
            },
        )));
        let json = to_json(&Document::new(vec![Node::Section(section)]), false).unwrap();
        assert_eq!(
            json,
            r#"[{"type":"section","title":"Title","level":1,"content":[{"type":"text","content":"Some bold text.","style":{"bold":true}}]}]"#
        );
    }

    #[test]
    fn test_json_plain_text_keeps_empty_style() {
        let json = to_json(
            &Document::new(vec![Node::Text(TextNode::plain("Hello"))]),
            false,
        )
        .unwrap();
        assert_eq!(json, r#"[{"type":"text","content":"Hello","style":{}}]"#);
    }

    #[test]
    fn test_json_highlight_and_image() {
        let doc = Document::new(vec![
            Node::Highlight(HighlightNode {
                content: HighlightContent::Text("Atenção".to_string()),
                kind: HighlightKind::Important,
            }),
            Node::Image(ImageNode {
                data: Some("<svg/>".to_string()),
                caption: None,
            }),
        ]);
        let json = to_json(&doc, false).unwrap();
        assert_eq!(
            json,
            r#"[{"type":"highlight","content":"Atenção","style":"important"},{"type":"image","svg":"<svg/>"}]"#
        );
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"[
            {"type":"section","title":"A","level":1,"content":[
                {"type":"list","items":["x",{"type":"list","items":["y"],"ordered":true}],"ordered":false},
                {"type":"table","headers":["h1","h2"],"rows":[["1","2"]],"caption":"c"},
                {"type":"highlight","content":[{"type":"text","content":"t","style":{}}],"style":"warning"},
                {"type":"formula","content":"x^2"}
            ]}
        ]"#;
        let doc = from_json(json).unwrap();
        let again = from_json(&to_json(&doc, true).unwrap()).unwrap();
        assert_eq!(doc, again);
        assert_eq!(doc.walk().count(), 7);
    }

    #[test]
    fn test_json_accepts_rust_field_names() {
        let json = r#"[{"type":"section","title":"A","level":2,"children":[]},
                       {"type":"highlight","content":"n","kind":"warning"}]"#;
        let doc = from_json(json).unwrap();
        match &doc.nodes[1] {
            Node::Highlight(h) => assert_eq!(h.kind, HighlightKind::Warning),
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn test_markdown_heading_and_text() {
        let mut section = SectionNode::new("Juros", 2);
        section
            .children
            .push(Node::Text(TextNode::plain("Texto simples.")));
        assert_eq!(markdown(vec![Node::Section(section)]), "## Juros\n\nTexto simples.");
    }

    #[test]
    fn test_markdown_styled_text() {
        let text = TextNode::new(
            "forte",
            TextStyle {
                bold: true,
                italic: true,
                size: None,
            },
        );
        assert_eq!(markdown(vec![Node::Text(text)]), "***forte***");
    }

    #[test]
    fn test_markdown_nested_list() {
        let list = ListNode {
            items: vec![
                ListItem::Text("One".to_string()),
                ListItem::Node(Node::List(ListNode {
                    items: vec![ListItem::Text("Inner".to_string())],
                    ordered: true,
                })),
                ListItem::Text("Two".to_string()),
            ],
            ordered: false,
        };
        assert_eq!(markdown(vec![Node::List(list)]), "- One\n    1. Inner\n- Two");
    }

    #[test]
    fn test_markdown_table() {
        let table = TableNode {
            headers: Some(vec!["Taxa".to_string(), "Prazo".to_string()]),
            rows: vec![vec!["10%".to_string(), "12".to_string()]],
            caption: None,
        };
        assert_eq!(
            markdown(vec![Node::Table(table)]),
            "| Taxa | Prazo |\n| ---- | ----- |\n| 10%  | 12    |"
        );
    }

    #[test]
    fn test_markdown_highlight_and_formula() {
        let nodes = vec![
            Node::Highlight(HighlightNode {
                content: HighlightContent::Text("Nota".to_string()),
                kind: HighlightKind::Warning,
            }),
            Node::Formula(FormulaNode {
                content: "M = C(1+i)^t".to_string(),
            }),
        ];
        assert_eq!(
            markdown(nodes),
            "> [!WARNING]\n> Nota\n\n$$\nM = C(1+i)^t\n$$"
        );
    }

    #[test]
    fn test_serialize_dispatches_on_format() {
        let doc = Document::new(vec![Node::Text(TextNode::plain("x"))]);
        let options = Options {
            format: OutputFormat::Markdown,
            ..Default::default()
        };
        assert_eq!(serialize(&doc, &options).unwrap(), "x");
    }
}
