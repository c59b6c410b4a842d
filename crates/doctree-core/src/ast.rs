//! Document tree
//!
//! This module defines the node types produced by the converters. The tree is the
//! persisted artifact read by the content renderer, so variant tags and field
//! names follow the renderer's JSON contract.

use serde::{Deserialize, Serialize};

/// A converted document: the ordered root list of nodes.
///
/// Content that appears before the first heading lives directly in this list,
/// as do documents without any headings at all.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub nodes: Vec<Node>,
}

/// A node of the document tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// Heading with nested content (chapter, section, subsection, ...)
    Section(SectionNode),

    /// Run of plain text with document-level style flags
    Text(TextNode),

    /// Ordered or unordered list
    List(ListNode),

    /// Rectangular table
    Table(TableNode),

    /// Highlighted box
    Highlight(HighlightNode),

    /// Display or inline math, kept as raw source
    Formula(FormulaNode),

    /// Figure or embedded vector graphic
    Image(ImageNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionNode {
    pub title: String,
    /// 1 = chapter, 2 = section, 3 = subsection, ...
    pub level: u8,
    #[serde(rename = "content", alias = "children", default)]
    pub children: Vec<Node>,
}

impl SectionNode {
    pub fn new(title: impl Into<String>, level: u8) -> Self {
        Self {
            title: title.into(),
            level,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub content: String,
    #[serde(default)]
    pub style: TextStyle,
}

impl TextNode {
    pub fn new(content: impl Into<String>, style: TextStyle) -> Self {
        Self {
            content: content.into(),
            style,
        }
    }

    pub fn plain(content: impl Into<String>) -> Self {
        Self::new(content, TextStyle::default())
    }
}

/// Style flags of a text run.
///
/// The flags describe the whole fragment: `bold` is set when any part of the
/// source carried bold markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeClass>,
}

impl TextStyle {
    pub fn is_plain(&self) -> bool {
        !self.bold && !self.italic && self.size.is_none()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    Normal,
    Large,
    Heading,
    Title,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListNode {
    pub items: Vec<ListItem>,
    #[serde(default)]
    pub ordered: bool,
}

/// A list entry: plain text, or a nested node such as a sub-list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
    Text(String),
    Node(Node),
}

impl ListItem {
    pub fn is_blank(&self) -> bool {
        match self {
            ListItem::Text(text) => text.trim().is_empty(),
            ListItem::Node(node) => node.is_blank(),
        }
    }
}

/// A table whose rows all have the same cell count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl TableNode {
    /// Header width when headers are present, else the width of the first row
    pub fn column_count(&self) -> usize {
        match &self.headers {
            Some(headers) => headers.len(),
            None => self.rows.first().map_or(0, Vec::len),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightNode {
    pub content: HighlightContent,
    #[serde(rename = "style", alias = "kind", default)]
    pub kind: HighlightKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HighlightContent {
    Text(String),
    Nodes(Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    #[default]
    Info,
    Warning,
    Important,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaNode {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageNode {
    /// Embedded SVG markup
    #[serde(rename = "svg", alias = "data", default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Node {
    /// The wire discriminator of this node
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Section(_) => "section",
            Node::Text(_) => "text",
            Node::List(_) => "list",
            Node::Table(_) => "table",
            Node::Highlight(_) => "highlight",
            Node::Formula(_) => "formula",
            Node::Image(_) => "image",
        }
    }

    /// Check if this node has nothing to render
    pub fn is_blank(&self) -> bool {
        match self {
            Node::Section(section) => {
                section.title.trim().is_empty() && section.children.iter().all(Node::is_blank)
            }
            Node::Text(text) => text.content.trim().is_empty(),
            Node::List(list) => list.items.iter().all(ListItem::is_blank),
            Node::Table(table) => table.headers.is_none() && table.rows.is_empty(),
            Node::Highlight(highlight) => match &highlight.content {
                HighlightContent::Text(text) => text.trim().is_empty(),
                HighlightContent::Nodes(nodes) => nodes.iter().all(Node::is_blank),
            },
            Node::Formula(formula) => formula.content.trim().is_empty(),
            Node::Image(_) => false,
        }
    }

    /// Nodes nested directly inside this one
    pub fn child_nodes(&self) -> Vec<&Node> {
        match self {
            Node::Section(section) => section.children.iter().collect(),
            Node::List(list) => list
                .items
                .iter()
                .filter_map(|item| match item {
                    ListItem::Node(node) => Some(node),
                    ListItem::Text(_) => None,
                })
                .collect(),
            Node::Highlight(highlight) => match &highlight.content {
                HighlightContent::Nodes(nodes) => nodes.iter().collect(),
                HighlightContent::Text(_) => Vec::new(),
            },
            Node::Text(_) | Node::Table(_) | Node::Formula(_) | Node::Image(_) => Vec::new(),
        }
    }

    /// Append the display text carried directly by this node (not its children).
    ///
    /// Formula sources and SVG payloads are not display text and are skipped.
    pub fn push_own_text(&self, out: &mut Vec<String>) {
        match self {
            Node::Section(section) => out.push(section.title.clone()),
            Node::Text(text) => out.push(text.content.clone()),
            Node::List(list) => {
                for item in &list.items {
                    if let ListItem::Text(text) = item {
                        out.push(text.clone());
                    }
                }
            }
            Node::Table(table) => {
                out.extend(table.headers.iter().flatten().cloned());
                out.extend(table.rows.iter().flatten().cloned());
                out.extend(table.caption.iter().cloned());
            }
            Node::Highlight(highlight) => {
                if let HighlightContent::Text(text) = &highlight.content {
                    out.push(text.clone());
                }
            }
            Node::Image(image) => out.extend(image.caption.iter().cloned()),
            Node::Formula(_) => {}
        }
    }
}

impl Document {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first, pre-order traversal of every node in the tree
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: self.nodes.iter().rev().collect(),
        }
    }

    /// All display text in document order, one entry per text-bearing field
    pub fn display_text(&self) -> Vec<String> {
        let mut out = Vec::new();
        for node in self.walk() {
            node.push_own_text(&mut out);
        }
        out
    }
}

/// Iterator returned by [`Document::walk`]
pub struct Walk<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.child_nodes().into_iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut chapter = SectionNode::new("Ch", 1);
        let mut section = SectionNode::new("Sec", 2);
        section.children.push(Node::Text(TextNode::plain("Body")));
        chapter.children.push(Node::Section(section));
        chapter.children.push(Node::List(ListNode {
            items: vec![
                ListItem::Text("one".to_string()),
                ListItem::Node(Node::List(ListNode {
                    items: vec![ListItem::Text("nested".to_string())],
                    ordered: true,
                })),
            ],
            ordered: false,
        }));
        Document::new(vec![Node::Section(chapter)])
    }

    #[test]
    fn test_walk_is_pre_order() {
        let doc = sample();
        let kinds: Vec<&str> = doc.walk().map(Node::kind_name).collect();
        assert_eq!(kinds, vec!["section", "section", "text", "list", "list"]);
    }

    #[test]
    fn test_display_text_order() {
        let doc = sample();
        assert_eq!(doc.display_text(), vec!["Ch", "Sec", "Body", "one", "nested"]);
    }

    #[test]
    fn test_blank_nodes() {
        assert!(Node::Text(TextNode::plain("  ")).is_blank());
        assert!(Node::List(ListNode {
            items: vec![ListItem::Text(String::new())],
            ordered: false,
        })
        .is_blank());
        assert!(Node::Table(TableNode {
            headers: None,
            rows: Vec::new(),
            caption: Some("Caption only".to_string()),
        })
        .is_blank());
        assert!(!Node::Image(ImageNode::default()).is_blank());
    }

    #[test]
    fn test_column_count() {
        let table = TableNode {
            headers: None,
            rows: vec![vec!["a".to_string(), "b".to_string()]],
            caption: None,
        };
        assert_eq!(table.column_count(), 2);
    }
}
