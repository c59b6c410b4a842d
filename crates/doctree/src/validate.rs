//! Structural checks over a converted tree.

use std::fmt;

use doctree_core::{Document, HighlightContent, Node};

/// Markup that should never survive inline formatting
const MARKUP_REMNANTS: &[&str] = &[
    "\\textbf{", "\\textit{", "\\emph{", "\\begin{", "\\end{", "\\item", "**",
];

/// Something wrong with a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Position in the tree, e.g. `0/2/1` (child indices from the root)
    pub path: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// A section whose level is not greater than its parent's
    SectionLevel { parent: u8, child: u8 },
    /// A header or row whose width differs from the table's
    RaggedTable {
        row: Option<usize>,
        expected: usize,
        found: usize,
    },
    /// A list, table or highlight with nothing in it
    EmptyCollection(&'static str),
    /// Leftover source markup in display text
    MarkupRemnant(String),
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.path)?;
        match &self.kind {
            IssueKind::SectionLevel { parent, child } => {
                write!(f, "level {child} section inside level {parent} section")
            }
            IssueKind::RaggedTable {
                row: Some(row),
                expected,
                found,
            } => write!(f, "table row {row} has {found} cells, expected {expected}"),
            IssueKind::RaggedTable {
                row: None,
                expected,
                found,
            } => write!(f, "table header has {found} cells, expected {expected}"),
            IssueKind::EmptyCollection(kind) => write!(f, "empty {kind}"),
            IssueKind::MarkupRemnant(text) => write!(f, "markup left in text: {text:?}"),
        }
    }
}

/// Check nesting levels, table shape, empty collections and markup remnants
pub fn validate(document: &Document) -> Vec<Issue> {
    let mut issues = Vec::new();
    for (index, node) in document.nodes.iter().enumerate() {
        check_node(node, None, &index.to_string(), &mut issues);
    }
    issues
}

fn check_node(node: &Node, parent_level: Option<u8>, path: &str, issues: &mut Vec<Issue>) {
    let mut report = |kind| {
        issues.push(Issue {
            path: path.to_string(),
            kind,
        })
    };

    match node {
        Node::Section(section) => {
            if let Some(parent) = parent_level.filter(|&parent| section.level <= parent) {
                report(IssueKind::SectionLevel {
                    parent,
                    child: section.level,
                });
            }
        }
        Node::List(list) if list.items.is_empty() => report(IssueKind::EmptyCollection("list")),
        Node::Table(table) => {
            if table.headers.is_none() && table.rows.is_empty() {
                report(IssueKind::EmptyCollection("table"));
            }
            let expected = table.column_count();
            if let Some(headers) = table.headers.as_ref().filter(|h| h.len() != expected) {
                report(IssueKind::RaggedTable {
                    row: None,
                    expected,
                    found: headers.len(),
                });
            }
            for (row, cells) in table.rows.iter().enumerate() {
                if cells.len() != expected {
                    report(IssueKind::RaggedTable {
                        row: Some(row),
                        expected,
                        found: cells.len(),
                    });
                }
            }
        }
        Node::Highlight(highlight) => {
            let empty = match &highlight.content {
                HighlightContent::Text(text) => text.trim().is_empty(),
                HighlightContent::Nodes(nodes) => nodes.is_empty(),
            };
            if empty {
                report(IssueKind::EmptyCollection("highlight"));
            }
        }
        _ => {}
    }

    let mut text = Vec::new();
    node.push_own_text(&mut text);
    for fragment in &text {
        if let Some(remnant) = MARKUP_REMNANTS.iter().find(|m| fragment.contains(**m)) {
            report(IssueKind::MarkupRemnant(remnant.to_string()));
        }
    }
    if let Node::Table(table) = node {
        let cells = table.headers.iter().chain(&table.rows).flatten();
        if cells.into_iter().any(|cell| cell.contains('|')) {
            report(IssueKind::MarkupRemnant("|".to_string()));
        }
    }

    let level = match node {
        Node::Section(section) => Some(section.level),
        _ => parent_level,
    };
    for (index, child) in node.child_nodes().into_iter().enumerate() {
        check_node(child, level, &format!("{path}/{index}"), issues);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctree_core::{ListNode, SectionNode, TableNode, TextNode};

    #[test]
    fn test_clean_document() {
        let mut chapter = SectionNode::new("Capítulo", 1);
        chapter.children.push(Node::Section(SectionNode::new("Seção", 2)));
        chapter.children.push(Node::Text(TextNode::plain("Texto limpo")));
        assert_eq!(validate(&Document::new(vec![Node::Section(chapter)])), Vec::new());
    }

    #[test]
    fn test_section_level() {
        let mut outer = SectionNode::new("A", 2);
        outer.children.push(Node::Section(SectionNode::new("B", 2)));
        let issues = validate(&Document::new(vec![Node::Section(outer)]));
        assert_eq!(
            issues,
            vec![Issue {
                path: "0/0".to_string(),
                kind: IssueKind::SectionLevel { parent: 2, child: 2 },
            }]
        );
    }

    #[test]
    fn test_ragged_and_piped_table() {
        let table = TableNode {
            headers: Some(vec!["a".to_string(), "b".to_string()]),
            rows: vec![vec!["1".to_string()], vec!["x | y".to_string(), "2".to_string()]],
            caption: None,
        };
        let issues = validate(&Document::new(vec![Node::Table(table)]));
        let kinds: Vec<IssueKind> = issues.into_iter().map(|issue| issue.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IssueKind::RaggedTable {
                    row: Some(0),
                    expected: 2,
                    found: 1,
                },
                IssueKind::MarkupRemnant("|".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_list_and_remnant() {
        let doc = Document::new(vec![
            Node::List(ListNode {
                items: Vec::new(),
                ordered: false,
            }),
            Node::Text(TextNode::plain("ainda \\textbf{negrito}")),
        ]);
        let issues = validate(&doc);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, IssueKind::EmptyCollection("list"));
        assert_eq!(issues[1].path, "1");
        assert_eq!(issues[1].to_string(), "1: markup left in text: \"\\\\textbf{\"");
    }
}
