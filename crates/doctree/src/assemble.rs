//! Nesting of flat block output into a section tree.

use doctree_core::{Document, Node, SectionNode};

/// A built block, ready to be placed in the tree
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Heading { level: u8, title: String },
    Node(Node),
}

/// Nest entries under the most recent heading of lower level.
///
/// A heading pops every open section whose level is not lower than its own.
/// Content before the first heading stays at the root.
pub fn assemble(entries: impl IntoIterator<Item = Entry>) -> Document {
    let mut roots = Vec::new();
    let mut stack: Vec<SectionNode> = Vec::new();

    for entry in entries {
        match entry {
            Entry::Heading { level, title } => {
                while stack.last().is_some_and(|top| top.level >= level) {
                    close_top(&mut stack, &mut roots);
                }
                stack.push(SectionNode::new(title, level));
            }
            Entry::Node(node) => match stack.last_mut() {
                Some(top) => top.children.push(node),
                None => roots.push(node),
            },
        }
    }

    while !stack.is_empty() {
        close_top(&mut stack, &mut roots);
    }
    Document::new(roots)
}

fn close_top(stack: &mut Vec<SectionNode>, roots: &mut Vec<Node>) {
    let Some(section) = stack.pop() else { return };
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Section(section)),
        None => roots.push(Node::Section(section)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctree_core::TextNode;

    fn heading(level: u8, title: &str) -> Entry {
        Entry::Heading {
            level,
            title: title.to_string(),
        }
    }

    fn text(content: &str) -> Entry {
        Entry::Node(Node::Text(TextNode::plain(content)))
    }

    fn section(node: &Node) -> &SectionNode {
        match node {
            Node::Section(section) => section,
            other => panic!("expected a section, got {}", other.kind_name()),
        }
    }

    #[test]
    fn test_nesting() {
        let doc = assemble(vec![
            heading(1, "Ch"),
            heading(2, "Sec"),
            heading(3, "Sub"),
            text("Text"),
        ]);
        assert_eq!(doc.nodes.len(), 1);
        let chapter = section(&doc.nodes[0]);
        let sec = section(&chapter.children[0]);
        let sub = section(&sec.children[0]);
        assert_eq!((chapter.level, sec.level, sub.level), (1, 2, 3));
        assert_eq!(sub.children, vec![Node::Text(TextNode::plain("Text"))]);
    }

    #[test]
    fn test_sibling_and_shallower_headings() {
        let doc = assemble(vec![
            heading(1, "A"),
            heading(2, "A.1"),
            heading(2, "A.2"),
            heading(1, "B"),
            text("b"),
        ]);
        assert_eq!(doc.nodes.len(), 2);
        let a = section(&doc.nodes[0]);
        assert_eq!(a.children.len(), 2);
        assert_eq!(section(&a.children[1]).title, "A.2");
        assert_eq!(section(&doc.nodes[1]).children.len(), 1);
    }

    #[test]
    fn test_content_before_headings_and_skipped_levels() {
        let doc = assemble(vec![text("intro"), heading(3, "Deep"), heading(2, "Mid"), text("x")]);
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.nodes[0], Node::Text(TextNode::plain("intro")));
        assert_eq!(section(&doc.nodes[1]).title, "Deep");
        assert_eq!(section(&doc.nodes[2]).children.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(assemble(Vec::new()).nodes.is_empty());
    }
}
