//! doctree-core - document tree data model and serialization
//!
//! This crate provides the node types produced by `doctree` and their
//! serialization. The JSON form is the artifact consumed by the content
//! renderer; the Markdown outline is meant for proof-reading.
//!
//! # Architecture
//!
//! ```text
//! LaTeX source ────┐      ┌───────────────┐ ──▶ JSON tree
//!                  ├─────▶│ Document tree │
//! Markdown source ─┘      └───────────────┘ ──▶ Markdown outline
//! ```
//!
//! # Example
//!
//! ```rust
//! use doctree_core::{to_json, Document, Node, SectionNode, TextNode};
//!
//! let mut chapter = SectionNode::new("Juros compostos", 1);
//! chapter.children.push(Node::Text(TextNode::plain("O dinheiro cresce.")));
//!
//! let json = to_json(&Document::new(vec![Node::Section(chapter)]), false).unwrap();
//! assert!(json.starts_with(r#"[{"type":"section""#));
//! ```

mod ast;
mod options;
mod serialize;

pub use ast::{
    Document, FormulaNode, HighlightContent, HighlightKind, HighlightNode, ImageNode, ListItem,
    ListNode, Node, SectionNode, SizeClass, TableNode, TextNode, TextStyle, Walk,
};
pub use options::{Options, OutputFormat};
pub use serialize::{from_json, serialize, to_json, to_markdown};
