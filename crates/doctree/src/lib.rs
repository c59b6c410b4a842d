//! # doctree
//!
//! Convert LaTeX and Markdown documents into a JSON document tree.
//!
//! A document goes through three stages: the segmenter splits the source into
//! blocks (headings, paragraphs, tables, lists, boxes, formulas, figures), each
//! block is built into a node with its inline markup normalized by an ordered
//! rule table, and the assembler nests everything under its headings.
//!
//! ## Design
//!
//! Both dialects share one pipeline; the dialect only selects how lines are
//! recognized and which inline rules apply. Conversion never fails: blocks
//! without a closing marker are flushed as they are, ragged table rows are
//! padded or truncated and unknown commands are kept literally. Only the
//! [`batch`] module, which reads and writes files, returns errors.
//!
//! ## Example
//!
//! ```rust
//! use doctree::{DoctreeService, Node};
//!
//! let service = DoctreeService::new();
//! let doc = service.convert("\\section{Juros}\nO \\textbf{montante} cresce.");
//!
//! let Node::Section(section) = &doc.nodes[0] else { panic!() };
//! assert_eq!(section.title, "Juros");
//! assert_eq!(section.children.len(), 1);
//! ```

use std::io;
use std::path::PathBuf;

mod assemble;
pub mod batch;
mod blocks;
mod embedded;
mod list;
mod rules;
mod segment;
mod service;
mod table;
mod utilities;
mod validate;

pub use assemble::{assemble, Entry};
pub use embedded::{extract_embedded_chapters, EmbeddedChapter};
pub use rules::{Filter, Formatted, Rule, Rules, SubstituteFn};
pub use segment::{segment, Block, BlockKind};
pub use service::{ConvertedChapter, Dialect, DoctreeOptions, DoctreeService};
pub use utilities::*;
pub use validate::{validate, Issue, IssueKind};

pub use doctree_core::{
    Document, FormulaNode, HighlightContent, HighlightKind, HighlightNode, ImageNode, ListItem,
    ListNode, Node, SectionNode, SizeClass, TableNode, TextNode, TextStyle,
};

/// Error type for doctree operations
#[derive(Debug, thiserror::Error)]
pub enum DoctreeError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported input: {}", .0.display())]
    UnsupportedInput(PathBuf),

    #[error("{} would overwrite the output of {}", .output.display(), .first.display())]
    OutputConflict { output: PathBuf, first: PathBuf },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DoctreeError>;
