//! Configuration options for document tree serialization

use serde::{Deserialize, Serialize};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON tree read by the content renderer
    #[default]
    Json,
    /// Markdown outline of the tree, for reading the result by eye
    Markdown,
}

impl OutputFormat {
    /// File extension used for converted output
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

/// Options for document tree serialization
#[derive(Debug, Clone)]
pub struct Options {
    /// Output format
    pub format: OutputFormat,

    /// Indent JSON output
    pub pretty: bool,

    /// Bullet list marker for the Markdown outline
    pub bullet_list_marker: char,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            pretty: true,
            bullet_list_marker: '-',
        }
    }
}
