use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use doctree::Dialect;
use doctree_core::OutputFormat;

/// Command line interface for doctree
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Convert LaTeX and Markdown documents into JSON document trees"
)]
pub struct Cli {
    /// Files or directories to convert; directories are searched recursively
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Write outputs into this directory instead of next to each source
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Input dialect; `auto` detects it per document
    #[arg(short, long, value_enum)]
    pub dialect: Option<DialectArg>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Write JSON without indentation
    #[arg(long)]
    pub compact: bool,

    /// Replace curly quotes with straight ones
    #[arg(long)]
    pub straighten_quotes: bool,

    /// Validate every tree and report structural issues
    #[arg(long)]
    pub check: bool,

    /// Path to configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config")]
    pub config_file: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectArg {
    Auto,
    Latex,
    Markdown,
}

impl DialectArg {
    pub fn dialect(self) -> Option<Dialect> {
        match self {
            DialectArg::Auto => None,
            DialectArg::Latex => Some(Dialect::Latex),
            DialectArg::Markdown => Some(Dialect::Markdown),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Json,
    Markdown,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "doctree", "-d", "latex", "-f", "markdown", "--compact", "-o", "out", "cap1.tex", "docs",
        ]);
        assert_eq!(cli.inputs, vec![PathBuf::from("cap1.tex"), PathBuf::from("docs")]);
        assert_eq!(cli.dialect, Some(DialectArg::Latex));
        assert_eq!(cli.format, Some(FormatArg::Markdown));
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert!(cli.compact);
        assert!(!cli.check);
    }

    #[test]
    fn test_inputs_required() {
        assert!(Cli::try_parse_from(["doctree", "--check"]).is_err());
    }
}
