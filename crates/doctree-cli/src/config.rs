use std::fs;
use std::path::{Path, PathBuf};

use doctree::batch::BatchOptions;
use doctree::{Dialect, DoctreeError, DoctreeOptions};
use doctree_core::{Options, OutputFormat};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Configuration options for doctree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output directory; outputs go next to their sources when unset
    pub output_dir: Option<PathBuf>,

    /// Input dialect; detected per document when unset
    pub dialect: Option<Dialect>,

    pub format: OutputFormat,

    /// Indent JSON output
    pub pretty: bool,

    pub straighten_quotes: bool,

    /// Bullet marker of the Markdown outline
    pub bullet_list_marker: char,

    /// Validate converted trees
    pub check: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: None,
            dialect: None,
            format: OutputFormat::Json,
            pretty: true,
            straighten_quotes: false,
            bullet_list_marker: '-',
            check: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML or JSON file, chosen by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> doctree::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DoctreeError::Io {
            path: path.to_owned(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => toml::from_str(&content).map_err(|e| {
                DoctreeError::Config(format!(
                    "Failed to parse TOML config from {}: {e}",
                    path.display()
                ))
            }),
            Some(ext) if ext.eq_ignore_ascii_case("json") => serde_json::from_str(&content)
                .map_err(|e| {
                    DoctreeError::Config(format!(
                        "Failed to parse JSON config from {}: {e}",
                        path.display()
                    ))
                }),
            _ => Err(DoctreeError::Config(format!(
                "Unsupported config file format: {}",
                path.display()
            ))),
        }
    }

    /// Apply command line flags, which take precedence over the file
    pub fn merge_with_cli(&mut self, cli: &Cli) {
        if let Some(output_dir) = &cli.output_dir {
            self.output_dir = Some(output_dir.clone());
        }
        if let Some(dialect) = cli.dialect {
            self.dialect = dialect.dialect();
        }
        if let Some(format) = cli.format {
            self.format = format.into();
        }
        if cli.compact {
            self.pretty = false;
        }
        if cli.straighten_quotes {
            self.straighten_quotes = true;
        }
        if cli.check {
            self.check = true;
        }
    }

    pub fn doctree_options(&self) -> DoctreeOptions {
        DoctreeOptions {
            dialect: self.dialect,
            straighten_quotes: self.straighten_quotes,
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            output_dir: self.output_dir.clone(),
            serialize: Options {
                format: self.format,
                pretty: self.pretty,
                bullet_list_marker: self.bullet_list_marker,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doctree.toml");
        fs::write(
            &path,
            "dialect = \"latex\"\nformat = \"markdown\"\nbullet_list_marker = \"*\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.dialect, Some(Dialect::Latex));
        assert_eq!(config.format, OutputFormat::Markdown);
        assert_eq!(config.bullet_list_marker, '*');
        assert!(config.pretty);
    }

    #[test]
    fn test_from_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doctree.json");
        fs::write(&path, r#"{ "pretty": false, "output_dir": "out" }"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(!config.pretty);
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.dialect, None);
    }

    #[test]
    fn test_unsupported_and_invalid_files() {
        let dir = TempDir::new().unwrap();
        let yaml = dir.path().join("doctree.yaml");
        fs::write(&yaml, "pretty: false").unwrap();
        assert!(matches!(Config::from_file(&yaml), Err(DoctreeError::Config(_))));

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "pretty = ").unwrap();
        assert!(matches!(Config::from_file(&broken), Err(DoctreeError::Config(_))));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::from_file(&missing), Err(DoctreeError::Io { .. })));
    }

    #[test]
    fn test_cli_takes_precedence() {
        let mut config = Config {
            dialect: Some(Dialect::Latex),
            ..Default::default()
        };
        let cli = Cli::parse_from(["doctree", "--dialect", "auto", "--compact", "--check", "a.md"]);
        config.merge_with_cli(&cli);

        assert_eq!(config.dialect, None);
        assert!(!config.pretty);
        assert!(config.check);

        let batch = config.batch_options();
        assert!(!batch.serialize.pretty);
        assert_eq!(batch.output_dir, None);
        assert_eq!(config.doctree_options(), DoctreeOptions::default());
    }
}
