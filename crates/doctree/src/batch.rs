//! Batch conversion of files and directories.
//!
//! This is the only part of the crate that touches the filesystem. Failures
//! are collected per source file so one bad document does not stop a batch.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use doctree_core::{serialize, Document, Options};
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::service::{Dialect, DoctreeService};
use crate::{DoctreeError, Result};

/// What a source file holds, judged by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Latex,
    Markdown,
    /// TypeScript/JavaScript with Markdown chapters in template literals
    Embedded,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "tex" | "latex" => Some(SourceKind::Latex),
            "md" | "markdown" => Some(SourceKind::Markdown),
            "tsx" | "ts" | "jsx" | "js" => Some(SourceKind::Embedded),
            _ => None,
        }
    }
}

/// Where and how converted trees are written
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Write outputs here instead of next to each source
    pub output_dir: Option<PathBuf>,
    pub serialize: Options,
}

/// One tree written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedDocument {
    pub source: PathBuf,
    pub output: PathBuf,
    pub document: Document,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub converted: Vec<ConvertedDocument>,
    pub failed: Vec<(PathBuf, DoctreeError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Expand directories into the supported files below them.
///
/// Paths that are not directories are kept as given, so a misnamed or missing
/// file is reported by the conversion instead of being skipped silently.
pub fn collect_sources(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && SourceKind::from_path(path).is_some() && !is_outline_output(path) {
                files.push(path.to_owned());
            }
        }
    }

    files
}

/// `cap.tree.md`, written by an earlier run with Markdown output
fn is_outline_output(path: &Path) -> bool {
    SourceKind::from_path(path) == Some(SourceKind::Markdown)
        && Path::new(path.file_stem().unwrap_or_default())
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tree"))
}

/// Convert one source file and write its tree (one per chapter for embedded sources)
pub fn convert_file(
    service: &DoctreeService,
    path: &Path,
    options: &BatchOptions,
) -> Result<Vec<ConvertedDocument>> {
    convert_source(service, path, options)?
        .into_iter()
        .map(|(output, document)| write_document(path, output, document, options))
        .collect()
}

/// Convert every source under `paths`, collecting failures.
///
/// A source whose output path was already written earlier in the run fails
/// with [`DoctreeError::OutputConflict`] and nothing of it is written.
pub fn convert_paths(
    service: &DoctreeService,
    paths: &[PathBuf],
    options: &BatchOptions,
) -> BatchReport {
    let sources = collect_sources(paths);
    info!("Found {} source files", sources.len());

    let mut report = BatchReport::default();
    let mut written: HashMap<PathBuf, PathBuf> = HashMap::new();
    for source in sources {
        let result = convert_source(service, &source, options).and_then(|documents| {
            claim_outputs(&mut written, &source, &documents)?;
            documents
                .into_iter()
                .map(|(output, document)| write_document(&source, output, document, options))
                .collect::<Result<Vec<_>>>()
        });
        match result {
            Ok(documents) => {
                for converted in &documents {
                    info!("{} -> {}", source.display(), converted.output.display());
                }
                report.converted.extend(documents);
            }
            Err(err) => {
                warn!("Failed to convert {}: {err}", source.display());
                report.failed.push((source, err));
            }
        }
    }
    report
}

/// Convert a source into `(output path, tree)` pairs without writing anything
fn convert_source(
    service: &DoctreeService,
    path: &Path,
    options: &BatchOptions,
) -> Result<Vec<(PathBuf, Document)>> {
    let kind =
        SourceKind::from_path(path).ok_or_else(|| DoctreeError::UnsupportedInput(path.to_owned()))?;
    debug!("reading {} as {kind:?}", path.display());
    let source = fs::read_to_string(path).map_err(|source| DoctreeError::Io {
        path: path.to_owned(),
        source,
    })?;

    let dialect = match kind {
        SourceKind::Embedded => {
            let chapters = service.convert_embedded(&source);
            if chapters.is_empty() {
                warn!("no embedded chapters found in {}", path.display());
            }
            let extension = options.serialize.format.extension();
            let dir = match &options.output_dir {
                Some(dir) => dir.clone(),
                None => path.parent().map(Path::to_owned).unwrap_or_default(),
            };
            return Ok(chapters
                .into_iter()
                .map(|chapter| {
                    let output = dir.join(format!("capitulo{}-converted.{extension}", chapter.id));
                    (output, chapter.document)
                })
                .collect());
        }
        SourceKind::Latex => Dialect::Latex,
        SourceKind::Markdown => Dialect::Markdown,
    };

    let dialect = service.options().dialect.unwrap_or(dialect);
    let document = service.convert_with(&source, dialect);
    Ok(vec![(output_path(path, options), document)])
}

/// Record the outputs of `source`, failing if an earlier source already wrote one of them
fn claim_outputs(
    written: &mut HashMap<PathBuf, PathBuf>,
    source: &Path,
    documents: &[(PathBuf, Document)],
) -> Result<()> {
    if let Some((output, first)) = documents
        .iter()
        .find_map(|(output, _)| written.get(output).map(|first| (output, first)))
    {
        return Err(DoctreeError::OutputConflict {
            output: output.clone(),
            first: first.clone(),
        });
    }
    for (output, _) in documents {
        written.insert(output.clone(), source.to_owned());
    }
    Ok(())
}

fn output_path(source: &Path, options: &BatchOptions) -> PathBuf {
    let extension = options.serialize.format.extension();
    let same_extension = source
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    // Never overwrite the source itself
    let extension = if same_extension {
        format!("tree.{extension}")
    } else {
        extension.to_string()
    };

    match &options.output_dir {
        Some(dir) => {
            let stem = source.file_stem().unwrap_or_default().to_string_lossy();
            dir.join(format!("{stem}.{extension}"))
        }
        None => source.with_extension(extension),
    }
}

fn write_document(
    source: &Path,
    output: PathBuf,
    document: Document,
    options: &BatchOptions,
) -> Result<ConvertedDocument> {
    let io_error = |path: &Path| {
        let path = path.to_owned();
        move |source| DoctreeError::Io { path, source }
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let serialized = serialize(&document, &options.serialize)?;
    fs::write(&output, serialized).map_err(io_error(&output))?;

    Ok(ConvertedDocument {
        source: source.to_owned(),
        output,
        document,
    })
}
