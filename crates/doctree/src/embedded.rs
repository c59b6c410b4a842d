//! Extraction of Markdown chapters stored as template literals in TS/TSX sources.
//!
//! Chapters are objects such as `{ id: '3', titulo: '...', conteudo: `...` }`.
//! When no object carries an id, every `conteudo` literal is taken in order
//! and numbered from 1.

use indexmap::IndexMap;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

static CHAPTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"id:\s*['"](\d+)['"][\s\S]*?conteudo:\s*`((?:[^`\\]|\\[\s\S])*)`"#).unwrap()
});

static CONTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"conteudo:\s*`((?:[^`\\]|\\[\s\S])*)`").unwrap());

/// A Markdown chapter found in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedChapter {
    pub id: String,
    pub content: String,
}

/// Find every embedded chapter; a later chapter replaces an earlier one with the same id
pub fn extract_embedded_chapters(source: &str) -> Vec<EmbeddedChapter> {
    let mut chapters: IndexMap<String, String> = IndexMap::new();
    for caps in CHAPTER.captures_iter(source) {
        let content = unescape_template(&caps[2]);
        debug!("found chapter {} ({} bytes)", &caps[1], content.len());
        if chapters.insert(caps[1].to_string(), content).is_some() {
            warn!("chapter {} appears more than once; keeping the last one", &caps[1]);
        }
    }

    if chapters.is_empty() {
        for (index, caps) in CONTENT.captures_iter(source).enumerate() {
            debug!("found unnumbered chapter content #{}", index + 1);
            chapters.insert((index + 1).to_string(), unescape_template(&caps[1]));
        }
    }

    chapters
        .into_iter()
        .map(|(id, content)| EmbeddedChapter { id, content })
        .collect()
}

/// Resolve the escapes a template literal allows
fn unescape_template(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(escaped @ ('`' | '$' | '\\' | '\'' | '"')) => out.push(escaped),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
