//! Line-oriented block segmentation.
//!
//! The segmenter walks a document one line at a time holding a single `Mode`.
//! While idle it collects paragraph lines and looks for block openers; inside a
//! block it hands every line to the block's closer until the closing marker
//! shows up. A block that never closes is flushed as-is.

use log::{debug, trace, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::list::markdown_item;
use crate::service::Dialect;
use crate::utilities::{find_command, is_escaped, matching_brace, strip_comment};

/// Kind of a segmented block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Paragraph,
    Table,
    List { ordered: bool },
    Highlight,
    Formula,
    Figure,
}

impl BlockKind {
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Heading(_) => "heading",
            BlockKind::Paragraph => "paragraph",
            BlockKind::Table => "table",
            BlockKind::List { .. } => "list",
            BlockKind::Highlight => "highlight",
            BlockKind::Formula => "formula",
            BlockKind::Figure => "figure",
        }
    }
}

/// A contiguous run of source text with its block kind.
///
/// For headings `raw` holds the unformatted title; paragraph lines are joined
/// with single spaces; other blocks keep their lines joined by `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub raw: String,
    /// False when the block was flushed without its closing marker
    pub terminated: bool,
}

/// Split a document into blocks
pub fn segment(source: &str, dialect: Dialect) -> Vec<Block> {
    match dialect {
        Dialect::Latex => Segmenter::new(LatexSyntax).run(source),
        Dialect::Markdown => Segmenter::new(MarkdownSyntax).run(source),
    }
}

static ENVIRONMENT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(begin|end)\{([A-Za-z]+\*?)\}").unwrap());

/// How an open block recognizes its end
enum Closer {
    /// LaTeX environment; nested environments of the same name are counted
    Environment { name: String, depth: usize },
    /// Brace-delimited box command with `groups` mandatory arguments
    Braces { depth: i32, groups: usize },
    /// Paired delimiters such as `$$ ... $$` or `<svg ... </svg>`
    Delimiter {
        open: &'static str,
        close: &'static str,
        opened: bool,
    },
    /// Block lasting while lines are accepted
    Continuation(fn(&str) -> bool),
    /// Block made of a single line
    Line,
}

enum Step {
    Continue,
    /// The block ends at this byte offset of the line
    Close(usize),
    /// The line is not part of the block, which ended before it
    Reject,
}

impl Closer {
    fn environment(name: &str) -> Self {
        Closer::Environment {
            name: name.to_string(),
            depth: 0,
        }
    }

    fn delimiter(open: &'static str, close: &'static str) -> Self {
        Closer::Delimiter {
            open,
            close,
            opened: false,
        }
    }

    /// Whether the block has a closing marker of its own
    fn is_explicit(&self) -> bool {
        !matches!(self, Closer::Continuation(_))
    }

    fn step(&mut self, line: &str) -> Step {
        match self {
            Closer::Environment { name, depth } => {
                for caps in ENVIRONMENT_MARKER.captures_iter(line) {
                    if &caps[2] != name.as_str() {
                        continue;
                    }
                    if &caps[1] == "begin" {
                        *depth += 1;
                    } else {
                        *depth = depth.saturating_sub(1);
                        if *depth == 0 {
                            let end = caps.get(0).map_or(line.len(), |m| m.end());
                            return Step::Close(end);
                        }
                    }
                }
                Step::Continue
            }

            Closer::Braces { depth, groups } => {
                let bytes = line.as_bytes();
                let mut i = 0;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => i += 1,
                        b'{' => *depth += 1,
                        b'}' => {
                            *depth -= 1;
                            if *depth == 0 {
                                *groups = groups.saturating_sub(1);
                                if *groups == 0 {
                                    return Step::Close(i + 1);
                                }
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                Step::Continue
            }

            Closer::Delimiter {
                open,
                close,
                opened,
            } => {
                let mut from = 0;
                if !*opened {
                    match find_unescaped(line, open, 0) {
                        Some(pos) => {
                            *opened = true;
                            from = pos + open.len();
                        }
                        None => return Step::Continue,
                    }
                }
                match find_unescaped(line, close, from) {
                    Some(pos) => Step::Close(pos + close.len()),
                    None => Step::Continue,
                }
            }

            Closer::Continuation(accepts) => {
                if (*accepts)(line) {
                    Step::Continue
                } else {
                    Step::Reject
                }
            }

            Closer::Line => Step::Close(line.len()),
        }
    }
}

fn find_unescaped(line: &str, pattern: &str, from: usize) -> Option<usize> {
    let mut search = from;
    while let Some(found) = line.get(search..)?.find(pattern) {
        let pos = search + found;
        if !is_escaped(line, pos) {
            return Some(pos);
        }
        search = pos + 1;
    }
    None
}

struct Pending {
    lines: Vec<String>,
    closer: Closer,
}

impl Pending {
    fn new(closer: Closer) -> Self {
        Self {
            lines: Vec::new(),
            closer,
        }
    }

    fn push(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Segmenter state
enum Mode {
    Idle,
    InTable(Pending),
    InList { ordered: bool, pending: Pending },
    InBox(Pending),
    InFormula(Pending),
    InFigure(Pending),
}

impl Mode {
    fn pending(&self) -> Option<&Pending> {
        match self {
            Mode::Idle => None,
            Mode::InTable(pending)
            | Mode::InList { pending, .. }
            | Mode::InBox(pending)
            | Mode::InFormula(pending)
            | Mode::InFigure(pending) => Some(pending),
        }
    }

    fn pending_mut(&mut self) -> Option<&mut Pending> {
        match self {
            Mode::Idle => None,
            Mode::InTable(pending)
            | Mode::InList { pending, .. }
            | Mode::InBox(pending)
            | Mode::InFormula(pending)
            | Mode::InFigure(pending) => Some(pending),
        }
    }

    /// Whether a heading line ends this block early.
    ///
    /// Math is left alone so that a stray `\section` inside it stays raw.
    fn yields_to_headings(&self) -> bool {
        match self {
            Mode::Idle | Mode::InFormula(_) => false,
            _ => self.pending().is_some_and(|p| p.closer.is_explicit()),
        }
    }

    fn into_block(self, terminated: bool) -> Option<Block> {
        let (kind, pending) = match self {
            Mode::Idle => return None,
            Mode::InTable(pending) => (BlockKind::Table, pending),
            Mode::InList { ordered, pending } => (BlockKind::List { ordered }, pending),
            Mode::InBox(pending) => (BlockKind::Highlight, pending),
            Mode::InFormula(pending) => (BlockKind::Formula, pending),
            Mode::InFigure(pending) => (BlockKind::Figure, pending),
        };
        Some(Block {
            kind,
            raw: pending.lines.join("\n"),
            terminated,
        })
    }
}

/// A block opener found on a line
struct Opening {
    /// Byte offset of the opener within the trimmed line
    start: usize,
    mode: Mode,
}

struct Heading {
    level: u8,
    title: String,
    /// Text following the heading command on the same line
    rest: String,
}

/// Dialect-specific line recognition
trait Syntax {
    /// The line as the segmenter should see it; `None` drops it entirely
    fn prepare<'a>(&self, line: &'a str) -> Option<&'a str>;

    /// Lines that carry no content, such as preamble commands
    fn is_noise(&self, line: &str) -> bool;

    /// Find a block opener, honoring the opener priority
    fn open(&self, line: &str) -> Option<Opening>;

    fn heading(&self, line: &str) -> Option<Heading>;
}

struct Segmenter<S> {
    syntax: S,
    mode: Mode,
    paragraph: Vec<String>,
    blocks: Vec<Block>,
}

impl<S: Syntax> Segmenter<S> {
    fn new(syntax: S) -> Self {
        Self {
            syntax,
            mode: Mode::Idle,
            paragraph: Vec::new(),
            blocks: Vec::new(),
        }
    }

    fn run(mut self, source: &str) -> Vec<Block> {
        for line in source.lines() {
            match self.syntax.prepare(line) {
                Some(line) => self.feed(line),
                None => trace!("skipping comment line"),
            }
        }

        // Blocks without a closing marker of their own end with the input
        let implicit = self.mode.pending().is_some_and(|p| !p.closer.is_explicit());
        self.close_block(implicit);
        self.flush_paragraph();
        self.blocks
    }

    fn feed(&mut self, line: &str) {
        let mut rest = line;
        loop {
            if self.mode.yields_to_headings() && self.syntax.heading(rest.trim()).is_some() {
                self.close_block(false);
                continue;
            }

            let Some(pending) = self.mode.pending_mut() else {
                self.feed_idle(rest);
                return;
            };

            match pending.closer.step(rest) {
                Step::Continue => {
                    pending.push(rest);
                    return;
                }
                Step::Close(end) => {
                    pending.push(&rest[..end]);
                    self.close_block(true);
                    rest = &rest[end..];
                    if rest.trim().is_empty() {
                        return;
                    }
                }
                Step::Reject => self.close_block(true),
            }
        }
    }

    fn feed_idle(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            self.flush_paragraph();
            return;
        }

        if self.syntax.is_noise(trimmed) {
            trace!("skipping noise line: {trimmed}");
            self.flush_paragraph();
            return;
        }

        if let Some(Opening { start, mode }) = self.syntax.open(trimmed) {
            let before = trimmed[..start].trim();
            if !before.is_empty() {
                self.push_text(before);
            }
            self.flush_paragraph();
            self.mode = mode;
            // Keep indentation when the opener starts the line; list nesting depends on it
            let first = if start == 0 {
                line.trim_end()
            } else {
                &trimmed[start..]
            };
            self.open_with(first);
            return;
        }

        self.push_text(trimmed);
    }

    /// Text outside any block: a heading, or more of the current paragraph
    fn push_text(&mut self, text: &str) {
        let Some(heading) = self.syntax.heading(text) else {
            self.paragraph.push(text.to_string());
            return;
        };
        self.flush_paragraph();
        self.emit(Block {
            kind: BlockKind::Heading(heading.level),
            raw: heading.title,
            terminated: true,
        });
        let rest = heading.rest.trim();
        if !rest.is_empty() {
            self.paragraph.push(rest.to_string());
        }
    }

    /// Feed the opening line of a block, which always belongs to it
    fn open_with(&mut self, line: &str) {
        let Some(pending) = self.mode.pending_mut() else {
            return;
        };
        match pending.closer.step(line) {
            Step::Continue | Step::Reject => pending.push(line),
            Step::Close(end) => {
                pending.push(&line[..end]);
                self.close_block(true);
                let rest = &line[end..];
                if !rest.trim().is_empty() {
                    self.feed(rest);
                }
            }
        }
    }

    fn close_block(&mut self, terminated: bool) {
        let mode = std::mem::replace(&mut self.mode, Mode::Idle);
        if let Some(block) = mode.into_block(terminated) {
            if !terminated {
                warn!(
                    "unterminated {} block flushed after {} lines",
                    block.kind.name(),
                    block.raw.lines().count()
                );
            }
            self.emit(block);
        }
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let raw = self.paragraph.join(" ");
        self.paragraph.clear();
        self.emit(Block {
            kind: BlockKind::Paragraph,
            raw,
            terminated: true,
        });
    }

    fn emit(&mut self, block: Block) {
        debug!("segmented {} block ({} bytes)", block.kind.name(), block.raw.len());
        self.blocks.push(block);
    }
}

const LATEX_NOISE: &[&str] = &[
    "documentclass",
    "usepackage",
    "maketitle",
    "tableofcontents",
    "listoffigures",
    "listoftables",
    "newpage",
    "clearpage",
    "cleardoublepage",
    "pagebreak",
    "title",
    "author",
    "date",
    "input",
    "include",
    "setcounter",
    "setlength",
    "newcommand",
    "renewcommand",
    "geometry",
    "pagestyle",
    "thispagestyle",
    "hypersetup",
    "definecolor",
    "graphicspath",
    "frontmatter",
    "mainmatter",
    "backmatter",
    "appendix",
    "bibliographystyle",
    "bibliography",
    "printbibliography",
];

const TABLE_ENVIRONMENTS: &[&str] = &["table", "table*", "tabular", "tabular*", "tabularx", "longtable"];
const LIST_ENVIRONMENTS: &[&str] = &["itemize", "enumerate", "description"];
const BOX_ENVIRONMENTS: &[&str] = &["minipage", "tcolorbox", "mdframed", "framed"];
const FORMULA_ENVIRONMENTS: &[&str] = &[
    "equation",
    "equation*",
    "align",
    "align*",
    "gather",
    "gather*",
    "multline",
    "multline*",
    "displaymath",
    "eqnarray",
    "eqnarray*",
];
const FIGURE_ENVIRONMENTS: &[&str] = &["figure", "figure*", "picture"];

/// Box commands and their mandatory argument counts
const BOX_COMMANDS: &[(&str, usize)] = &[
    ("fbox", 1),
    ("framebox", 1),
    ("colorbox", 2),
    ("fcolorbox", 3),
];

static LATEX_BEGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\begin\{([A-Za-z]+\*?)\}").unwrap());

static LATEX_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\\(chapter|section|subsection|subsubsection)\*?\s*(?:\[[^\]]*\])?\s*\{").unwrap()
});

struct LatexSyntax;

impl Syntax for LatexSyntax {
    fn prepare<'a>(&self, line: &'a str) -> Option<&'a str> {
        if line.trim_start().starts_with('%') {
            None
        } else {
            Some(strip_comment(line))
        }
    }

    fn is_noise(&self, line: &str) -> bool {
        line.starts_with("\\begin{document}")
            || line.starts_with("\\end{document}")
            || LATEX_NOISE
                .iter()
                .any(|name| matches!(find_command(line, name, 0), Some((0, _))))
    }

    fn open(&self, line: &str) -> Option<Opening> {
        let environments: Vec<(usize, &str)> = LATEX_BEGIN
            .captures_iter(line)
            .filter_map(|caps| Some((caps.get(0)?.start(), caps.get(1)?.as_str())))
            .collect();
        let first_of = |names: &[&str]| {
            environments
                .iter()
                .find(|(_, name)| names.contains(name))
                .copied()
        };

        if let Some((start, name)) = first_of(TABLE_ENVIRONMENTS) {
            let mode = Mode::InTable(Pending::new(Closer::environment(name)));
            return Some(Opening { start, mode });
        }

        if let Some((start, name)) = first_of(LIST_ENVIRONMENTS) {
            let mode = Mode::InList {
                ordered: name == "enumerate",
                pending: Pending::new(Closer::environment(name)),
            };
            return Some(Opening { start, mode });
        }

        if let Some((start, name)) = first_of(BOX_ENVIRONMENTS) {
            let mode = Mode::InBox(Pending::new(Closer::environment(name)));
            return Some(Opening { start, mode });
        }
        for (command, groups) in BOX_COMMANDS {
            if matches!(find_command(line, command, 0), Some((0, _))) {
                let closer = Closer::Braces {
                    depth: 0,
                    groups: *groups,
                };
                return Some(Opening {
                    start: 0,
                    mode: Mode::InBox(Pending::new(closer)),
                });
            }
        }

        let formula = [
            first_of(FORMULA_ENVIRONMENTS).map(|(start, name)| (start, Closer::environment(name))),
            find_unescaped(line, "$$", 0).map(|start| (start, Closer::delimiter("$$", "$$"))),
            find_unescaped(line, "\\[", 0).map(|start| (start, Closer::delimiter("\\[", "\\]"))),
        ]
        .into_iter()
        .flatten()
        .min_by_key(|(start, _)| *start);
        if let Some((start, closer)) = formula {
            let mode = Mode::InFormula(Pending::new(closer));
            return Some(Opening { start, mode });
        }

        if let Some((start, name)) = first_of(FIGURE_ENVIRONMENTS) {
            let mode = Mode::InFigure(Pending::new(Closer::environment(name)));
            return Some(Opening { start, mode });
        }

        None
    }

    fn heading(&self, line: &str) -> Option<Heading> {
        let caps = LATEX_HEADING.captures(line)?;
        let level = match &caps[1] {
            "chapter" => 1,
            "section" => 2,
            "subsection" => 3,
            _ => 4,
        };
        let open = caps.get(0)?.end() - 1;
        let (title, rest) = match matching_brace(line, open) {
            Some(end) => (&line[open + 1..end - 1], &line[end..]),
            None => (&line[open + 1..], ""),
        };
        Some(Heading {
            level,
            title: title.trim().to_string(),
            rest: rest.to_string(),
        })
    }
}

static MD_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*?)(?:\s+#+)?\s*$").unwrap());
static MD_THEMATIC_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(?:-\s*){3,}|(?:\*\s*){3,}|(?:_\s*){3,})$").unwrap());
static MD_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^!\[[^\]]*\]\([^)]*\)").unwrap());

struct MarkdownSyntax;

fn is_table_line(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_list_line(line: &str) -> bool {
    !line.trim().is_empty()
        && (markdown_item(line.trim_start()).is_some() || line.starts_with([' ', '\t']))
}

fn is_quote_line(line: &str) -> bool {
    line.trim_start().starts_with('>')
}

impl Syntax for MarkdownSyntax {
    fn prepare<'a>(&self, line: &'a str) -> Option<&'a str> {
        Some(line)
    }

    fn is_noise(&self, line: &str) -> bool {
        MD_THEMATIC_BREAK.is_match(line) || (line.starts_with("<!--") && line.ends_with("-->"))
    }

    fn open(&self, line: &str) -> Option<Opening> {
        let mode = if line.starts_with('|') {
            Mode::InTable(Pending::new(Closer::Continuation(is_table_line)))
        } else if let Some((ordered, _)) = markdown_item(line) {
            Mode::InList {
                ordered,
                pending: Pending::new(Closer::Continuation(is_list_line)),
            }
        } else if line.starts_with('>') {
            Mode::InBox(Pending::new(Closer::Continuation(is_quote_line)))
        } else if line.starts_with("$$") {
            Mode::InFormula(Pending::new(Closer::delimiter("$$", "$$")))
        } else if MD_IMAGE.is_match(line) {
            Mode::InFigure(Pending::new(Closer::Line))
        } else if line.starts_with("<svg") {
            Mode::InFigure(Pending::new(Closer::delimiter("<svg", "</svg>")))
        } else {
            return None;
        };
        Some(Opening { start: 0, mode })
    }

    fn heading(&self, line: &str) -> Option<Heading> {
        let caps = MD_HEADING.captures(line)?;
        let title = caps[2].trim();
        if title.is_empty() {
            return None;
        }
        Some(Heading {
            level: caps[1].len() as u8,
            title: title.to_string(),
            rest: String::new(),
        })
    }
}

/// Piece of a paragraph: prose or inline math
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fragment<'a> {
    Text(&'a str),
    Math(&'a str),
}

/// Cut `$...$` spans out of a paragraph.
///
/// An opening `$` must be unescaped and followed by a non-space; a closing `$`
/// must follow a non-space and must not be followed by a digit. This keeps
/// prices such as `R$ 100` or `$5 and $10` as text.
pub(crate) fn split_inline_math(text: &str) -> Vec<Fragment<'_>> {
    let bytes = text.as_bytes();
    let mut fragments = Vec::new();
    let mut cursor = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' || is_escaped(text, i) {
            i += 1;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'$') {
            i += 2;
            continue;
        }
        let opens = bytes.get(i + 1).is_some_and(|b| !b.is_ascii_whitespace());
        let close = if opens { find_math_close(text, i + 1) } else { None };

        match close {
            Some(end) => {
                if cursor < i {
                    fragments.push(Fragment::Text(&text[cursor..i]));
                }
                fragments.push(Fragment::Math(&text[i + 1..end]));
                cursor = end + 1;
                i = end + 1;
            }
            None => i += 1,
        }
    }

    if cursor < text.len() {
        fragments.push(Fragment::Text(&text[cursor..]));
    }
    fragments
}

fn find_math_close(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    (from..bytes.len()).find(|&j| {
        bytes[j] == b'$'
            && j > from
            && !is_escaped(text, j)
            && !bytes[j - 1].is_ascii_whitespace()
            && !bytes.get(j + 1).is_some_and(u8::is_ascii_digit)
    })
}
