//! Table parsing for both dialects.
//!
//! Both parsers end in [`build_table`], which pads or truncates every row to
//! the column count so the emitted table is always rectangular.

use doctree_core::TableNode;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::InlineFormatter;
use crate::utilities::{find_command, replace_command_nested, skip_optional, split_unescaped, take_group};

static TABULAR_BEGIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\begin\{(tabular\*?|tabularx|longtable)\}").unwrap());

static ROW_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\\(?:\[[^\]]*\])?|\\tabularnewline").unwrap());

static RULE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\\(hline|toprule|midrule|bottomrule|cline|cmidrule|endhead|endfirsthead|endfoot|endlastfoot)\b(?:\([^)]*\))?(?:\{[^}]*\})?",
    )
    .unwrap()
});

/// Widest table a column spec or `\multicolumn` span may declare
pub(crate) const MAX_COLUMNS: usize = 256;

static MD_SEPARATOR_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:?-+:?$").unwrap());

/// Parse a `table`/`tabular` block
pub(crate) fn parse_latex_table(raw: &str, fmt: &InlineFormatter) -> Option<TableNode> {
    let caption = find_command(raw, "caption", 0)
        .and_then(|(_, end)| take_group(raw, skip_optional(raw, end)))
        .map(|(caption, _)| fmt.text(caption))
        .filter(|caption| !caption.is_empty());

    let (declared, body) = tabular_body(raw);
    let (body, _) = replace_command_nested(body, "caption", 1, |_| String::new());
    let (body, _) = replace_command_nested(&body, "label", 1, |_| String::new());

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut first_row_ruled = false;
    let mut rule_pending = false;

    for chunk in ROW_SEPARATOR.split(&body) {
        let mut chunk = chunk.trim();
        while let Some(caps) = RULE_MARKER.captures(chunk) {
            if !caps[1].starts_with("end") {
                rule_pending = true;
            }
            let end = caps.get(0).map_or(chunk.len(), |m| m.end());
            chunk = chunk[end..].trim_start();
        }
        if chunk.is_empty() {
            continue;
        }

        let cells = latex_cells(chunk, fmt);
        if cells.iter().all(String::is_empty) {
            continue;
        }
        if rows.is_empty() {
            first_row_ruled = rule_pending;
        }
        rule_pending = false;
        rows.push(cells);
    }

    let headers = if first_row_ruled && !rows.is_empty() {
        Some(rows.remove(0))
    } else {
        None
    };
    let declared = declared.filter(|&count| {
        if count > MAX_COLUMNS {
            warn!("ignoring column spec declaring {count} columns");
        }
        count > 0 && count <= MAX_COLUMNS
    });
    let columns = declared.unwrap_or_else(|| widest(headers.as_ref(), &rows));

    build_table(headers, rows, columns, caption)
}

/// Declared column count and the text between the column spec and `\end{..}`
fn tabular_body(raw: &str) -> (Option<usize>, &str) {
    let Some(caps) = TABULAR_BEGIN.captures(raw) else {
        return (None, raw);
    };
    let environment = &caps[1];
    let mut pos = caps.get(0).map_or(0, |m| m.end());

    if environment == "tabular*" || environment == "tabularx" {
        if let Some((_, after)) = take_group(raw, pos) {
            pos = after;
        }
    }
    pos = skip_optional(raw, pos);

    let declared = match take_group(raw, pos) {
        Some((spec, after)) => {
            pos = after;
            Some(count_columns(spec))
        }
        None => None,
    };

    let closing = format!("\\end{{{environment}}}");
    let end = raw[pos..].find(&closing).map_or(raw.len(), |i| pos + i);
    (declared, &raw[pos..end])
}

fn latex_cells(row: &str, fmt: &InlineFormatter) -> Vec<String> {
    let mut cells = Vec::new();
    for cell in split_unescaped(row, '&') {
        let cell = cell.trim();
        match multicolumn(cell) {
            Some((span, content)) => {
                cells.push(fmt.text(content));
                cells.extend(std::iter::repeat(String::new()).take(span - 1));
            }
            None => cells.push(fmt.text(cell)),
        }
    }
    cells
}

/// `\multicolumn{n}{align}{content}` as `(n, content)`
fn multicolumn(cell: &str) -> Option<(usize, &str)> {
    let (start, end) = find_command(cell, "multicolumn", 0)?;
    if start != 0 {
        return None;
    }
    let (span, end) = take_group(cell, end)?;
    let (_, end) = take_group(cell, end)?;
    let (content, _) = take_group(cell, end)?;
    let span = parse_count(span)?.max(1);
    if span > MAX_COLUMNS {
        warn!("clamping multicolumn span {span} to {MAX_COLUMNS}");
    }
    Some((span.min(MAX_COLUMNS), content))
}

/// Count the columns declared by a LaTeX column spec such as `|l|p{3cm}|*{2}{c}|`.
///
/// Saturates instead of overflowing on absurd `*{n}{..}` repeats.
pub(crate) fn count_columns(spec: &str) -> usize {
    let bytes = spec.as_bytes();
    let mut count: usize = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'l' | b'c' | b'r' | b'X' | b'S' | b'L' | b'C' | b'R' | b'J' => {
                count = count.saturating_add(1);
                i += 1;
            }
            b'p' | b'm' | b'b' => {
                count = count.saturating_add(1);
                i = skip_group(spec, i + 1);
            }
            b'@' | b'!' | b'>' | b'<' => i = skip_group(spec, i + 1),
            b'*' => {
                let repeated = take_group(spec, i + 1).and_then(|(times, after)| {
                    let (inner, after) = take_group(spec, after)?;
                    let times = parse_count(times)?;
                    Some((times.saturating_mul(count_columns(inner)), after))
                });
                match repeated {
                    Some((columns, after)) => {
                        count = count.saturating_add(columns);
                        i = after;
                    }
                    None => i += 1,
                }
            }
            _ => i += 1,
        }
    }

    count
}

/// A decimal count, saturating when it does not fit in `usize`
fn parse_count(text: &str) -> Option<usize> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(text.parse().unwrap_or(usize::MAX))
}

fn skip_group(text: &str, pos: usize) -> usize {
    take_group(text, pos).map_or(pos, |(_, after)| after)
}

/// Parse a block of `|`-delimited Markdown table lines
pub(crate) fn parse_markdown_table(raw: &str, fmt: &InlineFormatter) -> Option<TableNode> {
    let mut headers = None;
    let mut rows: Vec<Vec<String>> = Vec::new();

    let lines = raw.lines().map(str::trim).filter(|line| !line.is_empty());
    for (index, line) in lines.enumerate() {
        let cells = markdown_cells(line);
        if cells.iter().all(|cell| MD_SEPARATOR_CELL.is_match(cell)) {
            if index == 1 && headers.is_none() && rows.len() == 1 {
                headers = rows.pop();
            }
            continue;
        }
        rows.push(cells.iter().map(|cell| fmt.text(cell)).collect());
    }

    let headers = headers.filter(|cells: &Vec<String>| cells.iter().any(|cell| !cell.is_empty()));
    rows.retain(|row| row.iter().any(|cell| !cell.is_empty()));
    let columns = match &headers {
        Some(cells) => cells.len(),
        None => widest(None, &rows),
    };

    build_table(headers, rows, columns, None)
}

fn markdown_cells(line: &str) -> Vec<&str> {
    let mut inner = line.strip_prefix('|').unwrap_or(line);
    if inner.ends_with('|') && !inner.ends_with("\\|") {
        inner = &inner[..inner.len() - 1];
    }
    split_unescaped(inner, '|').into_iter().map(str::trim).collect()
}

fn widest(headers: Option<&Vec<String>>, rows: &[Vec<String>]) -> usize {
    headers
        .into_iter()
        .chain(rows)
        .map(Vec::len)
        .max()
        .unwrap_or(0)
}

/// Assemble a rectangular table, or `None` when there is nothing to show
pub(crate) fn build_table(
    headers: Option<Vec<String>>,
    mut rows: Vec<Vec<String>>,
    columns: usize,
    caption: Option<String>,
) -> Option<TableNode> {
    if headers.is_none() && rows.is_empty() {
        debug!("dropping table without header or rows");
        return None;
    }

    let mut headers = headers;
    if let Some(cells) = headers.as_mut() {
        fit_row(cells, columns, "header");
    }
    for (index, row) in rows.iter_mut().enumerate() {
        fit_row(row, columns, &format!("row {}", index + 1));
    }

    Some(TableNode {
        headers,
        rows,
        caption,
    })
}

fn fit_row(cells: &mut Vec<String>, columns: usize, what: &str) {
    if cells.len() < columns {
        warn!("padding table {what} from {} to {columns} cells", cells.len());
        cells.resize(columns, String::new());
    } else if cells.len() > columns {
        warn!("truncating table {what} from {} to {columns} cells", cells.len());
        cells.truncate(columns);
    }
}
