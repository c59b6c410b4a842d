//! DoctreeService - the main entry point for LaTeX/Markdown to tree conversion.

use doctree_core::{Document, FormulaNode, HighlightContent, HighlightNode, Node, TextNode};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::assemble::{assemble, Entry};
use crate::blocks::{box_body, figure_node, formula_content};
use crate::embedded::extract_embedded_chapters;
use crate::list::{parse_latex_list, parse_markdown_list};
use crate::rules::{Formatted, InlineFormatter, Rule, Rules};
use crate::segment::{segment, split_inline_math, Block, BlockKind, Fragment};
use crate::table::{parse_latex_table, parse_markdown_table};
use crate::utilities::{brace_delta, classify_highlight, detect_dialect};

/// Input grammar of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Latex,
    Markdown,
}

/// Options for DoctreeService
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctreeOptions {
    /// Input dialect; detected per document when unset
    pub dialect: Option<Dialect>,

    /// Replace curly quotes with straight ASCII quotes
    pub straighten_quotes: bool,
}

/// A chapter found in a source file, converted
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedChapter {
    pub id: String,
    pub document: Document,
}

/// The main service for converting documents to trees
pub struct DoctreeService {
    options: DoctreeOptions,
    rules: Rules,
}

impl DoctreeService {
    /// Create a new DoctreeService with default options
    pub fn new() -> Self {
        Self {
            options: DoctreeOptions::default(),
            rules: Rules::new(),
        }
    }

    /// Create a DoctreeService with custom options
    pub fn with_options(options: DoctreeOptions) -> Self {
        Self {
            options,
            rules: Rules::new(),
        }
    }

    /// Convert a document in the configured dialect, or the detected one
    pub fn convert(&self, source: &str) -> Document {
        let dialect = self
            .options
            .dialect
            .unwrap_or_else(|| detect_dialect(source));
        self.convert_with(source, dialect)
    }

    pub fn convert_latex(&self, source: &str) -> Document {
        self.convert_with(source, Dialect::Latex)
    }

    pub fn convert_markdown(&self, source: &str) -> Document {
        self.convert_with(source, Dialect::Markdown)
    }

    /// Convert a document in the given dialect
    pub fn convert_with(&self, source: &str, dialect: Dialect) -> Document {
        let fmt = InlineFormatter {
            rules: &self.rules,
            dialect,
            options: &self.options,
        };

        let blocks = segment(source, dialect);
        debug!("building nodes from {} {dialect:?} blocks", blocks.len());
        let entries: Vec<Entry> = blocks
            .into_iter()
            .flat_map(|block| self.build(block, &fmt))
            .collect();
        assemble(entries)
    }

    /// Convert every Markdown chapter embedded in a TypeScript/JavaScript source
    pub fn convert_embedded(&self, source: &str) -> Vec<ConvertedChapter> {
        extract_embedded_chapters(source)
            .into_iter()
            .map(|chapter| ConvertedChapter {
                document: self.convert_markdown(&chapter.content),
                id: chapter.id,
            })
            .collect()
    }

    /// Run the inline rules over a single fragment
    pub fn format_inline(&self, text: &str, dialect: Dialect) -> Formatted {
        self.rules.format(text, dialect, &self.options)
    }

    /// Add a custom inline rule; it runs after the built-in rules
    pub fn add_rule(&mut self, key: &str, rule: Rule) -> &mut Self {
        self.rules.add(key, rule);
        self
    }

    /// Remove a custom inline rule
    pub fn remove_rule(&mut self, key: &str) -> Option<Rule> {
        self.rules.remove(key)
    }

    /// Apply a plugin
    pub fn use_plugin<F>(&mut self, plugin: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        plugin(self);
        self
    }

    /// Get the current options
    pub fn options(&self) -> &DoctreeOptions {
        &self.options
    }

    /// Get mutable access to options
    pub fn options_mut(&mut self) -> &mut DoctreeOptions {
        &mut self.options
    }

    /// Turn one block into tree entries
    fn build(&self, block: Block, fmt: &InlineFormatter) -> Vec<Entry> {
        let dialect = fmt.dialect;
        let node = match block.kind {
            BlockKind::Heading(level) => {
                let title = fmt.text(&block.raw);
                return vec![Entry::Heading { level, title }];
            }
            BlockKind::Paragraph => {
                return paragraph_nodes(&block.raw, fmt)
                    .into_iter()
                    .map(Entry::Node)
                    .collect();
            }
            BlockKind::Table => match dialect {
                Dialect::Latex => parse_latex_table(&block.raw, fmt),
                Dialect::Markdown => parse_markdown_table(&block.raw, fmt),
            }
            .map(Node::Table),
            BlockKind::List { ordered } => match dialect {
                Dialect::Latex => parse_latex_list(&block.raw, ordered, fmt),
                Dialect::Markdown => parse_markdown_list(&block.raw, ordered, fmt),
            }
            .map(Node::List),
            BlockKind::Highlight => self.highlight(&block.raw, fmt).map(Node::Highlight),
            BlockKind::Formula => formula_content(&block.raw).map(|content| Node::Formula(FormulaNode { content })),
            BlockKind::Figure => figure_node(&block.raw, fmt).map(Node::Image),
        };

        if node.is_none() {
            debug!("{} block produced no node", block.kind.name());
        }
        node.map(Entry::Node).into_iter().collect()
    }

    /// Convert the inside of a box with the same dialect
    fn highlight(&self, raw: &str, fmt: &InlineFormatter) -> Option<HighlightNode> {
        let (inner, explicit) = box_body(raw, fmt.dialect);
        let kind = explicit.unwrap_or_else(|| classify_highlight(&inner));

        // A wrapper that could not be removed would be segmented as a box again
        if inner.trim() == raw.trim() {
            let text = fmt.text(&inner);
            return (!text.is_empty()).then(|| HighlightNode {
                content: HighlightContent::Text(text),
                kind,
            });
        }

        let mut nodes = self.convert_with(&inner, fmt.dialect).nodes;
        let content = match (nodes.len(), nodes.pop()) {
            (_, None) => return None,
            (1, Some(Node::Text(text))) => HighlightContent::Text(text.content),
            (_, last) => {
                nodes.extend(last);
                HighlightContent::Nodes(nodes)
            }
        };
        Some(HighlightNode { content, kind })
    }
}

impl Default for DoctreeService {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a paragraph into text runs and inline formulas.
///
/// Math that sits inside an open group (`\textbf{a $x$ b}`, `**a $x$ b**`)
/// stays in the text so the group is formatted as a whole.
fn paragraph_nodes(raw: &str, fmt: &InlineFormatter) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut text = String::new();

    for fragment in split_inline_math(raw) {
        match fragment {
            Fragment::Text(prose) => text.push_str(prose),
            Fragment::Math(math) if inside_group(&text, fmt) => {
                text.push('$');
                text.push_str(math);
                text.push('$');
            }
            Fragment::Math(math) => {
                push_text(&mut nodes, &text, fmt);
                text.clear();
                let math = math.trim();
                if !math.is_empty() {
                    nodes.push(Node::Formula(FormulaNode {
                        content: math.to_string(),
                    }));
                }
            }
        }
    }
    push_text(&mut nodes, &text, fmt);
    nodes
}

fn inside_group(text: &str, fmt: &InlineFormatter) -> bool {
    match fmt.dialect {
        Dialect::Latex => brace_delta(text) > 0,
        Dialect::Markdown => text.matches("**").count() % 2 == 1,
    }
}

fn push_text(nodes: &mut Vec<Node>, raw: &str, fmt: &InlineFormatter) {
    let Formatted { text, style } = fmt.format(raw);
    if !text.is_empty() {
        nodes.push(Node::Text(TextNode::new(text, style)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctree_core::{HighlightKind, ListItem, ListNode, SectionNode, TextStyle};

    fn bold(content: &str) -> Node {
        let style = TextStyle {
            bold: true,
            ..Default::default()
        };
        Node::Text(TextNode::new(content, style))
    }

    fn plain(content: &str) -> Node {
        Node::Text(TextNode::plain(content))
    }

    fn formula(content: &str) -> Node {
        Node::Formula(FormulaNode {
            content: content.to_string(),
        })
    }

    #[test]
    fn test_markdown_heading_and_bold() {
        let service = DoctreeService::new();
        let doc = service.convert("# Title\n\nSome **bold** text.");
        let mut title = SectionNode::new("Title", 1);
        title.children.push(bold("Some bold text."));
        assert_eq!(doc.nodes, vec![Node::Section(title)]);
    }

    #[test]
    fn test_latex_detected() {
        let service = DoctreeService::new();
        let doc = service.convert("\\section{Juros}\nTexto \\textit{simples}.");
        let Node::Section(section) = &doc.nodes[0] else {
            panic!("expected a section");
        };
        assert_eq!(section.level, 2);
        assert_eq!(section.title, "Juros");
        assert_eq!(section.children.len(), 1);
    }

    #[test]
    fn test_dialect_option_overrides_detection() {
        let options = DoctreeOptions {
            dialect: Some(Dialect::Markdown),
            ..Default::default()
        };
        let service = DoctreeService::with_options(options);
        let doc = service.convert("\\section{Juros}");
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].kind_name(), "text");
    }

    #[test]
    fn test_inline_math_splits_paragraph() {
        let service = DoctreeService::new();
        let doc = service.convert_markdown("O montante é $M = C(1+i)^n$ ao final.");
        assert_eq!(
            doc.nodes,
            vec![plain("O montante é"), formula("M = C(1+i)^n"), plain("ao final.")]
        );
    }

    #[test]
    fn test_math_inside_group_stays_in_text() {
        let service = DoctreeService::new();
        let doc = service.convert_latex("\\textbf{taxa $i$ mensal}");
        assert_eq!(doc.nodes, vec![bold("taxa $i$ mensal")]);
    }

    #[test]
    fn test_currency_is_not_math() {
        let service = DoctreeService::new();
        let doc = service.convert_latex("Custa R\\$ 100 e R\\$ 200.");
        assert_eq!(doc.nodes, vec![plain("Custa R$ 100 e R$ 200.")]);
    }

    #[test]
    fn test_display_formula() {
        let service = DoctreeService::new();
        let doc = service.convert_latex("\\begin{equation}\n\\label{eq:1}\nJ = C \\cdot i \\cdot t\n\\end{equation}");
        assert_eq!(doc.nodes, vec![formula("J = C \\cdot i \\cdot t")]);
    }

    #[test]
    fn test_markdown_highlight_keyword() {
        let service = DoctreeService::new();
        let doc = service.convert_markdown("> **Importante:** pague em dia.");
        assert_eq!(
            doc.nodes,
            vec![Node::Highlight(HighlightNode {
                content: HighlightContent::Text("Importante: pague em dia.".to_string()),
                kind: HighlightKind::Important,
            })]
        );
    }

    #[test]
    fn test_latex_box_highlight() {
        let service = DoctreeService::new();
        let doc = service.convert_latex("\\fbox{\\parbox{\\textwidth}{Nota: taxa anual.}}");
        assert_eq!(
            doc.nodes,
            vec![Node::Highlight(HighlightNode {
                content: HighlightContent::Text("Nota: taxa anual.".to_string()),
                kind: HighlightKind::Warning,
            })]
        );
    }

    #[test]
    fn test_highlight_with_structure() {
        let service = DoctreeService::new();
        let doc = service.convert_markdown("> [!NOTE]\n> Passos:\n> - um\n> - dois");
        let expected = HighlightNode {
            content: HighlightContent::Nodes(vec![
                plain("Passos:"),
                Node::List(ListNode {
                    items: vec![
                        ListItem::Text("um".to_string()),
                        ListItem::Text("dois".to_string()),
                    ],
                    ordered: false,
                }),
            ]),
            kind: HighlightKind::Info,
        };
        assert_eq!(doc.nodes, vec![Node::Highlight(expected)]);
    }

    #[test]
    fn test_empty_highlight_is_omitted() {
        let service = DoctreeService::new();
        assert!(service.convert_markdown(">\n>").is_empty());
        assert!(service.convert_latex("\\fbox{}").is_empty());
    }

    #[test]
    fn test_custom_rule_and_plugin() {
        let mut service = DoctreeService::new();
        service.use_plugin(|service| {
            service.add_rule(
                "abbreviations",
                Rule::any(|text, _| text.replace("a.m.", "ao mês")),
            );
        });
        let doc = service.convert_markdown("Taxa de 2% a.m.");
        assert_eq!(doc.nodes, vec![plain("Taxa de 2% ao mês")]);

        assert!(service.remove_rule("abbreviations").is_some());
        let doc = service.convert_markdown("Taxa de 2% a.m.");
        assert_eq!(doc.nodes, vec![plain("Taxa de 2% a.m.")]);
    }

    #[test]
    fn test_options_mut() {
        let mut service = DoctreeService::new();
        service.options_mut().straighten_quotes = true;
        assert!(service.options().straighten_quotes);
        let formatted = service.format_inline("“aspas”", Dialect::Markdown);
        assert_eq!(formatted.text, "\"aspas\"");
    }

    #[test]
    fn test_convert_embedded() {
        let source = "export const capitulos = [\n  { id: '1', titulo: 'Juros', conteudo: `# Juros\\n\nTexto` },\n];";
        let service = DoctreeService::new();
        let chapters = service.convert_embedded(source);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].id, "1");
        let mut section = SectionNode::new("Juros", 1);
        section.children.push(plain("Texto"));
        assert_eq!(chapters[0].document.nodes, vec![Node::Section(section)]);
    }
}
