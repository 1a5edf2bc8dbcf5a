//! Markdown to HTML rendering with source-line annotations.
//!
//! Rendering runs in three steps:
//! - parse the markdown with comrak
//! - rewrite overridden nodes into raw HTML, children before parents
//! - format each document-level block and tag its first element with
//!   `data-line-begin`

mod diagram;
mod math;
mod overrides;
pub mod slug;

use std::cell::RefCell;
use std::io;
use std::string::FromUtf8Error;
use std::sync::atomic::{AtomicU64, Ordering};

use comrak::nodes::{Ast, AstNode, LineColumn, NodeHtmlBlock, NodeValue};
use comrak::{Arena, Options, format_html, parse_document};
use thiserror::Error;

use overrides::{NodeKind, Stage};

pub use math::expand_macros;
pub use slug::slugify;

/// Attribute carrying the 1-based source line of a document-level block.
pub const LINE_ATTR: &str = "data-line-begin";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderConfig {
    /// Syntax-highlight fenced code blocks with a known language.
    pub syntax: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub html: String,
    /// Number of source lines, counting line breaks plus one.
    pub line_count: usize,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to format HTML: {0}")]
    Format(#[from] io::Error),

    #[error("formatted HTML is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// Markdown renderer with a fixed configuration.
///
/// The override stages are composed once in [`RenderEngine::new`]. The only
/// mutable state is the diagram id counter, so one engine can be shared
/// across threads.
#[derive(Debug)]
pub struct RenderEngine {
    config: RenderConfig,
    stages: Vec<Stage>,
    diagram_ids: AtomicU64,
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new(RenderConfig::default())
    }
}

/// What an override turns a node into.
enum Replacement {
    Inline(String),
    Block(String),
    /// Raw open/close tags around the node's own children.
    Splice { open: String, close: String },
}

/// Shared state handed to override stages during one render.
struct Ctx<'a, 'r> {
    engine: &'r RenderEngine,
    slugs: &'r [(&'a AstNode<'a>, String)],
    format: &'r dyn Fn(&'a AstNode<'a>) -> Result<String, RenderError>,
}

impl<'a> Ctx<'a, '_> {
    fn slug_for(&self, heading: &'a AstNode<'a>) -> &str {
        self.slugs
            .iter()
            .find(|(node, _)| std::ptr::eq(*node, heading))
            .map_or("", |(_, slug)| slug.as_str())
    }
}

impl RenderEngine {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            stages: overrides::compose(config),
            diagram_ids: AtomicU64::new(0),
        }
    }

    pub const fn config(&self) -> RenderConfig {
        self.config
    }

    /// Render `markdown` and count its source lines.
    ///
    /// # Errors
    ///
    /// Returns an error if comrak fails to format the tree.
    pub fn render(&self, markdown: &str) -> Result<RenderedDocument, RenderError> {
        let _scope = crate::perf::scope("render.total");
        Ok(RenderedDocument {
            html: self.render_html(markdown)?,
            line_count: line_count(markdown),
        })
    }

    /// Render `markdown` to HTML.
    ///
    /// # Errors
    ///
    /// Returns an error if comrak fails to format the tree.
    pub fn render_html(&self, markdown: &str) -> Result<String, RenderError> {
        let arena = Arena::new();
        let mut options = Options::default();
        configure_options(&mut options);

        let root = {
            let _scope = crate::perf::scope("render.parse");
            parse_document(&arena, markdown, &options)
        };
        self.rewrite_tree(&arena, root, markdown, &options)?;

        let _scope = crate::perf::scope("render.format");
        emit_blocks(&arena, root, &options)
    }

    fn next_diagram_id(&self) -> u64 {
        self.diagram_ids.fetch_add(1, Ordering::Relaxed)
    }

    fn rewrite_tree<'a>(
        &self,
        arena: &'a Arena<AstNode<'a>>,
        root: &'a AstNode<'a>,
        markdown: &str,
        options: &Options,
    ) -> Result<(), RenderError> {
        let _scope = crate::perf::scope("render.rewrite");
        let slugs = slug::collect_heading_slugs(root, markdown);
        let format = |node: &'a AstNode<'a>| format_node(node, options);
        let ctx = Ctx {
            engine: self,
            slugs: &slugs,
            format: &format,
        };

        let nodes: Vec<_> = root.descendants().skip(1).collect();
        // Reverse document order reaches every child before its parent.
        for node in nodes.into_iter().rev() {
            let line = is_top_level(root, node).then(|| source_line(node));
            if let Some(replacement) = self.rewrite(&ctx, node, line)? {
                replace(arena, node, replacement);
            }
        }
        Ok(())
    }

    fn rewrite<'a>(
        &self,
        ctx: &Ctx<'a, '_>,
        node: &'a AstNode<'a>,
        line: Option<usize>,
    ) -> Result<Option<Replacement>, RenderError> {
        let Some(kind) = NodeKind::of(&node.data.borrow().value) else {
            return Ok(None);
        };
        for stage in self.stages.iter().filter(|stage| stage.kind() == kind) {
            if let Some(replacement) = stage.apply(ctx, node, line)? {
                return Ok(Some(replacement));
            }
        }
        Ok(None)
    }
}

/// Number of newline-delimited lines in `text`. A CRLF pair counts once.
pub fn line_count(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count() + 1
}

/// Parser extensions, in the order their output is layered: emoji
/// shortcodes, footnotes, inert task lists, then dollar and code math.
fn configure_options(options: &mut Options) {
    options.extension.shortcodes = true;
    options.extension.footnotes = true;
    options.extension.tasklist = true;
    options.extension.math_dollars = true;
    options.extension.math_code = true;

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.parse.smart = true;

    // Raw HTML passes through, and the override stages depend on it.
    options.render.unsafe_ = true;
}

fn format_node<'a>(node: &'a AstNode<'a>, options: &Options) -> Result<String, RenderError> {
    let mut out = Vec::new();
    format_html(node, options, &mut out)?;
    Ok(String::from_utf8(out)?)
}

fn is_top_level<'a>(root: &'a AstNode<'a>, node: &'a AstNode<'a>) -> bool {
    node.parent().is_some_and(|parent| std::ptr::eq(parent, root))
}

fn source_line<'a>(node: &'a AstNode<'a>) -> usize {
    node.data.borrow().sourcepos.start.line
}

fn replace<'a>(arena: &'a Arena<AstNode<'a>>, node: &'a AstNode<'a>, replacement: Replacement) {
    let start: LineColumn = node.data.borrow().sourcepos.start;
    let raw = |value: NodeValue| -> &'a AstNode<'a> {
        arena.alloc(AstNode::new(RefCell::new(Ast::new(value, start))))
    };
    match replacement {
        Replacement::Inline(html) => node.insert_before(raw(NodeValue::HtmlInline(html))),
        Replacement::Block(literal) => node.insert_before(raw(NodeValue::HtmlBlock(
            NodeHtmlBlock {
                block_type: 0,
                literal,
            },
        ))),
        Replacement::Splice { open, close } => {
            node.insert_before(raw(NodeValue::HtmlInline(open)));
            while let Some(child) = node.first_child() {
                node.insert_before(child);
            }
            node.insert_before(raw(NodeValue::HtmlInline(close)));
        }
    }
    node.detach();
}

enum Emit {
    Annotated,
    Verbatim,
    Footnote,
}

fn emit_blocks<'a>(
    arena: &'a Arena<AstNode<'a>>,
    root: &'a AstNode<'a>,
    options: &Options,
) -> Result<String, RenderError> {
    let mut html = String::new();
    let mut footnotes = Vec::new();

    for block in root.children() {
        let emit = match block.data.borrow().value {
            NodeValue::FootnoteDefinition(_) => Emit::Footnote,
            NodeValue::HtmlBlock(_) => Emit::Verbatim,
            _ => Emit::Annotated,
        };
        match emit {
            Emit::Footnote => footnotes.push(block),
            Emit::Verbatim => html.push_str(&format_node(block, options)?),
            Emit::Annotated => {
                let fragment = format_node(block, options)?;
                html.push_str(&annotate_first_tag(&fragment, source_line(block)));
            }
        }
    }

    if !footnotes.is_empty() {
        let section = arena.alloc(AstNode::new(RefCell::new(Ast::new(
            NodeValue::Document,
            LineColumn { line: 1, column: 1 },
        ))));
        for definition in footnotes {
            section.append(definition);
        }
        html.push_str(&format_node(section, options)?);
    }

    Ok(html)
}

/// Insert the line attribute into the first element of `fragment`.
fn annotate_first_tag(fragment: &str, line: usize) -> String {
    let Some(open) = fragment.find('<') else {
        return fragment.to_string();
    };
    let name_end = fragment[open + 1..]
        .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')
        .map_or(fragment.len(), |offset| open + 1 + offset);
    format!(
        "{}{}{}",
        &fragment[..name_end],
        line_attr(Some(line)),
        &fragment[name_end..]
    )
}

fn line_attr(line: Option<usize>) -> String {
    line.map_or_else(String::new, |line| format!(" {LINE_ATTR}=\"{line}\""))
}

/// Escape text for use in HTML content and double-quoted attributes.
pub(crate) fn escape_html(text: &str) -> Result<String, RenderError> {
    let mut out = Vec::with_capacity(text.len());
    comrak::html::escape(&mut out, text.as_bytes())?;
    Ok(String::from_utf8(out)?)
}
