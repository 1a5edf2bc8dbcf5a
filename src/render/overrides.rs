//! Node-kind overrides.
//!
//! Each [`Stage`] claims one comrak node kind and may turn a node into raw
//! HTML before the tree is formatted. Stages for the same kind are tried in
//! [`PIPELINE`] order; the first one that produces HTML wins and the rest
//! fall through to comrak's own formatter.

use std::sync::LazyLock;

use comrak::nodes::{AstNode, NodeValue};
use regex::Regex;

use super::{Ctx, RenderConfig, RenderError, Replacement, diagram, escape_html, line_attr, math};
use crate::highlight;

/// Trailing `(n)` after display math, e.g. `$$E = mc^2$$ (1)`.
static EQUATION_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\(([^()\s]+)\)\s*$").expect("equation number pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum NodeKind {
    Link,
    Math,
    Paragraph,
    CodeBlock,
    Heading,
}

impl NodeKind {
    pub(super) const fn of(value: &NodeValue) -> Option<Self> {
        match value {
            NodeValue::Link(_) => Some(Self::Link),
            NodeValue::Math(_) => Some(Self::Math),
            NodeValue::Paragraph => Some(Self::Paragraph),
            NodeValue::CodeBlock(_) => Some(Self::CodeBlock),
            NodeValue::Heading(_) => Some(Self::Heading),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Stage {
    SandboxLink,
    InlineMath,
    DisplayMath,
    MathFence,
    DiagramFence,
    HighlightedFence,
    AnchoredHeading,
}

pub(super) const PIPELINE: [Stage; 7] = [
    Stage::SandboxLink,
    Stage::InlineMath,
    Stage::DisplayMath,
    Stage::MathFence,
    Stage::DiagramFence,
    Stage::HighlightedFence,
    Stage::AnchoredHeading,
];

/// The stages active for `config`, in application order.
pub(super) fn compose(config: RenderConfig) -> Vec<Stage> {
    PIPELINE
        .into_iter()
        .filter(|stage| config.syntax || *stage != Stage::HighlightedFence)
        .collect()
}

impl Stage {
    pub(super) const fn kind(self) -> NodeKind {
        match self {
            Self::SandboxLink => NodeKind::Link,
            Self::InlineMath => NodeKind::Math,
            Self::DisplayMath => NodeKind::Paragraph,
            Self::MathFence | Self::DiagramFence | Self::HighlightedFence => NodeKind::CodeBlock,
            Self::AnchoredHeading => NodeKind::Heading,
        }
    }

    pub(super) fn apply<'a>(
        self,
        ctx: &Ctx<'a, '_>,
        node: &'a AstNode<'a>,
        line: Option<usize>,
    ) -> Result<Option<Replacement>, RenderError> {
        match self {
            Self::SandboxLink => sandbox_link(node),
            Self::InlineMath => inline_math(node),
            Self::DisplayMath => display_math(node, line),
            Self::MathFence => math_fence(node, line),
            Self::DiagramFence => diagram_fence(ctx, node, line),
            Self::HighlightedFence => highlighted_fence(node, line),
            Self::AnchoredHeading => anchored_heading(ctx, node, line),
        }
    }
}

fn sandbox_link<'a>(node: &'a AstNode<'a>) -> Result<Option<Replacement>, RenderError> {
    let data = node.data.borrow();
    let NodeValue::Link(link) = &data.value else {
        return Ok(None);
    };
    let mut open = String::from("<a href=\"javascript:return\"");
    if !link.title.is_empty() {
        open.push_str(&format!(" title=\"{}\"", escape_html(&link.title)?));
    }
    if link.url.starts_with('#') {
        open.push_str(&format!(
            " onclick=\"location.hash='{}'\"",
            escape_html(&link.url)?
        ));
    }
    open.push('>');
    Ok(Some(Replacement::Splice {
        open,
        close: "</a>".to_string(),
    }))
}

fn inline_math<'a>(node: &'a AstNode<'a>) -> Result<Option<Replacement>, RenderError> {
    let data = node.data.borrow();
    let NodeValue::Math(math_node) = &data.value else {
        return Ok(None);
    };
    // A paragraph holding only this display math becomes a block instead.
    if math_node.display_math && node.parent().is_some_and(|p| display_math_parts(p).is_some()) {
        return Ok(None);
    }
    let mathml = math::typeset(&math_node.literal, math_node.display_math)?;
    Ok(Some(Replacement::Inline(mathml)))
}

fn display_math<'a>(
    node: &'a AstNode<'a>,
    line: Option<usize>,
) -> Result<Option<Replacement>, RenderError> {
    let Some((tex, eqno)) = display_math_parts(node) else {
        return Ok(None);
    };
    let html = math::display_block(&tex, eqno.as_deref(), line)?;
    Ok(Some(Replacement::Block(html)))
}

/// TeX source and optional equation number of a paragraph that holds
/// nothing but one display math span.
fn display_math_parts<'a>(paragraph: &'a AstNode<'a>) -> Option<(String, Option<String>)> {
    if !matches!(paragraph.data.borrow().value, NodeValue::Paragraph) {
        return None;
    }
    let mut tex = None;
    let mut eqno = None;
    for child in paragraph.children() {
        match &child.data.borrow().value {
            NodeValue::Math(m) if m.display_math && tex.is_none() => {
                tex = Some(m.literal.clone());
            }
            NodeValue::SoftBreak | NodeValue::LineBreak => {}
            NodeValue::Text(text) if text.trim().is_empty() => {}
            NodeValue::Text(text) if tex.is_some() && eqno.is_none() => {
                let number = EQUATION_NUMBER.captures(text)?.get(1)?;
                eqno = Some(number.as_str().to_string());
            }
            _ => return None,
        }
    }
    Some((tex?, eqno))
}

fn fence_language(info: &str) -> Option<&str> {
    info.split_whitespace().next()
}

fn math_fence<'a>(
    node: &'a AstNode<'a>,
    line: Option<usize>,
) -> Result<Option<Replacement>, RenderError> {
    let data = node.data.borrow();
    let NodeValue::CodeBlock(block) = &data.value else {
        return Ok(None);
    };
    if !block.fenced || fence_language(&block.info) != Some("math") {
        return Ok(None);
    }
    let html = math::display_block(&block.literal, None, line)?;
    Ok(Some(Replacement::Block(html)))
}

fn diagram_fence<'a>(
    ctx: &Ctx<'a, '_>,
    node: &'a AstNode<'a>,
    line: Option<usize>,
) -> Result<Option<Replacement>, RenderError> {
    let data = node.data.borrow();
    let NodeValue::CodeBlock(block) = &data.value else {
        return Ok(None);
    };
    if !block.fenced || !diagram::is_diagram(fence_language(&block.info), &block.literal) {
        return Ok(None);
    }
    let id = ctx.engine.next_diagram_id();
    let html = diagram::placeholder(id, &block.literal, line)?;
    Ok(Some(Replacement::Block(html)))
}

fn highlighted_fence<'a>(
    node: &'a AstNode<'a>,
    line: Option<usize>,
) -> Result<Option<Replacement>, RenderError> {
    let data = node.data.borrow();
    let NodeValue::CodeBlock(block) = &data.value else {
        return Ok(None);
    };
    if !block.fenced {
        return Ok(None);
    }
    let Some(language) = fence_language(&block.info) else {
        return Ok(None);
    };
    let Some(body) = highlight::highlight_html(Some(language), &block.literal) else {
        return Ok(None);
    };
    Ok(Some(Replacement::Block(format!(
        "<pre{}><code class=\"language-{}\">{body}</code></pre>\n",
        line_attr(line),
        escape_html(language)?
    ))))
}

fn anchored_heading<'a>(
    ctx: &Ctx<'a, '_>,
    node: &'a AstNode<'a>,
    line: Option<usize>,
) -> Result<Option<Replacement>, RenderError> {
    let level = match &node.data.borrow().value {
        NodeValue::Heading(heading) => heading.level,
        _ => return Ok(None),
    };
    let mut html = format!(
        "<h{level}{} id=\"{}\">",
        line_attr(line),
        ctx.slug_for(node)
    );
    for child in node.children() {
        html.push_str(&(ctx.format)(child)?);
    }
    html.push_str(&format!("</h{level}>\n"));
    Ok(Some(Replacement::Block(html)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_orders_fence_stages() {
        let fences: Vec<_> = PIPELINE
            .into_iter()
            .filter(|stage| stage.kind() == NodeKind::CodeBlock)
            .collect();
        assert_eq!(
            fences,
            vec![Stage::MathFence, Stage::DiagramFence, Stage::HighlightedFence]
        );
    }

    #[test]
    fn test_compose_drops_highlighting_when_disabled() {
        let stages = compose(RenderConfig { syntax: false });
        assert!(!stages.contains(&Stage::HighlightedFence));
        assert!(stages.contains(&Stage::DiagramFence));

        let stages = compose(RenderConfig { syntax: true });
        assert_eq!(stages, PIPELINE.to_vec());
    }

    #[test]
    fn test_fence_language_takes_first_word() {
        assert_eq!(fence_language("rust ignore"), Some("rust"));
        assert_eq!(fence_language(""), None);
    }

    #[test]
    fn test_equation_number_pattern() {
        let caps = EQUATION_NUMBER.captures(" (1.2) ").unwrap();
        assert_eq!(&caps[1], "1.2");
        assert!(EQUATION_NUMBER.captures(" and more").is_none());
    }
}
