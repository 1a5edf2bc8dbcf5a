//! Heading anchor slugs.

use comrak::nodes::{AstNode, NodeValue, Sourcepos};

/// Derive an anchor id from heading text.
///
/// Whitespace-separated words are joined with `-`, everything outside
/// `[A-Za-z0-9-]` is dropped and the result is lowercased. Identical
/// headings produce identical slugs.
pub fn slugify(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Slugs for every heading under `root`, computed before any node is rewritten.
///
/// The slug comes from the heading's markdown source, so shortcodes, link
/// targets and inline HTML all contribute to the anchor.
pub(super) fn collect_heading_slugs<'a>(
    root: &'a AstNode<'a>,
    source: &str,
) -> Vec<(&'a AstNode<'a>, String)> {
    let lines: Vec<&str> = source.lines().collect();
    root.descendants()
        .filter_map(|node| {
            let data = node.data.borrow();
            let NodeValue::Heading(heading) = &data.value else {
                return None;
            };
            let text = heading_source(&lines, data.sourcepos, heading.setext);
            Some((node, slugify(&text)))
        })
        .collect()
}

/// Inline source of a heading, without its ATX or setext markers.
fn heading_source(lines: &[&str], pos: Sourcepos, setext: bool) -> String {
    let line_at = |number: usize| lines.get(number.wrapping_sub(1)).copied().unwrap_or("");
    let first = line_at(pos.start.line);
    let first = first
        .get(pos.start.column.saturating_sub(1)..)
        .unwrap_or(first);

    if setext {
        // Content runs up to the underline on the last line.
        let mut text = vec![first.trim()];
        for number in pos.start.line + 1..pos.end.line {
            text.push(line_at(number).trim());
        }
        return text.join("\n");
    }

    let content = first.trim_start().trim_start_matches('#').trim();
    // An optional closing sequence of `#` counts only after whitespace.
    let without_closing = content.trim_end_matches('#');
    if without_closing.is_empty() || without_closing.ends_with([' ', '\t']) {
        without_closing.trim_end().to_string()
    } else {
        content.to_string()
    }
}
