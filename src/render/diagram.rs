//! Diagram blocks deferred to the display surface.

use std::sync::LazyLock;

use regex::Regex;

use super::{RenderError, escape_html, line_attr};

static DIAGRAM_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:flowchart|graph|sequenceDiagram|gantt|classDiagram|stateDiagram|pie|journey|C4Context|erDiagram|requirementDiagram|gitGraph|mindmap|timeline)\b",
    )
    .expect("diagram keyword pattern is valid")
});

/// Whether a fenced block should be handed to the client-side diagram renderer.
///
/// A `mermaid` fence always is. Any other fence is when its source starts
/// with a diagram keyword, whatever its language tag.
pub fn is_diagram(language: Option<&str>, source: &str) -> bool {
    language == Some("mermaid") || DIAGRAM_START.is_match(source.trim_start())
}

/// Placeholder container holding the escaped diagram source.
pub fn placeholder(id: u64, source: &str, line: Option<usize>) -> Result<String, RenderError> {
    Ok(format!(
        "<div class=\"mermaid\"{}>\n\
         <div id=\"graph-mermaid-{id}\" data-graph=\"mermaid\" data-graph-definition=\"{}\">\n\
         <div class=\"loader\"></div>\n\
         </div>\n\
         </div>\n",
        line_attr(line),
        escape_html(source.trim())?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_flowchart_is_diagram() {
        assert!(is_diagram(None, "flowchart TD\n  A --> B"));
    }

    #[test]
    fn test_versioned_state_diagram_is_diagram() {
        assert!(is_diagram(None, "stateDiagram-v2\n  [*] --> Idle"));
    }

    #[test]
    fn test_keyword_prefix_of_identifier_is_not_diagram() {
        assert!(!is_diagram(None, "pie_chart = load()"));
    }

    #[test]
    fn test_tagged_fence_with_diagram_keyword_is_diagram() {
        assert!(is_diagram(Some("text"), "flowchart TD\n  A --> B"));
    }

    #[test]
    fn test_tagged_code_is_not_diagram() {
        assert!(!is_diagram(Some("python"), "graph = build()"));
    }

    #[test]
    fn test_mermaid_tag_is_always_diagram() {
        assert!(is_diagram(Some("mermaid"), "%%{init: {}}%%\nflowchart LR"));
    }

    #[test]
    fn test_placeholder_escapes_source() {
        let html = placeholder(7, "flowchart LR\n  A[\"<b>\"] --> B\n", Some(3)).unwrap();
        assert!(html.starts_with("<div class=\"mermaid\" data-line-begin=\"3\">"));
        assert!(html.contains("id=\"graph-mermaid-7\""));
        assert!(html.contains(
            "data-graph-definition=\"flowchart LR\n  A[&quot;&lt;b&gt;&quot;] --&gt; B\""
        ));
        assert!(html.contains("<div class=\"loader\"></div>"));
    }
}
