//! Math typesetting.
//!
//! TeX sources are expanded with a fixed macro table and converted to
//! MathML. Sources the converter rejects are shown as escaped TeX.

use latex2mathml::{DisplayStyle, latex_to_mathml};

use super::{RenderError, escape_html, line_attr};

/// Macros expanded before typesetting, keyed by control word.
///
/// `\R` maps to the literal symbol so it survives a sub- or superscript.
const MACROS: &[(&str, &str)] = &[("\\R", "ℝ")];

/// Replace every control word found in [`MACROS`].
///
/// Control words are matched whole, so `\Rightarrow` is left alone.
pub fn expand_macros(tex: &str) -> String {
    let mut out = String::with_capacity(tex.len());
    let mut rest = tex;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let name_len = after
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(after.len());
        if name_len == 0 {
            // Control symbol such as `\\` or `\{`.
            let symbol_len = after.chars().next().map_or(0, char::len_utf8);
            out.push_str(&rest[pos..=pos + symbol_len]);
            rest = &after[symbol_len..];
            continue;
        }
        let command = &rest[pos..=pos + name_len];
        match MACROS.iter().find(|(name, _)| *name == command) {
            Some((_, expansion)) => out.push_str(expansion),
            None => out.push_str(command),
        }
        rest = &after[name_len..];
    }
    out.push_str(rest);
    out
}

/// Typeset `tex` as MathML, inline or as a display block.
pub fn typeset(tex: &str, display: bool) -> Result<String, RenderError> {
    let style = if display {
        DisplayStyle::Block
    } else {
        DisplayStyle::Inline
    };
    match latex_to_mathml(&expand_macros(tex.trim()), style) {
        Ok(mathml) => Ok(mathml),
        Err(err) => {
            tracing::debug!(error = %err, "math typesetting failed, showing source");
            Ok(format!("<code class=\"math-error\">{}</code>", escape_html(tex)?))
        }
    }
}

/// Display math wrapped in a container that carries the block's source line.
pub fn display_block(
    tex: &str,
    eqno: Option<&str>,
    line: Option<usize>,
) -> Result<String, RenderError> {
    let math = typeset(tex, true)?;
    let body = match eqno {
        Some(number) => format!(
            "<section class=\"eqno\">{math}<span>({})</span></section>",
            escape_html(number)?
        ),
        None => format!("<section>{math}</section>"),
    };
    Ok(format!("<div{}>{body}</div>\n", line_attr(line)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_real_numbers_macro() {
        assert_eq!(expand_macros("x \\in \\R^n"), "x \\in ℝ^n");
    }

    #[test]
    fn test_expand_leaves_longer_control_words() {
        assert_eq!(expand_macros("a \\Rightarrow b"), "a \\Rightarrow b");
    }

    #[test]
    fn test_expand_leaves_escaped_backslash() {
        assert_eq!(expand_macros("a \\\\R b"), "a \\\\R b");
    }

    #[test]
    fn test_expand_handles_trailing_backslash() {
        assert_eq!(expand_macros("x\\"), "x\\");
    }

    #[test]
    fn test_typeset_inline_produces_mathml() {
        let html = typeset("x^2", false).unwrap();
        assert!(html.starts_with("<math"), "{html}");
        assert!(!html.contains("display=\"block\""), "{html}");
    }

    #[test]
    fn test_typeset_display_produces_block_mathml() {
        let html = typeset("\\frac{a}{b}", true).unwrap();
        assert!(html.contains("display=\"block\""), "{html}");
    }

    #[test]
    fn test_real_numbers_keep_symbol_under_superscript() {
        let html = typeset("\\R^2", true).unwrap();
        assert!(html.contains("<msup>"), "{html}");
        assert!(html.contains('ℝ'), "{html}");
    }

    #[test]
    fn test_typeset_failure_shows_escaped_source() {
        let html = typeset("\\frac{<a", false).unwrap();
        assert!(html.starts_with("<code class=\"math-error\">"), "{html}");
        assert!(html.contains("&lt;a"));
    }

    #[test]
    fn test_display_block_carries_line_and_eqno() {
        let html = display_block("E = mc^2", Some("1"), Some(4)).unwrap();
        assert!(html.starts_with("<div data-line-begin=\"4\"><section class=\"eqno\">"));
        assert!(html.contains("<span>(1)</span>"));
    }

    #[test]
    fn test_nested_display_block_has_no_line() {
        let html = display_block("x", None, None).unwrap();
        assert!(html.starts_with("<div><section>"));
    }
}
