//! Syntax highlighting for code blocks.
//!
//! Uses syntect with Sublime Text syntax definitions. Output is class-based
//! HTML so the display surface can theme it with [`stylesheet`].

use std::sync::OnceLock;

use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

/// Highlight `code` as HTML spans for `language`.
///
/// Returns `None` when no language is given, the language is unknown, or the
/// highlighter fails; callers render the block as plain escaped text then.
pub fn highlight_html(language: Option<&str>, code: &str) -> Option<String> {
    let language = language?;
    let syntax_set = syntax_set();
    let syntax = syntax_set
        .find_syntax_by_token(language)
        .or_else(|| syntax_set.find_syntax_by_name(language))?;

    let _scope = crate::perf::scope("highlight.code_block");
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, ClassStyle::Spaced);
    for line in LinesWithEndings::from(code) {
        if let Err(err) = generator.parse_html_for_line_which_includes_newline(line) {
            tracing::debug!(language, error = %err, "highlighting failed, rendering plain code");
            return None;
        }
    }
    Some(generator.finalize())
}

/// CSS for the class names emitted by [`highlight_html`].
///
/// # Errors
///
/// Returns an error if syntect cannot convert the theme to CSS.
pub fn stylesheet(background: HighlightBackground) -> Result<String, syntect::Error> {
    match theme(background) {
        Some(theme) => css_for_theme_with_class_style(&theme, ClassStyle::Spaced),
        None => Ok(String::new()),
    }
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.syntax_set.load_defaults");
        SyntaxSet::load_defaults_newlines()
    })
}

fn theme(background: HighlightBackground) -> Option<Theme> {
    let _scope = crate::perf::scope("highlight.theme.load_defaults");
    let theme_set = ThemeSet::load_defaults();
    let preferred = match background {
        HighlightBackground::Dark => [
            "Monokai Extended",
            "Monokai Extended Bright",
            "Dracula",
            "Solarized (dark)",
            "base16-ocean.dark",
        ]
        .as_slice(),
        HighlightBackground::Light => [
            "InspiredGitHub",
            "Solarized (light)",
            "base16-ocean.light",
        ]
        .as_slice(),
    };

    preferred
        .iter()
        .find_map(|name| theme_set.themes.get(*name))
        .or_else(|| theme_set.themes.values().next())
        .cloned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightBackground {
    Light,
    Dark,
}

impl HighlightBackground {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// Guess the terminal background from `COLORFGBG` (`"fg;bg"`).
pub fn background_from_colorfgbg(colorfgbg: Option<&str>) -> HighlightBackground {
    let Some(value) = colorfgbg else {
        return HighlightBackground::Dark;
    };
    let bg_str = value.rsplit(';').next().unwrap_or(value);
    let Ok(bg) = bg_str.parse::<u8>() else {
        return HighlightBackground::Dark;
    };

    if bg >= 7 {
        HighlightBackground::Light
    } else {
        HighlightBackground::Dark
    }
}
