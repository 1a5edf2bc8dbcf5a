use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::frame::DEFAULT_MAX_FRAME_LEN;
use crate::highlight::{HighlightBackground, background_from_colorfgbg};
use crate::render::RenderConfig;

pub const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Auto,
    Light,
    Dark,
}

impl ThemeMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub syntax: bool,
    pub perf: bool,
    pub theme: Option<ThemeMode>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_frame_bytes: Option<usize>,
    pub display_cmd: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl ConfigFlags {
    /// Merge `other` over `self`: switches are or-ed, values from `other` win.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            syntax: self.syntax || other.syntax,
            perf: self.perf || other.perf,
            theme: other.theme.or(self.theme),
            host: other.host.clone().or_else(|| self.host.clone()),
            port: other.port.or(self.port),
            max_frame_bytes: other.max_frame_bytes.or(self.max_frame_bytes),
            display_cmd: other
                .display_cmd
                .clone()
                .or_else(|| self.display_cmd.clone()),
            log_file: other.log_file.clone().or_else(|| self.log_file.clone()),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!(
            "{}:{}",
            self.host.as_deref().unwrap_or(DEFAULT_HOST),
            self.port.unwrap_or(0)
        )
    }

    pub const fn render_config(&self) -> RenderConfig {
        RenderConfig {
            syntax: self.syntax,
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_bytes.unwrap_or(DEFAULT_MAX_FRAME_LEN)
    }

    /// Concrete background for the display, resolving `auto` from `COLORFGBG`.
    pub fn background(&self, colorfgbg: Option<&str>) -> HighlightBackground {
        match self.theme.unwrap_or(ThemeMode::Auto) {
            ThemeMode::Auto => background_from_colorfgbg(colorfgbg),
            ThemeMode::Light => HighlightBackground::Light,
            ThemeMode::Dark => HighlightBackground::Dark,
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("marksync").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("marksync")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("marksync").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("marksync")
                .join("config");
        }
    }

    PathBuf::from(".marksyncrc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".marksyncrc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(line_tokens)
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

/// Split one rc-file line into tokens. The display command keeps the rest
/// of its line as a single value.
fn line_tokens(line: &str) -> Vec<String> {
    if let Some(rest) = line.strip_prefix("--display-cmd") {
        let value = rest.strip_prefix('=').unwrap_or(rest).trim();
        if rest.starts_with('=') || rest.starts_with(char::is_whitespace) {
            return vec!["--display-cmd".to_string(), value.to_string()];
        }
    }
    line.split_whitespace().map(ToOwned::to_owned).collect()
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = Vec::new();
    lines.push("# marksync defaults (saved with --save)".to_string());
    if flags.syntax {
        lines.push("--syntax".to_string());
    }
    if let Some(theme) = flags.theme {
        lines.push(format!("--theme {}", theme.as_str()));
    }
    if let Some(host) = &flags.host {
        lines.push(format!("--host {host}"));
    }
    if let Some(port) = flags.port {
        lines.push(format!("--port {port}"));
    }
    if let Some(bytes) = flags.max_frame_bytes {
        lines.push(format!("--max-frame-bytes {bytes}"));
    }
    if let Some(command) = &flags.display_cmd {
        lines.push(format!("--display-cmd {command}"));
    }
    if let Some(path) = &flags.log_file {
        lines.push(format!("--log-file {}", path.display()));
    }
    if flags.perf {
        lines.push("--perf".to_string());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Parse flags from a token list. Unknown tokens and malformed values are
/// ignored.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline_value) = match token.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name, Some(value)),
            _ => (token, None),
        };
        match name {
            "--syntax" => flags.syntax = true,
            "--perf" => flags.perf = true,
            "--theme" | "--host" | "--port" | "--max-frame-bytes" | "--display-cmd"
            | "--log-file" => {
                let value = match inline_value {
                    Some(value) => Some(value),
                    None => {
                        let next = tokens.get(i + 1).map(String::as_str);
                        if next.is_some() {
                            i += 1;
                        }
                        next
                    }
                };
                if let Some(value) = value {
                    apply_value(&mut flags, name, value);
                }
            }
            _ => {}
        }
        i += 1;
    }
    flags
}

fn apply_value(flags: &mut ConfigFlags, name: &str, value: &str) {
    match name {
        "--theme" => flags.theme = parse_theme(value),
        "--host" => flags.host = Some(value.to_string()),
        "--port" => flags.port = value.parse().ok(),
        "--max-frame-bytes" => flags.max_frame_bytes = value.parse().ok(),
        "--display-cmd" => flags.display_cmd = Some(value.to_string()),
        "--log-file" => flags.log_file = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn parse_theme(s: &str) -> Option<ThemeMode> {
    match s {
        "auto" => Some(ThemeMode::Auto),
        "light" => Some(ThemeMode::Light),
        "dark" => Some(ThemeMode::Dark),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let args = tokens(&[
            "marksync",
            "--syntax",
            "--theme",
            "dark",
            "--port=8090",
            "--host",
            "0.0.0.0",
            "--max-frame-bytes",
            "1024",
            "--log-file=marksync.log",
            "--perf",
        ]);
        let flags = parse_flag_tokens(&args);
        assert!(flags.syntax);
        assert!(flags.perf);
        assert_eq!(flags.theme, Some(ThemeMode::Dark));
        assert_eq!(flags.port, Some(8090));
        assert_eq!(flags.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(flags.max_frame_bytes, Some(1024));
        assert_eq!(flags.log_file, Some(PathBuf::from("marksync.log")));
    }

    #[test]
    fn test_parse_flag_tokens_ignores_bad_values() {
        let flags = parse_flag_tokens(&tokens(&["--port", "http", "--theme=purple", "--port"]));
        assert_eq!(flags.port, None);
        assert_eq!(flags.theme, None);
    }

    #[test]
    fn test_config_union_merges_cli_over_file_for_options() {
        let file = ConfigFlags {
            syntax: true,
            theme: Some(ThemeMode::Light),
            port: Some(9000),
            ..ConfigFlags::default()
        };
        let cli = ConfigFlags {
            perf: true,
            theme: Some(ThemeMode::Dark),
            ..ConfigFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.syntax);
        assert!(merged.perf);
        assert_eq!(merged.theme, Some(ThemeMode::Dark));
        assert_eq!(merged.port, Some(9000));
    }

    #[test]
    fn test_defaults() {
        let flags = ConfigFlags::default();
        assert_eq!(flags.listen_addr(), "127.0.0.1:0");
        assert_eq!(flags.max_frame_len(), DEFAULT_MAX_FRAME_LEN);
        assert_eq!(flags.render_config(), RenderConfig { syntax: false });
    }

    #[test]
    fn test_background_resolution() {
        let auto = ConfigFlags::default();
        assert_eq!(auto.background(Some("0;15")), HighlightBackground::Light);
        assert_eq!(auto.background(None), HighlightBackground::Dark);

        let light = ConfigFlags {
            theme: Some(ThemeMode::Light),
            ..ConfigFlags::default()
        };
        assert_eq!(light.background(Some("15;0")), HighlightBackground::Light);
    }

    #[test]
    fn test_display_cmd_keeps_rest_of_line() {
        assert_eq!(
            line_tokens("--display-cmd viewer --url ws://{addr}"),
            tokens(&["--display-cmd", "viewer --url ws://{addr}"])
        );
        assert_eq!(
            line_tokens("--syntax --perf"),
            tokens(&["--syntax", "--perf"])
        );
    }

    #[test]
    fn test_load_skips_comments_and_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".marksyncrc");
        fs::write(&path, "# comment\n\n  --syntax\n# --perf\n--port 7000\n").unwrap();

        let flags = load_config_flags(&path).unwrap();
        assert!(flags.syntax);
        assert!(!flags.perf);
        assert_eq!(flags.port, Some(7000));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let flags = load_config_flags(&dir.path().join("absent")).unwrap();
        assert_eq!(flags, ConfigFlags::default());
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config");
        let flags = ConfigFlags {
            syntax: true,
            perf: true,
            theme: Some(ThemeMode::Dark),
            host: Some("localhost".to_string()),
            port: Some(8090),
            max_frame_bytes: Some(4096),
            display_cmd: Some("viewer --url ws://{addr} --theme {theme}".to_string()),
            log_file: Some(PathBuf::from("marksync.log")),
        };

        save_config_flags(&path, &flags).unwrap();
        let loaded = load_config_flags(&path).unwrap();
        assert_eq!(loaded, flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
    }
}
