use std::path::PathBuf;

use marksync::config::{ConfigFlags, ThemeMode, load_config_flags, parse_flag_tokens};

#[test]
fn test_config_file_parsing_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".marksyncrc");
    let content = r#"
# comment
--syntax

--theme light
   
--log-file=marksync.log
--display-cmd   viewer --url ws://{addr}
"#;
    std::fs::write(&path, content).unwrap();

    let flags = load_config_flags(&path).unwrap();
    assert!(flags.syntax);
    assert_eq!(flags.theme, Some(ThemeMode::Light));
    assert_eq!(flags.log_file, Some(PathBuf::from("marksync.log")));
    assert_eq!(flags.display_cmd.as_deref(), Some("viewer --url ws://{addr}"));
}

#[test]
fn test_cli_flags_override_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".marksyncrc");
    let content = "--syntax\n--theme light\n--port 8090\n--log-file file.log\n";
    std::fs::write(&path, content).unwrap();

    let file_flags = load_config_flags(&path).unwrap();
    let cli_args = vec![
        "marksync".to_string(),
        "--theme".to_string(),
        "dark".to_string(),
        "--perf".to_string(),
    ];
    let cli_flags = parse_flag_tokens(&cli_args);

    let effective = file_flags.union(&cli_flags);
    assert!(effective.syntax, "file flags should remain enabled");
    assert!(effective.perf, "cli flags should be applied");
    assert_eq!(effective.theme, Some(ThemeMode::Dark), "cli should override theme");
    assert_eq!(effective.listen_addr(), "127.0.0.1:8090");
    assert_eq!(
        effective.log_file,
        Some(PathBuf::from("file.log")),
        "file config should be preserved when CLI does not override"
    );
}

#[test]
fn test_parse_flag_tokens_handles_equals_syntax() {
    let args = vec![
        "marksync".to_string(),
        "--theme=dark".to_string(),
        "--max-frame-bytes=65536".to_string(),
        "--display-cmd=viewer".to_string(),
    ];
    let flags = parse_flag_tokens(&args);
    assert_eq!(flags.theme, Some(ThemeMode::Dark));
    assert_eq!(flags.max_frame_len(), 65536);
    assert_eq!(flags.display_cmd.as_deref(), Some("viewer"));
}

#[test]
fn test_local_file_overrides_global_file() {
    let dir = tempfile::tempdir().unwrap();
    let global = dir.path().join("config");
    let local = dir.path().join(".marksyncrc");
    std::fs::write(&global, "--host 0.0.0.0\n--port 9000\n--syntax\n").unwrap();
    std::fs::write(&local, "--port 9100\n").unwrap();

    let merged: ConfigFlags =
        load_config_flags(&global).unwrap().union(&load_config_flags(&local).unwrap());
    assert!(merged.syntax);
    assert_eq!(merged.listen_addr(), "0.0.0.0:9100");
}
