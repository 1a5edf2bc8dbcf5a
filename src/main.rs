//! marksync - markdown live-preview backend.
//!
//! # Usage
//!
//! ```bash
//! editor-plugin | marksync --syntax --port 8090
//! marksync --display-cmd "viewer --url ws://{addr} --theme {theme}"
//! marksync --print-css --theme light > highlight.css
//! ```

use std::fs::OpenOptions;
use std::future::pending;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use marksync::bridge::Bridge;
use marksync::config::{
    ConfigFlags, ThemeMode, clear_config_flags, global_config_path, load_config_flags,
    local_override_path, save_config_flags,
};
use marksync::display::{DisplayCommand, DisplayProcess};
use marksync::frame::FrameReader;
use marksync::highlight;
use marksync::perf;
use marksync::protocol::{self, Dispatcher};
use marksync::render::RenderEngine;
use marksync::session::{self, Lifecycle, Termination};

/// Markdown live-preview backend
#[derive(Parser, Debug)]
#[command(name = "marksync", version, about, long_about = None)]
struct Cli {
    /// Syntax-highlight fenced code blocks
    #[arg(long)]
    syntax: bool,

    /// Background the display should use (passed as {theme})
    #[arg(long, value_enum)]
    theme: Option<ThemeMode>,

    /// Address to listen on for the display client
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Port to listen on (0 picks a free port)
    #[arg(long)]
    port: Option<u16>,

    /// Largest accepted input frame in bytes
    #[arg(long, value_name = "BYTES")]
    max_frame_bytes: Option<usize>,

    /// Display program to launch; {addr} and {theme} are substituted
    #[arg(long, value_name = "COMMAND")]
    display_cmd: Option<String>,

    /// Write logs to a file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log render stage timings
    #[arg(long)]
    perf: bool,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,

    /// Print the highlight stylesheet for the theme and exit
    #[arg(long)]
    print_css: bool,
}

impl Cli {
    /// Flags given on this command line, in rc-file form.
    fn flags(&self) -> ConfigFlags {
        ConfigFlags {
            syntax: self.syntax,
            perf: self.perf,
            theme: self.theme,
            host: self.host.clone(),
            port: self.port,
            max_frame_bytes: self.max_frame_bytes,
            display_cmd: self.display_cmd.clone(),
            log_file: self.log_file.clone(),
        }
    }
}

fn init_logging(log_file: Option<&Path>, perf: bool) -> Result<()> {
    let mut filter =
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into());
    if perf {
        filter = filter.add_directive("marksync::perf=info".parse()?);
    }

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

async fn wait_for_display(display: Option<&mut DisplayProcess>) -> Option<i32> {
    match display {
        Some(process) => process.wait().await,
        None => pending().await,
    }
}

async fn serve(
    lifecycle: &Lifecycle,
    bridge: Bridge,
    display: Option<&mut DisplayProcess>,
    flags: &ConfigFlags,
) {
    let display_exit = wait_for_display(display);
    let signal = session::wait_for_signal();
    tokio::pin!(display_exit, signal);

    let accepted = tokio::select! {
        accepted = bridge.accept() => accepted,
        code = &mut display_exit => {
            lifecycle.terminate(Termination::DisplayExited(code));
            return;
        }
        signal = &mut signal => {
            lifecycle.terminate(Termination::from_signal(signal));
            return;
        }
    };
    let (mut sink, peer) = match accepted {
        Ok(connection) => connection,
        Err(err) => {
            lifecycle.terminate(Termination::Fatal(err.to_string()));
            return;
        }
    };

    let engine = RenderEngine::new(flags.render_config());
    let frames = FrameReader::new(tokio::io::stdin(), flags.max_frame_len());
    session::run_session(
        lifecycle,
        protocol::run(Dispatcher::new(frames), &engine, &mut sink),
        peer.closed(),
        display_exit,
        signal,
    )
    .await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = cli.flags();

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    init_logging(effective.log_file.as_deref(), effective.perf)?;
    perf::set_enabled(effective.perf);

    let colorfgbg = std::env::var("COLORFGBG").ok();
    let background = effective.background(colorfgbg.as_deref());
    if cli.print_css {
        let css = highlight::stylesheet(background).context("Failed to build stylesheet")?;
        print!("{css}");
        return Ok(());
    }

    let display = effective
        .display_cmd
        .as_deref()
        .map(DisplayCommand::parse)
        .transpose()?;

    let listen_addr = effective.listen_addr();
    let bridge = Bridge::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to listen on {listen_addr}"))?;
    let addr = bridge.local_addr()?;
    tracing::info!(%addr, "waiting for display client");

    let mut display = display
        .map(|command| command.spawn(addr, background.as_str()))
        .transpose()?;

    let lifecycle = Lifecycle::new();
    serve(&lifecycle, bridge, display.as_mut(), &effective).await;

    // `process::exit` skips destructors, so stop the display first.
    drop(display);
    std::process::exit(lifecycle.exit_code());
}
