// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. frame::FrameReader)
    clippy::module_name_repetitions
)]

//! # Marksync
//!
//! A markdown live-preview backend.
//!
//! An editor writes length-prefixed frames to stdin; marksync renders the
//! markdown to HTML annotated with source line numbers and pushes the
//! result to a single display surface over a WebSocket so the preview can
//! scroll in lockstep with the editor.
//!
//! ## Architecture
//!
//! Data flows one way:
//!
//! ```text
//! stdin -> FrameReader -> Dispatcher -> (RenderEngine) -> ReplySink -> client
//! ```
//!
//! ## Modules
//!
//! - [`frame`]: Length-prefixed frame reading
//! - [`protocol`]: Command decoding, replies, and the dispatch loop
//! - [`render`]: Markdown to annotated HTML
//! - [`highlight`]: Syntax highlighting for code blocks
//! - [`bridge`]: WebSocket connection to the display surface
//! - [`session`]: Session lifecycle and shutdown
//! - [`display`]: Optional launch of the display process
//! - [`config`]: Flags and persisted defaults
//! - [`perf`]: Render-stage timings

pub mod bridge;
pub mod config;
pub mod display;
pub mod frame;
pub mod highlight;
pub mod perf;
pub mod protocol;
pub mod render;
pub mod session;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bridge::{Bridge, ReplySink};
    pub use crate::frame::FrameReader;
    pub use crate::protocol::{Command, Dispatcher, Reply};
    pub use crate::render::{RenderConfig, RenderEngine, RenderedDocument};
    pub use crate::session::{Lifecycle, Termination};
}
