//! Streams bytes through `deno fmt`.
//!
//! ```text
//!  input chunks ──accept──► stdin ┐
//!                                 │  deno fmt --ext <ext> [--no-config | --config <path>] -
//!  output chunks ◄──drain── stdout┘
//!                           stderr ──► FmtError::ProcessFailure on a failed exit
//! ```
//!
//! [`stream::FmtStream`] is the entry point for most callers; [`engine::PipeEngine`]
//! exposes the underlying start/accept/finish steps.

pub mod ansi;
pub mod args;
pub mod chunk;
pub mod engine;
pub mod error;
pub mod process;
pub mod stream;

#[cfg(test)]
pub(crate) mod fake;

pub use args::{ConfigFile, Ext, FmtOptions};
pub use engine::{EngineOptions, OutputStream, PipeEngine};
pub use error::{FmtError, Result};
pub use process::{FmtCommand, ProcessExit, ProcessHandle};
pub use stream::{FmtOutput, FmtStream, format_bytes};
