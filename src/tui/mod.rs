//! TUI debugger.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register and flag view for the CPU
//! - Memory view in hex rows
//! - Step/run/breakpoint controls and disassembly around PC
//! - A GPU summary once the CPU program stops

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
