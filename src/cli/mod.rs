//! Command Line Interface (CLI) layer for landshift.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for the `detect`, `indices`,
//! `inspect` and `transitions` subcommands. It wires user-provided options to
//! the underlying library functionality exposed via `landshift::api`.
//!
//! If you are embedding landshift into another application, prefer using
//! the high-level `landshift::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
