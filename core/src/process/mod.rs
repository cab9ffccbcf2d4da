//! Process creation and status retrieval primitives
//!
//! This module wraps the OS primitives the supervisor is built on:
//!
//! - creation (`fork`) and image replacement (`execv`/`execve`)
//! - blocking or polling status retrieval (`waitpid`)
//! - explicit signal delivery (`kill`)
//!
//! ## Platform Support
//!
//! - **Unix**: full support; Linux is the primary target

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use unix::*;
