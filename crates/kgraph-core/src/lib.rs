//! Foundational file utilities shared across kgraph crates.
//!
//! Provides the atomic replace-on-write helper used by graph persistence so a
//! crash mid-save never leaves a truncated backing file.

pub mod atomic_io;

pub use atomic_io::{temporary_sibling_path, write_text_atomic};
