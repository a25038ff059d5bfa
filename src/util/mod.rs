//! Shared utilities for nogvl-check.

mod position;

pub use position::{LineCol, LineIndex};
