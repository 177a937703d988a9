//! Minimal reader for the Dalvik executable container format.
//!
//! The aggregator loads real `d8` output, so this module knows the exact
//! binary layout: header, string/type/proto/method id tables and per-class
//! `class_data` items. It reads just enough to list classes and their
//! method shapes; code items, fields, annotations and debug info are
//! skipped. All offsets and indices are bounds-checked; malformed input
//! yields a [`DexError`], never a panic.

mod reader;
mod types;

pub use reader::parse;
pub use types::*;
