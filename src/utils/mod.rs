//! Shared utility functions.

pub mod json_merge;

pub use json_merge::deep_merge;
