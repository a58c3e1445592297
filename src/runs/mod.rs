//! Mutation of stored task runs.
//!
//! [`RunUpdater`] is the only write path for existing runs.

mod updater;

pub use updater::RunUpdater;
