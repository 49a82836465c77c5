//! Utility functions for the engine module.
//!
//! Filesystem helpers shared by the checkpoint store, the metadata finalizer,
//! and the stage payload writers.

pub mod fs;
