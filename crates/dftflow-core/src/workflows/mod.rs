//! # Workflows Module
//!
//! High-level stage entry points. Each `run` function owns the terminal
//! status of the run it drives: it takes a
//! [`MetadataFinalizer`](crate::engine::metadata::MetadataFinalizer) by value
//! and consumes it on every exit path.
//!
//! - **Frequency** ([`frequency`]) - Frequency analysis, TS-quality gating, and the
//!   deferred reaction-path trace and single-point refinement it may trigger.
//! - **Reaction path** ([`irc`]) - Resumable bidirectional IRC tracing with
//!   throttled snapshots and checkpoints.
//! - **Single point** ([`single_point`]) - Energy refinement shared by both stages;
//!   its failures never fail the run.

pub mod frequency;
pub mod irc;
pub mod single_point;
