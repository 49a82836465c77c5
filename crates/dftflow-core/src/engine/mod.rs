//! # Engine Module
//!
//! This module implements the stateful machinery behind a DFTFlow run: the
//! durable checkpoint record, the snapshot cadence that throttles writes
//! during long stages, the stage-state machine and its quality gate, and the
//! finalizer that stamps a run's terminal status.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Snapshot, reaction-path and TS-quality settings
//! - **Context** ([`context`]) - The run layout and per-run parameters shared by every stage
//! - **Checkpointing** ([`checkpoint`]) - Versioned, forward-compatible progress record
//! - **Cadence** ([`cadence`]) - Per-direction snapshot and checkpoint throttling
//! - **Profiles** ([`profile`]) - Deduplicated energy profile and its plausibility assessment
//! - **State Tracking** ([`state`]) - Stage lifecycle and the pure gating decision
//! - **Metadata** ([`metadata`]) - Run metadata, event log and terminal finalization
//! - **Backends** ([`backend`], [`replay`]) - The computation seam and a recorded-result backend
//! - **Progress Monitoring** ([`progress`]) - Progress reporting for front ends
//! - **Error Handling** ([`error`]) - Engine-specific error types and failure traces
//!
//! ## Durability
//!
//! A run is interrupted only by process termination. Everything needed to
//! resume lives in the checkpoint file, which is always replaced atomically,
//! so a crash leaves either the previous or the new record on disk.

pub mod backend;
pub mod cadence;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod direction;
pub mod error;
pub mod metadata;
pub mod profile;
pub mod progress;
pub mod replay;
pub mod state;
pub(crate) mod utils;
