//! # DFTFlow Core Library
//!
//! Stage orchestration and checkpoint/resume for multi-stage quantum-chemistry
//! runs: frequency analysis, transition-state quality gating, bidirectional
//! reaction-path (IRC) tracing and single-point refinement.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three-layer split throughout.
//!
//! - **[`core`]: The Foundation.** Stateless geometry models and XYZ snapshot I/O.
//!
//! - **[`engine`]: The Logic Core.** Checkpoint persistence, snapshot cadence,
//!   profile assessment, the stage-state machine with its quality gate, and
//!   metadata finalization. Computation is delegated to a
//!   [`ComputeBackend`](engine::backend::ComputeBackend).
//!
//! - **[`workflows`]: The Public API.** The frequency and reaction-path stages,
//!   each owning the terminal status of the run it drives.

pub mod core;
pub mod engine;
pub mod workflows;
