//! Provides input/output functionality for molecular geometry files.
//!
//! Snapshots written during long-running stages use the multi-frame XYZ
//! format; the [`traits::MolecularFile`] trait keeps the format pluggable.

pub mod traits;
pub mod xyz;
