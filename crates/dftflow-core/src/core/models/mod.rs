//! # Core Models Module
//!
//! Plain data structures describing the molecular input of a calculation run.
//!
//! The pipeline never interprets coordinates itself; geometries are carried
//! between the computation backend, checkpoints, and XYZ snapshot files.
//!
//! - [`geometry`] - Atoms and ordered atom lists (`Geometry`)

pub mod geometry;
