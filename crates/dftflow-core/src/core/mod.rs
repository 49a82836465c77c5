//! # Core Module
//!
//! Stateless building blocks shared by the engine and the workflows: the
//! molecular geometry model and geometry file I/O.
//!
//! - **Molecular Representation** ([`models`]) - Atoms and geometries
//! - **File I/O** ([`io`]) - XYZ snapshot reading and writing

pub mod io;
pub mod models;
