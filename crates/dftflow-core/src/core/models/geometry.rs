use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// A single atom of a molecular geometry.
///
/// Only the element symbol and Cartesian position (in Angstroms) are tracked;
/// everything else about the system lives with the computation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Element symbol (e.g., "C", "H", "Cl").
    pub symbol: String,
    /// Cartesian coordinates in Angstroms.
    pub position: Point3<f64>,
}

impl Atom {
    pub fn new(symbol: &str, position: Point3<f64>) -> Self {
        Self {
            symbol: symbol.to_string(),
            position,
        }
    }
}

/// An ordered list of atoms describing one molecular geometry.
///
/// This is the raw geometry stored in checkpoints and handed to XYZ snapshot
/// writers. It serializes transparently as a list of atoms.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Geometry {
    atoms: Vec<Atom>,
}

impl Geometry {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn push(&mut self, atom: Atom) {
        self.atoms.push(atom);
    }
}

impl FromIterator<Atom> for Geometry {
    fn from_iter<I: IntoIterator<Item = Atom>>(iter: I) -> Self {
        Self {
            atoms: iter.into_iter().collect(),
        }
    }
}
