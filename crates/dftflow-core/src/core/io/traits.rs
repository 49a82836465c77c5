use crate::core::models::geometry::Geometry;
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing geometry file formats.
///
/// Implementors handle format-specific parsing and serialization of a single
/// geometry frame together with its per-frame metadata (e.g., an XYZ comment).
pub trait MolecularFile {
    /// The type of metadata carried alongside each frame.
    type Metadata;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads the first frame from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<(Geometry, Self::Metadata), Self::Error>;

    /// Writes one frame to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(
        geometry: &Geometry,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    /// Reads the first frame from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<(Geometry, Self::Metadata), Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes one frame to a file path, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(
        geometry: &Geometry,
        metadata: &Self::Metadata,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(geometry, metadata, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Appends one frame to a file path, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for appending or writing fails.
    fn append_to_path<P: AsRef<Path>>(
        geometry: &Geometry,
        metadata: &Self::Metadata,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(geometry, metadata, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
