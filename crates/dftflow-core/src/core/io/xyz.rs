use crate::core::io::traits::MolecularFile;
use crate::core::models::geometry::{Atom, Geometry};
use nalgebra::Point3;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("File contains no frames")]
    Empty,
}

/// Molecular charge/spin information written into every XYZ comment line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeSpin {
    pub charge: i32,
    pub spin: u32,
    pub multiplicity: u32,
}

impl Default for ChargeSpin {
    /// A neutral closed-shell singlet.
    fn default() -> Self {
        Self {
            charge: 0,
            spin: 0,
            multiplicity: 1,
        }
    }
}

/// Formats the comment line used for every snapshot frame.
///
/// The layout is `charge=<c> spin=<s> multiplicity=<m>` followed by an
/// optional free-form suffix such as `step=3 direction=forward`.
pub fn format_xyz_comment(charge_spin: ChargeSpin, extra: Option<&str>) -> String {
    let mut comment = format!(
        "charge={} spin={} multiplicity={}",
        charge_spin.charge, charge_spin.spin, charge_spin.multiplicity
    );
    if let Some(extra) = extra.filter(|e| !e.is_empty()) {
        comment.push(' ');
        comment.push_str(extra);
    }
    comment
}

pub struct XyzFile;

impl XyzFile {
    /// Reads every frame of a (possibly multi-frame) XYZ file.
    pub fn read_frames_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<Vec<(Geometry, String)>, XyzError> {
        let content = fs::read_to_string(path)?;
        let lines: Vec<&str> = content.lines().collect();
        let mut frames = Vec::new();
        let mut cursor = 0;

        while cursor < lines.len() {
            if lines[cursor].trim().is_empty() {
                cursor += 1;
                continue;
            }
            let (frame, consumed) = parse_frame(&lines[cursor..], cursor)?;
            frames.push(frame);
            cursor += consumed;
        }
        Ok(frames)
    }

    /// Reads the last frame of an XYZ file, as written by step-series snapshots.
    pub fn read_last_frame<P: AsRef<Path>>(path: P) -> Result<(Geometry, String), XyzError> {
        Self::read_frames_from_path(path)?
            .pop()
            .ok_or(XyzError::Empty)
    }
}

impl MolecularFile for XyzFile {
    type Metadata = String;
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Geometry, Self::Metadata), Self::Error> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        let borrowed: Vec<&str> = lines.iter().map(String::as_str).collect();
        let start = borrowed
            .iter()
            .position(|l| !l.trim().is_empty())
            .ok_or(XyzError::Empty)?;
        let (frame, _) = parse_frame(&borrowed[start..], start)?;
        Ok(frame)
    }

    fn write_to(
        geometry: &Geometry,
        metadata: &Self::Metadata,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        writeln!(writer, "{}", geometry.len())?;
        writeln!(writer, "{}", metadata.replace('\n', " "))?;
        for atom in geometry.atoms() {
            writeln!(
                writer,
                "{:<3} {:>15.8} {:>15.8} {:>15.8}",
                atom.symbol, atom.position.x, atom.position.y, atom.position.z
            )?;
        }
        Ok(())
    }
}

fn parse_frame(lines: &[&str], offset: usize) -> Result<((Geometry, String), usize), XyzError> {
    let count_line = lines[0].trim();
    let count: usize = count_line.parse().map_err(|_| XyzError::Parse {
        line: offset + 1,
        message: format!("expected atom count, found '{}'", count_line),
    })?;
    let frame_len = match count.checked_add(2) {
        Some(len) if len <= lines.len() => len,
        _ => {
            return Err(XyzError::Parse {
                line: offset + lines.len(),
                message: format!("frame declares {} atoms but the file ends early", count),
            });
        }
    };

    let comment = lines[1].to_string();
    let mut geometry = Geometry::default();
    for (i, line) in lines[2..frame_len].iter().enumerate() {
        let line_num = offset + i + 3;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(XyzError::Parse {
                line: line_num,
                message: "atom line needs a symbol and three coordinates".to_string(),
            });
        }
        let mut coords = [0.0; 3];
        for (slot, raw) in coords.iter_mut().zip(&fields[1..4]) {
            *slot = raw.parse().map_err(|_| XyzError::Parse {
                line: line_num,
                message: format!("invalid coordinate '{}'", raw),
            })?;
        }
        geometry.push(Atom::new(
            fields[0],
            Point3::new(coords[0], coords[1], coords[2]),
        ));
    }
    Ok(((geometry, comment), frame_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn water() -> Geometry {
        Geometry::new(vec![
            Atom::new("O", Point3::new(0.0, 0.0, 0.117)),
            Atom::new("H", Point3::new(0.0, 0.757, -0.467)),
            Atom::new("H", Point3::new(0.0, -0.757, -0.467)),
        ])
    }

    #[test]
    fn comment_includes_charge_spin_and_extra() {
        let cs = ChargeSpin {
            charge: -1,
            spin: 1,
            multiplicity: 2,
        };
        assert_eq!(
            format_xyz_comment(cs, Some("step=4 direction=reverse")),
            "charge=-1 spin=1 multiplicity=2 step=4 direction=reverse"
        );
        assert_eq!(
            format_xyz_comment(cs, None),
            "charge=-1 spin=1 multiplicity=2"
        );
    }

    #[test]
    fn write_then_read_preserves_symbols_and_comment() {
        let mut buffer = Vec::new();
        XyzFile::write_to(&water(), &"frame one".to_string(), &mut buffer).unwrap();

        let (geometry, comment) = XyzFile::read_from(&mut Cursor::new(buffer)).unwrap();
        assert_eq!(comment, "frame one");
        assert_eq!(geometry.len(), 3);
        assert_eq!(geometry.atoms()[1].symbol, "H");
        assert!((geometry.atoms()[1].position.y - 0.757).abs() < 1e-8);
    }

    #[test]
    fn append_accumulates_frames_and_last_frame_is_newest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("steps.xyz");
        XyzFile::append_to_path(&water(), &"step=0".to_string(), &path).unwrap();
        XyzFile::append_to_path(&water(), &"step=1".to_string(), &path).unwrap();

        let frames = XyzFile::read_frames_from_path(&path).unwrap();
        assert_eq!(frames.len(), 2);
        let (_, comment) = XyzFile::read_last_frame(&path).unwrap();
        assert_eq!(comment, "step=1");
    }

    #[test]
    fn write_to_path_overwrites_previous_frame() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last.xyz");
        XyzFile::write_to_path(&water(), &"old".to_string(), &path).unwrap();
        XyzFile::write_to_path(&water(), &"new".to_string(), &path).unwrap();

        let frames = XyzFile::read_frames_from_path(&path).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1, "new");
    }

    #[test]
    fn truncated_frame_is_a_parse_error() {
        let input = "3\ncomment\nO 0.0 0.0 0.0\n";
        let result = XyzFile::read_from(&mut Cursor::new(input));
        assert!(matches!(result, Err(XyzError::Parse { .. })));
    }

    #[test]
    fn oversized_atom_count_is_a_parse_error() {
        let input = format!("{}\ncomment\nO 0.0 0.0 0.0\n", usize::MAX);
        let result = XyzFile::read_from(&mut Cursor::new(input));
        assert!(matches!(result, Err(XyzError::Parse { .. })));
    }

    #[test]
    fn default_charge_spin_is_a_neutral_singlet() {
        assert_eq!(
            format_xyz_comment(ChargeSpin::default(), Some("step=0 direction=forward")),
            "charge=0 spin=0 multiplicity=1 step=0 direction=forward"
        );
    }

    #[test]
    fn invalid_coordinate_is_reported_with_line_number() {
        let input = "1\ncomment\nO 0.0 abc 0.0\n";
        match XyzFile::read_from(&mut Cursor::new(input)) {
            Err(XyzError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
