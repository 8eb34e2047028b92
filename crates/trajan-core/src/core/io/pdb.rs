use super::traits::{FrameLoader, LoadError, ParseErrorKind};
use crate::core::models::atom::{Atom, ResidueClass};
use crate::core::models::frame::Frame;
use crate::core::models::stream::{FrameFormat, StreamFlags};
use nalgebra::Point3;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::trace;

const MIN_ATOM_RECORD_LEN: usize = 54;

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_coord(line: &str, line_num: usize, start: usize, columns: &'static str) -> Result<f64, LoadError> {
    let value = slice_and_trim(line, start, start + 8);
    value.parse().map_err(|_| LoadError::Parse {
        line: line_num,
        kind: ParseErrorKind::InvalidFloat {
            columns,
            value: value.into(),
        },
    })
}

/// Reader for fixed-column PDB coordinate files.
///
/// Only the first model of a multi-model file is read. With
/// [`FrameFormat::PdbSegment`] the chain identifier is taken from the last
/// character of the segment identifier (columns 73-76), as written by
/// CHARMM-family tools that leave column 22 blank.
pub struct PdbFile;

impl PdbFile {
    pub fn read_from(
        reader: &mut impl BufRead,
        format: FrameFormat,
        flags: StreamFlags,
    ) -> Result<Frame, LoadError> {
        let mut atoms = Vec::new();
        let mut positions = Vec::new();
        let mut seen_model = false;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            let record_type = slice_and_trim(&line, 0, 6);
            match record_type {
                "MODEL" => {
                    if seen_model {
                        break;
                    }
                    seen_model = true;
                    continue;
                }
                "ENDMDL" | "END" => break,
                "ATOM" | "HETATM" => {}
                _ => continue,
            }

            if line.len() < MIN_ATOM_RECORD_LEN {
                return Err(LoadError::Parse {
                    line: line_num,
                    kind: ParseErrorKind::LineTooShort,
                });
            }

            let hetero = record_type == "HETATM";
            let name = slice_and_trim(&line, 12, 16);
            let residue_name = slice_and_trim(&line, 17, 21);
            let residue_serial_str = slice_and_trim(&line, 22, 26);
            let residue_serial: i32 = residue_serial_str.parse().map_err(|_| LoadError::Parse {
                line: line_num,
                kind: ParseErrorKind::InvalidInt {
                    columns: "23-26",
                    value: residue_serial_str.into(),
                },
            })?;
            // Serial columns overflow to "*****" or hex in large systems.
            let serial = slice_and_trim(&line, 6, 11)
                .parse::<u32>()
                .unwrap_or(atoms.len() as u32 + 1);

            let chain_id = match format {
                FrameFormat::Pdb => line.get(21..22).and_then(|s| s.chars().next()).unwrap_or(' '),
                FrameFormat::PdbSegment => slice_and_trim(&line, 72, 76).chars().last().unwrap_or(' '),
            };

            let x = parse_coord(&line, line_num, 30, "31-38")?;
            let y = parse_coord(&line, line_num, 38, "39-46")?;
            let z = parse_coord(&line, line_num, 46, "47-54")?;

            let mut atom = Atom::new(serial, name, residue_name, residue_serial, chain_id)
                .with_element(slice_and_trim(&line, 76, 78));
            atom.hetero = hetero;

            if flags.skip_water && atom.class == ResidueClass::Water {
                continue;
            }
            if flags.skip_hetero && hetero && atom.class != ResidueClass::Water {
                continue;
            }
            if flags.skip_hydrogens && !atom.is_heavy() {
                continue;
            }

            atoms.push(atom);
            positions.push(Point3::new(x, y, z));
        }

        Ok(Frame::new(atoms, positions))
    }
}

/// Loads frames from PDB files on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdbFrameLoader;

impl FrameLoader for PdbFrameLoader {
    fn load(
        &self,
        worker: usize,
        format: FrameFormat,
        path: &Path,
        flags: StreamFlags,
    ) -> Result<Frame, LoadError> {
        trace!(worker, path = %path.display(), "Loading frame");
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        let frame = PdbFile::read_from(&mut reader, format, flags)?;
        if frame.atom_count() == 0 {
            return Err(LoadError::NoAtoms(path.to_path_buf()));
        }
        Ok(frame)
    }
}
