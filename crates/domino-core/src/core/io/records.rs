use super::traits::AssignmentFile;
use crate::core::models::assignment::Assignment;
use crate::core::models::ids::EntityId;
use std::io::{self, BufRead, Read, Write};
use thiserror::Error;

/// File signature of a binary assignment record file.
pub const MAGIC: [u8; 4] = *b"DMNO";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not an assignment record file (bad magic bytes)")]
    BadMagic,
    #[error("Unsupported record format version {0}")]
    UnsupportedVersion(u32),
    #[error("Record file is truncated: expected {expected} records, found {found}")]
    Truncated { expected: u64, found: u64 },
    #[error("State {0} does not fit in a 32-bit record field")]
    StateOverflow(usize),
    #[error("Record has {found} states, but the file stores {expected} per record")]
    WidthMismatch { expected: usize, found: usize },
}

/// Leading section of a record file: the subset's entities and the number
/// of records that follow.
///
/// Layout, all little-endian: magic (4 bytes), version (`u32`), width
/// (`u32`), one raw entity id (`u64`) per column, record count (`u64`).
/// Each record is `width` states as `u32` followed by the score as `f64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub entities: Vec<EntityId>,
    pub count: u64,
}

impl RecordHeader {
    pub fn new(entities: Vec<EntityId>) -> Self {
        Self { entities, count: 0 }
    }

    pub fn width(&self) -> usize {
        self.entities.len()
    }

    /// Size of the encoded header in bytes.
    pub fn encoded_len(&self) -> u64 {
        4 + 4 + 4 + 8 * self.width() as u64 + 8
    }

    /// Byte offset of the record count field.
    pub fn count_offset(&self) -> u64 {
        self.encoded_len() - 8
    }

    /// Size of one encoded record in bytes.
    pub fn record_len(&self) -> u64 {
        4 * self.width() as u64 + 8
    }

    pub fn record_offset(&self, index: u64) -> u64 {
        self.encoded_len() + index * self.record_len()
    }

    pub fn write(&self, writer: &mut impl Write) -> Result<(), RecordError> {
        writer.write_all(&MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(self.width() as u32).to_le_bytes())?;
        for id in &self.entities {
            writer.write_all(&id.to_raw().to_le_bytes())?;
        }
        writer.write_all(&self.count.to_le_bytes())?;
        Ok(())
    }

    pub fn read(reader: &mut impl Read) -> Result<Self, RecordError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(RecordError::BadMagic);
        }
        let version = read_u32(reader)?;
        if version != FORMAT_VERSION {
            return Err(RecordError::UnsupportedVersion(version));
        }
        let width = read_u32(reader)? as usize;
        let entities = (0..width)
            .map(|_| read_u64(reader).map(EntityId::from_raw))
            .collect::<Result<Vec<_>, _>>()?;
        let count = read_u64(reader)?;
        Ok(Self { entities, count })
    }
}

/// Encodes one assignment as a fixed-width record.
pub fn write_record(
    writer: &mut impl Write,
    width: usize,
    assignment: &Assignment,
) -> Result<(), RecordError> {
    if assignment.len() != width {
        return Err(RecordError::WidthMismatch {
            expected: width,
            found: assignment.len(),
        });
    }
    for &state in &assignment.states {
        let value = u32::try_from(state).map_err(|_| RecordError::StateOverflow(state))?;
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.write_all(&assignment.score.to_le_bytes())?;
    Ok(())
}

pub fn read_record(reader: &mut impl Read, width: usize) -> Result<Assignment, RecordError> {
    let states = (0..width)
        .map(|_| read_u32(reader).map(|s| s as usize))
        .collect::<Result<Vec<_>, _>>()?;
    let mut score = [0u8; 8];
    reader.read_exact(&mut score)?;
    Ok(Assignment::new(states, f64::from_le_bytes(score)))
}

fn read_u32(reader: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// A complete record file held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub entities: Vec<EntityId>,
    pub records: Vec<Assignment>,
}

pub struct RecordFile;

impl AssignmentFile for RecordFile {
    type Data = RecordSet;
    type Error = RecordError;

    fn read_from(reader: &mut impl BufRead) -> Result<RecordSet, RecordError> {
        let header = RecordHeader::read(reader)?;
        let mut records = Vec::new();
        for found in 0..header.count {
            match read_record(reader, header.width()) {
                Ok(record) => records.push(record),
                Err(RecordError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(RecordError::Truncated {
                        expected: header.count,
                        found,
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(RecordSet {
            entities: header.entities,
            records,
        })
    }

    fn write_to(data: &RecordSet, writer: &mut impl Write) -> Result<(), RecordError> {
        let header = RecordHeader {
            entities: data.entities.clone(),
            count: data.records.len() as u64,
        };
        header.write(writer)?;
        for record in &data.records {
            write_record(writer, header.width(), record)?;
        }
        Ok(())
    }
}
