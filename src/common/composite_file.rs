use crate::common::BinarySerializable;
use crate::common::CountingWriter;
use crate::common::VInt;
use crate::schema::Field;
use crate::storage::ReadOnlySource;
use crate::storage::WritePtr;
use std::collections::HashMap;
use std::io;
use std::io::Write;

/// A composite file packs one sub-file per field into a single physical
/// file, with a footer directory mapping each field to its byte range.
///
/// Lengths, columns and vectors all use this layout so that a segment
/// keeps one file per role regardless of the number of fields.
pub struct CompositeWrite {
    write: CountingWriter<WritePtr>,
    offsets: Vec<(Field, u64)>,
}

impl CompositeWrite {
    pub fn wrap(write: WritePtr) -> CompositeWrite {
        CompositeWrite {
            write: CountingWriter::wrap(write),
            offsets: Vec::new(),
        }
    }

    /// Opens the sub-file for `field`. Fields must be opened in strictly
    /// increasing offset order; the previous sub-file ends where this one
    /// starts.
    pub fn for_field(&mut self, field: Field) -> &mut CountingWriter<WritePtr> {
        let offset = self.write.written_bytes();
        debug_assert!(self
            .offsets
            .iter()
            .all(|&(prev_field, _)| prev_field != field));
        self.offsets.push((field, offset));
        &mut self.write
    }

    /// Writes the footer directory and flushes.
    pub fn close(mut self) -> io::Result<()> {
        let footer_offset = self.write.written_bytes();
        VInt(self.offsets.len() as u64).serialize(&mut self.write)?;
        for &(field, offset) in &self.offsets {
            field.0.serialize(&mut self.write)?;
            VInt(offset).serialize(&mut self.write)?;
        }
        footer_offset.serialize(&mut self.write)?;
        let mut write = self.write.finish()?;
        write.flush()
    }
}

/// Read-side counterpart of [`CompositeWrite`].
#[derive(Clone)]
pub struct CompositeFile {
    data: ReadOnlySource,
    ranges: HashMap<Field, (usize, usize)>,
}

impl CompositeFile {
    pub fn open(data: ReadOnlySource) -> io::Result<CompositeFile> {
        let len = data.len();
        if len < 8 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "composite file too short",
            ));
        }
        let footer_offset = {
            let mut footer_bytes = &data.as_slice()[len - 8..];
            u64::deserialize(&mut footer_bytes)? as usize
        };
        if footer_offset > len - 8 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "composite footer offset out of bounds",
            ));
        }
        let mut footer = &data.as_slice()[footer_offset..len - 8];
        let num_fields = VInt::deserialize(&mut footer)?.0 as usize;
        let mut entries: Vec<(Field, usize)> = Vec::with_capacity(num_fields);
        for _ in 0..num_fields {
            let field = Field(u32::deserialize(&mut footer)?);
            let offset = VInt::deserialize(&mut footer)?.0 as usize;
            entries.push((field, offset));
        }
        let mut ranges = HashMap::with_capacity(num_fields);
        for i in 0..num_fields {
            let (field, start) = entries[i];
            let end = entries
                .get(i + 1)
                .map(|&(_, offset)| offset)
                .unwrap_or(footer_offset);
            ranges.insert(field, (start, end));
        }
        Ok(CompositeFile { data, ranges })
    }

    /// An empty composite file, for segments missing an optional role file.
    pub fn empty() -> CompositeFile {
        CompositeFile {
            data: ReadOnlySource::empty(),
            ranges: HashMap::new(),
        }
    }

    pub fn open_read(&self, field: Field) -> Option<ReadOnlySource> {
        self.ranges
            .get(&field)
            .map(|&(start, end)| self.data.slice(start, end))
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.ranges.keys().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RamStorage, Storage};
    use std::path::Path;

    #[test]
    fn test_composite_file_round_trip() {
        let storage = RamStorage::create();
        let path = Path::new("test.composite");
        {
            let write = storage.open_write(path).unwrap();
            let mut composite = CompositeWrite::wrap(write);
            {
                let w = composite.for_field(Field(0));
                w.write_all(b"alpha").unwrap();
            }
            {
                let w = composite.for_field(Field(2));
                w.write_all(b"gamma-data").unwrap();
            }
            composite.close().unwrap();
        }
        let source = storage.open_read(path).unwrap();
        let composite = CompositeFile::open(source).unwrap();
        assert_eq!(
            composite.open_read(Field(0)).unwrap().as_slice(),
            b"alpha" as &[u8]
        );
        assert_eq!(
            composite.open_read(Field(2)).unwrap().as_slice(),
            b"gamma-data" as &[u8]
        );
        assert!(composite.open_read(Field(1)).is_none());
    }
}
