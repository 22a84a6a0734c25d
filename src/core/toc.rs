use crate::common::{BinarySerializable, VInt};
use crate::core::segment_meta::DeleteMeta;
use crate::core::{SegmentMeta, SegmentMetaInventory};
use crate::error::LexisError;
use crate::schema::{Field, Schema};
use crate::Result;
use std::io;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Format version of the on-disk codec. Bumped on any layout change;
/// readers refuse other versions.
pub const FORMAT_VERSION: u32 = 1;

const TOC_MAGIC: u32 = 0x4c58_4953;

/// The manifest of one generation: schema, segment list, generation
/// number.
///
/// Serialized as: magic, format version, generation, schema blob
/// (JSON), segment records, crc32 of everything before it. The file is
/// written to a temporary name and atomically renamed, so readers only
/// ever observe complete TOCs.
#[derive(Clone)]
pub struct TableOfContents {
    pub generation: u64,
    pub schema: Schema,
    pub segments: Vec<SegmentMeta>,
}

impl TableOfContents {
    /// Number of live documents across the segments.
    pub fn num_docs(&self) -> u64 {
        self.segments
            .iter()
            .map(|meta| u64::from(meta.num_docs()))
            .sum()
    }

    /// File name of this generation's TOC.
    pub fn filename(index_name: &str, generation: u64) -> PathBuf {
        PathBuf::from(format!("{}_{}.toc", index_name, generation))
    }

    /// Parses `<index_name>_<generation>.toc`, returning the generation.
    pub fn parse_generation(index_name: &str, path: &Path) -> Option<u64> {
        let file_name = path.file_name()?.to_str()?;
        let prefix = format!("{}_", index_name);
        if !file_name.starts_with(&prefix) || !file_name.ends_with(".toc") {
            return None;
        }
        file_name[prefix.len()..file_name.len() - 4].parse().ok()
    }

    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut buffer: Vec<u8> = Vec::new();
        TOC_MAGIC.serialize(&mut buffer)?;
        FORMAT_VERSION.serialize(&mut buffer)?;
        self.generation.serialize(&mut buffer)?;
        let schema_json = serde_json::to_vec(&self.schema)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        schema_json.serialize(&mut buffer)?;
        VInt(self.segments.len() as u64).serialize(&mut buffer)?;
        for meta in &self.segments {
            buffer.write_all(meta.id().as_bytes())?;
            meta.byte_size().serialize(&mut buffer)?;
            meta.max_doc().serialize(&mut buffer)?;
            match meta.del_gen() {
                Some(del_gen) => {
                    1u8.serialize(&mut buffer)?;
                    meta.num_deleted_docs().serialize(&mut buffer)?;
                    del_gen.serialize(&mut buffer)?;
                }
                None => {
                    0u8.serialize(&mut buffer)?;
                }
            }
            let totals = meta.field_length_totals();
            VInt(totals.len() as u64).serialize(&mut buffer)?;
            for &(field, total) in totals {
                field.serialize(&mut buffer)?;
                VInt(total).serialize(&mut buffer)?;
            }
        }
        let checksum = {
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&buffer);
            hasher.finalize()
        };
        checksum.serialize(&mut buffer)?;
        Ok(buffer)
    }

    pub fn deserialize(data: &[u8], inventory: &SegmentMetaInventory) -> Result<TableOfContents> {
        if data.len() < 4 {
            return Err(LexisError::corruption("table of contents truncated"));
        }
        let payload = &data[..data.len() - 4];
        let expected_checksum = {
            let mut footer = &data[data.len() - 4..];
            u32::deserialize(&mut footer)?
        };
        let actual_checksum = {
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(payload);
            hasher.finalize()
        };
        if actual_checksum != expected_checksum {
            return Err(LexisError::corruption("table of contents checksum mismatch"));
        }
        let mut reader: &[u8] = payload;
        let magic = u32::deserialize(&mut reader)?;
        if magic != TOC_MAGIC {
            return Err(LexisError::corruption("bad table of contents magic"));
        }
        let format_version = u32::deserialize(&mut reader)?;
        if format_version != FORMAT_VERSION {
            return Err(LexisError::IncompatibleFormat {
                found: format_version,
                supported: FORMAT_VERSION,
            });
        }
        let generation = u64::deserialize(&mut reader)?;
        let schema_json = Vec::<u8>::deserialize(&mut reader)?;
        let schema: Schema = serde_json::from_slice(&schema_json)?;
        let num_segments = VInt::deserialize(&mut reader)?.0 as usize;
        let mut segments = Vec::with_capacity(num_segments);
        for _ in 0..num_segments {
            let mut id_bytes = [0u8; 16];
            reader.read_exact(&mut id_bytes)?;
            let segment_id = crate::core::SegmentId::from_bytes(id_bytes);
            let byte_size = u64::deserialize(&mut reader)?;
            let max_doc = u32::deserialize(&mut reader)?;
            let has_deletes = u8::deserialize(&mut reader)?;
            let deletes = if has_deletes != 0 {
                let num_deleted_docs = u32::deserialize(&mut reader)?;
                let del_gen = u64::deserialize(&mut reader)?;
                Some(DeleteMeta {
                    num_deleted_docs,
                    del_gen,
                })
            } else {
                None
            };
            let num_totals = VInt::deserialize(&mut reader)?.0 as usize;
            let mut field_length_totals = Vec::with_capacity(num_totals);
            for _ in 0..num_totals {
                let field = Field::deserialize(&mut reader)?;
                let total = VInt::deserialize(&mut reader)?.0;
                field_length_totals.push((field, total));
            }
            segments.push(SegmentMeta::from_parts(
                inventory,
                segment_id,
                max_doc,
                deletes,
                field_length_totals,
                byte_size,
            ));
        }
        Ok(TableOfContents {
            generation,
            schema,
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SegmentId;
    use crate::schema::{text_options, Schema};

    #[test]
    fn test_toc_round_trip() {
        let inventory = SegmentMetaInventory::new();
        let mut builder = Schema::builder();
        let title = builder.add_text_field("title", text_options().set_stored());
        let schema = builder.build();
        let meta = SegmentMeta::from_parts(
            &inventory,
            SegmentId::generate_random(),
            100,
            Some(DeleteMeta {
                num_deleted_docs: 3,
                del_gen: 7,
            }),
            vec![(title, 512)],
            4096,
        );
        let toc = TableOfContents {
            generation: 12,
            schema: schema.clone(),
            segments: vec![meta.clone()],
        };
        let bytes = toc.serialize().unwrap();
        let restored = TableOfContents::deserialize(&bytes, &inventory).unwrap();
        assert_eq!(restored.generation, 12);
        assert_eq!(restored.schema, schema);
        assert_eq!(restored.segments.len(), 1);
        assert_eq!(restored.segments[0].id(), meta.id());
        assert_eq!(restored.segments[0].num_docs(), 97);
        assert_eq!(restored.segments[0].del_gen(), Some(7));
        assert_eq!(restored.segments[0].field_length_totals(), &[(title, 512)]);
    }

    #[test]
    fn test_toc_rejects_corruption() {
        let inventory = SegmentMetaInventory::new();
        let toc = TableOfContents {
            generation: 1,
            schema: Schema::builder().build(),
            segments: Vec::new(),
        };
        let mut bytes = toc.serialize().unwrap();
        bytes[10] ^= 0xff;
        assert!(TableOfContents::deserialize(&bytes, &inventory).is_err());
    }

    #[test]
    fn test_toc_filename_round_trip() {
        let path = TableOfContents::filename("main", 42);
        assert_eq!(path.to_str().unwrap(), "main_42.toc");
        assert_eq!(
            TableOfContents::parse_generation("main", &path),
            Some(42)
        );
        assert_eq!(
            TableOfContents::parse_generation("other", &path),
            None
        );
    }
}
