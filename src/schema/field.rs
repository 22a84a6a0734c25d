use crate::common::BinarySerializable;
use std::io;
use std::io::{Read, Write};

/// Compact handle for a field of the schema.
///
/// Fields are identified by the order in which they were added to the
/// `SchemaBuilder`.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Eq, Ord, Hash, Serialize, Deserialize)]
pub struct Field(pub u32);

impl Field {
    pub fn field_id(self) -> u32 {
        self.0
    }
}

impl BinarySerializable for Field {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.0.serialize(writer)
    }

    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Field> {
        u32::deserialize(reader).map(Field)
    }
}
