use crate::common::VInt;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;
use std::io::Read;
use std::io::Write;

/// Trait for the types making up the binary codec surface.
///
/// All fixed-width integers are little-endian; byte strings are
/// length-prefixed with a [`VInt`].
pub trait BinarySerializable: Sized {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()>;
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self>;
}

/// Marker trait for types whose serialized form has a constant byte length.
pub trait FixedSize: BinarySerializable {
    const SIZE_IN_BYTES: usize;
}

impl BinarySerializable for () {
    fn serialize<W: Write>(&self, _: &mut W) -> io::Result<()> {
        Ok(())
    }
    fn deserialize<R: Read>(_: &mut R) -> io::Result<Self> {
        Ok(())
    }
}

impl FixedSize for () {
    const SIZE_IN_BYTES: usize = 0;
}

impl BinarySerializable for u8 {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(*self)
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<u8> {
        reader.read_u8()
    }
}

impl FixedSize for u8 {
    const SIZE_IN_BYTES: usize = 1;
}

impl BinarySerializable for u32 {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(*self)
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<u32> {
        reader.read_u32::<LittleEndian>()
    }
}

impl FixedSize for u32 {
    const SIZE_IN_BYTES: usize = 4;
}

impl BinarySerializable for u64 {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(*self)
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<u64> {
        reader.read_u64::<LittleEndian>()
    }
}

impl FixedSize for u64 {
    const SIZE_IN_BYTES: usize = 8;
}

impl BinarySerializable for i64 {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_i64::<LittleEndian>(*self)
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<i64> {
        reader.read_i64::<LittleEndian>()
    }
}

impl FixedSize for i64 {
    const SIZE_IN_BYTES: usize = 8;
}

impl BinarySerializable for f32 {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.to_bits())
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<f32> {
        Ok(f32::from_bits(reader.read_u32::<LittleEndian>()?))
    }
}

impl FixedSize for f32 {
    const SIZE_IN_BYTES: usize = 4;
}

impl BinarySerializable for Vec<u8> {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        VInt(self.len() as u64).serialize(writer)?;
        writer.write_all(&self[..])
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
        let len = VInt::deserialize(reader)?.0 as usize;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl BinarySerializable for String {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let bytes = self.as_bytes();
        VInt(bytes.len() as u64).serialize(writer)?;
        writer.write_all(bytes)
    }
    fn deserialize<R: Read>(reader: &mut R) -> io::Result<String> {
        let bytes = Vec::<u8>::deserialize(reader)?;
        String::from_utf8(bytes)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "not valid utf-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: BinarySerializable + PartialEq + std::fmt::Debug>(value: T) {
        let mut buffer: Vec<u8> = Vec::new();
        value.serialize(&mut buffer).unwrap();
        let deserialized = T::deserialize(&mut &buffer[..]).unwrap();
        assert_eq!(value, deserialized);
    }

    #[test]
    fn test_serialize_round_trips() {
        round_trip(3u8);
        round_trip(1_000_000u32);
        round_trip(u64::max_value());
        round_trip(-12i64);
        round_trip(3.25f32);
        round_trip(String::from("drei käse hoch"));
        round_trip(vec![1u8, 3, 5, 7]);
    }
}
