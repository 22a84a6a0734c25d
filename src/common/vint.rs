use super::BinarySerializable;
use std::io;
use std::io::Read;
use std::io::Write;

/// Variable-length encoded `u64`, 7 bits per byte, low bits first.
///
/// The high bit of each byte is a continuation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VInt(pub u64);

const STOP_BIT: u8 = 128u8;

impl VInt {
    pub fn val(&self) -> u64 {
        self.0
    }

    /// Appends the encoded form to `output`.
    pub fn serialize_into_vec(&self, output: &mut Vec<u8>) {
        let mut buffer = [0u8; 10];
        let num_bytes = self.serialize_into(&mut buffer);
        output.extend_from_slice(&buffer[..num_bytes]);
    }

    /// Writes into a 10-byte buffer, returning the number of bytes used.
    pub fn serialize_into(&self, buffer: &mut [u8; 10]) -> usize {
        let mut remaining = self.0;
        for (i, b) in buffer.iter_mut().enumerate() {
            let next_byte: u8 = (remaining % 128u64) as u8;
            remaining /= 128u64;
            if remaining == 0u64 {
                *b = next_byte | STOP_BIT;
                return i + 1;
            } else {
                *b = next_byte;
            }
        }
        unreachable!();
    }

    /// Decodes a vint from the start of `data`, returning the value and the
    /// number of bytes consumed, or `None` if `data` ends mid-integer.
    pub fn deserialize_from_slice(data: &[u8]) -> Option<(u64, usize)> {
        let mut result = 0u64;
        let mut shift = 0u32;
        for (i, &b) in data.iter().enumerate() {
            result |= u64::from(b % 128u8) << shift;
            if b & STOP_BIT != 0 {
                return Some((result, i + 1));
            }
            shift += 7;
            if shift > 63 {
                break;
            }
        }
        None
    }
}

impl BinarySerializable for VInt {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut buffer = [0u8; 10];
        let num_bytes = self.serialize_into(&mut buffer);
        writer.write_all(&buffer[..num_bytes])
    }

    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut bytes = reader.bytes();
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            match bytes.next() {
                Some(Ok(b)) => {
                    result |= u64::from(b % 128u8) << shift;
                    if b & STOP_BIT != 0 {
                        return Ok(VInt(result));
                    }
                    shift += 7;
                    if shift > 63 {
                        break;
                    }
                }
                Some(Err(err)) => {
                    return Err(err);
                }
                None => {
                    break;
                }
            }
        }
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "reached end of stream while reading a vint",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aux_test_vint(val: u64) {
        let mut buffer = Vec::new();
        VInt(val).serialize(&mut buffer).unwrap();
        assert!(buffer.len() <= 10);
        let deser = VInt::deserialize(&mut &buffer[..]).unwrap();
        assert_eq!(deser.0, val);
        let (slice_val, consumed) = VInt::deserialize_from_slice(&buffer).unwrap();
        assert_eq!(slice_val, val);
        assert_eq!(consumed, buffer.len());
    }

    #[test]
    fn test_vint() {
        aux_test_vint(0);
        aux_test_vint(1);
        aux_test_vint(127);
        aux_test_vint(128);
        aux_test_vint(16_383);
        aux_test_vint(16_384);
        aux_test_vint(u64::max_value());
        for i in 1..512 {
            aux_test_vint(i * 1_332);
        }
    }

    #[test]
    fn test_vint_truncated() {
        let mut buffer = Vec::new();
        VInt(100_000).serialize(&mut buffer).unwrap();
        let truncated = &buffer[..buffer.len() - 1];
        assert!(VInt::deserialize(&mut &truncated[..]).is_err());
        assert!(VInt::deserialize_from_slice(truncated).is_none());
    }
}
