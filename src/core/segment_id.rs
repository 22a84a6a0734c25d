use std::fmt;
use uuid::Uuid;

/// Globally unique identifier of a segment.
///
/// Segment files are named after it, so a merge or flush can never
/// collide with files of an older generation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(Uuid);

impl SegmentId {
    pub fn generate_random() -> SegmentId {
        SegmentId(Uuid::new_v4())
    }

    /// Hyphen-less lowercase form, used in file names.
    pub fn uuid_string(&self) -> String {
        self.0.to_simple_ref().to_string()
    }

    /// Truncated form for logs.
    pub fn short_uuid_string(&self) -> String {
        self.uuid_string()[..8].to_string()
    }

    pub fn from_uuid_string(uuid_str: &str) -> Option<SegmentId> {
        Uuid::parse_str(uuid_str).ok().map(SegmentId)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub(crate) fn from_bytes(bytes: [u8; 16]) -> SegmentId {
        SegmentId(Uuid::from_bytes(bytes))
    }
}

impl fmt::Debug for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Seg({})", self.short_uuid_string())
    }
}

#[cfg(test)]
mod tests {
    use super::SegmentId;

    #[test]
    fn test_segment_id_round_trip() {
        let segment_id = SegmentId::generate_random();
        let as_string = segment_id.uuid_string();
        assert_eq!(SegmentId::from_uuid_string(&as_string), Some(segment_id));
        assert_eq!(segment_id.short_uuid_string().len(), 8);
    }
}
