/// The file roles making up a segment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SegmentComponent {
    /// Term dictionary (`.trm`).
    Terms,
    /// Postings (`.pst`).
    Postings,
    /// Stored fields (`.fld`).
    Store,
    /// Per-doc field lengths (`.len`).
    Lengths,
    /// Sort/group columns (`.col`).
    Columns,
    /// Forward vectors (`.vec`).
    Vectors,
    /// Live-docs bitmap (`.del`); versioned by deletion generation.
    Delete,
}

impl SegmentComponent {
    pub fn iterator() -> impl Iterator<Item = SegmentComponent> {
        static COMPONENTS: [SegmentComponent; 7] = [
            SegmentComponent::Terms,
            SegmentComponent::Postings,
            SegmentComponent::Store,
            SegmentComponent::Lengths,
            SegmentComponent::Columns,
            SegmentComponent::Vectors,
            SegmentComponent::Delete,
        ];
        COMPONENTS.iter().cloned()
    }

    pub fn extension(self) -> &'static str {
        match self {
            SegmentComponent::Terms => "trm",
            SegmentComponent::Postings => "pst",
            SegmentComponent::Store => "fld",
            SegmentComponent::Lengths => "len",
            SegmentComponent::Columns => "col",
            SegmentComponent::Vectors => "vec",
            SegmentComponent::Delete => "del",
        }
    }
}
