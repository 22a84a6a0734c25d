use crate::core::{SegmentComponent, SegmentId};
use crate::schema::Field;
use crate::DocId;
use census::{Inventory, TrackedObject};
use std::fmt;
use std::path::PathBuf;

/// Deletion state of a segment.
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteMeta {
    /// Number of deleted documents.
    pub num_deleted_docs: u32,
    /// Generation that wrote the current live-docs file.
    pub del_gen: u64,
}

#[derive(Clone, Debug)]
pub struct InnerSegmentMeta {
    segment_id: SegmentId,
    max_doc: DocId,
    deletes: Option<DeleteMeta>,
    /// Total token count per indexed text field, feeding the collection
    /// statistics (average field lengths for BM25F).
    field_length_totals: Vec<(Field, u64)>,
    /// Total byte size of the segment files, used by the merge policy.
    byte_size: u64,
}

/// Tracks which segment metas are alive (referenced by a TOC, an open
/// reader or an in-flight merge). The garbage-collection sweep only
/// deletes the files of segments absent from the inventory.
#[derive(Clone)]
pub struct SegmentMetaInventory {
    inventory: Inventory<InnerSegmentMeta>,
}

impl Default for SegmentMetaInventory {
    fn default() -> SegmentMetaInventory {
        SegmentMetaInventory {
            inventory: Inventory::new(),
        }
    }
}

impl SegmentMetaInventory {
    pub fn new() -> SegmentMetaInventory {
        SegmentMetaInventory::default()
    }

    /// The segment ids currently alive.
    pub fn living_segment_ids(&self) -> Vec<SegmentId> {
        self.inventory
            .list()
            .into_iter()
            .map(|tracked| tracked.segment_id)
            .collect()
    }

    /// The `(segment id, deletion generation)` pairs currently alive;
    /// the GC sweep keeps a live-docs file only while some meta pins
    /// its exact generation.
    pub fn living_entries(&self) -> Vec<(SegmentId, Option<u64>)> {
        self.inventory
            .list()
            .into_iter()
            .map(|tracked| {
                (
                    tracked.segment_id,
                    tracked.deletes.as_ref().map(|deletes| deletes.del_gen),
                )
            })
            .collect()
    }

    pub fn new_segment_meta(
        &self,
        segment_id: SegmentId,
        max_doc: DocId,
    ) -> SegmentMeta {
        self.track(InnerSegmentMeta {
            segment_id,
            max_doc,
            deletes: None,
            field_length_totals: Vec::new(),
            byte_size: 0,
        })
    }

    pub(crate) fn track(&self, inner: InnerSegmentMeta) -> SegmentMeta {
        SegmentMeta {
            tracked: self.inventory.track(inner),
        }
    }
}

/// Metadata of one immutable segment, as recorded in the table of
/// contents.
///
/// Cloning shares the tracked handle: a `SegmentMeta` kept alive by a
/// reader pins the segment's files against garbage collection.
#[derive(Clone)]
pub struct SegmentMeta {
    tracked: TrackedObject<InnerSegmentMeta>,
}

impl SegmentMeta {
    pub fn id(&self) -> SegmentId {
        self.tracked.segment_id
    }

    /// Highest local docnum + 1, deleted documents included.
    pub fn max_doc(&self) -> DocId {
        self.tracked.max_doc
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> DocId {
        self.max_doc() - self.num_deleted_docs()
    }

    pub fn num_deleted_docs(&self) -> DocId {
        self.tracked
            .deletes
            .as_ref()
            .map(|deletes| deletes.num_deleted_docs)
            .unwrap_or(0)
    }

    pub fn has_deletes(&self) -> bool {
        self.tracked.deletes.is_some()
    }

    pub fn del_gen(&self) -> Option<u64> {
        self.tracked.deletes.as_ref().map(|deletes| deletes.del_gen)
    }

    pub fn field_length_totals(&self) -> &[(Field, u64)] {
        &self.tracked.field_length_totals
    }

    pub fn byte_size(&self) -> u64 {
        self.tracked.byte_size
    }

    /// Relative path of one component file.
    pub fn component_path(&self, component: SegmentComponent) -> PathBuf {
        let uuid = self.id().uuid_string();
        match component {
            SegmentComponent::Delete => {
                let del_gen = self.del_gen().unwrap_or(0);
                PathBuf::from(format!("{}.{}.del", uuid, del_gen))
            }
            _ => PathBuf::from(format!("{}.{}", uuid, component.extension())),
        }
    }

    /// Derived meta with updated statistics, tracked in the same
    /// inventory.
    pub fn with_stats(
        &self,
        inventory: &SegmentMetaInventory,
        field_length_totals: Vec<(Field, u64)>,
        byte_size: u64,
    ) -> SegmentMeta {
        let mut inner = (*self.tracked).clone();
        inner.field_length_totals = field_length_totals;
        inner.byte_size = byte_size;
        inventory.track(inner)
    }

    /// Derived meta carrying a new live-docs file.
    pub fn with_delete_meta(
        &self,
        inventory: &SegmentMetaInventory,
        num_deleted_docs: u32,
        del_gen: u64,
    ) -> SegmentMeta {
        let mut inner = (*self.tracked).clone();
        inner.deletes = Some(DeleteMeta {
            num_deleted_docs,
            del_gen,
        });
        inventory.track(inner)
    }

    pub(crate) fn from_parts(
        inventory: &SegmentMetaInventory,
        segment_id: SegmentId,
        max_doc: DocId,
        deletes: Option<DeleteMeta>,
        field_length_totals: Vec<(Field, u64)>,
        byte_size: u64,
    ) -> SegmentMeta {
        inventory.track(InnerSegmentMeta {
            segment_id,
            max_doc,
            deletes,
            field_length_totals,
            byte_size,
        })
    }
}

impl fmt::Debug for SegmentMeta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SegmentMeta(id={:?}, max_doc={}, deleted={})",
            self.id(),
            self.max_doc(),
            self.num_deleted_docs()
        )
    }
}
