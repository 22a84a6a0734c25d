use crate::core::{SegmentComponent, SegmentId, SegmentMeta};
use crate::schema::Schema;
use crate::storage::error::{OpenReadError, OpenWriteError};
use crate::storage::{ReadOnlySource, Storage, WritePtr};
use std::fmt;

/// One immutable segment: the handle bundling its storage, schema and
/// meta. Opening component files goes through here.
#[derive(Clone)]
pub struct Segment {
    storage: Box<dyn Storage>,
    schema: Schema,
    meta: SegmentMeta,
}

impl Segment {
    pub fn new(storage: Box<dyn Storage>, schema: Schema, meta: SegmentMeta) -> Segment {
        Segment {
            storage,
            schema,
            meta,
        }
    }

    pub fn id(&self) -> SegmentId {
        self.meta.id()
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn schema(&self) -> Schema {
        self.schema.clone()
    }

    pub fn storage(&self) -> &dyn Storage {
        &*self.storage
    }

    pub fn open_read(&self, component: SegmentComponent) -> Result<ReadOnlySource, OpenReadError> {
        self.storage.open_read(&self.meta.component_path(component))
    }

    pub fn open_write(&self, component: SegmentComponent) -> Result<WritePtr, OpenWriteError> {
        self.storage.open_write(&self.meta.component_path(component))
    }

    pub fn component_exists(&self, component: SegmentComponent) -> bool {
        self.storage.exists(&self.meta.component_path(component))
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Segment({:?})", self.id())
    }
}
