//! Schema definition: field types, documents, terms and values.

mod document;
mod field;
mod field_entry;
mod field_type;
#[allow(clippy::module_inception)]
mod schema;
mod term;
mod value;

pub use self::document::{Document, FieldValue};
pub use self::field::Field;
pub use self::field_entry::FieldEntry;
pub use self::field_type::{
    id_options, stored_options, text_options, BytesOptions, ColumnType, FieldType,
    NumericOptions, PostingFormat, TextOptions,
};
pub use self::schema::{Schema, SchemaBuilder};
pub use self::term::Term;
pub use self::value::Value;
