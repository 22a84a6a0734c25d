use crate::error::LexisError;
use crate::schema::BytesOptions;
use crate::schema::Document;
use crate::schema::Field;
use crate::schema::FieldEntry;
use crate::schema::FieldType;
use crate::schema::NumericOptions;
use crate::schema::TextOptions;
use crate::schema::Value;
use crate::Result;
use serde::de::{SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Builder accumulating field definitions.
///
/// Fields are assigned increasing ids in the order they are added; the
/// resulting [`Schema`] is immutable.
#[derive(Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldEntry>,
    fields_map: HashMap<String, Field>,
}

impl SchemaBuilder {
    pub fn new() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Starts from the fields of an existing schema; used to extend a
    /// schema with new fields across generations.
    pub fn from_schema(schema: &Schema) -> SchemaBuilder {
        let mut builder = SchemaBuilder::default();
        for (field, entry) in schema.fields() {
            builder.fields_map.insert(entry.name().to_string(), field);
            builder.fields.push(entry.clone());
        }
        builder
    }

    pub fn add_text_field(&mut self, name: &str, options: TextOptions) -> Field {
        self.add_field(FieldEntry::new(name.to_string(), FieldType::Text(options)))
    }

    pub fn add_u64_field(&mut self, name: &str, options: NumericOptions) -> Field {
        self.add_field(FieldEntry::new(name.to_string(), FieldType::U64(options)))
    }

    pub fn add_i64_field(&mut self, name: &str, options: NumericOptions) -> Field {
        self.add_field(FieldEntry::new(name.to_string(), FieldType::I64(options)))
    }

    pub fn add_f64_field(&mut self, name: &str, options: NumericOptions) -> Field {
        self.add_field(FieldEntry::new(name.to_string(), FieldType::F64(options)))
    }

    pub fn add_date_field(&mut self, name: &str, options: NumericOptions) -> Field {
        self.add_field(FieldEntry::new(name.to_string(), FieldType::Date(options)))
    }

    pub fn add_bytes_field(&mut self, name: &str, options: BytesOptions) -> Field {
        self.add_field(FieldEntry::new(name.to_string(), FieldType::Bytes(options)))
    }

    pub fn add_field(&mut self, field_entry: FieldEntry) -> Field {
        let field = Field(self.fields.len() as u32);
        if self
            .fields_map
            .insert(field_entry.name().to_string(), field)
            .is_some()
        {
            panic!("field {:?} appears twice in the schema", field_entry.name());
        }
        self.fields.push(field_entry);
        field
    }

    pub fn build(self) -> Schema {
        Schema(Arc::new(InnerSchema {
            fields: self.fields,
            fields_map: self.fields_map,
        }))
    }
}

struct InnerSchema {
    fields: Vec<FieldEntry>,
    fields_map: HashMap<String, Field>,
}

/// The ordered mapping from field names to field configurations.
///
/// Cloning is cheap; the schema is shared between the index handle, the
/// writers and the readers.
#[derive(Clone)]
pub struct Schema(Arc<InnerSchema>);

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn num_fields(&self) -> usize {
        self.0.fields.len()
    }

    pub fn get_field(&self, field_name: &str) -> Option<Field> {
        self.0.fields_map.get(field_name).cloned()
    }

    /// Like [`Schema::get_field`] but failing with `UnknownField`.
    pub fn find_field(&self, field_name: &str) -> Result<Field> {
        self.get_field(field_name)
            .ok_or_else(|| LexisError::UnknownField(field_name.to_string()))
    }

    pub fn get_field_entry(&self, field: Field) -> &FieldEntry {
        &self.0.fields[field.0 as usize]
    }

    pub fn get_field_name(&self, field: Field) -> &str {
        self.get_field_entry(field).name()
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &FieldEntry)> {
        self.0
            .fields
            .iter()
            .enumerate()
            .map(|(field_id, entry)| (Field(field_id as u32), entry))
    }

    /// The fields flagged unique, used by `update_document`.
    pub fn unique_fields(&self) -> Vec<Field> {
        self.fields()
            .filter(|(_, entry)| entry.is_unique())
            .map(|(field, _)| field)
            .collect()
    }

    /// True if `other` contains every field of `self`, unchanged and in
    /// the same positions. Extending a schema preserves field ids.
    pub fn is_prefix_of(&self, other: &Schema) -> bool {
        self.0.fields.len() <= other.0.fields.len()
            && self
                .0
                .fields
                .iter()
                .zip(other.0.fields.iter())
                .all(|(left, right)| left == right)
    }

    /// The stored fields of `doc`, keyed by field name, for JSON output.
    pub fn to_named_doc(&self, doc: &Document) -> BTreeMap<String, Vec<Value>> {
        let mut named_doc: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for field_value in doc.field_values() {
            named_doc
                .entry(self.get_field_name(field_value.field()).to_string())
                .or_insert_with(Vec::new)
                .push(field_value.value().clone());
        }
        named_doc
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(
                self.0
                    .fields
                    .iter()
                    .map(|entry| (entry.name(), entry.field_type())),
            )
            .finish()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Schema) -> bool {
        self.0.fields == other.0.fields
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Schema, D::Error> {
        struct SchemaVisitor;

        impl<'de> Visitor<'de> for SchemaVisitor {
            type Value = Schema;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a sequence of field entries")
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Schema, A::Error> {
                let mut builder = SchemaBuilder::default();
                while let Some(entry) = seq.next_element::<FieldEntry>()? {
                    builder.add_field(entry);
                }
                Ok(builder.build())
            }
        }

        deserializer.deserialize_seq(SchemaVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{id_options, stored_options, text_options};

    fn sample_schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field("title", text_options().set_stored());
        builder.add_text_field("path", id_options().set_unique() | stored_options());
        builder.add_text_field("content", text_options());
        builder.add_u64_field("price", NumericOptions::default().set_indexed().set_column());
        builder.build()
    }

    #[test]
    fn test_schema_lookup() {
        let schema = sample_schema();
        assert_eq!(schema.num_fields(), 4);
        let title = schema.get_field("title").unwrap();
        assert_eq!(schema.get_field_name(title), "title");
        assert!(schema.get_field("missing").is_none());
        assert!(schema.find_field("missing").is_err());
        assert_eq!(schema.unique_fields(), vec![Field(1)]);
    }

    #[test]
    fn test_schema_serde_round_trip() {
        let schema = sample_schema();
        let json = serde_json::to_string(&schema).unwrap();
        let restored: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, schema);
        assert_eq!(restored.get_field("price"), Some(Field(3)));
    }

    #[test]
    fn test_schema_extension() {
        let schema = sample_schema();
        let mut builder = SchemaBuilder::from_schema(&schema);
        builder.add_text_field("tags", text_options());
        let extended = builder.build();
        assert!(schema.is_prefix_of(&extended));
        assert!(!extended.is_prefix_of(&schema));
    }

    #[test]
    #[should_panic]
    fn test_schema_duplicate_field_panics() {
        let mut builder = Schema::builder();
        builder.add_text_field("a", text_options());
        builder.add_text_field("a", text_options());
    }
}
