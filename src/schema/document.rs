use crate::common::BinarySerializable;
use crate::common::VInt;
use crate::schema::Field;
use crate::schema::Value;
use crate::DateTime;
use std::io;
use std::io::{Read, Write};

/// A field/value pair of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    field: Field,
    value: Value,
}

impl FieldValue {
    pub fn new(field: Field, value: Value) -> FieldValue {
        FieldValue { field, value }
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl BinarySerializable for FieldValue {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.field.serialize(writer)?;
        self.value.serialize(writer)
    }

    fn deserialize<R: Read>(reader: &mut R) -> io::Result<FieldValue> {
        let field = Field::deserialize(reader)?;
        let value = Value::deserialize(reader)?;
        Ok(FieldValue { field, value })
    }
}

/// An unindexed document: an ordered collection of field/value pairs.
///
/// A field may carry several values; their order of insertion is the
/// position order used when indexing multi-valued text fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    field_values: Vec<FieldValue>,
}

impl Document {
    pub fn new() -> Document {
        Document::default()
    }

    pub fn len(&self) -> usize {
        self.field_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_values.is_empty()
    }

    pub fn add(&mut self, field_value: FieldValue) {
        self.field_values.push(field_value);
    }

    pub fn add_text(&mut self, field: Field, text: &str) {
        self.add(FieldValue::new(field, Value::Str(text.to_string())));
    }

    pub fn add_u64(&mut self, field: Field, value: u64) {
        self.add(FieldValue::new(field, Value::U64(value)));
    }

    pub fn add_i64(&mut self, field: Field, value: i64) {
        self.add(FieldValue::new(field, Value::I64(value)));
    }

    pub fn add_f64(&mut self, field: Field, value: f64) {
        self.add(FieldValue::new(field, Value::F64(value)));
    }

    pub fn add_date(&mut self, field: Field, value: &DateTime) {
        self.add(FieldValue::new(field, Value::Date(*value)));
    }

    pub fn add_bytes(&mut self, field: Field, value: Vec<u8>) {
        self.add(FieldValue::new(field, Value::Bytes(value)));
    }

    pub fn field_values(&self) -> &[FieldValue] {
        &self.field_values
    }

    /// The first value for `field`, if any.
    pub fn get_first(&self, field: Field) -> Option<&Value> {
        self.field_values
            .iter()
            .find(|field_value| field_value.field() == field)
            .map(FieldValue::value)
    }

    pub fn get_all<'a>(&'a self, field: Field) -> impl Iterator<Item = &'a Value> {
        self.field_values
            .iter()
            .filter(move |field_value| field_value.field() == field)
            .map(FieldValue::value)
    }

    /// Groups the values by field, fields in increasing id order,
    /// values in insertion order.
    pub fn get_sorted_field_values(&self) -> Vec<(Field, Vec<&FieldValue>)> {
        let mut field_values: Vec<&FieldValue> = self.field_values.iter().collect();
        field_values.sort_by_key(|field_value| field_value.field());
        let mut grouped: Vec<(Field, Vec<&FieldValue>)> = Vec::new();
        for field_value in field_values {
            match grouped.last_mut() {
                Some((field, values)) if *field == field_value.field() => {
                    values.push(field_value);
                }
                _ => {
                    grouped.push((field_value.field(), vec![field_value]));
                }
            }
        }
        grouped
    }

    /// Drops the values whose field does not satisfy `predicate`.
    pub fn filter_fields<P: Fn(Field) -> bool>(&mut self, predicate: P) {
        self.field_values
            .retain(|field_value| predicate(field_value.field()));
    }
}

impl BinarySerializable for Document {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        VInt(self.field_values.len() as u64).serialize(writer)?;
        for field_value in &self.field_values {
            field_value.serialize(writer)?;
        }
        Ok(())
    }

    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Document> {
        let num_field_values = VInt::deserialize(reader)?.0 as usize;
        let mut field_values = Vec::with_capacity(num_field_values.min(1 << 12));
        for _ in 0..num_field_values {
            field_values.push(FieldValue::deserialize(reader)?);
        }
        Ok(Document { field_values })
    }
}
