use crate::schema::FieldType;

/// A named field and its configuration, as persisted in the table of
/// contents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    name: String,
    #[serde(flatten)]
    field_type: FieldType,
}

impl FieldEntry {
    pub fn new(name: String, field_type: FieldType) -> FieldEntry {
        FieldEntry { name, field_type }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_indexed(&self) -> bool {
        self.field_type.is_indexed()
    }

    pub fn is_stored(&self) -> bool {
        self.field_type.is_stored()
    }

    pub fn is_unique(&self) -> bool {
        self.field_type.is_unique()
    }
}
