use crate::schema::Field;
use crate::schema::Term;
use crate::schema::Value;
use std::ops::BitOr;

/// What a field's postings record for each `(term, document)` pair.
///
/// `freqs` is implied by `positions`, which is implied by `characters`.
/// `boosts` adds one f32 per occurrence (per-position boost).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingFormat {
    #[serde(default)]
    freqs: bool,
    #[serde(default)]
    positions: bool,
    #[serde(default)]
    characters: bool,
    #[serde(default)]
    boosts: bool,
}

impl PostingFormat {
    /// Document ids only.
    pub fn exists_only() -> PostingFormat {
        PostingFormat::default()
    }

    pub fn with_freqs(mut self) -> PostingFormat {
        self.freqs = true;
        self
    }

    pub fn with_positions(mut self) -> PostingFormat {
        self.freqs = true;
        self.positions = true;
        self
    }

    pub fn with_characters(mut self) -> PostingFormat {
        self = self.with_positions();
        self.characters = true;
        self
    }

    pub fn with_boosts(mut self) -> PostingFormat {
        self = self.with_positions();
        self.boosts = true;
        self
    }

    pub fn has_freqs(&self) -> bool {
        self.freqs
    }

    pub fn has_positions(&self) -> bool {
        self.positions
    }

    pub fn has_characters(&self) -> bool {
        self.characters
    }

    pub fn has_boosts(&self) -> bool {
        self.boosts
    }

    /// Encodes the flags in the low bits of a byte, for block headers.
    pub fn flags(&self) -> u8 {
        (self.freqs as u8)
            | (self.positions as u8) << 1
            | (self.characters as u8) << 2
            | (self.boosts as u8) << 3
    }

    pub fn from_flags(flags: u8) -> PostingFormat {
        PostingFormat {
            freqs: flags & 1 != 0,
            positions: flags & 2 != 0,
            characters: flags & 4 != 0,
            boosts: flags & 8 != 0,
        }
    }

    /// True if this format records at least everything `other` records.
    pub fn covers(&self, other: &PostingFormat) -> bool {
        (self.freqs || !other.freqs)
            && (self.positions || !other.positions)
            && (self.characters || !other.characters)
            && (self.boosts || !other.boosts)
    }
}

/// Element format of a sortable column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Fixed 8-byte values holding the monotone `u64` image of the
    /// field's numeric value.
    Numeric,
    /// Raw variable-length byte strings.
    Bytes,
    /// Byte strings deduplicated through a sorted dictionary; cheap for
    /// low-cardinality group-by fields.
    DictBytes,
    /// One bit per document.
    Bool,
    /// Like `Bytes`, with the data section block-compressed.
    CompressedBytes,
}

/// Configuration of a text field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextOptions {
    analyzer: String,
    format: PostingFormat,
    #[serde(default)]
    indexed: bool,
    #[serde(default)]
    stored: bool,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    column: Option<ColumnType>,
    #[serde(default)]
    vectors: bool,
    #[serde(default = "default_boost")]
    boost: f32,
}

fn default_boost() -> f32 {
    1.0
}

impl Default for TextOptions {
    fn default() -> TextOptions {
        TextOptions {
            analyzer: "simple".to_string(),
            format: PostingFormat::exists_only(),
            indexed: false,
            stored: false,
            unique: false,
            column: None,
            vectors: false,
            boost: 1.0,
        }
    }
}

impl TextOptions {
    pub fn analyzer(&self) -> &str {
        &self.analyzer
    }

    pub fn set_analyzer(mut self, analyzer: &str) -> TextOptions {
        self.analyzer = analyzer.to_string();
        self
    }

    pub fn format(&self) -> PostingFormat {
        self.format
    }

    pub fn set_format(mut self, format: PostingFormat) -> TextOptions {
        self.format = format;
        self.indexed = true;
        self
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn set_stored(mut self) -> TextOptions {
        self.stored = true;
        self
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Marks the field as carrying at most one term per document, usable
    /// as the key of `update_document`.
    pub fn set_unique(mut self) -> TextOptions {
        self.unique = true;
        self
    }

    pub fn column(&self) -> Option<ColumnType> {
        self.column
    }

    pub fn set_column(mut self, column: ColumnType) -> TextOptions {
        self.column = Some(column);
        self
    }

    pub fn has_vectors(&self) -> bool {
        self.vectors
    }

    /// Also writes a per-document forward vector of `(term, positions)`.
    pub fn set_vectors(mut self) -> TextOptions {
        self.vectors = true;
        self
    }

    pub fn boost(&self) -> f32 {
        self.boost
    }

    pub fn set_boost(mut self, boost: f32) -> TextOptions {
        self.boost = boost;
        self
    }
}

impl BitOr for TextOptions {
    type Output = TextOptions;

    fn bitor(self, other: TextOptions) -> TextOptions {
        let mut res = if other.indexed { other.clone() } else { self.clone() };
        res.indexed = self.indexed || other.indexed;
        res.stored = self.stored || other.stored;
        res.unique = self.unique || other.unique;
        res.vectors = self.vectors || other.vectors;
        res.column = self.column.or(other.column);
        res
    }
}

/// Tokenized text field with frequencies and positions. Compose with
/// [`STORED`] to keep the raw value.
pub fn text_options() -> TextOptions {
    TextOptions::default()
        .set_analyzer("simple")
        .set_format(PostingFormat::exists_only().with_positions())
}

/// Untokenized identifier field: the whole value is a single term.
pub fn id_options() -> TextOptions {
    TextOptions::default()
        .set_analyzer("keyword")
        .set_format(PostingFormat::exists_only())
}

/// Stored-only marker, to be `|`-composed with other text options.
pub fn stored_options() -> TextOptions {
    TextOptions::default().set_stored()
}

/// Configuration of a numeric (u64/i64/f64/date) field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericOptions {
    #[serde(default)]
    indexed: bool,
    #[serde(default)]
    stored: bool,
    #[serde(default)]
    column: bool,
    #[serde(default)]
    unique: bool,
}

impl NumericOptions {
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn set_indexed(mut self) -> NumericOptions {
        self.indexed = true;
        self
    }

    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn set_stored(mut self) -> NumericOptions {
        self.stored = true;
        self
    }

    pub fn has_column(&self) -> bool {
        self.column
    }

    /// Also writes the value in a dense per-document column for
    /// sorting/grouping.
    pub fn set_column(mut self) -> NumericOptions {
        self.column = true;
        self
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn set_unique(mut self) -> NumericOptions {
        self.unique = true;
        self.indexed = true;
        self
    }
}

/// Configuration of a stored-only bytes field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytesOptions {
    #[serde(default)]
    stored: bool,
    #[serde(default)]
    column: bool,
}

impl BytesOptions {
    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn set_stored(mut self) -> BytesOptions {
        self.stored = true;
        self
    }

    pub fn has_column(&self) -> bool {
        self.column
    }

    pub fn set_column(mut self) -> BytesOptions {
        self.column = true;
        self
    }
}

/// The type and configuration of a field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options")]
pub enum FieldType {
    #[serde(rename = "text")]
    Text(TextOptions),
    #[serde(rename = "u64")]
    U64(NumericOptions),
    #[serde(rename = "i64")]
    I64(NumericOptions),
    #[serde(rename = "f64")]
    F64(NumericOptions),
    #[serde(rename = "date")]
    Date(NumericOptions),
    #[serde(rename = "bytes")]
    Bytes(BytesOptions),
}

impl FieldType {
    pub fn is_indexed(&self) -> bool {
        match *self {
            FieldType::Text(ref options) => options.is_indexed(),
            FieldType::U64(ref options)
            | FieldType::I64(ref options)
            | FieldType::F64(ref options)
            | FieldType::Date(ref options) => options.is_indexed(),
            FieldType::Bytes(_) => false,
        }
    }

    pub fn is_stored(&self) -> bool {
        match *self {
            FieldType::Text(ref options) => options.is_stored(),
            FieldType::U64(ref options)
            | FieldType::I64(ref options)
            | FieldType::F64(ref options)
            | FieldType::Date(ref options) => options.is_stored(),
            FieldType::Bytes(ref options) => options.is_stored(),
        }
    }

    pub fn is_unique(&self) -> bool {
        match *self {
            FieldType::Text(ref options) => options.is_unique(),
            FieldType::U64(ref options)
            | FieldType::I64(ref options)
            | FieldType::F64(ref options)
            | FieldType::Date(ref options) => options.is_unique(),
            FieldType::Bytes(_) => false,
        }
    }

    /// The posting format, for indexed fields. Indexed numeric fields
    /// record document ids only.
    pub fn posting_format(&self) -> Option<PostingFormat> {
        match *self {
            FieldType::Text(ref options) if options.is_indexed() => Some(options.format()),
            FieldType::U64(ref options)
            | FieldType::I64(ref options)
            | FieldType::F64(ref options)
            | FieldType::Date(ref options)
                if options.is_indexed() =>
            {
                Some(PostingFormat::exists_only())
            }
            _ => None,
        }
    }

    /// The analyzer name, for indexed text fields.
    pub fn analyzer(&self) -> Option<&str> {
        match *self {
            FieldType::Text(ref options) if options.is_indexed() => Some(options.analyzer()),
            _ => None,
        }
    }

    pub fn column_type(&self) -> Option<ColumnType> {
        match *self {
            FieldType::Text(ref options) => options.column(),
            FieldType::U64(ref options)
            | FieldType::I64(ref options)
            | FieldType::F64(ref options)
            | FieldType::Date(ref options) => {
                if options.has_column() {
                    Some(ColumnType::Numeric)
                } else {
                    None
                }
            }
            FieldType::Bytes(ref options) => {
                if options.has_column() {
                    Some(ColumnType::Bytes)
                } else {
                    None
                }
            }
        }
    }

    pub fn has_vectors(&self) -> bool {
        match *self {
            FieldType::Text(ref options) => options.has_vectors(),
            _ => false,
        }
    }

    pub fn boost(&self) -> f32 {
        match *self {
            FieldType::Text(ref options) => options.boost(),
            _ => 1.0,
        }
    }

    /// Builds the index term for a value of this field, for
    /// `delete_by_term`-style lookups on untokenized fields.
    pub fn value_to_term(&self, field: Field, value: &Value) -> Option<Term> {
        match (self, value) {
            (FieldType::Text(_), Value::Str(text)) => Some(Term::from_field_text(field, text)),
            (FieldType::U64(_), Value::U64(val)) => Some(Term::from_field_u64(field, *val)),
            (FieldType::I64(_), Value::I64(val)) => Some(Term::from_field_i64(field, *val)),
            (FieldType::F64(_), Value::F64(val)) => Some(Term::from_field_f64(field, *val)),
            (FieldType::Date(_), Value::Date(date)) => Some(Term::from_field_date(field, date)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posting_format_implications() {
        let format = PostingFormat::exists_only().with_characters();
        assert!(format.has_freqs());
        assert!(format.has_positions());
        assert!(format.has_characters());
        assert!(!format.has_boosts());
        assert_eq!(PostingFormat::from_flags(format.flags()), format);
    }

    #[test]
    fn test_text_options_composition() {
        let options = text_options() | stored_options();
        assert!(options.is_indexed());
        assert!(options.is_stored());
        assert!(options.format().has_positions());
        let id = id_options().set_unique() | stored_options();
        assert!(id.is_unique());
        assert!(id.is_stored());
        assert_eq!(id.analyzer(), "keyword");
        assert!(!id.format().has_freqs());
    }

    #[test]
    fn test_field_type_serde() {
        let field_type = FieldType::Text(text_options().set_stored());
        let json = serde_json::to_string(&field_type).unwrap();
        let restored: FieldType = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, field_type);
    }
}
