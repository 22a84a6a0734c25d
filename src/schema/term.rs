use crate::common::{f64_to_sortable, i64_to_sortable};
use crate::schema::Field;
use crate::DateTime;
use std::fmt;

/// Number of bytes used to encode the field id at the head of a term.
const FIELD_ID_NUM_BYTES: usize = 4;

/// A term is the unit key of the inverted index: a field id followed by
/// the value bytes.
///
/// The field id is encoded big-endian so that the natural byte order of
/// terms is `(field, value)` lexicographic, which is the order of the
/// term dictionary. Numeric values go through the monotone sortable
/// mappings, again big-endian, so that numeric ranges are contiguous
/// ranges of the dictionary.
#[derive(Clone, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct Term(Vec<u8>);

impl Term {
    /// An empty term addressing `field`, to be completed with
    /// [`Term::set_text`] or [`Term::set_value_bytes`].
    pub fn for_field(field: Field) -> Term {
        let mut data = Vec::with_capacity(FIELD_ID_NUM_BYTES + 16);
        data.extend_from_slice(&field.0.to_be_bytes());
        Term(data)
    }

    pub fn from_field_text(field: Field, text: &str) -> Term {
        let mut term = Term::for_field(field);
        term.set_text(text);
        term
    }

    pub fn from_field_bytes(field: Field, bytes: &[u8]) -> Term {
        let mut term = Term::for_field(field);
        term.set_value_bytes(bytes);
        term
    }

    pub fn from_field_u64(field: Field, val: u64) -> Term {
        Term::from_field_bytes(field, &val.to_be_bytes())
    }

    pub fn from_field_i64(field: Field, val: i64) -> Term {
        Term::from_field_u64(field, i64_to_sortable(val))
    }

    pub fn from_field_f64(field: Field, val: f64) -> Term {
        Term::from_field_u64(field, f64_to_sortable(val))
    }

    pub fn from_field_date(field: Field, val: &DateTime) -> Term {
        Term::from_field_i64(field, val.timestamp())
    }

    pub(crate) fn from_bytes(data: &[u8]) -> Term {
        assert!(data.len() >= FIELD_ID_NUM_BYTES);
        Term(data.to_vec())
    }

    pub fn set_text(&mut self, text: &str) {
        self.set_value_bytes(text.as_bytes());
    }

    pub fn set_value_bytes(&mut self, bytes: &[u8]) {
        self.0.truncate(FIELD_ID_NUM_BYTES);
        self.0.extend_from_slice(bytes);
    }

    pub fn field(&self) -> Field {
        let mut field_id_bytes = [0u8; 4];
        field_id_bytes.copy_from_slice(&self.0[..FIELD_ID_NUM_BYTES]);
        Field(u32::from_be_bytes(field_id_bytes))
    }

    /// The value bytes, without the field prefix.
    pub fn value_bytes(&self) -> &[u8] {
        &self.0[FIELD_ID_NUM_BYTES..]
    }

    /// The value interpreted as utf-8 text.
    ///
    /// # Panics
    /// Panics if the value bytes are not valid utf-8.
    pub fn text(&self) -> &str {
        std::str::from_utf8(self.value_bytes()).expect("term value is not valid utf-8")
    }

    /// The full `(field, value)` key, as stored in the term dictionary.
    pub fn as_slice(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Term(field={}, bytes={:?})",
            self.field().0,
            self.value_bytes()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_ordering_follows_field_then_value() {
        let t1 = Term::from_field_text(Field(1), "zebra");
        let t2 = Term::from_field_text(Field(2), "apple");
        assert!(t1 < t2);
        let t3 = Term::from_field_text(Field(1), "apple");
        assert!(t3 < t1);
    }

    #[test]
    fn test_numeric_terms_sort_numerically() {
        let small = Term::from_field_i64(Field(0), -10);
        let mid = Term::from_field_i64(Field(0), 0);
        let large = Term::from_field_i64(Field(0), 12_000);
        assert!(small.as_slice() < mid.as_slice());
        assert!(mid.as_slice() < large.as_slice());
        let f_small = Term::from_field_f64(Field(0), -2.5);
        let f_large = Term::from_field_f64(Field(0), 3.25);
        assert!(f_small.as_slice() < f_large.as_slice());
    }

    #[test]
    fn test_term_accessors() {
        let term = Term::from_field_text(Field(7), "lamb");
        assert_eq!(term.field(), Field(7));
        assert_eq!(term.value_bytes(), b"lamb");
        assert_eq!(term.text(), "lamb");
        assert_eq!(term.as_slice().len(), 4 + 4);
    }
}
