/// Builds a [`Document`](crate::schema::Document) from field/value
/// pairs.
///
/// ```rust
/// use lexis::schema::{text_options, Schema};
/// use lexis::doc;
///
/// let mut schema_builder = Schema::builder();
/// let title = schema_builder.add_text_field("title", text_options());
/// let document = doc!(title => "a day at the beach");
/// assert_eq!(document.len(), 1);
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::schema::Document::default()
    };
    ($($field:expr => $value:expr),* $(,)*) => {
        {
            let mut document = $crate::schema::Document::default();
            $(
                document.add($crate::schema::FieldValue::new(
                    $field,
                    $crate::schema::Value::from($value),
                ));
            )*
            document
        }
    };
}
