use crate::query::Query;
use crate::schema::{Document, Term};

/// A buffered document addition.
#[derive(Clone, Debug)]
pub struct AddOperation {
    pub stamp: u64,
    pub document: Document,
}

/// What a buffered deletion matches.
#[derive(Clone, Debug)]
pub enum DeleteCriterion {
    Term(Term),
    Query(Query),
}

/// A buffered deletion; resolved at commit time against every segment.
///
/// Only documents whose stamp precedes `stamp` are affected, which is
/// what lets `update_document` replace earlier buffered revisions of
/// the same unique key while keeping the newest one.
#[derive(Clone, Debug)]
pub struct DeleteOperation {
    pub stamp: u64,
    pub criterion: DeleteCriterion,
}
