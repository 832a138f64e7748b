//! Ledger and transaction entities, their drafts, and document decoding.

mod ledger;
mod transaction;

pub use ledger::{Ledger, LedgerCategory, LedgerDraft};
pub use transaction::{Direction, Transaction, TransactionDraft, MAX_AMOUNT};

use crate::types::{CollectionPath, Document};
use thiserror::Error;
use tracing::warn;

/// A stored document could not be read as an entity.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing field {0:?}")]
    MissingField(&'static str),

    #[error("invalid field {field:?}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("document is not in a {0} collection")]
    WrongCollection(&'static str),
}

/// Entities that can be decoded from a document in a known collection.
pub trait FromDocument: Sized {
    fn from_document(collection: &CollectionPath, doc: &Document) -> Result<Self, DecodeError>;
}

fn required_str<'a>(doc: &'a Document, field: &'static str) -> Result<&'a str, DecodeError> {
    match doc.field(field) {
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(_) => Err(DecodeError::InvalidField {
            field,
            reason: "expected a string".into(),
        }),
        None => Err(DecodeError::MissingField(field)),
    }
}

/// Decode a snapshot, skipping documents that are not valid entities.
pub fn decode_all<T: FromDocument>(collection: &CollectionPath, docs: &[Document]) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match T::from_document(collection, doc) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(
                    collection = %collection,
                    id = %doc.id,
                    error = %e,
                    "Skipping undecodable document"
                );
                None
            }
        })
        .collect()
}
