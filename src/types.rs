//! Core types for the document store.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Field map of a document.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Length of generated document ids (hex characters).
const GENERATED_ID_LEN: usize = 20;

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Position in the store's mutation history.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Sequence(pub u64);

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl Sequence {
    pub fn next(self) -> Self {
        Sequence(self.0 + 1)
    }
}

/// Validate a single path segment.
fn check_segment(segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(StoreError::InvalidPath("empty path segment".into()));
    }
    if segment.contains('/') {
        return Err(StoreError::InvalidPath(format!(
            "segment {:?} contains '/'",
            segment
        )));
    }
    Ok(())
}

/// Opaque identifier of a document within its collection.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Parse a caller-supplied id.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        check_segment(&id)?;
        Ok(DocumentId(id))
    }

    /// Derive a fresh id from the collection it is created in and the
    /// sequence of the creating mutation.
    pub fn generate(collection: &CollectionPath, sequence: Sequence) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(collection.to_string().as_bytes());
        hasher.update(sequence.0.to_le_bytes());
        hasher.update(Timestamp::now().0.to_le_bytes());
        let digest = hex::encode(hasher.finalize());
        DocumentId(digest[..GENERATED_ID_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        DocumentId::parse(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path to a collection: an odd number of segments
/// (`users`, `users/{uid}/ledgers`, ...).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionPath(Vec<String>);

impl CollectionPath {
    /// A top-level collection.
    pub fn root(name: &str) -> Result<Self> {
        check_segment(name)?;
        Ok(CollectionPath(vec![name.to_string()]))
    }

    /// Parse a slash separated path.
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<String> = path.split('/').map(str::to_string).collect();
        for segment in &segments {
            check_segment(segment)?;
        }
        if segments.len() % 2 == 0 {
            return Err(StoreError::InvalidPath(format!(
                "{:?} names a document, not a collection",
                path
            )));
        }
        Ok(CollectionPath(segments))
    }

    /// Path of a document in this collection.
    pub fn doc(&self, id: &DocumentId) -> DocumentPath {
        let mut segments = self.0.clone();
        segments.push(id.0.clone());
        DocumentPath(segments)
    }

    /// The document owning this collection, if it is nested.
    pub fn parent(&self) -> Option<DocumentPath> {
        if self.0.len() < 3 {
            return None;
        }
        Some(DocumentPath(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl TryFrom<String> for CollectionPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        CollectionPath::parse(&value)
    }
}

impl From<CollectionPath> for String {
    fn from(path: CollectionPath) -> Self {
        path.to_string()
    }
}

impl fmt::Debug for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionPath({})", self)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Path to a document: an even number of segments.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath(Vec<String>);

impl DocumentPath {
    /// Parse a slash separated path.
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<String> = path.split('/').map(str::to_string).collect();
        for segment in &segments {
            check_segment(segment)?;
        }
        if segments.len() % 2 != 0 {
            return Err(StoreError::InvalidPath(format!(
                "{:?} names a collection, not a document",
                path
            )));
        }
        Ok(DocumentPath(segments))
    }

    /// A subcollection under this document.
    pub fn collection(&self, name: &str) -> Result<CollectionPath> {
        check_segment(name)?;
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Ok(CollectionPath(segments))
    }

    /// The collection containing this document.
    pub fn parent(&self) -> CollectionPath {
        CollectionPath(self.0[..self.0.len() - 1].to_vec())
    }

    /// The document's own id (last segment).
    pub fn id(&self) -> DocumentId {
        DocumentId(self.0[self.0.len() - 1].clone())
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        DocumentPath::parse(&value)
    }
}

impl From<DocumentPath> for String {
    fn from(path: DocumentPath) -> Self {
        path.to_string()
    }
}

impl fmt::Debug for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentPath({})", self)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// A stored document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Id within the parent collection.
    pub id: DocumentId,

    /// Application fields.
    pub fields: Fields,

    /// When the document was first written (assigned by store).
    pub create_time: Timestamp,

    /// When the document was last written (assigned by store).
    pub update_time: Timestamp,
}

impl Document {
    /// Get a field value.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

/// What a query orders by.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// Store-assigned creation time.
    CreateTime,
    /// An application field.
    Field(String),
}

impl SortKey {
    pub fn field(name: impl Into<String>) -> Self {
        SortKey::Field(name.into())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// An ordered query over one collection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Query {
    pub collection: CollectionPath,
    pub order_by: SortKey,
    pub direction: SortDirection,
}

/// Comparable projection of a document for ordering.
#[derive(Debug, PartialEq, PartialOrd)]
enum OrderValue<'a> {
    Null,
    Bool(bool),
    Number(f64),
    Text(&'a str),
}

impl Query {
    pub fn new(collection: CollectionPath, order_by: SortKey, direction: SortDirection) -> Self {
        Self {
            collection,
            order_by,
            direction,
        }
    }

    fn order_value<'a>(&self, doc: &'a Document) -> Option<OrderValue<'a>> {
        use serde_json::Value;

        match &self.order_by {
            SortKey::CreateTime => Some(OrderValue::Number(doc.create_time.0 as f64)),
            SortKey::Field(name) => match doc.fields.get(name)? {
                Value::Null => Some(OrderValue::Null),
                Value::Bool(b) => Some(OrderValue::Bool(*b)),
                Value::Number(n) => n.as_f64().map(OrderValue::Number),
                Value::String(s) => Some(OrderValue::Text(s)),
                // Arrays and maps are not orderable.
                _ => None,
            },
        }
    }

    /// Order documents of the queried collection.
    ///
    /// Documents lacking the order-by field are excluded. Ties are broken
    /// by document id so results are deterministic.
    pub fn apply<'a>(&self, docs: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        let mut keyed: Vec<(OrderValue<'a>, &'a Document)> = docs
            .into_iter()
            .filter_map(|doc| self.order_value(doc).map(|value| (value, doc)))
            .collect();

        keyed.sort_by(|(va, da), (vb, db)| {
            let ord = va
                .partial_cmp(vb)
                .unwrap_or(Ordering::Equal)
                .then_with(|| da.id.cmp(&db.id));
            match self.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });

        keyed.into_iter().map(|(_, doc)| doc.clone()).collect()
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    pub collection_count: u64,
    pub document_count: u64,
    pub active_feeds: u64,
    pub head: Sequence,
    pub log_size_bytes: u64,
}
