//! The data service seam between the reactive layer and the backing store.

use crate::error::Result;
use crate::subscriptions::FeedHandle;
use crate::types::{CollectionPath, Document, DocumentId, DocumentPath, Fields, Query};

/// A hierarchical document database with live queries.
///
/// [`DocumentStore`](crate::DocumentStore) is the in-process
/// implementation; tests substitute scripted fakes.
pub trait RemoteDataService: Send + Sync {
    /// Open a live feed over `query`. The first snapshot is the current
    /// contents; every later write to the collection pushes another.
    fn subscribe(&self, query: Query) -> Result<FeedHandle>;

    /// Run `query` once.
    fn fetch_once(&self, query: &Query) -> Result<Vec<Document>>;

    /// Read one document.
    fn get(&self, path: &DocumentPath) -> Result<Option<Document>>;

    /// Create a document with a service-assigned id.
    fn create(&self, collection: &CollectionPath, fields: Fields) -> Result<DocumentId>;

    /// Write a document at a known path, replacing or merging.
    fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> Result<()>;

    /// Merge fields into an existing document.
    fn update(&self, path: &DocumentPath, fields: Fields) -> Result<()>;

    /// Delete a document, leaving its subcollections alone.
    fn delete(&self, path: &DocumentPath) -> Result<()>;
}
