//! Document store: collections, ordered queries and live feeds.

use crate::error::{Result, StoreError};
use crate::log::{Mutation, MutationLog};
use crate::remote::RemoteDataService;
use crate::subscriptions::{FeedConfig, FeedHandle, FeedManager};
use crate::types::{
    CollectionPath, Document, DocumentId, DocumentPath, Fields, Query, Sequence, StoreStats,
    Timestamp,
};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory for durable storage. `None` keeps everything in memory.
    pub path: Option<PathBuf>,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Sync the mutation log every N writes.
    pub sync_interval: u64,

    /// Live feed settings.
    pub feed: FeedConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            create_if_missing: true,
            sync_interval: MutationLog::DEFAULT_SYNC_INTERVAL,
            feed: FeedConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Durable store rooted at `path`.
    pub fn durable(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Magic bytes for store manifest.
const STORE_MAGIC: &[u8; 4] = b"LBK\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

type Collection = BTreeMap<DocumentId, Document>;

/// Mutable store contents, guarded by `write_lock` for writers.
struct Contents {
    collections: HashMap<CollectionPath, Collection>,
    head: Sequence,
    /// Last assigned document time, to keep store times strictly increasing.
    last_time: Timestamp,
}

/// The document store.
///
/// Provides a unified interface for:
/// - Creating, replacing, merging and deleting documents
/// - One-shot ordered queries
/// - Live feeds that receive the whole ordered collection after each write
///
/// Deleting a document never touches collections nested under it.
pub struct DocumentStore {
    /// Store configuration.
    config: StoreConfig,

    /// Lock file for exclusive access (durable stores only).
    _lock_file: Option<File>,

    /// Mutation log (durable stores only).
    log: Option<MutationLog>,

    contents: RwLock<Contents>,

    /// Live feeds.
    feeds: Arc<FeedManager>,

    /// Lock for write operations to ensure atomicity.
    write_lock: Mutex<()>,

    closed: AtomicBool,
}

impl DocumentStore {
    /// A purely in-memory store with default settings.
    pub fn in_memory() -> Self {
        Self::build(StoreConfig::default(), None, None)
    }

    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        match &config.path {
            None => Ok(Self::build(config, None, None)),
            Some(path) if path.join("MANIFEST").exists() => Self::open(config),
            Some(_) if config.create_if_missing => Self::create(config),
            Some(_) => Err(StoreError::NotInitialized),
        }
    }

    /// Create a new durable store.
    pub fn create(config: StoreConfig) -> Result<Self> {
        let path = config.path.clone().ok_or(StoreError::NotInitialized)?;
        fs::create_dir_all(&path)?;

        Self::write_manifest(&path)?;
        let lock_file = Self::acquire_lock(&path)?;
        let log = MutationLog::open(path.join("mutations.log"), config.sync_interval)?;

        info!(path = %path.display(), "document store created");
        Ok(Self::build(config, Some(lock_file), Some(log)))
    }

    /// Open an existing durable store, replaying its mutation log.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let path = config.path.clone().ok_or(StoreError::NotInitialized)?;

        Self::verify_manifest(&path)?;
        let lock_file = Self::acquire_lock(&path)?;
        let log = MutationLog::open(path.join("mutations.log"), config.sync_interval)?;
        let entries = log.replay()?;

        let store = Self::build(config, Some(lock_file), Some(log));
        {
            let mut contents = store.contents.write();
            for entry in entries {
                Self::apply_mutation(&mut contents.collections, entry.mutation);
                contents.head = contents.head.max(entry.sequence);
            }
            contents.last_time = contents
                .collections
                .values()
                .flat_map(|c| c.values())
                .map(|d| d.update_time.max(d.create_time))
                .max()
                .unwrap_or(Timestamp(0));
        }

        info!(path = %path.display(), head = ?store.head(), "document store opened");
        Ok(store)
    }

    fn build(config: StoreConfig, lock_file: Option<File>, log: Option<MutationLog>) -> Self {
        let feeds = FeedManager::new(config.feed.clone());
        Self {
            config,
            _lock_file: lock_file,
            log,
            contents: RwLock::new(Contents {
                collections: HashMap::new(),
                head: Sequence(0),
                last_time: Timestamp(0),
            }),
            feeds,
            write_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    // --- Reads ---

    /// Get a document by path.
    pub fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        self.ensure_open()?;
        let contents = self.contents.read();
        Ok(contents
            .collections
            .get(&path.parent())
            .and_then(|c| c.get(&path.id()))
            .cloned())
    }

    /// Run an ordered query once.
    pub fn fetch_once(&self, query: &Query) -> Result<Vec<Document>> {
        self.ensure_open()?;
        let contents = self.contents.read();
        Ok(match contents.collections.get(&query.collection) {
            Some(collection) => query.apply(collection.values()),
            None => Vec::new(),
        })
    }

    /// Open a live feed. The current contents are queued as its first
    /// snapshot.
    pub fn subscribe(&self, query: Query) -> Result<FeedHandle> {
        self.ensure_open()?;
        let _lock = self.write_lock.lock();

        let contents = self.contents.read();
        let initial = match contents.collections.get(&query.collection) {
            Some(collection) => query.apply(collection.values()),
            None => Vec::new(),
        };
        Ok(self.feeds.subscribe(query, initial, contents.head))
    }

    // --- Writes ---

    /// Create a document with a store-assigned id.
    pub fn create_document(&self, collection: &CollectionPath, fields: Fields) -> Result<DocumentId> {
        self.ensure_open()?;
        let _lock = self.write_lock.lock();

        let (id, time) = {
            let mut contents = self.contents.write();
            let sequence = contents.head.next();
            let mut id = DocumentId::generate(collection, sequence);
            while contents
                .collections
                .get(collection)
                .is_some_and(|c| c.contains_key(&id))
            {
                id = DocumentId::generate(collection, sequence);
            }
            (id, Self::next_time(&mut contents))
        };

        let document = Document {
            id: id.clone(),
            fields,
            create_time: time,
            update_time: time,
        };
        self.commit(Mutation::Put {
            path: collection.doc(&id),
            document,
        })?;

        Ok(id)
    }

    /// Write a document at a known path.
    ///
    /// With `merge`, the given fields are merged into an existing document;
    /// otherwise they replace it. The creation time survives either way.
    pub fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> Result<()> {
        self.ensure_open()?;
        let _lock = self.write_lock.lock();

        let document = {
            let mut contents = self.contents.write();
            let time = Self::next_time(&mut contents);
            let existing = contents
                .collections
                .get(&path.parent())
                .and_then(|c| c.get(&path.id()))
                .cloned();

            match existing {
                Some(mut document) => {
                    if merge {
                        document.fields.extend(fields);
                    } else {
                        document.fields = fields;
                    }
                    document.update_time = time;
                    document
                }
                None => Document {
                    id: path.id(),
                    fields,
                    create_time: time,
                    update_time: time,
                },
            }
        };

        self.commit(Mutation::Put {
            path: path.clone(),
            document,
        })
    }

    /// Merge fields into an existing document.
    pub fn update(&self, path: &DocumentPath, fields: Fields) -> Result<()> {
        self.ensure_open()?;
        let _lock = self.write_lock.lock();

        let document = {
            let mut contents = self.contents.write();
            let time = Self::next_time(&mut contents);
            let mut document = contents
                .collections
                .get(&path.parent())
                .and_then(|c| c.get(&path.id()))
                .cloned()
                .ok_or_else(|| StoreError::DocumentNotFound(path.clone()))?;
            document.fields.extend(fields);
            document.update_time = time;
            document
        };

        self.commit(Mutation::Put {
            path: path.clone(),
            document,
        })
    }

    /// Delete a document. Deleting a missing document succeeds.
    ///
    /// Subcollections of the document are left in place.
    pub fn delete(&self, path: &DocumentPath) -> Result<()> {
        self.ensure_open()?;
        let _lock = self.write_lock.lock();

        let exists = self
            .contents
            .read()
            .collections
            .get(&path.parent())
            .is_some_and(|c| c.contains_key(&path.id()));
        if !exists {
            debug!(path = %path, "delete of missing document ignored");
            return Ok(());
        }

        self.commit(Mutation::Delete { path: path.clone() })
    }

    /// Log, apply and broadcast one mutation. Caller holds `write_lock`.
    fn commit(&self, mutation: Mutation) -> Result<()> {
        let collection = mutation.path().parent();

        let mut contents = self.contents.write();
        let sequence = contents.head.next();

        if let Some(log) = &self.log {
            log.append(sequence, &mutation)?;
        }

        Self::apply_mutation(&mut contents.collections, mutation);
        contents.head = sequence;

        let contents = parking_lot::RwLockWriteGuard::downgrade(contents);
        let documents = contents.collections.get(&collection);
        self.feeds.broadcast_collection(&collection, sequence, || {
            documents.into_iter().flat_map(|c| c.values())
        });

        Ok(())
    }

    fn apply_mutation(collections: &mut HashMap<CollectionPath, Collection>, mutation: Mutation) {
        match mutation {
            Mutation::Put { path, document } => {
                collections
                    .entry(path.parent())
                    .or_default()
                    .insert(path.id(), document);
            }
            Mutation::Delete { path } => {
                let collection = path.parent();
                if let Some(docs) = collections.get_mut(&collection) {
                    docs.remove(&path.id());
                    if docs.is_empty() {
                        collections.remove(&collection);
                    }
                }
            }
        }
    }

    fn next_time(contents: &mut Contents) -> Timestamp {
        let now = Timestamp::now();
        let time = if now > contents.last_time {
            now
        } else {
            Timestamp(contents.last_time.0 + 1)
        };
        contents.last_time = time;
        time
    }

    // --- Lifecycle ---

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Stop accepting operations and terminate every live feed.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _lock = self.write_lock.lock();
        self.feeds.close_all();
        if let Some(log) = &self.log {
            log.sync()?;
        }
        info!("document store closed");
        Ok(())
    }

    /// Number of live feeds currently open.
    pub fn feed_count(&self) -> usize {
        self.feeds.feed_count()
    }

    /// Sequence of the last applied write.
    pub fn head(&self) -> Sequence {
        self.contents.read().head
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        let contents = self.contents.read();
        StoreStats {
            collection_count: contents.collections.len() as u64,
            document_count: contents.collections.values().map(|c| c.len() as u64).sum(),
            active_feeds: self.feeds.feed_count() as u64,
            head: contents.head,
            log_size_bytes: self.log.as_ref().map(|l| l.size()).unwrap_or(0),
        }
    }

    /// Flush the mutation log.
    pub fn sync(&self) -> Result<()> {
        if let Some(log) = &self.log {
            log.sync()?;
        }
        Ok(())
    }

    /// Storage directory, if durable.
    pub fn path(&self) -> Option<&Path> {
        self.config.path.as_deref()
    }

    fn write_manifest(path: &Path) -> Result<()> {
        let mut manifest = Vec::with_capacity(5);
        manifest.extend_from_slice(STORE_MAGIC);
        manifest.push(STORE_VERSION);
        fs::write(path.join("MANIFEST"), manifest)?;
        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let manifest_path = path.join("MANIFEST");
        if !manifest_path.exists() {
            return Err(StoreError::NotInitialized);
        }

        let data = fs::read(&manifest_path)?;
        if data.len() < 5 {
            return Err(StoreError::InvalidFormat("Manifest too short".into()));
        }
        if &data[0..4] != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid manifest magic".into()));
        }
        if data[4] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                data[4]
            )));
        }
        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join("LOCK");
        let lock_file = File::create(&lock_path)?;

        lock_file.try_lock_exclusive().map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }
}

impl Drop for DocumentStore {
    fn drop(&mut self) {
        // Best effort; errors cannot be reported from drop.
        let _ = self.close();
    }
}

impl RemoteDataService for DocumentStore {
    fn subscribe(&self, query: Query) -> Result<FeedHandle> {
        DocumentStore::subscribe(self, query)
    }

    fn fetch_once(&self, query: &Query) -> Result<Vec<Document>> {
        DocumentStore::fetch_once(self, query)
    }

    fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        DocumentStore::get(self, path)
    }

    fn create(&self, collection: &CollectionPath, fields: Fields) -> Result<DocumentId> {
        self.create_document(collection, fields)
    }

    fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> Result<()> {
        DocumentStore::set(self, path, fields, merge)
    }

    fn update(&self, path: &DocumentPath, fields: Fields) -> Result<()> {
        DocumentStore::update(self, path, fields)
    }

    fn delete(&self, path: &DocumentPath) -> Result<()> {
        DocumentStore::delete(self, path)
    }
}
