//! Concurrent store of open document sessions
//!
//! The store owns every open document. Callers hold only session IDs and
//! reach documents through [`SessionStore::with_write_access`] and
//! [`SessionStore::with_read_access`], which serialize access per session
//! while letting different sessions proceed in parallel.
//!
//! # Locking
//!
//! - The session map is a `RwLock<HashMap<..>>`; it is never held while
//!   waiting for a per-session lock.
//! - Each session carries its own `Mutex` around the document and its temp
//!   files.
//! - The reaper only `try_lock`s sessions, so a busy session is simply
//!   deferred to the next pass. Idle-ness is re-checked under the map write
//!   lock, which excludes concurrent lookups (they touch under the read lock).

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::reaper::{self, ReaperHandle};
use super::session::{DocumentSource, Session, SessionId, SessionInfo, SessionState};
use super::temp::TempFileManager;
use crate::document::{
    Document, DocumentKind, DocumentLibrary, JsonDocumentLibrary, LibraryResult,
};
use crate::error::{Error, Result};

/// Default idle time before a session is evicted
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Default time between reaper passes
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Default cap on concurrently open sessions
pub const DEFAULT_MAX_SESSIONS: usize = 100;

/// Session store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStoreConfig {
    /// Whether idle sessions expire; when false callers must close explicitly
    pub enabled: bool,

    /// Idle time after which a session is evicted
    pub ttl: Duration,

    /// Time between reaper passes (at least 1ms)
    pub reap_interval: Duration,

    /// Maximum number of open sessions (0 = unlimited)
    pub max_sessions: usize,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_SESSION_TTL,
            reap_interval: DEFAULT_REAP_INTERVAL,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl SessionStoreConfig {
    /// Config where sessions never expire automatically
    pub fn without_expiry() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }
}

/// Exclusive view of one session's state, valid while its lock is held
pub struct SessionAccess<'a> {
    session: &'a Session,
    document: &'a mut Document,
    temp_paths: &'a mut Vec<PathBuf>,
}

impl<'a> SessionAccess<'a> {
    pub fn session(&self) -> &Session {
        self.session
    }

    pub fn document(&self) -> &Document {
        self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        self.document
    }

    /// Set the dirty flag while the lock is still held
    pub fn mark_dirty(&self) {
        self.session.set_dirty(true);
    }

    /// Hand ownership of a scratch file to the session
    pub fn adopt_temp_path(&mut self, path: PathBuf) {
        self.temp_paths.push(path);
    }

    /// Split into the document and the session's temp-path list
    pub(crate) fn into_parts(self) -> (&'a Session, &'a mut Document, &'a mut Vec<PathBuf>) {
        (self.session, self.document, self.temp_paths)
    }
}

/// Outcome of [`SessionStore::shutdown`]
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Whether a running reaper was stopped
    pub reaper_stopped: bool,

    /// Number of sessions closed
    pub sessions_closed: usize,

    /// Sessions closed with unsaved changes
    pub unsaved_sessions: Vec<String>,
}

impl ShutdownReport {
    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.reaper_stopped {
            parts.push("reaper stopped".to_string());
        }
        if self.sessions_closed > 0 {
            parts.push(format!("{} sessions closed", self.sessions_closed));
        }
        if !self.unsaved_sessions.is_empty() {
            parts.push(format!(
                "{} with unsaved changes",
                self.unsaved_sessions.len()
            ));
        }

        if parts.is_empty() {
            "Shutdown completed (no actions needed)".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// Concurrent map of open document sessions
pub struct SessionStore {
    config: SessionStoreConfig,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    library: Arc<dyn DocumentLibrary>,
    temp: Arc<TempFileManager>,
    reaper: StdMutex<Option<ReaperHandle>>,
}

impl SessionStore {
    /// Create a store with the given configuration, library and temp space
    pub fn new(
        config: SessionStoreConfig,
        library: Arc<dyn DocumentLibrary>,
        temp: Arc<TempFileManager>,
    ) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            library,
            temp,
            reaper: StdMutex::new(None),
        }
    }

    /// Create a store using the built-in JSON library and the default temp root
    pub fn with_defaults() -> Self {
        Self::new(
            SessionStoreConfig::default(),
            Arc::new(JsonDocumentLibrary),
            Arc::new(TempFileManager::with_defaults()),
        )
    }

    pub fn config(&self) -> &SessionStoreConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<dyn DocumentLibrary> {
        &self.library
    }

    pub fn temp(&self) -> &Arc<TempFileManager> {
        &self.temp
    }

    // ========== Lifecycle ==========

    /// Open a document and register a new session for it
    pub async fn open(&self, kind: DocumentKind, source: DocumentSource) -> Result<SessionId> {
        self.check_capacity(self.sessions.read().await.len())?;

        let source_name = source.describe();
        let (path, source_path, temp_paths) = match source {
            DocumentSource::Path(path) => (path.clone(), Some(path), Vec::new()),
            DocumentSource::Bytes { data, extension } => {
                let extension = extension.unwrap_or_else(|| kind.default_extension().to_string());
                let path = self.temp.write(&extension, &data)?;
                (path.clone(), None, vec![path])
            }
        };

        let document = match self.load(kind, &path, &source_name).await {
            Ok(document) => document,
            Err(e) => {
                self.release_paths(&temp_paths);
                warn!(source = %source_name, kind = %kind, error = %e, "Failed to open document");
                return Err(e);
            }
        };

        let session = Arc::new(Session::new(kind, document, source_path, temp_paths));
        let id = session.id().clone();

        {
            let mut sessions = self.sessions.write().await;
            if let Err(e) = self.check_capacity(sessions.len()) {
                drop(sessions);
                let mut state = session.state.lock().await;
                self.release_state(&session, &mut state);
                return Err(e);
            }
            sessions.insert(id.clone(), session);
        }

        info!(session_id = %id, kind = %kind, source = %source_name, "Session opened");
        Ok(id)
    }

    /// Parse a document off the async worker threads
    async fn load(&self, kind: DocumentKind, path: &Path, source_name: &str) -> Result<Document> {
        let library = Arc::clone(&self.library);
        let owned_path = path.to_path_buf();
        let loaded = tokio::task::spawn_blocking(move || library.load(kind, &owned_path))
            .await
            .map_err(|e| Error::Other(format!("Document load task failed: {}", e)))?;

        let document = loaded.map_err(|e| Error::InvalidDocument {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        })?;

        if document.kind() != kind {
            return Err(Error::InvalidDocument {
                source_name: source_name.to_string(),
                reason: format!("expected a {} document, found {}", kind, document.kind()),
            });
        }

        Ok(document)
    }

    /// Serialize a document off the async worker threads
    pub(crate) async fn write_document(
        &self,
        document: Document,
        path: PathBuf,
    ) -> Result<LibraryResult<()>> {
        let library = Arc::clone(&self.library);
        tokio::task::spawn_blocking(move || library.save(&document, &path))
            .await
            .map_err(|e| Error::Other(format!("Document save task failed: {}", e)))
    }

    fn check_capacity(&self, open: usize) -> Result<()> {
        if self.config.max_sessions > 0 && open >= self.config.max_sessions {
            return Err(Error::SessionLimitReached(self.config.max_sessions));
        }
        Ok(())
    }

    /// Look up a session, refreshing its last-access time
    pub async fn get(&self, id: &SessionId) -> Result<Arc<Session>> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        session.touch();
        Ok(session)
    }

    /// Look up a session without extending its life
    async fn peek(&self, id: &SessionId) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Explicit keep-alive
    pub async fn touch(&self, id: &SessionId) -> Result<()> {
        self.get(id).await.map(|_| ())
    }

    /// Whether a session is currently registered (does not touch it)
    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Number of open sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    // ========== Access ==========

    /// Run `f` with exclusive access to the session's full state
    ///
    /// The per-session lock is held for the duration of `f` and released on
    /// every exit path, including panics.
    pub async fn with_session_access<R>(
        &self,
        id: &SessionId,
        f: impl FnOnce(SessionAccess<'_>) -> Result<R>,
    ) -> Result<R> {
        let session = self.get(id).await?;
        let mut state = session.state.lock().await;
        let SessionState {
            document,
            temp_paths,
        } = &mut *state;

        // Closed or evicted while this call was waiting for the lock
        let Some(document) = document.as_mut() else {
            return Err(Error::SessionNotFound(id.to_string()));
        };

        let result = f(SessionAccess {
            session: &session,
            document,
            temp_paths,
        });
        if result.is_ok() {
            session.touch();
        }
        result
    }

    /// Run `f` against the session's document with exclusive access
    pub async fn with_write_access<R>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut Document) -> Result<R>,
    ) -> Result<R> {
        self.with_session_access(id, |access| f(access.document))
            .await
    }

    /// Run `f` against the session's document for inspection
    ///
    /// Reads take the same per-session lock as writes.
    pub async fn with_read_access<R>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&Document) -> Result<R>,
    ) -> Result<R> {
        self.with_session_access(id, |access| f(access.document))
            .await
    }

    /// Set the dirty flag; idempotent
    pub async fn mark_dirty(&self, id: &SessionId) -> Result<()> {
        let session = self.get(id).await?;
        session.set_dirty(true);
        Ok(())
    }

    // ========== Persistence ==========

    /// Serialize the session's document to `output_path`
    ///
    /// Clears the dirty flag on success. On failure the flag and the document
    /// are left untouched so the same save can be retried.
    pub async fn save(&self, id: &SessionId, output_path: &Path) -> Result<()> {
        let session = self.get(id).await?;
        let state = session.state.lock().await;
        let document = state
            .document
            .as_ref()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;

        match self
            .write_document(document.clone(), output_path.to_path_buf())
            .await?
        {
            Ok(()) => {
                session.set_dirty(false);
                session.touch();
                info!(session_id = %id, path = %output_path.display(), "Session saved");
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %id, path = %output_path.display(), error = %e, "Session save failed");
                Err(Error::Save {
                    session_id: id.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Serialize the session's document to bytes
    ///
    /// The document is materialized into a scratch file first; the dirty flag
    /// is not changed.
    pub async fn export(&self, id: &SessionId) -> Result<Vec<u8>> {
        let session = self.get(id).await?;
        let state = session.state.lock().await;
        let document = state
            .document
            .as_ref()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;

        let snapshot = document.clone();
        drop(state);

        let path = self.temp.allocate(session.kind().default_extension())?;
        let result = match self.write_document(snapshot, path.clone()).await {
            Ok(Ok(())) => tokio::fs::read(&path).await.map_err(Error::from),
            Ok(Err(e)) => Err(Error::from(e)),
            Err(e) => Err(e),
        };
        self.release_paths(std::slice::from_ref(&path));

        let bytes = result?;
        debug!(session_id = %id, bytes = bytes.len(), "Session exported");
        Ok(bytes)
    }

    /// Close a session and release its resources
    ///
    /// Returns `false` when the ID is unknown; that is not an error, so
    /// repeated or racing closes all succeed. Waits for an in-flight access on
    /// the session to finish before releasing the document.
    pub async fn close(&self, id: &SessionId) -> Result<bool> {
        let removed = self.sessions.write().await.remove(id);
        let Some(session) = removed else {
            debug!(session_id = %id, "Close requested for unknown session");
            return Ok(false);
        };

        let mut state = session.state.lock().await;
        if session.is_dirty() {
            warn!(session_id = %id, "Closing session with unsaved changes");
        }
        self.release_state(&session, &mut state);

        info!(session_id = %id, "Session closed");
        Ok(true)
    }

    // ========== Inspection ==========

    /// Snapshot of all open sessions, oldest first
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();

        let mut infos: Vec<SessionInfo> = sessions
            .iter()
            .map(|session| {
                let temp_count = session.state.try_lock().ok().map(|s| s.temp_paths.len());
                session.info(temp_count)
            })
            .collect();
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        infos
    }

    /// Snapshot of one session; does not extend its life
    pub async fn status(&self, id: &SessionId) -> Result<SessionInfo> {
        let session = self.peek(id).await?;
        let temp_count = session.state.try_lock().ok().map(|s| s.temp_paths.len());
        Ok(session.info(temp_count))
    }

    // ========== Expiry ==========

    /// Evict every session idle for longer than the TTL
    ///
    /// Busy sessions are skipped and reconsidered on the next pass. Returns
    /// the number of sessions evicted. Does nothing when expiry is disabled.
    pub async fn evict_idle(&self) -> usize {
        if !self.config.enabled {
            return 0;
        }

        let ttl = self.config.ttl;
        let now = Instant::now();
        let candidates: Vec<Arc<Session>> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|session| session.is_expired(now, ttl))
            .cloned()
            .collect();

        let mut evicted = 0;
        for session in candidates {
            let Ok(mut state) = session.state.try_lock() else {
                debug!(session_id = %session.id(), "Idle session is busy, deferring eviction");
                continue;
            };

            {
                let mut sessions = self.sessions.write().await;
                // A lookup may have refreshed the session since the scan
                if !session.is_expired(Instant::now(), ttl) {
                    continue;
                }
                match sessions.get(session.id()) {
                    Some(current) if Arc::ptr_eq(current, &session) => {
                        sessions.remove(session.id());
                    }
                    _ => continue,
                }
            }

            let idle_secs = session.idle_for(Instant::now()).as_secs();
            if session.is_dirty() {
                warn!(session_id = %session.id(), "Evicting session with unsaved changes");
            }
            self.release_state(&session, &mut state);
            info!(session_id = %session.id(), idle_secs = idle_secs, "Evicted idle session");
            evicted += 1;
        }

        evicted
    }

    /// Start the background reaper on the current tokio runtime
    ///
    /// Returns false if expiry is disabled or a reaper is already running.
    pub fn start_reaper(self: &Arc<Self>) -> bool {
        if !self.config.enabled {
            debug!("Session expiry disabled, reaper not started");
            return false;
        }

        let mut slot = self.lock_reaper();
        if slot.is_some() {
            return false;
        }

        *slot = Some(reaper::spawn(
            Arc::downgrade(self),
            self.config.reap_interval,
        ));
        info!(
            ttl_secs = self.config.ttl.as_secs(),
            interval_secs = self.config.reap_interval.as_secs(),
            "Session reaper started"
        );
        true
    }

    /// Whether the background reaper is running
    pub fn reaper_running(&self) -> bool {
        self.lock_reaper().is_some()
    }

    /// Stop the reaper and close every remaining session
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        info!("Starting session store shutdown");

        let handle = self.lock_reaper().take();
        if let Some(handle) = handle {
            handle.stop().await;
            report.reaper_stopped = true;
        }

        let sessions: Vec<Arc<Session>> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();

        for session in sessions {
            let mut state = session.state.lock().await;
            if session.is_dirty() {
                warn!(session_id = %session.id(), "Discarding unsaved changes at shutdown");
                report.unsaved_sessions.push(session.id().to_string());
            }
            self.release_state(&session, &mut state);
            report.sessions_closed += 1;
        }

        info!(summary = %report.summary(), "Session store shutdown completed");
        report
    }

    // ========== Internals ==========

    /// Drop the document and delete session-owned temp files
    ///
    /// Cleanup failures are logged and never abort the caller.
    fn release_state(&self, session: &Session, state: &mut SessionState) {
        state.document = None;
        let paths: Vec<PathBuf> = state.temp_paths.drain(..).collect();
        for path in &paths {
            if let Err(e) = self.temp.release(path) {
                warn!(
                    session_id = %session.id(),
                    path = %path.display(),
                    error = %e,
                    "Failed to release session temp file"
                );
            }
        }
    }

    pub(crate) fn release_paths(&self, paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = self.temp.release(path) {
                warn!(path = %path.display(), error = %e, "Failed to release temp file");
            }
        }
    }

    fn lock_reaper(&self) -> StdMutexGuard<'_, Option<ReaperHandle>> {
        self.reaper
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .field("temp", &self.temp)
            .finish_non_exhaustive()
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_reaper().take() {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{LibraryError, Workbook, WordDocument};
    use std::collections::HashSet;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// JSON library whose saves can be made to fail on demand
    #[derive(Default)]
    struct FlakyLibrary {
        fail_saves: AtomicBool,
    }

    impl DocumentLibrary for FlakyLibrary {
        fn load(&self, kind: DocumentKind, path: &Path) -> LibraryResult<Document> {
            JsonDocumentLibrary.load(kind, path)
        }

        fn save(&self, document: &Document, path: &Path) -> LibraryResult<()> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(LibraryError::Invalid("simulated write failure".to_string()));
            }
            JsonDocumentLibrary.save(document, path)
        }
    }

    /// JSON library whose saves wait until `gate` is free
    #[derive(Default)]
    struct GatedLibrary {
        gate: StdMutex<()>,
    }

    impl DocumentLibrary for GatedLibrary {
        fn load(&self, kind: DocumentKind, path: &Path) -> LibraryResult<Document> {
            JsonDocumentLibrary.load(kind, path)
        }

        fn save(&self, document: &Document, path: &Path) -> LibraryResult<()> {
            let _open = self.gate.lock().unwrap();
            JsonDocumentLibrary.save(document, path)
        }
    }

    struct Fixture {
        store: Arc<SessionStore>,
        dir: TempDir,
    }

    impl Fixture {
        fn new(config: SessionStoreConfig) -> Self {
            Self::with_library(config, Arc::new(JsonDocumentLibrary))
        }

        fn with_library(config: SessionStoreConfig, library: Arc<dyn DocumentLibrary>) -> Self {
            let dir = TempDir::new().expect("Failed to create temp dir");
            let temp = Arc::new(TempFileManager::new(dir.path().join("tmp")));
            let store = Arc::new(SessionStore::new(config, library, temp));
            Self { store, dir }
        }

        fn write_word(&self, name: &str, paragraphs: &[&str]) -> PathBuf {
            let mut word = WordDocument::default();
            for text in paragraphs {
                word.add_paragraph(*text, None);
            }
            let path = self.dir.path().join(name);
            JsonDocumentLibrary
                .save(&Document::from(word), &path)
                .expect("Failed to write fixture");
            path
        }

        fn word_bytes(&self) -> Vec<u8> {
            serde_json::to_vec(&Document::empty(DocumentKind::Word)).unwrap()
        }
    }

    fn paragraph_count(document: &Document) -> usize {
        match document {
            Document::Word(word) => word.paragraphs.len(),
            _ => panic!("expected a word document"),
        }
    }

    #[tokio::test]
    async fn test_open_from_path_and_get() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let path = fx.write_word("doc.docx", &["one"]);

        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .expect("open failed");

        let session = fx.store.get(&id).await.expect("get failed");
        assert_eq!(session.kind(), DocumentKind::Word);
        assert_eq!(session.source_path(), Some(&path));
        assert!(!session.is_dirty());
        assert_eq!(fx.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_open_from_bytes_owns_temp_file() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::bytes(fx.word_bytes()))
            .await
            .expect("open failed");

        let status = fx.store.status(&id).await.expect("status failed");
        assert_eq!(status.temp_file_count, Some(1));
        assert!(status.source_path.is_none());

        let temp_root = fx.store.temp().root().to_path_buf();
        assert_eq!(fs::read_dir(&temp_root).unwrap().count(), 1);

        assert!(fx.store.close(&id).await.expect("close failed"));
        assert_eq!(fs::read_dir(&temp_root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_open_registers_nothing() {
        let fx = Fixture::new(SessionStoreConfig::default());

        let err = fx
            .store
            .open(DocumentKind::Word, DocumentSource::bytes(b"garbage".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDocument { .. }));
        assert!(fx.store.is_empty().await);
        // Materialized input is cleaned up again
        assert_eq!(fs::read_dir(fx.store.temp().root()).unwrap().count(), 0);

        let err = fx
            .store
            .open(
                DocumentKind::Excel,
                DocumentSource::path(fx.dir.path().join("missing.xlsx")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDocument { .. }));
        assert!(fx.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_open_rejects_wrong_kind() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let path = fx.write_word("doc.docx", &[]);

        let err = fx
            .store
            .open(DocumentKind::Excel, DocumentSource::path(&path))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDocument { .. }));
    }

    #[tokio::test]
    async fn test_session_ids_are_pairwise_distinct() {
        let fx = Fixture::new(SessionStoreConfig::default().with_max_sessions(0));
        let path = fx.write_word("doc.docx", &[]);

        let mut ids = HashSet::new();
        for _ in 0..50 {
            let id = fx
                .store
                .open(DocumentKind::Word, DocumentSource::path(&path))
                .await
                .expect("open failed");
            assert!(ids.insert(id));
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let path = fx.write_word("doc.docx", &[]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        assert!(fx.store.close(&id).await.unwrap());
        assert!(!fx.store.close(&id).await.unwrap());
        assert!(matches!(
            fx.store.get(&id).await.unwrap_err(),
            Error::SessionNotFound(_)
        ));
        // The source file is not owned by the session
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_unknown_session_errors() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let id = SessionId::from("nonexistent");

        assert!(matches!(fx.store.get(&id).await, Err(Error::SessionNotFound(_))));
        assert!(matches!(fx.store.touch(&id).await, Err(Error::SessionNotFound(_))));
        assert!(matches!(fx.store.mark_dirty(&id).await, Err(Error::SessionNotFound(_))));
        assert!(matches!(
            fx.store.with_write_access(&id, |_| Ok(())).await,
            Err(Error::SessionNotFound(_))
        ));
        assert!(matches!(
            fx.store.save(&id, &fx.dir.path().join("out.docx")).await,
            Err(Error::SessionNotFound(_))
        ));
        assert!(matches!(fx.store.status(&id).await, Err(Error::SessionNotFound(_))));
        assert!(!fx.store.close(&id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_write_access_is_serialized_per_session() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let path = fx.write_word("doc.docx", &[]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&fx.store);
                let id = id.clone();
                tokio::spawn(async move {
                    store
                        .with_write_access(&id, |document| {
                            let Document::Word(word) = document else {
                                panic!("expected word");
                            };
                            // Read-modify-write that would lose updates without the lock
                            let before = word.paragraphs.len();
                            std::thread::sleep(Duration::from_millis(2));
                            word.add_paragraph(format!("p{}", i), None);
                            assert_eq!(word.paragraphs.len(), before + 1);
                            Ok(())
                        })
                        .await
                })
            })
            .collect();

        for task in futures_util::future::join_all(tasks).await {
            task.expect("task panicked").expect("write failed");
        }

        let count = fx
            .store
            .with_read_access(&id, |document| Ok(paragraph_count(document)))
            .await
            .unwrap();
        assert_eq!(count, 16);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let path = fx.write_word("doc.docx", &["shared"]);
        let a = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();
        let b = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        fx.store
            .with_write_access(&a, |document| {
                if let Document::Word(word) = document {
                    word.add_paragraph("only in a", None);
                }
                Ok(())
            })
            .await
            .unwrap();

        let count_a = fx
            .store
            .with_read_access(&a, |d| Ok(paragraph_count(d)))
            .await
            .unwrap();
        let count_b = fx
            .store
            .with_read_access(&b, |d| Ok(paragraph_count(d)))
            .await
            .unwrap();
        assert_eq!(count_a, 2);
        assert_eq!(count_b, 1);
    }

    #[tokio::test]
    async fn test_write_access_releases_lock_on_error() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let path = fx.write_word("doc.docx", &[]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        let err = fx
            .store
            .with_write_access(&id, |_| -> Result<()> { Err(Error::Other("boom".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Other(_)));

        // The lock is free again
        fx.store.with_write_access(&id, |_| Ok(())).await.unwrap();
    }

    #[tokio::test]
    async fn test_save_round_trip_clears_dirty() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let path = fx.write_word("doc.docx", &[]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        fx.store.mark_dirty(&id).await.unwrap();
        fx.store.mark_dirty(&id).await.unwrap();
        assert!(fx.store.get(&id).await.unwrap().is_dirty());

        let out = fx.dir.path().join("out").join("saved.docx");
        fx.store.save(&id, &out).await.expect("save failed");
        assert!(out.exists());
        assert!(!fx.store.get(&id).await.unwrap().is_dirty());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_dirty_and_can_retry() {
        let library = Arc::new(FlakyLibrary::default());
        let fx = Fixture::with_library(SessionStoreConfig::default(), library.clone());
        let path = fx.write_word("doc.docx", &["keep me"]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();
        fx.store.mark_dirty(&id).await.unwrap();

        library.fail_saves.store(true, Ordering::SeqCst);
        let out = fx.dir.path().join("out.docx");
        let err = fx.store.save(&id, &out).await.unwrap_err();
        assert!(matches!(err, Error::Save { .. }));
        assert!(fx.store.get(&id).await.unwrap().is_dirty());

        library.fail_saves.store(false, Ordering::SeqCst);
        fx.store.save(&id, &out).await.expect("retry failed");
        assert!(!fx.store.get(&id).await.unwrap().is_dirty());

        let saved = JsonDocumentLibrary.load(DocumentKind::Word, &out).unwrap();
        assert_eq!(paragraph_count(&saved), 1);
    }

    #[tokio::test]
    async fn test_slow_save_does_not_stall_other_sessions() {
        let library = Arc::new(GatedLibrary::default());
        let fx = Fixture::with_library(SessionStoreConfig::default(), library.clone());
        let path = fx.write_word("doc.docx", &["one"]);
        let saving_id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();
        let other_id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        let gate = library.gate.lock().unwrap();
        let saving = {
            let store = Arc::clone(&fx.store);
            let out = fx.dir.path().join("out.docx");
            tokio::spawn(async move { store.save(&saving_id, &out).await })
        };
        tokio::task::yield_now().await;

        // Single-threaded runtime: this only completes if the save left the worker
        let count = tokio::time::timeout(
            Duration::from_secs(5),
            fx.store.with_read_access(&other_id, |document| Ok(paragraph_count(document))),
        )
        .await
        .expect("other session stalled behind a save")
        .unwrap();
        assert_eq!(count, 1);
        assert!(!saving.is_finished());

        drop(gate);
        saving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_export_returns_bytes_and_cleans_up() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let path = fx.write_word("doc.docx", &["exported"]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();
        fx.store.mark_dirty(&id).await.unwrap();

        let bytes = fx.store.export(&id).await.expect("export failed");
        let document: Document = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(paragraph_count(&document), 1);

        assert!(fx.store.get(&id).await.unwrap().is_dirty());
        assert_eq!(fs::read_dir(fx.store.temp().root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_session_limit() {
        let fx = Fixture::new(SessionStoreConfig::default().with_max_sessions(2));
        let path = fx.write_word("doc.docx", &[]);

        for _ in 0..2 {
            fx.store
                .open(DocumentKind::Word, DocumentSource::path(&path))
                .await
                .unwrap();
        }
        let err = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionLimitReached(2)));
    }

    #[tokio::test]
    async fn test_list_and_status() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let path = fx.write_word("doc.docx", &[]);
        let book = fx.dir.path().join("book.xlsx");
        JsonDocumentLibrary
            .save(&Document::from(Workbook::new()), &book)
            .unwrap();

        let a = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();
        let b = fx
            .store
            .open(DocumentKind::Excel, DocumentSource::path(&book))
            .await
            .unwrap();
        fx.store.mark_dirty(&b).await.unwrap();

        let infos = fx.store.list().await;
        assert_eq!(infos.len(), 2);
        let ids: HashSet<String> = infos.iter().map(|i| i.id.clone()).collect();
        assert!(ids.contains(a.as_str()) && ids.contains(b.as_str()));

        let status = fx.store.status(&b).await.unwrap();
        assert_eq!(status.document_type, DocumentKind::Excel);
        assert!(status.dirty);
        assert_eq!(status.temp_file_count, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_is_evicted_with_temp_files() {
        let fx = Fixture::new(SessionStoreConfig::default().with_ttl(Duration::from_secs(10)));
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::bytes(fx.word_bytes()))
            .await
            .unwrap();
        let temp_root = fx.store.temp().root().to_path_buf();
        assert_eq!(fs::read_dir(&temp_root).unwrap().count(), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(fx.store.evict_idle().await, 0);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(fx.store.evict_idle().await, 1);

        assert!(matches!(fx.store.get(&id).await, Err(Error::SessionNotFound(_))));
        assert_eq!(fs::read_dir(&temp_root).unwrap().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_touched_every_half_ttl_survives() {
        let ttl = Duration::from_secs(10);
        let fx = Fixture::new(SessionStoreConfig::default().with_ttl(ttl));
        let path = fx.write_word("doc.docx", &[]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        for _ in 0..10 {
            tokio::time::advance(ttl / 2).await;
            assert_eq!(fx.store.evict_idle().await, 0);
            fx.store.touch(&id).await.expect("session evicted early");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_session_is_not_evicted() {
        let fx = Fixture::new(SessionStoreConfig::default().with_ttl(Duration::from_secs(10)));
        let path = fx.write_word("doc.docx", &[]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        let session = fx.store.get(&id).await.unwrap();
        let guard = session.state.lock().await;

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(fx.store.evict_idle().await, 0);
        assert!(fx.store.contains(&id).await);

        drop(guard);
        assert_eq!(fx.store.evict_idle().await, 1);
        assert!(!fx.store.contains(&id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_expiry_never_evicts() {
        let fx = Fixture::new(SessionStoreConfig::without_expiry().with_ttl(Duration::from_secs(1)));
        let path = fx.write_word("doc.docx", &[]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        assert!(!fx.store.start_reaper());
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(fx.store.evict_idle().await, 0);
        assert!(fx.store.get(&id).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_evicts_in_background() {
        let config = SessionStoreConfig::default()
            .with_ttl(Duration::from_secs(10))
            .with_reap_interval(Duration::from_secs(2));
        let fx = Fixture::new(config);
        let path = fx.write_word("doc.docx", &[]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        assert!(fx.store.start_reaper());
        assert!(!fx.store.start_reaper());
        assert!(fx.store.reaper_running());

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(!fx.store.contains(&id).await);

        let report = fx.store.shutdown().await;
        assert!(report.reaper_stopped);
        assert!(!fx.store.reaper_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_with_zero_interval_still_runs() {
        let config = SessionStoreConfig::default()
            .with_ttl(Duration::from_millis(10))
            .with_reap_interval(Duration::ZERO);
        let fx = Fixture::new(config);
        let path = fx.write_word("doc.docx", &[]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        assert!(fx.store.start_reaper());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!fx.store.contains(&id).await);
        assert!(fx.store.shutdown().await.reaper_stopped);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let path = fx.write_word("doc.docx", &[]);
        let clean = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();
        let dirty = fx
            .store
            .open(DocumentKind::Word, DocumentSource::bytes(fx.word_bytes()))
            .await
            .unwrap();
        fx.store.mark_dirty(&dirty).await.unwrap();

        let report = fx.store.shutdown().await;
        assert_eq!(report.sessions_closed, 2);
        assert_eq!(report.unsaved_sessions, vec![dirty.to_string()]);
        assert!(!report.reaper_stopped);
        assert!(report.summary().contains("2 sessions closed"));

        assert!(fx.store.is_empty().await);
        assert!(matches!(fx.store.get(&clean).await, Err(Error::SessionNotFound(_))));
        assert_eq!(fs::read_dir(fx.store.temp().root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_access_after_close_while_waiting() {
        let fx = Fixture::new(SessionStoreConfig::default());
        let path = fx.write_word("doc.docx", &[]);
        let id = fx
            .store
            .open(DocumentKind::Word, DocumentSource::path(&path))
            .await
            .unwrap();

        let session = fx.store.get(&id).await.unwrap();
        {
            let mut state = session.state.lock().await;
            fx.store.sessions.write().await.remove(&id);
            fx.store.release_state(&session, &mut state);
        }

        // A caller that already resolved the handle sees the session as gone
        let state = session.state.lock().await;
        assert!(state.document.is_none());
    }

    #[test]
    fn test_shutdown_report_summary_empty() {
        let report = ShutdownReport::default();
        assert_eq!(report.summary(), "Shutdown completed (no actions needed)");
    }
}
