//! Session handle and related types
//!
//! A [`Session`] binds an opaque ID to exactly one in-memory document. The
//! document itself lives behind the per-session lock and is only reachable
//! through the store's access methods.

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::document::{Document, DocumentKind};

/// Opaque session identifier, never reused within a process
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where a session's document comes from
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A file the session reads but does not own
    Path(PathBuf),
    /// Raw bytes; materialized into a temp file owned by the session
    Bytes {
        data: Vec<u8>,
        extension: Option<String>,
    },
}

impl DocumentSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            data: data.into(),
            extension: None,
        }
    }

    /// Label used in logs and error messages
    pub fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes { data, .. } => format!("<{} bytes>", data.len()),
        }
    }
}

/// State guarded by the per-session lock
#[derive(Debug)]
pub(crate) struct SessionState {
    /// Present for as long as the session is registered in the store
    pub(crate) document: Option<Document>,
    /// Files owned by this session, deleted on close or eviction
    pub(crate) temp_paths: Vec<PathBuf>,
}

/// A single open document handle
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    kind: DocumentKind,
    source_path: Option<PathBuf>,
    created_at: DateTime<Utc>,
    dirty: AtomicBool,
    last_accessed: StdMutex<Instant>,
    pub(crate) state: Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(
        kind: DocumentKind,
        document: Document,
        source_path: Option<PathBuf>,
        temp_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            kind,
            source_path,
            created_at: Utc::now(),
            dirty: AtomicBool::new(false),
            last_accessed: StdMutex::new(Instant::now()),
            state: Mutex::new(SessionState {
                document: Some(document),
                temp_paths,
            }),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Document type tag, fixed at creation
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Path the document was opened from, if any
    pub fn source_path(&self) -> Option<&PathBuf> {
        self.source_path.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether unsaved mutations exist
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub(crate) fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::SeqCst);
    }

    /// Monotonic time of the last successful access
    pub fn last_accessed(&self) -> Instant {
        match self.last_accessed.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Refresh the last-access timestamp
    pub(crate) fn touch(&self) {
        let now = Instant::now();
        match self.last_accessed.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    /// How long the session has been idle as of `now`
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_accessed())
    }

    /// Whether the session has been idle for longer than `ttl`
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.idle_for(now) > ttl
    }

    /// Point-in-time summary of this session
    pub fn info(&self, temp_file_count: Option<usize>) -> SessionInfo {
        SessionInfo {
            id: self.id.to_string(),
            document_type: self.kind,
            dirty: self.is_dirty(),
            created_at: self.created_at,
            idle_secs: self.idle_for(Instant::now()).as_secs(),
            source_path: self.source_path.clone(),
            temp_file_count,
        }
    }
}

/// Serializable session summary for listings and status calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub document_type: DocumentKind,
    pub dirty: bool,
    pub created_at: DateTime<Utc>,
    pub idle_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    /// Number of session-owned temp files (omitted when the session was busy)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_file_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_session_id_serializes_as_string() {
        let id = SessionId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }

    #[test]
    fn test_document_source_describe() {
        assert_eq!(DocumentSource::path("a/b.docx").describe(), "a/b.docx");
        assert_eq!(DocumentSource::bytes(vec![0u8; 4]).describe(), "<4 bytes>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_tracking() {
        let session = Session::new(
            DocumentKind::Word,
            Document::empty(DocumentKind::Word),
            None,
            Vec::new(),
        );
        let ttl = Duration::from_secs(10);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(session.is_expired(Instant::now(), ttl));

        session.touch();
        assert!(!session.is_expired(Instant::now(), ttl));
        assert_eq!(session.info(None).idle_secs, 0);
    }

    #[test]
    fn test_dirty_flag() {
        let session = Session::new(
            DocumentKind::Pdf,
            Document::empty(DocumentKind::Pdf),
            None,
            Vec::new(),
        );
        assert!(!session.is_dirty());
        session.set_dirty(true);
        assert!(session.info(Some(0)).dirty);
    }
}
