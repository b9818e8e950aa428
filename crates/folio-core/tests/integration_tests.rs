//! Folio Core Integration Tests

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use folio_core::document::{
    Document, DocumentKind, DocumentLibrary, JsonDocumentLibrary, LibraryError, LibraryResult,
    Workbook, WordDocument,
};
use folio_core::prelude::*;
use folio_core::session::TempFileManager;
use serde_json::{Value, json};
use tempfile::TempDir;

/// JSON library whose saves can be switched to fail
#[derive(Default)]
struct SwitchableLibrary {
    fail_saves: AtomicBool,
}

impl DocumentLibrary for SwitchableLibrary {
    fn load(&self, kind: DocumentKind, path: &Path) -> LibraryResult<Document> {
        JsonDocumentLibrary.load(kind, path)
    }

    fn save(&self, document: &Document, path: &Path) -> LibraryResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(LibraryError::Invalid("disk full".to_string()));
        }
        JsonDocumentLibrary.save(document, path)
    }
}

struct Harness {
    dir: TempDir,
    library: Arc<SwitchableLibrary>,
    dispatcher: Arc<Dispatcher>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(SessionStoreConfig::default())
    }

    fn with_config(config: SessionStoreConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let library = Arc::new(SwitchableLibrary::default());
        let store = Arc::new(SessionStore::new(
            config,
            library.clone(),
            Arc::new(TempFileManager::new(dir.path().join("tmp"))),
        ));
        let dispatcher = Arc::new(Dispatcher::with_builtin_handlers(store).unwrap());
        Self {
            dir,
            library,
            dispatcher,
        }
    }

    fn store(&self) -> &Arc<SessionStore> {
        self.dispatcher.store()
    }

    fn write(&self, name: &str, document: Document) -> PathBuf {
        let path = self.dir.path().join(name);
        JsonDocumentLibrary.save(&document, &path).unwrap();
        path
    }

    fn temp_files(&self) -> usize {
        match std::fs::read_dir(self.dir.path().join("tmp")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

fn word_with_paragraph() -> Document {
    let mut word = WordDocument::default();
    word.add_paragraph("Body", None);
    word.into()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_word_session_lifecycle() {
    let h = Harness::new();
    let source = h.write("doc.docx", word_with_paragraph());
    let out = h.dir.path().join("out.docx");

    let sid = h
        .dispatcher
        .open(DocumentKind::Word, DocumentSource::path(&source))
        .await
        .unwrap();

    let output = h
        .dispatcher
        .execute(&sid, "add_footnote", json!({"text": "n1"}))
        .await
        .unwrap();
    assert!(output.modified);
    assert!(h.store().get(&sid).await.unwrap().is_dirty());

    h.store().save(&sid, &out).await.unwrap();
    assert!(!h.store().get(&sid).await.unwrap().is_dirty());

    let Document::Word(saved) = JsonDocumentLibrary.load(DocumentKind::Word, &out).unwrap() else {
        panic!("expected word");
    };
    assert_eq!(saved.footnotes.len(), 1);
    assert_eq!(saved.footnotes[0].text, "n1");

    assert!(h.store().close(&sid).await.unwrap());
    assert!(matches!(
        h.store().get(&sid).await,
        Err(Error::SessionNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_row_inserts_are_not_lost() {
    let h = Harness::new();
    let source = h.write("book.xlsx", Workbook::new().into());
    let sid = h
        .dispatcher
        .open(DocumentKind::Excel, DocumentSource::path(&source))
        .await
        .unwrap();

    let first = {
        let dispatcher = Arc::clone(&h.dispatcher);
        let sid = sid.clone();
        tokio::spawn(async move {
            dispatcher
                .execute(&sid, "insert_row", json!({"rowIndex": 0}))
                .await
        })
    };
    let second = {
        let dispatcher = Arc::clone(&h.dispatcher);
        let sid = sid.clone();
        tokio::spawn(async move {
            dispatcher
                .execute(&sid, "insert_row", json!({"rowIndex": 0}))
                .await
        })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let rows = h
        .store()
        .with_read_access(&sid, |document| match document {
            Document::Excel(book) => Ok(book.sheets[0].rows.len()),
            other => panic!("unexpected document: {:?}", other.kind()),
        })
        .await
        .unwrap();
    assert_eq!(rows, 2);
}

#[tokio::test]
async fn test_unknown_session_lookup_and_close() {
    let h = Harness::new();
    let missing = SessionId::from("nonexistent");

    assert!(matches!(
        h.store().get(&missing).await,
        Err(Error::SessionNotFound(_))
    ));
    assert!(!h.store().close(&missing).await.unwrap());
}

#[tokio::test]
async fn test_idle_session_expires_and_releases_temp_files() {
    let h = Harness::with_config(
        SessionStoreConfig::default()
            .with_ttl(Duration::from_secs(5))
            .with_reap_interval(Duration::from_secs(1)),
    );
    let bytes = serde_json::to_vec(&word_with_paragraph()).unwrap();
    let sid = h
        .dispatcher
        .open(DocumentKind::Word, DocumentSource::bytes(bytes))
        .await
        .unwrap();
    assert_eq!(h.temp_files(), 1);

    tokio::time::pause();
    assert!(h.store().start_reaper());
    tokio::time::sleep(Duration::from_secs(8)).await;

    assert!(matches!(
        h.store().get(&sid).await,
        Err(Error::SessionNotFound(_))
    ));
    assert_eq!(h.temp_files(), 0);

    let report = h.store().shutdown().await;
    assert!(report.reaper_stopped);
    assert_eq!(report.sessions_closed, 0);
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_session_ids_are_unique() {
    let h = Harness::new();
    let source = h.write("doc.docx", word_with_paragraph());

    let mut ids = HashSet::new();
    for _ in 0..25 {
        let id = h
            .dispatcher
            .open(DocumentKind::Word, DocumentSource::path(&source))
            .await
            .unwrap();
        assert!(ids.insert(id.to_string()));
    }
    assert_eq!(h.store().len().await, 25);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_edits_form_a_sequence() {
    let h = Harness::new();
    let source = h.write("doc.docx", Document::empty(DocumentKind::Word));
    let sid = h
        .dispatcher
        .open(DocumentKind::Word, DocumentSource::path(&source))
        .await
        .unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let dispatcher = Arc::clone(&h.dispatcher);
            let sid = sid.clone();
            tokio::spawn(async move {
                dispatcher
                    .execute(&sid, "add_paragraph", json!({"text": format!("line {i}")}))
                    .await
            })
        })
        .collect();
    for result in futures_util::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let output = h
        .dispatcher
        .execute(&sid, "get_text", Value::Null)
        .await
        .unwrap();
    let text = output.value.as_str().unwrap().to_string();
    let mut lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 20);
    lines.sort();
    lines.dedup();
    assert_eq!(lines.len(), 20);
}

#[tokio::test]
async fn test_sessions_from_same_path_are_isolated() {
    let h = Harness::new();
    let source = h.write("doc.docx", word_with_paragraph());
    let a = h
        .dispatcher
        .open(DocumentKind::Word, DocumentSource::path(&source))
        .await
        .unwrap();
    let b = h
        .dispatcher
        .open(DocumentKind::Word, DocumentSource::path(&source))
        .await
        .unwrap();

    h.dispatcher
        .execute(&a, "replace_text", json!({"find": "Body", "replace": "Changed"}))
        .await
        .unwrap();

    let text_b = h.dispatcher.execute(&b, "get_text", Value::Null).await.unwrap();
    assert_eq!(text_b.value, "Body");
    assert!(!h.store().get(&b).await.unwrap().is_dirty());
}

#[tokio::test]
async fn test_close_twice() {
    let h = Harness::new();
    let source = h.write("deck.pptx", Document::empty(DocumentKind::PowerPoint));
    let sid = h
        .dispatcher
        .open(DocumentKind::PowerPoint, DocumentSource::path(&source))
        .await
        .unwrap();

    assert!(h.store().close(&sid).await.unwrap());
    assert!(!h.store().close(&sid).await.unwrap());
    assert!(h.store().get(&sid).await.is_err());
}

#[tokio::test]
async fn test_failed_save_keeps_changes() {
    let h = Harness::new();
    let source = h.write("doc.docx", word_with_paragraph());
    let sid = h
        .dispatcher
        .open(DocumentKind::Word, DocumentSource::path(&source))
        .await
        .unwrap();
    h.dispatcher
        .execute(&sid, "add_endnote", json!({"text": "e1"}))
        .await
        .unwrap();

    h.library.fail_saves.store(true, Ordering::SeqCst);
    let err = h.store().save(&sid, &source).await.unwrap_err();
    assert!(matches!(err, Error::Save { .. }));
    assert!(h.store().get(&sid).await.unwrap().is_dirty());

    h.library.fail_saves.store(false, Ordering::SeqCst);
    h.store().save(&sid, &source).await.unwrap();
    assert!(!h.store().get(&sid).await.unwrap().is_dirty());

    let Document::Word(saved) = JsonDocumentLibrary.load(DocumentKind::Word, &source).unwrap()
    else {
        panic!("expected word");
    };
    assert_eq!(saved.endnotes.len(), 1);
}

#[tokio::test]
async fn test_unknown_operation_leaves_document_untouched() {
    let h = Harness::new();
    let source = h.write("book.xlsx", Workbook::new().into());
    let sid = h
        .dispatcher
        .open(DocumentKind::Excel, DocumentSource::path(&source))
        .await
        .unwrap();
    let before = h.store().export(&sid).await.unwrap();

    let err = h
        .dispatcher
        .execute(&sid, "add_footnote", json!({"text": "n1"}))
        .await
        .unwrap_err();
    match err {
        Error::UnsupportedOperation {
            domain, available, ..
        } => {
            assert_eq!(domain, "excel");
            assert!(available.contains(&"insert_row".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(h.store().export(&sid).await.unwrap(), before);
    assert!(!h.store().get(&sid).await.unwrap().is_dirty());
}

#[tokio::test]
async fn test_shutdown_closes_everything() {
    let h = Harness::new();
    let source = h.write("mail.eml", Document::empty(DocumentKind::Email));
    let clean = h
        .dispatcher
        .open(DocumentKind::Email, DocumentSource::path(&source))
        .await
        .unwrap();
    let edited = h
        .dispatcher
        .open(DocumentKind::Email, DocumentSource::path(&source))
        .await
        .unwrap();
    h.dispatcher
        .execute(&edited, "set_subject", json!({"subject": "Draft"}))
        .await
        .unwrap();

    let report = h.store().shutdown().await;
    assert_eq!(report.sessions_closed, 2);
    assert_eq!(report.unsaved_sessions, vec![edited.to_string()]);
    assert!(h.store().get(&clean).await.is_err());
    assert!(h.store().is_empty().await);
}
