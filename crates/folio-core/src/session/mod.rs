//! Document sessions
//!
//! - [`TempFileManager`] hands out scratch paths under a configured root
//! - [`Session`] binds an ID to one open document
//! - [`SessionStore`] owns all sessions, serializes access per session and
//!   evicts idle ones in the background

mod reaper;
#[allow(clippy::module_inception)]
mod session;
mod store;
mod temp;

pub use session::{DocumentSource, Session, SessionId, SessionInfo};
pub use store::{
    DEFAULT_MAX_SESSIONS, DEFAULT_REAP_INTERVAL, DEFAULT_SESSION_TTL, SessionAccess, SessionStore,
    SessionStoreConfig, ShutdownReport,
};
pub use temp::TempFileManager;
