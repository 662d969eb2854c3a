//! Boundary surfaces: local downloads and the persistence collaborator
//!
//! The export pipeline only talks to these traits. In-memory implementations
//! keep their state behind a `Mutex` so tests can inspect what was handed
//! over.

pub mod download;
pub mod persistence;

pub use download::{DirectorySink, DownloadSink, MemoryDownloads};
#[cfg(feature = "http")]
pub use persistence::HttpPersistence;
pub use persistence::{NoPersistence, Persistence, RecordingPersistence};
