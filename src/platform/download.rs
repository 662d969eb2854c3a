/// Local "save as file" boundary

use std::path::PathBuf;
use std::sync::Mutex;

use log::info;

use crate::{Error, Result};

pub trait DownloadSink: Send + Sync {
    /// Hand a complete document to the user. Returns where it ended up.
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Writes downloads into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySink { dir: dir.into() }
    }
}

impl DownloadSink for DirectorySink {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::DownloadFailure(format!("cannot create {}: {}", self.dir.display(), e)))?;
        let path = self.dir.join(filename);
        std::fs::write(&path, bytes)
            .map_err(|e| Error::DownloadFailure(format!("cannot write {}: {}", path.display(), e)))?;
        info!("saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// Keeps downloads in memory
pub struct MemoryDownloads {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryDownloads {
    pub fn new() -> Self {
        MemoryDownloads { files: Mutex::new(Vec::new()) }
    }

    /// Snapshot of everything saved so far, in order.
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for MemoryDownloads {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadSink for MemoryDownloads {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let mut g = self.files.lock().unwrap_or_else(|e| e.into_inner());
        g.push((filename.to_string(), bytes.to_vec()));
        Ok(PathBuf::from(filename))
    }
}

impl<T: DownloadSink + ?Sized> DownloadSink for std::sync::Arc<T> {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        (**self).save(filename, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_downloads_record_in_order() {
        let m = MemoryDownloads::new();
        m.save("a.pdf", b"1").unwrap();
        m.save("b.pdf", b"22").unwrap();
        let files = m.files();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1], ("b.pdf".to_string(), b"22".to_vec()));
    }

    #[test]
    fn directory_sink_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(tmp.path().join("downloads"));
        let path = sink.save("INV-9.pdf", b"%PDF-1.7").unwrap();
        assert_eq!(path, tmp.path().join("downloads").join("INV-9.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
    }
}
