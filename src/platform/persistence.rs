/// Persistence boundary: stores the encoded copy of a generated document.
///
/// Retry and storage semantics belong to the collaborator; a failed `store`
/// is reported once and never retried here.

use std::sync::Mutex;

use crate::artifact::StoredArtifact;
use crate::Result;

pub trait Persistence: Send + Sync {
    fn store(&self, artifact: &StoredArtifact) -> Result<()>;
}

/// Acknowledges every request without storing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPersistence;

impl Persistence for NoPersistence {
    fn store(&self, _artifact: &StoredArtifact) -> Result<()> {
        Ok(())
    }
}

/// Keeps stored artifacts in memory
pub struct RecordingPersistence {
    stored: Mutex<Vec<StoredArtifact>>,
}

impl RecordingPersistence {
    pub fn new() -> Self {
        RecordingPersistence { stored: Mutex::new(Vec::new()) }
    }

    pub fn stored(&self) -> Vec<StoredArtifact> {
        self.stored.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for RecordingPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence for RecordingPersistence {
    fn store(&self, artifact: &StoredArtifact) -> Result<()> {
        self.stored.lock().unwrap_or_else(|e| e.into_inner()).push(artifact.clone());
        Ok(())
    }
}

impl<T: Persistence + ?Sized> Persistence for std::sync::Arc<T> {
    fn store(&self, artifact: &StoredArtifact) -> Result<()> {
        (**self).store(artifact)
    }
}

#[cfg(feature = "http")]
pub use http::HttpPersistence;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use log::{debug, warn};
    use reqwest::blocking::Client;

    use super::Persistence;
    use crate::artifact::StoredArtifact;
    use crate::{Error, Result};

    /// POSTs the artifact as JSON to a REST endpoint.
    pub struct HttpPersistence {
        client: Client,
        endpoint: url::Url,
    }

    impl HttpPersistence {
        pub fn new(endpoint: &str, timeout_ms: u64) -> Result<Self> {
            let endpoint = url::Url::parse(endpoint)
                .map_err(|e| Error::ConfigError(format!("invalid persistence URL {:?}: {}", endpoint, e)))?;
            if !matches!(endpoint.scheme(), "http" | "https") {
                return Err(Error::ConfigError(format!("unsupported persistence scheme {:?}", endpoint.scheme())));
            }
            let client = Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
            Ok(Self { client, endpoint })
        }

        pub fn endpoint(&self) -> &url::Url {
            &self.endpoint
        }
    }

    impl Persistence for HttpPersistence {
        fn store(&self, artifact: &StoredArtifact) -> Result<()> {
            debug!("storing {} at {}", artifact.document_number, self.endpoint);
            let resp = self
                .client
                .post(self.endpoint.clone())
                .json(artifact)
                .send()
                .map_err(|e| Error::PersistenceFailure(format!("request to {} failed: {}", self.endpoint, e)))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().unwrap_or_default();
                warn!("persistence endpoint answered {}: {}", status, body.trim());
                return Err(Error::PersistenceFailure(format!("server answered {}", status)));
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn rejects_non_http_endpoints() {
            assert!(matches!(HttpPersistence::new("ftp://files.example.com", 1000), Err(Error::ConfigError(_))));
            assert!(matches!(HttpPersistence::new("not a url", 1000), Err(Error::ConfigError(_))));
            let p = HttpPersistence::new("https://api.example.com/invoices/pdf", 1000).unwrap();
            assert_eq!(p.endpoint().path(), "/invoices/pdf");
        }
    }
}
