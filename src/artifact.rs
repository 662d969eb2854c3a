//! Document metadata and the stored copy handed to persistence.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

const DATA_URI_PREFIX: &str = "data:application/pdf;base64,";

/// Values the dashboard already computed for the invoice on screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub display_name: String,
    /// Invoice number; also names the download
    pub document_number: String,
    /// Owning client
    pub party_id: String,
    pub total: f64,
}

/// The encoded document plus metadata, as sent to the persistence boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
    /// `data:application/pdf;base64,...`
    pub encoded_document: String,
    pub display_name: String,
    pub party_id: String,
    pub document_number: String,
    pub total: f64,
    pub page_count: usize,
    /// SHA-256 of the PDF bytes, hex encoded
    pub checksum: String,
}

impl StoredArtifact {
    pub fn from_pdf(pdf: &[u8], meta: &DocumentMeta, page_count: usize) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(pdf);
        Self {
            encoded_document: format!("{}{}", DATA_URI_PREFIX, encoded),
            display_name: meta.display_name.clone(),
            party_id: meta.party_id.clone(),
            document_number: meta.document_number.clone(),
            total: meta.total,
            page_count,
            checksum: checksum(pdf),
        }
    }

    /// Decode the embedded PDF and verify it against the checksum.
    pub fn decode_document(&self) -> Result<Vec<u8>> {
        let payload = self
            .encoded_document
            .strip_prefix(DATA_URI_PREFIX)
            .ok_or_else(|| Error::EncodingFailure("artifact is not a base64 PDF data URI".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| Error::EncodingFailure(format!("invalid base64 payload: {}", e)))?;
        if checksum(&bytes) != self.checksum {
            return Err(Error::EncodingFailure("artifact checksum mismatch".into()));
        }
        Ok(bytes)
    }
}

/// SHA-256 of `bytes`, hex encoded.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// `<documentNumber>.pdf`, with anything unsafe in a file name replaced.
pub fn download_filename(document_number: &str) -> String {
    let cleaned: String = document_number
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == ':' || c.is_control() { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "document.pdf".to_string()
    } else {
        format!("{}.pdf", cleaned)
    }
}
