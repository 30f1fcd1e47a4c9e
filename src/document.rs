// Uploaded documents and media-kind detection
use std::fs;
use std::path::Path;

use crate::types::IngestError;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaKind {
    PlainText,
    Pdf,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split(';').next().map(str::trim) {
            Some("text/plain") => Some(Self::PlainText),
            Some("application/pdf") => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::PlainText),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Raw upload bytes plus their declared kind. Immutable once built.
#[derive(Debug, Clone)]
pub struct Document {
    bytes: Vec<u8>,
    kind: MediaKind,
}

impl Document {
    pub fn new(bytes: Vec<u8>, kind: MediaKind) -> Self {
        Self { bytes, kind }
    }

    /// Build a document from an uploaded MIME type
    pub fn from_upload(bytes: Vec<u8>, mime: &str) -> Result<Self, IngestError> {
        let kind = MediaKind::from_mime(mime)
            .ok_or_else(|| IngestError::UnsupportedMediaKind(mime.to_string()))?;
        Ok(Self::new(bytes, kind))
    }

    /// Read a file, detecting its kind from the extension and falling back to the PDF header.
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let bytes = fs::read(path)?;
        let kind = MediaKind::from_path(path)
            .or_else(|| bytes.starts_with(PDF_MAGIC).then_some(MediaKind::Pdf))
            .ok_or_else(|| IngestError::UnsupportedMediaKind(path.display().to_string()))?;
        Ok(Self::new(bytes, kind))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}
