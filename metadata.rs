use crate::chunk::Chunk;
use crate::document::Document;
use crate::error::{Result, SealError};
use crate::text_chunk::TextRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// File-level overview of an opened image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub file_name: String,
    pub size_bytes: u64,
    pub chunk_count: usize,
    /// Chunk types in stream order
    pub chunk_types: Vec<String>,
    pub text_records: usize,
    pub encrypted_records: usize,
    /// Chunks whose stored CRC does not match (repaired on save)
    pub stale_crc_chunks: usize,
}

impl ImageSummary {
    /// Summarize chunks and records parsed from the file at `path`.
    ///
    /// Name and size come from `path`; counts come from the parsed lists.
    pub fn from_chunks(path: &Path, chunks: &[Chunk], records: &[TextRecord]) -> Result<Self> {
        let file_name = path
            .file_name()
            .ok_or_else(|| SealError::io(format!("path has no filename: {}", path.display())))?
            .to_string_lossy()
            .into_owned();
        let size_bytes = fs::metadata(path)
            .map_err(|e| SealError::io(format!("reading metadata for {}: {}", path.display(), e)))?
            .len();

        Ok(Self {
            file_name,
            size_bytes,
            chunk_count: chunks.len(),
            chunk_types: chunks.iter().map(|c| c.chunk_type.to_string()).collect(),
            text_records: records.len(),
            encrypted_records: records.iter().filter(|r| r.is_encrypted()).count(),
            stale_crc_chunks: chunks.iter().filter(|c| !c.has_valid_crc()).count(),
        })
    }

    /// Summary of an edit session, counting its current records
    pub fn from_document(doc: &Document) -> Result<Self> {
        let records: Vec<TextRecord> = doc.records().map(|(_, r)| r.clone()).collect();
        Self::from_chunks(doc.path(), doc.chunks(), &records)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SealError::format(format!("serializing summary: {}", e)))
    }
}
