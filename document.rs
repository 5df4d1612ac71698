//! Editing the text records of one PNG file.
//!
//! This module provides the free functions [`open`] and [`save`] over raw
//! chunk/record lists, and [`Document`], an edit session that keeps the
//! records of one file in an ordered arena keyed by [`RecordId`].
//!
//! Ids stay stable across inserts, removals and moves; positional indices are
//! re-derived from the arena after every structural edit, so an index is only
//! meaningful until the next mutation.

use crate::chunk::{self, Chunk};
use crate::error::{Result, SealError};
use crate::hybrid::HybridCipher;
use crate::metadata::ImageSummary;
use crate::text_chunk::{self, TextRecord};
use crate::util::{self, FileMode};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Read a PNG file and extract its text records
pub fn open(path: &Path) -> Result<(Vec<Chunk>, Vec<TextRecord>)> {
    let bytes = util::read_file(path)?;
    let chunks = chunk::parse(&bytes)?;
    let records = text_chunk::extract(&chunks);
    debug!(
        path = %path.display(),
        chunks = chunks.len(),
        records = records.len(),
        "opened image"
    );
    Ok((chunks, records))
}

/// Write `original` to `path` with its text chunks replaced by `records`.
///
/// The whole file is serialized in memory before the destination is touched.
pub fn save(path: &Path, original: &[Chunk], records: &[TextRecord]) -> Result<()> {
    let chunks = text_chunk::rebuild(original, records);
    let bytes = chunk::serialize(&chunks)?;
    util::write_atomic(path, &bytes, FileMode::Normal)?;
    info!(
        path = %path.display(),
        records = records.len(),
        bytes = bytes.len(),
        "saved image"
    );
    Ok(())
}

/// Validate user input and create a new plain-text record
pub fn add_record(keyword: &str, text: &str) -> Result<TextRecord> {
    TextRecord::new(keyword, text)
}

/// Stable identity of a record within one [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: RecordId,
    record: TextRecord,
}

/// Outcome of a bulk encrypt/decrypt
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Records changed
    pub processed: usize,
    /// Records already in the target state
    pub skipped: usize,
    /// Records that failed, left unchanged
    pub failures: Vec<(RecordId, SealError)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Edit session over one PNG file
pub struct Document {
    path: PathBuf,
    chunks: Vec<Chunk>,
    entries: Vec<Entry>,
    next_id: u64,
    cipher: HybridCipher,
}

impl Document {
    pub fn open(path: impl Into<PathBuf>, cipher: HybridCipher) -> Result<Self> {
        let path = path.into();
        let (chunks, records) = open(&path)?;
        let mut doc = Self {
            path,
            chunks,
            entries: Vec::with_capacity(records.len()),
            next_id: 0,
            cipher,
        };
        for record in records {
            doc.push(record);
        }
        Ok(doc)
    }

    fn alloc_id(&mut self) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        id
    }

    fn push(&mut self, record: TextRecord) -> RecordId {
        let id = self.alloc_id();
        self.entries.push(Entry { id, record });
        id
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.entries.len() {
            return Err(SealError::validation(format!(
                "record index {} out of range ({} records)",
                index,
                self.entries.len()
            )));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records in their current order
    pub fn records(&self) -> impl Iterator<Item = (RecordId, &TextRecord)> + '_ {
        self.entries.iter().map(|e| (e.id, &e.record))
    }

    pub fn get(&self, index: usize) -> Option<&TextRecord> {
        self.entries.get(index).map(|e| &e.record)
    }

    pub fn record(&self, id: RecordId) -> Option<&TextRecord> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.record)
    }

    pub fn id_at(&self, index: usize) -> Option<RecordId> {
        self.entries.get(index).map(|e| e.id)
    }

    pub fn index_of(&self, id: RecordId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Append a new plain-text record
    pub fn add_record(&mut self, keyword: &str, text: &str) -> Result<RecordId> {
        let record = add_record(keyword, text)?;
        let id = self.push(record);
        debug!(id = %id, keyword, "added record");
        Ok(id)
    }

    pub fn remove_record(&mut self, index: usize) -> Result<TextRecord> {
        self.check_index(index)?;
        let entry = self.entries.remove(index);
        debug!(id = %entry.id, index, "removed record");
        Ok(entry.record)
    }

    /// Insert a copy of the record right after it
    pub fn duplicate_record(&mut self, index: usize) -> Result<RecordId> {
        self.check_index(index)?;
        let record = self.entries[index].record.clone();
        let id = self.alloc_id();
        self.entries.insert(index + 1, Entry { id, record });
        debug!(id = %id, index, "duplicated record");
        Ok(id)
    }

    pub fn move_record(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_index(from)?;
        self.check_index(to)?;
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        Ok(())
    }

    pub fn clear_records(&mut self) {
        debug!(count = self.entries.len(), "clearing all records");
        self.entries.clear();
    }

    /// Replace keyword and/or text. The encrypted flag follows the new text.
    pub fn edit_record(
        &mut self,
        index: usize,
        keyword: Option<&str>,
        text: Option<&str>,
    ) -> Result<()> {
        self.check_index(index)?;
        if let Some(text) = text {
            text_chunk::validate_text(text)?;
        }
        let record = &mut self.entries[index].record;
        if let Some(keyword) = keyword {
            record.set_keyword(keyword)?;
        }
        if let Some(text) = text {
            record.set_text(text);
        }
        Ok(())
    }

    pub fn encrypt_record(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let updated = self.cipher.encrypt_record(&self.entries[index].record)?;
        self.entries[index].record = updated;
        Ok(())
    }

    pub fn decrypt_record(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let updated = self.cipher.decrypt_record(&self.entries[index].record)?;
        self.entries[index].record = updated;
        Ok(())
    }

    /// Encrypt every plain record; failures leave the record as it was
    pub fn encrypt_all(&mut self) -> BatchReport {
        self.apply_all(false, |cipher, record| cipher.encrypt_record(record))
    }

    /// Decrypt every encrypted record; failures leave the record as it was
    pub fn decrypt_all(&mut self) -> BatchReport {
        self.apply_all(true, |cipher, record| cipher.decrypt_record(record))
    }

    fn apply_all<F>(&mut self, want_encrypted: bool, op: F) -> BatchReport
    where
        F: Fn(&HybridCipher, &TextRecord) -> Result<TextRecord>,
    {
        let mut report = BatchReport::default();
        for entry in &mut self.entries {
            if entry.record.is_encrypted() != want_encrypted {
                report.skipped += 1;
                continue;
            }
            match op(&self.cipher, &entry.record) {
                Ok(updated) => {
                    entry.record = updated;
                    report.processed += 1;
                }
                Err(e) => {
                    warn!(id = %entry.id, error = %e, "record left unchanged");
                    report.failures.push((entry.id, e));
                }
            }
        }
        report
    }

    fn current_records(&self) -> Vec<TextRecord> {
        self.entries.iter().map(|e| e.record.clone()).collect()
    }

    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone();
        self.save_as(path)
    }

    /// Save to `path`; later saves go there too
    pub fn save_as(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let records = self.current_records();
        save(&path, &self.chunks, &records)?;
        // mirror what was written, CRCs included
        self.chunks = text_chunk::rebuild(&self.chunks, &records)
            .into_iter()
            .map(|c| Chunk::new(c.chunk_type, c.data))
            .collect();
        self.path = path;
        Ok(())
    }

    pub fn summary(&self) -> Result<ImageSummary> {
        ImageSummary::from_document(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_record_id_display() {
        assert_eq!(RecordId(7).to_string(), "#7");
    }

    #[test]
    fn test_add_record_validates() {
        assert!(add_record("Comment", "x").is_ok());
        assert_eq!(
            add_record("", "x").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_batch_report_clean() {
        let report = BatchReport::default();
        assert!(report.is_clean());
    }
}
