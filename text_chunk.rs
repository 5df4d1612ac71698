//! Mapping between raw `tEXt` chunks and typed text records.
//!
//! A `tEXt` chunk carries `keyword ++ 0x00 ++ text`. Records are extracted in
//! stream order; on save, [`rebuild`] emits every non-text chunk first (in its
//! original order), then one chunk per record, then the original `IEND`.
//!
//! Keywords are Latin-1 on the wire. Text is read as UTF-8 when it is valid
//! UTF-8 and as Latin-1 otherwise, and written back in the same encoding. A
//! record that was never modified after extraction is written back with its
//! original bytes.

use crate::chunk::{Chunk, ChunkType};
use crate::error::{Result, SealError};
use crate::hybrid;

/// Keyword used when a chunk has no usable keyword/text separator
pub const DEFAULT_KEYWORD: &str = "Comment";

/// PNG limits keywords to 79 bytes
pub const MAX_KEYWORD_LEN: usize = 79;

#[derive(Debug, Clone, Eq)]
pub struct TextRecord {
    keyword: String,
    text: String,
    encrypted: bool,
    /// Text came from a file as Latin-1 and is written back as Latin-1
    latin1_text: bool,
    /// Chunk payload as read, dropped on the first modification
    raw: Option<Vec<u8>>,
}

/// Records compare by content, not by how they were encoded on disk
impl PartialEq for TextRecord {
    fn eq(&self, other: &Self) -> bool {
        self.keyword == other.keyword
            && self.text == other.text
            && self.encrypted == other.encrypted
    }
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Every char must be at most U+00FF, which holds for decoded and validated keywords
fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// UTF-8 when valid, else Latin-1; the flag is true for Latin-1
fn decode_text(bytes: &[u8]) -> (String, bool) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), false),
        Err(_) => (decode_latin1(bytes), true),
    }
}

impl TextRecord {
    /// Create a record from user input, validating both fields
    pub fn new(keyword: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        let keyword = keyword.into();
        let text = text.into();
        validate_keyword(&keyword)?;
        validate_text(&text)?;
        Ok(Self::from_parts(keyword, text, false))
    }

    fn from_parts(keyword: String, text: String, latin1_text: bool) -> Self {
        let encrypted = hybrid::is_envelope(&text);
        Self {
            keyword,
            text,
            encrypted,
            latin1_text,
            raw: None,
        }
    }

    /// Decode a record from raw `tEXt` chunk data.
    ///
    /// Splits on the first NUL. A NUL at position 0, at the last byte, or no
    /// NUL at all yields keyword `Comment` with the whole payload as text.
    pub fn from_chunk_data(data: &[u8]) -> Self {
        let mut record = match data.iter().position(|&b| b == 0) {
            Some(pos) if pos > 0 && pos < data.len() - 1 => {
                let (text, latin1) = decode_text(&data[pos + 1..]);
                Self::from_parts(decode_latin1(&data[..pos]), text, latin1)
            }
            _ => {
                let (text, latin1) = decode_text(data);
                Self::from_parts(DEFAULT_KEYWORD.to_string(), text, latin1)
            }
        };
        record.raw = Some(data.to_vec());
        record
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn set_keyword(&mut self, keyword: impl Into<String>) -> Result<()> {
        let keyword = keyword.into();
        validate_keyword(&keyword)?;
        self.keyword = keyword;
        self.raw = None;
        Ok(())
    }

    /// Replace the text; the encrypted flag follows the new content
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.encrypted = hybrid::is_envelope(&self.text);
        self.latin1_text = false;
        self.raw = None;
    }

    /// Text preview cut to `max_chars` characters, with `...` when shortened
    pub fn display_text(&self, max_chars: usize) -> String {
        match self.text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &self.text[..cut]),
            None => self.text.clone(),
        }
    }

    /// Raw `tEXt` payload for this record
    pub fn to_chunk_data(&self) -> Vec<u8> {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let mut data = encode_latin1(&self.keyword);
        data.push(0);
        if self.latin1_text {
            data.extend(encode_latin1(&self.text));
        } else {
            data.extend_from_slice(self.text.as_bytes());
        }
        data
    }
}

pub fn validate_keyword(keyword: &str) -> Result<()> {
    if keyword.trim().is_empty() {
        return Err(SealError::validation("keyword cannot be empty"));
    }
    if keyword.len() > MAX_KEYWORD_LEN {
        return Err(SealError::validation(format!(
            "keyword is {} bytes, limit is {}",
            keyword.len(),
            MAX_KEYWORD_LEN
        )));
    }
    if !keyword.is_ascii() || keyword.bytes().any(|b| b.is_ascii_control()) {
        return Err(SealError::validation(
            "keyword must be printable ASCII without NUL or control characters",
        ));
    }
    Ok(())
}

pub fn validate_text(text: &str) -> Result<()> {
    if text.is_empty() {
        return Err(SealError::validation("text cannot be empty"));
    }
    Ok(())
}

/// Collect every `tEXt` chunk as a record, in stream order
pub fn extract(chunks: &[Chunk]) -> Vec<TextRecord> {
    chunks
        .iter()
        .filter(|c| c.chunk_type.is_text())
        .map(|c| TextRecord::from_chunk_data(&c.data))
        .collect()
}

/// Build a `tEXt` chunk for a record. The CRC is left at 0; the codec fills
/// it in on write.
pub fn build(record: &TextRecord) -> Chunk {
    Chunk {
        chunk_type: ChunkType::tEXt,
        data: record.to_chunk_data(),
        crc: 0,
    }
}

/// Replace all text chunks in `original` with `records`
pub fn rebuild(original: &[Chunk], records: &[TextRecord]) -> Vec<Chunk> {
    let mut out: Vec<Chunk> = original
        .iter()
        .filter(|c| !c.chunk_type.is_text() && !c.chunk_type.is_terminal())
        .cloned()
        .collect();

    out.extend(records.iter().map(build));

    if let Some(end) = original.iter().find(|c| c.chunk_type.is_terminal()) {
        out.push(end.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn chunk(tag: ChunkType, data: &[u8]) -> Chunk {
        Chunk::new(tag, data.to_vec())
    }

    #[test]
    fn test_extract_comment() {
        let chunks = vec![
            chunk(ChunkType::IHDR, &[0; 13]),
            chunk(ChunkType::tEXt, b"Comment\0Hello"),
            chunk(ChunkType::IEND, &[]),
        ];
        let records = extract(&chunks);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].keyword(), "Comment");
        assert_eq!(records[0].text(), "Hello");
        assert!(!records[0].is_encrypted());
    }

    #[test]
    fn test_extract_fallbacks() {
        let no_nul = TextRecord::from_chunk_data(b"just text");
        assert_eq!(no_nul.keyword(), DEFAULT_KEYWORD);
        assert_eq!(no_nul.text(), "just text");

        let leading = TextRecord::from_chunk_data(b"\0text");
        assert_eq!(leading.keyword(), DEFAULT_KEYWORD);
        assert_eq!(leading.text(), "\0text");

        let trailing = TextRecord::from_chunk_data(b"Author\0");
        assert_eq!(trailing.keyword(), DEFAULT_KEYWORD);
        assert_eq!(trailing.text(), "Author\0");
    }

    #[test]
    fn test_extract_splits_on_first_nul() {
        let r = TextRecord::from_chunk_data(b"Title\0a\0b");
        assert_eq!(r.keyword(), "Title");
        assert_eq!(r.text(), "a\0b");
    }

    #[test]
    fn test_encrypted_flag_is_derived() {
        let r = TextRecord::from_chunk_data(b"Secret\0ENC:abc:def");
        assert!(r.is_encrypted());

        let mut r = TextRecord::new("Note", "plain").unwrap();
        assert!(!r.is_encrypted());
        r.set_text("ENC:x:y");
        assert!(r.is_encrypted());
        r.set_text("back to plain");
        assert!(!r.is_encrypted());
    }

    #[test]
    fn test_build_layout() {
        let r = TextRecord::new("Author", "Zoë").unwrap();
        let c = build(&r);
        assert_eq!(c.chunk_type, ChunkType::tEXt);
        assert_eq!(c.data, "Author\0Zoë".as_bytes());
        assert_eq!(c.crc, 0);
        assert_eq!(TextRecord::from_chunk_data(&c.data), r);
    }

    #[test]
    fn test_rebuild_order() {
        let original = vec![
            chunk(ChunkType::IHDR, &[0; 13]),
            chunk(ChunkType::tEXt, b"Old\0gone"),
            chunk(ChunkType::IDAT, &[1, 2, 3]),
            chunk(ChunkType::IEND, &[]),
        ];
        let records = vec![
            TextRecord::new("B", "second").unwrap(),
            TextRecord::new("A", "first").unwrap(),
        ];
        let rebuilt = rebuild(&original, &records);
        let types: Vec<_> = rebuilt.iter().map(|c| c.chunk_type).collect();
        assert_eq!(
            types,
            vec![
                ChunkType::IHDR,
                ChunkType::IDAT,
                ChunkType::tEXt,
                ChunkType::tEXt,
                ChunkType::IEND
            ]
        );
        assert_eq!(rebuilt[2].data, b"B\0second");
        assert_eq!(rebuilt[3].data, b"A\0first");
    }

    #[test]
    fn test_rebuild_adds_record_before_iend() {
        let original = vec![chunk(ChunkType::IHDR, &[0; 13]), chunk(ChunkType::IEND, &[])];
        let records = vec![TextRecord::new("Comment", "x").unwrap()];
        let rebuilt = rebuild(&original, &records);
        assert_eq!(rebuilt.len(), 3);
        assert_eq!(rebuilt[1].chunk_type, ChunkType::tEXt);
        assert_eq!(rebuilt[1].data, b"Comment\0x");
        assert_eq!(rebuilt[2].chunk_type, ChunkType::IEND);
    }

    #[test]
    fn test_keyword_validation() {
        assert_eq!(
            TextRecord::new("", "x").unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            TextRecord::new("Key\0word", "x").unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            TextRecord::new("Schlüssel", "x").unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            TextRecord::new("k".repeat(80), "x").unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            TextRecord::new("Comment", "").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_non_utf8_records_rebuild_byte_identical() {
        let payloads: [&[u8]; 3] = [
            b"Copyright\0\xA9 2020 Jos\xE9",
            b"Schl\xFCssel\0text",
            b"no separator \xFF",
        ];
        let original: Vec<Chunk> = payloads
            .iter()
            .map(|p| chunk(ChunkType::tEXt, p))
            .chain([chunk(ChunkType::IEND, &[])])
            .collect();

        let rebuilt = rebuild(&original, &extract(&original));
        for (before, after) in original.iter().zip(&rebuilt) {
            assert_eq!(before.data, after.data);
        }
    }

    #[test]
    fn test_latin1_text_is_decoded() {
        let r = TextRecord::from_chunk_data(b"Copyright\0\xA9 2020 Jos\xE9");
        assert_eq!(r.keyword(), "Copyright");
        assert_eq!(r.text(), "\u{a9} 2020 Jos\u{e9}");
        assert!(!r.text().contains('\u{fffd}'));
    }

    #[test]
    fn test_edits_keep_untouched_field_bytes() {
        let mut r = TextRecord::from_chunk_data(b"Schl\xFCssel\0old");
        assert_eq!(r.keyword(), "Schl\u{fc}ssel");
        r.set_text("new");
        assert_eq!(r.to_chunk_data(), b"Schl\xFCssel\0new");

        let mut r = TextRecord::from_chunk_data(b"Title\0Jos\xE9");
        r.set_keyword("Author").unwrap();
        assert_eq!(r.to_chunk_data(), b"Author\0Jos\xE9");

        // unchanged UTF-8 text stays UTF-8
        let mut r = TextRecord::from_chunk_data("Title\0Zoë".as_bytes());
        r.set_keyword("Name").unwrap();
        assert_eq!(r.to_chunk_data(), "Name\0Zoë".as_bytes());
    }

    #[test]
    fn test_display_text() {
        let r = TextRecord::new("Comment", "héllo world").unwrap();
        assert_eq!(r.display_text(5), "héllo...");
        assert_eq!(r.display_text(50), "héllo world");
    }
}
