//! A single JSON-lines segment: one stored document per line, plus an optional
//! deletion bitmap.

use std::path::Path;

use serde::{
    Deserializer,
    de::{DeserializeSeed, IgnoredAny, MapAccess, Visitor},
};
use serde_json::{Map, Value};
use shardsplit_bit_array::BitArray;
use shardsplit_common::{Result, error::Error, try_or_ret_some_err, verify_data};

use crate::{
    document::{Document, value_as_text},
    manifest::SegmentEntry,
    reader::{CorpusReader, Postings},
};

/// An opened, read-only segment.
///
/// The document text is held in memory together with a line offset table; documents are
/// parsed on demand, one line at a time.
pub struct JsonlSegment {
    name: String,
    text: String,
    /// `line_ends[i]` is the byte offset of the newline terminating document `i`.
    line_ends: Vec<usize>,
    deletions: Option<BitArray>,
    num_docs: u32,
}

impl JsonlSegment {
    pub fn open(dir: &Path, entry: &SegmentEntry) -> Result<JsonlSegment> {
        let docs_path = entry.docs_path(dir);
        let text = std::fs::read_to_string(&docs_path)
            .map_err(|e| Error::io(format!("read segment {}", docs_path.display()), e))?;

        let deletions = if entry.has_deletions {
            let del_path = entry.deletions_path(dir);
            let bytes = std::fs::read(&del_path)
                .map_err(|e| Error::io(format!("read deletions {}", del_path.display()), e))?;
            verify_data!(
                deletions_len,
                bytes.len() == (entry.max_doc as usize).div_ceil(8)
            );
            Some(BitArray::from_lsb_bytes(&bytes, entry.max_doc as usize))
        } else {
            None
        };

        Self::from_parts(entry.name.clone(), text, entry.max_doc, deletions)
    }

    /// Builds a segment from its document text (newline-terminated JSON objects) and an
    /// optional deletion bitmap.
    pub fn from_parts(
        name: String,
        text: String,
        max_doc: u32,
        deletions: Option<BitArray>,
    ) -> Result<JsonlSegment> {
        let line_ends = text
            .bytes()
            .enumerate()
            .filter(|&(_, b)| b == b'\n')
            .map(|(pos, _)| pos)
            .collect::<Vec<_>>();
        verify_data!(line_count, line_ends.len() == max_doc as usize);
        verify_data!(
            trailing_data,
            text.len() == line_ends.last().map_or(0, |&end| end + 1)
        );

        let num_docs = match &deletions {
            Some(bits) => {
                verify_data!(deletions_len, bits.len() == max_doc as usize);
                bits.count_zeros() as u32
            }
            None => max_doc,
        };
        // An all-zero bitmap carries no information
        let deletions = deletions.filter(|bits| bits.count_ones() != 0);

        log::debug!(
            "opened segment {name}: max_doc={max_doc}, num_docs={num_docs}, {} bytes",
            text.len()
        );

        Ok(JsonlSegment {
            name,
            text,
            line_ends,
            deletions,
            num_docs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The segment's own deletion bitmap, if any document is deleted.
    pub fn deletions(&self) -> Option<&BitArray> {
        self.deletions.as_ref()
    }

    fn line(&self, ordinal: u32) -> Result<&str> {
        let index = ordinal as usize;
        if index >= self.line_ends.len() {
            return Err(Error::invalid_arg(
                "ordinal",
                format!(
                    "{ordinal} out of range for segment {} (max_doc {})",
                    self.name,
                    self.line_ends.len()
                ),
            ));
        }
        let start = if index == 0 {
            0
        } else {
            self.line_ends[index - 1] + 1
        };
        Ok(&self.text[start..self.line_ends[index]])
    }

    fn parse(&self, ordinal: u32) -> Result<Map<String, Value>> {
        let line = self.line(ordinal)?;
        serde_json::from_str(line)
            .map_err(|e| Error::json(format!("segment {} document {ordinal}", self.name), e))
    }
}

impl std::fmt::Debug for JsonlSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlSegment")
            .field("name", &self.name)
            .field("max_doc", &self.line_ends.len())
            .field("num_docs", &self.num_docs)
            .finish()
    }
}

impl CorpusReader for JsonlSegment {
    fn max_doc(&self) -> u32 {
        self.line_ends.len() as u32
    }

    fn num_docs(&self) -> u32 {
        self.num_docs
    }

    fn is_deleted(&self, ordinal: u32) -> bool {
        self.deletions
            .as_ref()
            .is_some_and(|bits| bits.contains(ordinal as usize))
    }

    fn fetch_field(&self, ordinal: u32, field: &str) -> Result<Option<String>> {
        let line = self.line(ordinal)?;
        let mut de = serde_json::Deserializer::from_str(line);
        let value = FieldSeek(field)
            .deserialize(&mut de)
            .and_then(|value| de.end().map(|()| value))
            .map_err(|e| Error::json(format!("segment {} document {ordinal}", self.name), e))?;
        Ok(value.as_ref().and_then(value_as_text))
    }

    fn document(&self, ordinal: u32) -> Result<Document> {
        self.parse(ordinal).map(Document::from_fields)
    }

    fn postings<'a>(&'a self, field: &'a str, term: &'a str) -> Postings<'a> {
        Box::new(ScanPostings {
            segment: self,
            field,
            term,
            next: 0,
        })
    }
}

/// Pulls one top-level field out of a JSON object. Every other value is skipped
/// without being built; a repeated key resolves to its last occurrence.
struct FieldSeek<'f>(&'f str);

impl<'de> DeserializeSeed<'de> for FieldSeek<'_> {
    type Value = Option<Value>;

    fn deserialize<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for FieldSeek<'_> {
    type Value = Option<Value>;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut found = None;
        while let Some(is_field) = map.next_key_seed(KeyMatches(self.0))? {
            if is_field {
                found = Some(map.next_value::<Value>()?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(found)
    }
}

/// Compares an object key against a field name without allocating it.
struct KeyMatches<'f>(&'f str);

impl<'de> DeserializeSeed<'de> for KeyMatches<'_> {
    type Value = bool;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<bool, D::Error> {
        deserializer.deserialize_str(self)
    }
}

impl<'de> Visitor<'de> for KeyMatches<'_> {
    type Value = bool;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a field name")
    }

    fn visit_str<E: serde::de::Error>(self, key: &str) -> std::result::Result<bool, E> {
        Ok(key == self.0)
    }
}

/// Postings produced by scanning stored documents in ordinal order.
struct ScanPostings<'a> {
    segment: &'a JsonlSegment,
    field: &'a str,
    term: &'a str,
    next: u32,
}

impl Iterator for ScanPostings<'_> {
    type Item = Result<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.segment.max_doc() {
            let ordinal = self.next;
            self.next += 1;
            if self.segment.is_deleted(ordinal) {
                continue;
            }
            let value = try_or_ret_some_err!(self.segment.fetch_field(ordinal, self.field));
            if value.as_deref() == Some(self.term) {
                return Some(Ok(ordinal));
            }
        }
        None
    }
}
