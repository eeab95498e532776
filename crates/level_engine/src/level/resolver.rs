use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codec::{classify_payload, DecodeError, Decompressor, PayloadKind};
use crate::config::SourceLayout;

use super::fields::{looks_like_field_record, parse_fields, FieldValue, LevelDocument, LevelField};
use super::plist::{looks_like_plist, parse_plist_level};
use super::storage::LevelStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelSource {
    Archive,
    LevelFile,
    PlistFile,
}

impl LevelSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::LevelFile => "level_file",
            Self::PlistFile => "plist_file",
        }
    }
}

#[derive(Debug, Clone)]
enum CachedLevel {
    Resolved(Arc<LevelDocument>),
    Failed(DecodeError),
}

struct FoundPayload {
    source: LevelSource,
    bytes: Vec<u8>,
    metadata: LevelDocument,
}

/// Finds, decodes and caches level documents. Each level id is decoded at
/// most once; later lookups return the cached document or the cached error.
pub struct LevelSourceResolver<S> {
    storage: S,
    layout: SourceLayout,
    decompressor: Decompressor,
    archive: Option<HashMap<String, String>>,
    cache: HashMap<i64, CachedLevel>,
    decode_attempts: u64,
}

impl<S: LevelStorage> LevelSourceResolver<S> {
    pub fn new(storage: S, layout: SourceLayout, decompressor: Decompressor) -> Self {
        Self {
            storage,
            layout,
            decompressor,
            archive: None,
            cache: HashMap::new(),
            decode_attempts: 0,
        }
    }

    pub fn with_defaults(storage: S) -> Self {
        Self::new(storage, SourceLayout::default(), Decompressor::default())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    /// Number of levels whose payload went through decoding.
    pub fn decode_attempts(&self) -> u64 {
        self.decode_attempts
    }

    pub fn cached_levels(&self) -> usize {
        self.cache.len()
    }

    pub fn resolve(&mut self, level_id: i64) -> Result<Arc<LevelDocument>, DecodeError> {
        match self.cache.get(&level_id) {
            Some(CachedLevel::Resolved(document)) => return Ok(Arc::clone(document)),
            Some(CachedLevel::Failed(error)) => return Err(error.clone()),
            None => {}
        }

        let result = self.load_uncached(level_id);
        let cached = match &result {
            Ok(document) => CachedLevel::Resolved(Arc::clone(document)),
            Err(error) => CachedLevel::Failed(error.clone()),
        };
        self.cache.insert(level_id, cached);
        result
    }

    fn load_uncached(&mut self, level_id: i64) -> Result<Arc<LevelDocument>, DecodeError> {
        let Some(found) = self.find_payload(level_id) else {
            debug!(level_id, "level_payload_not_found");
            return Ok(Arc::new(LevelDocument::with_level_id(level_id)));
        };

        self.decode_attempts = self.decode_attempts.saturating_add(1);
        let text = match self.decode_payload(&found.bytes) {
            Ok(text) => text,
            Err(error) => {
                warn!(
                    level_id,
                    source = found.source.label(),
                    error = %error,
                    "level_decode_failed"
                );
                return Err(error);
            }
        };

        let (mut document, body) = if looks_like_field_record(&text) {
            let document = parse_fields(&text);
            let body = match document.level_string() {
                Some(level_string) => self.decode_payload(level_string.as_bytes()).map_err(|error| {
                    warn!(
                        level_id,
                        source = found.source.label(),
                        error = %error,
                        "level_decode_failed"
                    );
                    error
                })?,
                None => String::new(),
            };
            (document, body)
        } else {
            (LevelDocument::empty(), text)
        };

        document.merge_missing_fields(&found.metadata);
        if document.level_id().is_none() {
            document.set(LevelField::LevelId, FieldValue::Int(level_id));
        }
        if !body.is_empty() {
            document.populate_body(body, found.source);
        }

        info!(
            level_id,
            source = found.source.label(),
            body_len = document.body().map_or(0, str::len),
            field_count = document.field_count(),
            "level_payload_resolved"
        );
        Ok(Arc::new(document))
    }

    fn find_payload(&mut self, level_id: i64) -> Option<FoundPayload> {
        if let Some(value) = self.archive_entry(level_id) {
            return Some(self.unwrap_container(LevelSource::Archive, value.into_bytes()));
        }

        let level_file = self.layout.level_file(level_id);
        if let Some(bytes) = self.read_non_empty(&level_file) {
            return Some(self.unwrap_container(LevelSource::LevelFile, bytes));
        }

        let plist_file = self.layout.plist_file(level_id);
        if let Some(bytes) = self.read_non_empty(&plist_file) {
            let found = self.unwrap_container(LevelSource::PlistFile, bytes);
            if !found.bytes.is_empty() {
                return Some(found);
            }
        }

        None
    }

    /// Replaces a plist container with the level string it holds.
    fn unwrap_container(&self, source: LevelSource, bytes: Vec<u8>) -> FoundPayload {
        if !looks_like_plist(&bytes) {
            return FoundPayload {
                source,
                bytes,
                metadata: LevelDocument::empty(),
            };
        }

        let text = String::from_utf8_lossy(&bytes);
        match parse_plist_level(&text) {
            Ok(plist) => {
                let mut metadata = LevelDocument::empty();
                if let Some(level_id) = plist.level_id {
                    metadata.set(LevelField::LevelId, FieldValue::Int(level_id));
                }
                if let Some(name) = plist.name {
                    metadata.set(LevelField::Name, FieldValue::Text(name));
                }
                FoundPayload {
                    source,
                    bytes: plist.level_string.unwrap_or_default().into_bytes(),
                    metadata,
                }
            }
            Err(error) => {
                warn!(source = source.label(), error = %error, "level_plist_unreadable");
                FoundPayload {
                    source,
                    bytes: Vec::new(),
                    metadata: LevelDocument::empty(),
                }
            }
        }
    }

    fn decode_payload(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        match classify_payload(bytes) {
            PayloadKind::Compressed => self.decompressor.decode(bytes),
            PayloadKind::DelimitedText => Ok(String::from_utf8_lossy(bytes).trim().to_string()),
            PayloadKind::Unknown => match self.decompressor.decode(bytes) {
                Ok(text) => Ok(text),
                Err(error) => {
                    debug!(error = %error, "level_payload_used_as_plain_text");
                    Ok(String::from_utf8_lossy(bytes).trim().to_string())
                }
            },
        }
    }

    fn archive_entry(&mut self, level_id: i64) -> Option<String> {
        let archive = self.archive.get_or_insert_with(|| {
            load_archive(&self.storage, &self.layout.archive_path)
        });
        archive
            .get(&level_id.to_string())
            .filter(|value| !value.trim().is_empty())
            .cloned()
    }

    fn read_non_empty(&self, path: &Path) -> Option<Vec<u8>> {
        if !self.storage.file_exists(path) {
            return None;
        }
        match self.storage.read_file(path) {
            Ok(bytes) if bytes.trim_ascii().is_empty() => None,
            Ok(bytes) => Some(bytes),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "level_file_unreadable");
                None
            }
        }
    }
}

fn load_archive<S: LevelStorage>(storage: &S, path: &Path) -> HashMap<String, String> {
    if !storage.file_exists(path) {
        return HashMap::new();
    }
    let bytes = match storage.read_file(path) {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(path = %path.display(), error = %error, "level_archive_unreadable");
            return HashMap::new();
        }
    };
    match serde_json::from_slice::<HashMap<String, serde_json::Value>>(&bytes) {
        Ok(entries) => {
            let archive = entries
                .into_iter()
                .filter_map(|(key, value)| match value {
                    serde_json::Value::String(text) => Some((key, text)),
                    _ => None,
                })
                .collect::<HashMap<_, _>>();
            info!(
                path = %path.display(),
                entry_count = archive.len(),
                "level_archive_loaded"
            );
            archive
        }
        Err(error) => {
            warn!(path = %path.display(), error = %error, "level_archive_malformed");
            HashMap::new()
        }
    }
}
