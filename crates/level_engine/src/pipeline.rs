use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::codec::{DecodeError, Decompressor};
use crate::config::EngineConfig;
use crate::level::{parse_body, LevelDocument, LevelSourceResolver, LevelStorage, ParseIssue};
use crate::runtime::RuntimeLevel;

#[derive(Debug, Error)]
pub enum LevelLoadError {
    #[error("level {level_id} has no playable objects")]
    NotFound { level_id: i64 },
    #[error("failed to decode level {level_id}: {source}")]
    Decode {
        level_id: i64,
        #[source]
        source: DecodeError,
    },
}

#[derive(Debug)]
pub struct LoadedLevel {
    pub document: Arc<LevelDocument>,
    pub runtime: RuntimeLevel,
    pub issues: Vec<ParseIssue>,
}

/// Resolves level payloads and turns them into running levels.
pub struct LevelLoader<S> {
    resolver: LevelSourceResolver<S>,
    config: EngineConfig,
}

impl<S: LevelStorage> LevelLoader<S> {
    pub fn new(storage: S, config: EngineConfig) -> Self {
        let resolver = LevelSourceResolver::new(
            storage,
            config.sources.clone(),
            Decompressor::new(config.decode),
        );
        Self { resolver, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &LevelSourceResolver<S> {
        &self.resolver
    }

    pub fn resolve(&mut self, level_id: i64) -> Result<Arc<LevelDocument>, LevelLoadError> {
        self.resolver
            .resolve(level_id)
            .map_err(|source| LevelLoadError::Decode { level_id, source })
    }

    pub fn load(&mut self, level_id: i64) -> Result<LoadedLevel, LevelLoadError> {
        let document = self.resolve(level_id)?;
        let Some(body) = document.body().filter(|body| !body.is_empty()) else {
            warn!(level_id, "level_body_missing");
            return Err(LevelLoadError::NotFound { level_id });
        };

        let (runtime, issues) = build_runtime_level(level_id, body, &self.config)?;
        Ok(LoadedLevel {
            document,
            runtime,
            issues,
        })
    }
}

/// Parses `body` and buckets its objects. Nothing is indexed unless the body
/// has at least one valid object.
pub fn build_runtime_level(
    level_id: i64,
    body: &str,
    config: &EngineConfig,
) -> Result<(RuntimeLevel, Vec<ParseIssue>), LevelLoadError> {
    let parsed = parse_body(body);
    if parsed.objects.is_empty() {
        warn!(
            level_id,
            skipped_records = parsed.issues.len(),
            "level_body_has_no_objects"
        );
        return Err(LevelLoadError::NotFound { level_id });
    }

    info!(
        level_id,
        object_count = parsed.objects.len(),
        skipped_records = parsed.issues.len(),
        header_settings = parsed.header.len(),
        "level_body_parsed"
    );
    let runtime = RuntimeLevel::new(level_id, parsed.header, parsed.objects, config);
    Ok((runtime, parsed.issues))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_level_string;
    use crate::level::MemoryStorage;

    #[test]
    fn load_builds_runtime_and_keeps_issues() {
        let body = "kA2,0;1,1,2,15,3,15;1,8,2";
        let storage = MemoryStorage::new()
            .with_file("levels/3.txt", encode_level_string(body).expect("encode"));
        let mut loader = LevelLoader::new(storage, EngineConfig::default());

        let loaded = loader.load(3).expect("load");
        assert_eq!(loaded.runtime.object_count(), 1);
        assert_eq!(loaded.issues.len(), 1);
        assert_eq!(loaded.document.body(), Some(body));
    }

    #[test]
    fn missing_level_is_not_found() {
        let mut loader = LevelLoader::new(MemoryStorage::new(), EngineConfig::default());
        assert!(matches!(
            loader.load(8),
            Err(LevelLoadError::NotFound { level_id: 8 })
        ));
    }

    #[test]
    fn body_without_valid_objects_is_not_found() {
        let storage = MemoryStorage::new().with_file("levels/4.txt", "kA2,0;1,5,2;");
        let mut loader = LevelLoader::new(storage, EngineConfig::default());
        assert!(matches!(
            loader.load(4),
            Err(LevelLoadError::NotFound { level_id: 4 })
        ));
    }

    #[test]
    fn decode_failure_is_reported_with_level_id() {
        let storage = MemoryStorage::new().with_file("levels/5.txt", "H4sIAAAAAAAAA####");
        let mut loader = LevelLoader::new(storage, EngineConfig::default());

        let error = loader.load(5).expect_err("decode failure");
        assert!(matches!(error, LevelLoadError::Decode { level_id: 5, .. }));
        assert_eq!(loader.resolver().decode_attempts(), 1);
        assert!(loader.load(5).is_err());
        assert_eq!(loader.resolver().decode_attempts(), 1);
    }
}
