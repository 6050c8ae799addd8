//! Decompiled-source cache.
//!
//! `recover` is cache-or-compute: a cached file for the class is returned
//! without starting any process; otherwise the class is looked up in the
//! index, extracted from its jar into the scratch directory and run through
//! CFR. There is no expiry; a cached file stays valid until the project state
//! is cleared or the caller bypasses the cache.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::JarArchive;
use crate::config::RecoveryToolLookup;
use crate::error::{FinderError, Result};
use crate::indexer::{ClassIndex, ClassIndexer};
use crate::store::ProjectStore;
use crate::toolchain::Toolchain;
use crate::unit::UnitName;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveredSource {
    pub unit_name: String,
    pub archive_path: Option<String>,
    pub content: String,
    pub content_hash: String,
    pub cache_hit: bool,
}

#[derive(Clone)]
pub struct RecoveryCache {
    indexer: ClassIndexer,
    toolchain: Arc<dyn Toolchain>,
    tool_lookup: RecoveryToolLookup,
}

impl RecoveryCache {
    pub fn new(
        indexer: ClassIndexer,
        toolchain: Arc<dyn Toolchain>,
        tool_lookup: RecoveryToolLookup,
    ) -> Self {
        Self {
            indexer,
            toolchain,
            tool_lookup,
        }
    }

    pub fn recover(
        &self,
        store: &ProjectStore,
        unit_name: &str,
        use_cache: bool,
        tool_override: Option<&Path>,
    ) -> Result<RecoveredSource> {
        self.recover_with(store, unit_name, use_cache, tool_override, |unit| {
            self.indexer.find_archive_within_timeout(store, unit)
        })
    }

    /// [`Self::recover`] with the jar lookup supplied by the caller.
    fn recover_with(
        &self,
        store: &ProjectStore,
        unit_name: &str,
        use_cache: bool,
        tool_override: Option<&Path>,
        find_archive: impl FnOnce(&UnitName) -> Result<Option<PathBuf>>,
    ) -> Result<RecoveredSource> {
        let unit = UnitName::parse(unit_name)?;
        let tool = self.tool_lookup.with_override(tool_override).resolve()?;

        if use_cache && let Some(content) = store.read_cached(&unit)? {
            log::debug!("cache hit for {unit}");
            return Ok(RecoveredSource {
                unit_name: unit.to_string(),
                archive_path: None,
                content_hash: hash_content(&content),
                content,
                cache_hit: true,
            });
        }

        let archive = find_archive(&unit)?.ok_or_else(|| FinderError::UnitNotIndexed {
            unit: unit.to_string(),
            project: store.project_root().to_path_buf(),
        })?;

        let scratch = store.scratch_path(&unit);
        JarArchive::open(&archive)?.extract_to_file(&unit.class_entry(), &scratch)?;

        let outcome = self.decompile(&tool, &scratch, &unit);
        if !use_cache || outcome.is_err() {
            discard_scratch(&scratch);
        }
        let content = outcome?;

        if use_cache {
            let path = store.write_cached(&unit, &content)?;
            log::info!("cached {unit} at {}", path.display());
        }

        Ok(RecoveredSource {
            unit_name: unit.to_string(),
            archive_path: Some(archive.to_string_lossy().into_owned()),
            content_hash: hash_content(&content),
            content,
            cache_hit: false,
        })
    }

    /// Recovers each class in turn. A failure becomes a `// Failed to decompile`
    /// placeholder for that class instead of aborting the batch.
    ///
    /// The index is read once, on the first cache miss, and shared by the rest.
    pub fn recover_many(
        &self,
        store: &ProjectStore,
        unit_names: &[String],
        use_cache: bool,
        tool_override: Option<&Path>,
    ) -> BTreeMap<String, String> {
        let mut results = BTreeMap::new();
        let mut index: Option<ClassIndex> = None;
        for name in unit_names {
            let outcome = self.recover_with(store, name, use_cache, tool_override, |unit| {
                if index.is_none() {
                    index = Some(self.indexer.load_index_within_timeout(store, unit)?);
                }
                Ok(index.as_ref().and_then(|i| i.archive_for(unit)))
            });
            let text = match outcome {
                Ok(recovered) => recovered.content,
                Err(e) => {
                    log::warn!("failed to decompile {name}: {e}");
                    error_placeholder(name, &e)
                }
            };
            results.insert(name.clone(), text);
        }
        results
    }

    fn decompile(&self, tool: &Path, class_file: &Path, unit: &UnitName) -> Result<String> {
        let output = self.toolchain.recover_source(tool, class_file)?;
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            log::warn!("CFR reported while decompiling {unit}: {stderr}");
        }
        if output.stdout.trim().is_empty() {
            return Err(FinderError::ToolEmptyOutput {
                tool: "CFR".to_string(),
                unit: unit.to_string(),
            });
        }
        Ok(output.stdout.replace("\r\n", "\n"))
    }
}

pub fn error_placeholder(unit_name: &str, err: &FinderError) -> String {
    format!("// Failed to decompile {unit_name}: {err}")
}

pub fn is_error_placeholder(text: &str) -> bool {
    text.starts_with("// Failed to decompile ")
}

pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn discard_scratch(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("failed to remove scratch file {}: {e}", path.display());
    }
}
