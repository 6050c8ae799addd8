//! Project class index: fully-qualified class name → containing jar.
//!
//! A scan resolves the project's dependency jars through Maven, falling back
//! to sweeping the whole local repository when Maven is unavailable, catalogs
//! every jar and writes the result to the project's state directory. The index
//! is only ever rebuilt wholesale.
//!
//! When two jars contain the same class the later one in resolution order
//! wins. Jars are cataloged in parallel but merged sequentially, so the winner
//! is stable for a given resolution order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::archive::JarArchive;
use crate::config::Settings;
use crate::error::{FinderError, Result};
use crate::scan::{extract_version_from_maven_path, parse_dependency_report, scan_jars};
use crate::store::ProjectStore;
use crate::toolchain::Toolchain;
use crate::unit::UnitName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub unit_name: String,
    pub archive_path: String,
    pub package_name: String,
    pub simple_name: String,
}

impl IndexEntry {
    fn new(unit_name: String, archive: &Path) -> Self {
        let (package_name, simple_name) = match unit_name.rfind('.') {
            Some(idx) => (unit_name[..idx].to_string(), unit_name[idx + 1..].to_string()),
            None => (String::new(), unit_name.clone()),
        };
        Self {
            unit_name,
            archive_path: archive.to_string_lossy().into_owned(),
            package_name,
            simple_name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveSource {
    Maven,
    RepositorySweep,
}

/// The persisted index file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassIndex {
    pub archive_count: usize,
    pub entry_count: usize,
    pub index_location: String,
    pub sample_entries: Vec<String>,
    pub resolved_via: ArchiveSource,
    pub built_at: u64,
    pub entries: Vec<IndexEntry>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl ClassIndex {
    fn new(
        archive_count: usize,
        index_location: String,
        sample_entries: Vec<String>,
        resolved_via: ArchiveSource,
        entries: Vec<IndexEntry>,
    ) -> Self {
        let mut index = Self {
            archive_count,
            entry_count: entries.len(),
            index_location,
            sample_entries,
            resolved_via,
            built_at: now_millis(),
            entries,
            positions: HashMap::new(),
        };
        index.rebuild_positions();
        index
    }

    fn rebuild_positions(&mut self) {
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.unit_name.clone(), pos))
            .collect();
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            archive_count: self.archive_count,
            entry_count: self.entry_count,
            index_location: self.index_location.clone(),
            sample_entries: self.sample_entries.clone(),
            resolved_via: self.resolved_via,
            built_at: self.built_at,
        }
    }

    pub fn find(&self, unit_name: &str) -> Option<&IndexEntry> {
        self.positions
            .get(unit_name)
            .and_then(|&pos| self.entries.get(pos))
    }

    /// Jar containing `unit`; nested classes resolve to their top-level class's jar.
    pub fn archive_for(&self, unit: &UnitName) -> Option<PathBuf> {
        self.find(unit.as_str())
            .or_else(|| {
                unit.is_nested()
                    .then(|| self.find(unit.top_level().as_str()))
                    .flatten()
            })
            .map(|e| PathBuf::from(&e.archive_path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub archive_count: usize,
    pub entry_count: usize,
    pub index_location: String,
    pub sample_entries: Vec<String>,
    pub resolved_via: ArchiveSource,
    pub built_at: u64,
}

#[derive(Clone)]
pub struct ClassIndexer {
    settings: Arc<Settings>,
    toolchain: Arc<dyn Toolchain>,
}

impl ClassIndexer {
    pub fn new(settings: Arc<Settings>, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            settings,
            toolchain,
        }
    }

    /// Returns the persisted index summary, building the index first when it is
    /// absent or `force_refresh` is set.
    pub fn scan(&self, store: &ProjectStore, force_refresh: bool) -> Result<IndexSummary> {
        let index_path = store.index_path();
        if force_refresh && index_path.exists() {
            log::info!("removing existing index {}", index_path.display());
            std::fs::remove_file(&index_path)?;
        }

        if index_path.exists() {
            match read_index(&index_path) {
                Ok(index) => {
                    log::debug!("reusing index {}", index_path.display());
                    return Ok(index.summary());
                }
                Err(e) => log::warn!("ignoring unreadable index {}: {e}", index_path.display()),
            }
        }

        let (archives, resolved_via) = self.resolve_archives(store.project_root());
        let index = self.build_index(&archives, resolved_via, &index_path);
        write_index(&index_path, &index)?;
        log::info!(
            "indexed {} classes from {} jars into {}",
            index.entry_count,
            index.archive_count,
            index_path.display()
        );
        Ok(index.summary())
    }

    pub fn load_index(&self, store: &ProjectStore) -> Result<ClassIndex> {
        let path = store.index_path();
        if !path.exists() {
            return Err(FinderError::IndexMissing {
                project: store.project_root().to_path_buf(),
            });
        }
        read_index(&path)
    }

    /// Jar containing `unit`, or `None` when the index has no such class.
    ///
    /// Nested classes are not indexed; they resolve to their top-level class's jar.
    pub fn find_archive_for(&self, store: &ProjectStore, unit: &UnitName) -> Result<Option<PathBuf>> {
        Ok(self.load_index(store)?.archive_for(unit))
    }

    /// [`Self::find_archive_for`] bounded by the configured lookup timeout.
    pub fn find_archive_within_timeout(
        &self,
        store: &ProjectStore,
        unit: &UnitName,
    ) -> Result<Option<PathBuf>> {
        Ok(self.load_index_within_timeout(store, unit)?.archive_for(unit))
    }

    /// Reads the index on a worker thread, giving up after the lookup timeout.
    ///
    /// `unit` is the class the caller is resolving; it only names the timeout error.
    /// Expiry is final: the read is not retried.
    pub fn load_index_within_timeout(
        &self,
        store: &ProjectStore,
        unit: &UnitName,
    ) -> Result<ClassIndex> {
        let index_path = store.index_path();
        if !index_path.exists() {
            return Err(FinderError::IndexMissing {
                project: store.project_root().to_path_buf(),
            });
        }

        let timeout = self.settings.lookup_timeout;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(read_index(&index_path));
        });

        match rx.recv_timeout(timeout) {
            Ok(index) => index,
            Err(_) => Err(FinderError::LookupTimeout {
                unit: unit.to_string(),
                timeout,
            }),
        }
    }

    pub fn list_all_unit_names(&self, store: &ProjectStore) -> Result<Vec<String>> {
        match self.load_index(store) {
            Ok(index) => Ok(index.entries.into_iter().map(|e| e.unit_name).collect()),
            Err(FinderError::IndexMissing { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn resolve_archives(&self, project: &Path) -> (Vec<PathBuf>, ArchiveSource) {
        match self.toolchain.resolve_dependencies(project) {
            Ok(report) => {
                let m2 = &self.settings.m2_repository;
                let mut archives = Vec::new();
                for coord in parse_dependency_report(&report) {
                    if !coord.is_jar() {
                        continue;
                    }
                    let jar = coord.repository_path(m2);
                    if jar.is_file() {
                        archives.push(jar);
                    } else {
                        log::debug!("resolved jar not in local repository: {}", jar.display());
                    }
                }
                log::info!("maven resolved {} jars for {}", archives.len(), project.display());
                (archives, ArchiveSource::Maven)
            }
            Err(e) => {
                log::warn!(
                    "dependency resolution failed ({e}); sweeping {} instead",
                    self.settings.m2_repository.display()
                );
                let archives = scan_jars(&self.settings.m2_repository).unwrap_or_else(|e| {
                    log::warn!("repository sweep failed: {e}");
                    Vec::new()
                });
                (archives, ArchiveSource::RepositorySweep)
            }
        }
    }

    fn build_index(
        &self,
        archives: &[PathBuf],
        resolved_via: ArchiveSource,
        index_path: &Path,
    ) -> ClassIndex {
        let cataloged: Vec<(&PathBuf, Result<Vec<String>>)> = archives
            .par_iter()
            .map(|jar| (jar, JarArchive::open(jar).map(|a| a.top_level_units())))
            .collect();

        let mut entries: Vec<IndexEntry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (jar, units) in cataloged {
            let units = match units {
                Ok(units) => units,
                Err(e) => {
                    log::warn!("skipping {}: {e}", jar.display());
                    continue;
                }
            };
            log::debug!(
                "{} (version {}): {} classes",
                jar.display(),
                extract_version_from_maven_path(jar).as_deref().unwrap_or("unknown"),
                units.len()
            );

            for unit in units {
                let entry = IndexEntry::new(unit, jar);
                match positions.get(&entry.unit_name) {
                    Some(&pos) => entries[pos] = entry,
                    None => {
                        positions.insert(entry.unit_name.clone(), entries.len());
                        entries.push(entry);
                    }
                }
            }
        }

        let sample_entries = entries
            .iter()
            .take(self.settings.sample_size)
            .map(|e| {
                let jar_name = Path::new(&e.archive_path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("{} → {jar_name}", e.unit_name)
            })
            .collect();

        ClassIndex::new(
            archives.len(),
            index_path.to_string_lossy().into_owned(),
            sample_entries,
            resolved_via,
            entries,
        )
    }
}

fn read_index(path: &Path) -> Result<ClassIndex> {
    let raw = std::fs::read_to_string(path)?;
    let mut index: ClassIndex = serde_json::from_str(&raw)?;
    index.rebuild_positions();
    Ok(index)
}

fn write_index(path: &Path, index: &ClassIndex) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(index)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn now_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}
