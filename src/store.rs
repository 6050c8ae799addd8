//! On-disk layout for one project.
//!
//! ```text
//! <project>/.class-scope/class-index.json
//! <project>/.class-scope/decompiled/<package path>/<Simple>.java
//! <scratch root>/<package path>/<Simple>.class
//! ```
//!
//! Each project owns its index and cache, so two projects never share entries.

use std::path::{Path, PathBuf};

use crate::config::{STATE_DIR_NAME, Settings};
use crate::error::{FinderError, Result};
use crate::unit::UnitName;

const INDEX_FILE_NAME: &str = "class-index.json";
const CACHE_DIR_NAME: &str = "decompiled";

#[derive(Debug, Clone)]
pub struct ProjectStore {
    project_root: PathBuf,
    state_dir: PathBuf,
    scratch_root: PathBuf,
}

impl ProjectStore {
    pub fn open(project_root: &Path, settings: &Settings) -> Result<Self> {
        if project_root.as_os_str().is_empty() {
            return Err(FinderError::InvalidProject {
                path: project_root.to_path_buf(),
                reason: "project path is empty".to_string(),
            });
        }
        if !project_root.is_dir() {
            return Err(FinderError::InvalidProject {
                path: project_root.to_path_buf(),
                reason: "not an existing directory".to_string(),
            });
        }
        let project_root = project_root.canonicalize()?;

        Ok(Self {
            state_dir: project_root.join(STATE_DIR_NAME),
            project_root,
            scratch_root: settings.scratch_root.clone(),
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.state_dir.join(INDEX_FILE_NAME)
    }

    pub fn cache_root(&self) -> PathBuf {
        self.state_dir.join(CACHE_DIR_NAME)
    }

    pub fn cache_path(&self, unit: &UnitName) -> PathBuf {
        self.cache_root().join(unit.relative_path("java"))
    }

    pub fn scratch_path(&self, unit: &UnitName) -> PathBuf {
        self.scratch_root.join(unit.relative_path("class"))
    }

    pub fn read_cached(&self, unit: &UnitName) -> Result<Option<String>> {
        let path = self.cache_path(unit);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&path)?))
    }

    pub fn write_cached(&self, unit: &UnitName, content: &str) -> Result<PathBuf> {
        let path = self.cache_path(unit);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Removes the index and every cached source for this project.
    pub fn clear(&self) -> Result<bool> {
        if !self.state_dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&self.state_dir)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "class_scope_store_test_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn paths_mirror_package_structure() {
        let base = temp_dir("paths");
        let settings = Settings::new(base.join("m2"), base.join("scratch"));
        let store = ProjectStore::open(&base, &settings).unwrap();
        let unit = UnitName::parse("org.example.pkg.Demo").unwrap();

        assert!(
            store
                .cache_path(&unit)
                .ends_with(".class-scope/decompiled/org/example/pkg/Demo.java")
        );
        assert_eq!(
            store.scratch_path(&unit),
            base.join("scratch/org/example/pkg/Demo.class")
        );
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn projects_do_not_share_cache_entries() {
        let base = temp_dir("isolation");
        let one = base.join("one");
        let two = base.join("two");
        fs::create_dir_all(&one).unwrap();
        fs::create_dir_all(&two).unwrap();
        let settings = Settings::new(base.join("m2"), base.join("scratch"));
        let unit = UnitName::parse("a.B").unwrap();

        let store_one = ProjectStore::open(&one, &settings).unwrap();
        let store_two = ProjectStore::open(&two, &settings).unwrap();
        store_one.write_cached(&unit, "class B {}").unwrap();

        assert_eq!(store_one.read_cached(&unit).unwrap().as_deref(), Some("class B {}"));
        assert_eq!(store_two.read_cached(&unit).unwrap(), None);

        assert!(store_one.clear().unwrap());
        assert_eq!(store_one.read_cached(&unit).unwrap(), None);
        assert!(!store_one.clear().unwrap());
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn rejects_missing_or_empty_project() {
        let settings = Settings::new(PathBuf::from("m2"), PathBuf::from("scratch"));
        assert!(matches!(
            ProjectStore::open(Path::new(""), &settings),
            Err(FinderError::InvalidProject { .. })
        ));
        assert!(matches!(
            ProjectStore::open(Path::new("/nonexistent/path/that/does/not/exist"), &settings),
            Err(FinderError::InvalidProject { .. })
        ));
    }
}
