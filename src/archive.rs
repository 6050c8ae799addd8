//! Read-only access to jar archives.
//!
//! The archive is memory-mapped and read through `zip`, so listing and
//! extraction stream from the mapping instead of buffering the jar. The map and
//! file handle live inside [`JarArchive`] and are released when it drops, on
//! every exit path.

use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{FinderError, Result};
use crate::unit::top_level_unit_from_entry;

pub struct JarArchive {
    path: PathBuf,
    zip: ZipArchive<Cursor<Mmap>>,
}

impl JarArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let open_failure = |reason: String| FinderError::ArchiveOpen {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| open_failure(e.to_string()))?;
        // SAFETY: The mapping is read-only and owned by the returned archive; jars in the
        // local repository are not rewritten in place while a scan runs.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| open_failure(e.to_string()))?;
        let zip = ZipArchive::new(Cursor::new(mmap)).map_err(|e| open_failure(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            zip,
        })
    }

    /// Entry names in central-directory order, produced lazily.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.zip.file_names()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.zip.file_names().any(|name| name == entry)
    }

    /// Dotted names of the top-level classes in this jar, sorted.
    pub fn top_level_units(&self) -> Vec<String> {
        let mut units: Vec<String> = self
            .entry_names()
            .filter_map(top_level_unit_from_entry)
            .collect();
        units.sort();
        units
    }

    /// Streams one entry into `out`, returning the number of bytes copied.
    pub fn extract_to(&mut self, entry: &str, out: &mut impl Write) -> Result<u64> {
        let mut file = match self.zip.by_name(entry) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => {
                return Err(FinderError::EntryNotFound {
                    archive: self.path.clone(),
                    entry: entry.to_string(),
                });
            }
            Err(e) => {
                return Err(FinderError::ArchiveOpen {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };
        Ok(io::copy(&mut file, out)?)
    }

    /// Extracts one entry to `target`, creating parent directories.
    ///
    /// A partially written target is removed when the copy fails.
    pub fn extract_to_file(&mut self, entry: &str, target: &Path) -> Result<u64> {
        if !self.contains(entry) {
            return Err(FinderError::EntryNotFound {
                archive: self.path.clone(),
                entry: entry.to_string(),
            });
        }

        let extraction_failure = |reason: String| FinderError::Extraction {
            entry: entry.to_string(),
            target: target.to_path_buf(),
            reason,
        };

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| extraction_failure(e.to_string()))?;
        }
        let mut out = File::create(target).map_err(|e| extraction_failure(e.to_string()))?;

        let copied = self
            .extract_to(entry, &mut out)
            .and_then(|written| out.flush().map(|_| written).map_err(FinderError::from));
        match copied {
            Ok(written) => Ok(written),
            Err(err) => {
                drop(out);
                let _ = std::fs::remove_file(target);
                Err(extraction_failure(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};
    use zip::write::{FileOptions, ZipWriter};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "class_scope_archive_test_{}_{}_{}_{}",
            std::process::id(),
            nanos,
            n,
            name
        ))
    }

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn lists_top_level_units_only() {
        let jar = temp_path("list.jar");
        write_jar(
            &jar,
            &[
                ("org/example/B.class", b""),
                ("org/example/A.class", b""),
                ("org/example/A$Inner.class", b""),
                ("org/example/package-info.class", b""),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0"),
            ],
        );

        let archive = JarArchive::open(&jar).unwrap();
        assert_eq!(archive.entry_names().count(), 5);
        assert_eq!(
            archive.top_level_units(),
            vec!["org.example.A".to_string(), "org.example.B".to_string()]
        );
        drop(archive);
        let _ = fs::remove_file(jar);
    }

    #[test]
    fn extracts_entry_bytes() {
        let jar = temp_path("extract.jar");
        write_jar(&jar, &[("org/example/A.class", b"\xCA\xFE\xBA\xBEpayload")]);

        let mut archive = JarArchive::open(&jar).unwrap();
        let mut out = Vec::new();
        let written = archive.extract_to("org/example/A.class", &mut out).unwrap();
        assert_eq!(written, 11);
        assert_eq!(&out[..4], b"\xCA\xFE\xBA\xBE");

        let target = temp_path("scratch").join("org/example/A.class");
        archive
            .extract_to_file("org/example/A.class", &target)
            .unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"\xCA\xFE\xBA\xBEpayload");

        let _ = fs::remove_dir_all(target.parent().unwrap().parent().unwrap().parent().unwrap());
        let _ = fs::remove_file(jar);
    }

    #[test]
    fn missing_entry_is_entry_not_found() {
        let jar = temp_path("missing.jar");
        write_jar(&jar, &[("org/example/A.class", b"")]);

        let mut archive = JarArchive::open(&jar).unwrap();
        let target = temp_path("missing-target").join("B.class");
        let err = archive
            .extract_to_file("org/example/B.class", &target)
            .unwrap_err();
        assert!(matches!(err, FinderError::EntryNotFound { .. }));
        assert!(!target.exists());

        let mut sink = Vec::new();
        let err = archive.extract_to("org/example/B.class", &mut sink).unwrap_err();
        assert!(err.to_string().contains("org/example/B.class"));
        let _ = fs::remove_file(jar);
    }

    #[test]
    fn corrupt_archive_fails_to_open() {
        let jar = temp_path("corrupt.jar");
        fs::write(&jar, b"this is not a zip file").unwrap();

        let err = JarArchive::open(&jar).err().unwrap();
        assert!(matches!(err, FinderError::ArchiveOpen { .. }));
        let _ = fs::remove_file(jar);
    }

    #[test]
    fn missing_archive_fails_to_open() {
        let err = JarArchive::open(&temp_path("absent.jar")).err().unwrap();
        assert!(matches!(err, FinderError::ArchiveOpen { .. }));
    }
}
