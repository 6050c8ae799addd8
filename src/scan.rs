use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::error::{FinderError, Result};

pub fn default_m2_repository() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| FinderError::InvalidProject {
        path: PathBuf::from("~"),
        reason: "cannot determine the home directory; pass --m2".to_string(),
    })?;
    Ok(home.join(".m2").join("repository"))
}

/// Every `.jar` below `base_path`, sorted so repeated sweeps process archives in the same order.
pub fn scan_jars(base_path: &Path) -> Result<Vec<PathBuf>> {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            if let Ok(entry) = entry {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "jar") && path.is_file() {
                    let _ = tx.send(path.to_path_buf());
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    let mut jars: Vec<PathBuf> = rx.iter().collect();
    jars.sort();
    Ok(jars)
}

/// One resolved `group:artifact:type[:classifier]:version:scope` line of a Maven report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub packaging: String,
    pub classifier: Option<String>,
    pub version: String,
    pub scope: String,
}

impl Coordinate {
    pub fn is_jar(&self) -> bool {
        matches!(self.packaging.as_str(), "jar" | "bundle" | "maven-plugin" | "test-jar")
    }

    /// Location of the artifact inside a Maven local repository.
    pub fn repository_path(&self, m2_repo: &Path) -> PathBuf {
        let mut path = m2_repo.to_path_buf();
        for part in self.group_id.split('.') {
            path.push(part);
        }
        path.push(&self.artifact_id);
        path.push(&self.version);

        let classifier = match (self.classifier.as_deref(), self.packaging.as_str()) {
            (Some(c), _) => format!("-{c}"),
            (None, "test-jar") => "-tests".to_string(),
            (None, _) => String::new(),
        };
        path.push(format!("{}-{}{classifier}.jar", self.artifact_id, self.version));
        path
    }
}

/// Pulls resolved coordinates out of `mvn dependency:list` (or `dependency:tree`) output.
///
/// Lines are noisy: `[INFO]` prefixes, tree glyphs, and trailing notes such as
/// ` -- module foo` or ` (optional)` all appear in the wild.
pub fn parse_dependency_report(output: &str) -> Vec<Coordinate> {
    let mut coords: Vec<Coordinate> = Vec::new();
    for line in output.lines() {
        let line = line
            .trim()
            .trim_start_matches("[INFO]")
            .trim_start_matches(['+', '\\', '|', '-', ' ']);

        let Some(token) = line.split_whitespace().next() else {
            continue;
        };
        if let Some(coord) = parse_coordinate(token)
            && !coords.contains(&coord)
        {
            coords.push(coord);
        }
    }
    coords
}

fn parse_coordinate(token: &str) -> Option<Coordinate> {
    let parts: Vec<&str> = token.split(':').collect();
    if parts.iter().any(|p| p.is_empty() || p.contains('/')) {
        return None;
    }

    let (group_id, artifact_id, packaging, classifier, version, scope) = match parts.as_slice() {
        [g, a, t, v, s] => (*g, *a, *t, None, *v, *s),
        [g, a, t, c, v, s] => (*g, *a, *t, Some(*c), *v, *s),
        _ => return None,
    };
    if !is_scope(scope) {
        return None;
    }

    Some(Coordinate {
        group_id: group_id.to_string(),
        artifact_id: artifact_id.to_string(),
        packaging: packaging.to_string(),
        classifier: classifier.map(str::to_string),
        version: version.to_string(),
        scope: scope.to_string(),
    })
}

fn is_scope(s: &str) -> bool {
    matches!(s, "compile" | "provided" | "runtime" | "test" | "system" | "import")
}

pub fn extract_version_from_maven_path(jar_path: &Path) -> Option<String> {
    jar_path
        .parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy().to_string())
}
