use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FinderError>;

#[derive(Error, Debug)]
pub enum FinderError {
    #[error("Failed to open archive {path}: {reason} (the jar may be corrupt; delete it from the local repository and re-resolve)")]
    ArchiveOpen { path: PathBuf, reason: String },

    #[error("Entry {entry} not found in {archive} (the index may be stale; run `scan --force`)")]
    EntryNotFound { archive: PathBuf, entry: String },

    #[error("No class index for project {project} (run `scan` first)")]
    IndexMissing { project: PathBuf },

    #[error("Class {unit} is not in the index of {project} (run `scan` first, or `scan --force` if dependencies changed)")]
    UnitNotIndexed { unit: String, project: PathBuf },

    #[error("Invalid class name {name:?}: {reason}")]
    InvalidUnitName { name: String, reason: String },

    #[error("Invalid project path {path}: {reason}")]
    InvalidProject { path: PathBuf, reason: String },

    #[error("{tool} not found: {hint}")]
    ToolNotFound { tool: String, hint: String },

    #[error("{tool} timed out after {}s and was killed (retry, or raise the timeout)", timeout.as_secs())]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("{tool} failed: {message}")]
    ToolFailure { tool: String, message: String },

    #[error("{tool} produced no output for {unit} (the class file may be corrupt or the tool version incompatible)")]
    ToolEmptyOutput { tool: String, unit: String },

    #[error("Failed to extract {entry} to {target}: {reason}")]
    Extraction {
        entry: String,
        target: PathBuf,
        reason: String,
    },

    #[error("Looking up {unit} in the class index took longer than {}s", timeout.as_secs())]
    LookupTimeout { unit: String, timeout: Duration },

    #[error("javap output for {unit} contains no class declaration (check the javap version)")]
    NoDeclarationFound { unit: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to read or write the class index: {0}")]
    Json(#[from] serde_json::Error),
}
