//! External JDK / Maven tools behind one narrow interface.
//!
//! The indexer, recovery cache and analyzer only talk to [`Toolchain`], so tests
//! can substitute a counting fake for `mvn`, CFR and `javap`.

use std::path::Path;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{FinderError, Result};
use crate::process::{ToolOutput, run_with_timeout};

pub trait Toolchain: Send + Sync {
    /// Raw dependency report for the project (`mvn dependency:list`).
    fn resolve_dependencies(&self, project: &Path) -> Result<String>;

    /// Runs the decompiler on one extracted `.class` file.
    ///
    /// A successful exit is returned as-is, including empty stdout; judging the
    /// output is the caller's job.
    fn recover_source(&self, tool: &Path, class_file: &Path) -> Result<ToolOutput>;

    /// Verbose `javap` report for `unit_name` loaded from `archive`.
    fn disassemble(&self, archive: &Path, unit_name: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct JavaToolchain {
    java: String,
    javap: String,
    mvn: String,
    dependency_timeout: Duration,
    tool_timeout: Duration,
}

impl JavaToolchain {
    pub fn new(settings: &Settings) -> Self {
        Self {
            java: settings.java.clone(),
            javap: settings.javap.clone(),
            mvn: settings.mvn.clone(),
            dependency_timeout: settings.dependency_timeout,
            tool_timeout: settings.tool_timeout,
        }
    }
}

impl Toolchain for JavaToolchain {
    fn resolve_dependencies(&self, project: &Path) -> Result<String> {
        let args = vec![
            "dependency:list".to_string(),
            "-B".to_string(),
            "-DexcludeTransitive=false".to_string(),
        ];
        let output = run_with_timeout(&self.mvn, &args, Some(project), self.dependency_timeout)?;
        if !output.success() {
            return Err(FinderError::ToolFailure {
                tool: self.mvn.clone(),
                message: failure_message(&output),
            });
        }
        Ok(output.stdout)
    }

    fn recover_source(&self, tool: &Path, class_file: &Path) -> Result<ToolOutput> {
        let args = vec![
            "-jar".to_string(),
            tool.to_string_lossy().into_owned(),
            class_file.to_string_lossy().into_owned(),
            "--silent".to_string(),
            "true".to_string(),
        ];
        let output = run_with_timeout(&self.java, &args, None, self.tool_timeout)?;
        if !output.success() {
            return Err(FinderError::ToolFailure {
                tool: "CFR".to_string(),
                message: failure_message(&output),
            });
        }
        Ok(output)
    }

    fn disassemble(&self, archive: &Path, unit_name: &str) -> Result<String> {
        let args = vec![
            "-v".to_string(),
            "-cp".to_string(),
            archive.to_string_lossy().into_owned(),
            unit_name.to_string(),
        ];
        let output = run_with_timeout(&self.javap, &args, None, self.tool_timeout)?;
        if !output.success() {
            return Err(FinderError::ToolFailure {
                tool: self.javap.clone(),
                message: failure_message(&output),
            });
        }
        Ok(output.stdout)
    }
}

fn failure_message(output: &ToolOutput) -> String {
    let stderr = output.stderr.trim();
    let detail = if stderr.is_empty() {
        // Maven reports build errors on stdout.
        output
            .stdout
            .lines()
            .filter(|l| l.starts_with("[ERROR]"))
            .take(5)
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        stderr.to_string()
    };
    format!("exit status {}: {}", output.status, detail)
}
