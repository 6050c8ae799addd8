use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FinderError, Result};
use crate::scan::default_m2_repository;

pub const STATE_DIR_NAME: &str = ".class-scope";
pub const SCRATCH_DIR_NAME: &str = ".class-scope-scratch";

const DEFAULT_DEPENDENCY_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct Settings {
    pub m2_repository: PathBuf,
    pub java: String,
    pub javap: String,
    pub mvn: String,
    pub dependency_timeout: Duration,
    pub lookup_timeout: Duration,
    pub tool_timeout: Duration,
    pub scratch_root: PathBuf,
    pub sample_size: usize,
}

impl Settings {
    /// Settings with fixed defaults and no environment lookups.
    pub fn new(m2_repository: PathBuf, scratch_root: PathBuf) -> Self {
        Self {
            m2_repository,
            java: "java".to_string(),
            javap: "javap".to_string(),
            mvn: default_mvn_program().to_string(),
            dependency_timeout: DEFAULT_DEPENDENCY_TIMEOUT,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            scratch_root,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }

    pub fn from_env(m2_override: Option<PathBuf>) -> Result<Self> {
        let m2_repository = match m2_override {
            Some(p) => p,
            None => match env::var_os("CLASS_SCOPE_M2") {
                Some(p) => PathBuf::from(p),
                None => default_m2_repository()?,
            },
        };
        let scratch_root = env::current_dir()?.join(SCRATCH_DIR_NAME);

        let mut settings = Self::new(m2_repository, scratch_root);
        settings.java = resolve_program("CLASS_SCOPE_JAVA", "JAVA_HOME", "java");
        settings.javap = resolve_program("CLASS_SCOPE_JAVAP", "JAVA_HOME", "javap");
        settings.mvn = resolve_program("CLASS_SCOPE_MVN", "MAVEN_HOME", default_mvn_program());
        if let Some(secs) = env::var("CLASS_SCOPE_TOOL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            settings.tool_timeout = Duration::from_secs(secs);
        }
        Ok(settings)
    }
}

fn default_mvn_program() -> &'static str {
    if cfg!(windows) { "mvn.cmd" } else { "mvn" }
}

fn resolve_program(explicit_var: &str, home_var: &str, program: &str) -> String {
    if let Ok(p) = env::var(explicit_var)
        && !p.trim().is_empty()
    {
        return p;
    }

    if let Some(home) = env::var_os(home_var) {
        let candidate = PathBuf::from(home).join("bin").join(program);
        if candidate.is_file() {
            return candidate.to_string_lossy().into_owned();
        }
    }

    program.to_string()
}

/// Where to look for the CFR jar, in priority order.
#[derive(Debug, Clone, Default)]
pub struct RecoveryToolLookup {
    pub explicit: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
    pub bundled: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
    pub classpath: Option<String>,
}

impl RecoveryToolLookup {
    pub fn from_env(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            env_path: env::var_os("CFR_JAR").map(PathBuf::from),
            bundled: class_scope_home().map(|home| home.join("tools").join("cfr.jar")),
            working_dir: env::current_dir().ok(),
            classpath: env::var("CLASSPATH").ok(),
        }
    }

    /// Same lookup with a different explicit override.
    pub fn with_override(&self, explicit: Option<&Path>) -> Self {
        let mut lookup = self.clone();
        if let Some(p) = explicit {
            lookup.explicit = Some(p.to_path_buf());
        }
        lookup
    }

    pub fn resolve(&self) -> Result<PathBuf> {
        if let Some(p) = self.explicit.as_ref() {
            if p.is_file() {
                return Ok(p.clone());
            }
            return Err(FinderError::ToolNotFound {
                tool: "cfr.jar".to_string(),
                hint: format!("the configured path {} does not exist", p.display()),
            });
        }

        if let Some(p) = self.env_path.as_ref().filter(|p| p.is_file()) {
            return Ok(p.clone());
        }

        if let Some(p) = self.bundled.as_ref().filter(|p| p.is_file()) {
            return Ok(p.clone());
        }

        if let Some(dir) = self.working_dir.as_ref() {
            for candidate in [dir.join("tools").join("cfr.jar"), dir.join("cfr.jar")] {
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }

        if let Some(cp) = self.classpath.as_deref() {
            for entry in env::split_paths(cp) {
                let is_cfr = entry
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("cfr") && n.ends_with(".jar"));
                if is_cfr && entry.is_file() {
                    return Ok(entry);
                }
            }
        }

        Err(FinderError::ToolNotFound {
            tool: "cfr.jar".to_string(),
            hint: "pass --cfr, set CFR_JAR, or place cfr.jar under the class-scope tools directory"
                .to_string(),
        })
    }
}

pub fn class_scope_home() -> Option<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .map(|base| base.join("class-scope"))
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
            "class_scope_config_test_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"stub").unwrap();
    }

    #[test]
    fn explicit_override_wins() {
        let base = temp_dir("explicit");
        let explicit = base.join("mine.jar");
        let env_jar = base.join("env.jar");
        touch(&explicit);
        touch(&env_jar);

        let lookup = RecoveryToolLookup {
            explicit: Some(explicit.clone()),
            env_path: Some(env_jar),
            ..Default::default()
        };
        assert_eq!(lookup.resolve().unwrap(), explicit);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn missing_explicit_override_is_an_error() {
        let base = temp_dir("explicit_missing");
        let lookup = RecoveryToolLookup {
            explicit: Some(base.join("absent.jar")),
            ..Default::default()
        };
        assert!(matches!(
            lookup.resolve(),
            Err(FinderError::ToolNotFound { .. })
        ));
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn falls_through_to_working_dir_then_classpath() {
        let base = temp_dir("fallthrough");
        let bundled = base.join("home/tools/cfr.jar");
        let cwd = base.join("cwd");
        fs::create_dir_all(&cwd).unwrap();
        let cp_jar = base.join("lib/cfr-0.152.jar");
        touch(&cp_jar);

        let lookup = RecoveryToolLookup {
            explicit: None,
            env_path: Some(base.join("unset.jar")),
            bundled: Some(bundled.clone()),
            working_dir: Some(cwd.clone()),
            classpath: Some(cp_jar.to_string_lossy().into_owned()),
        };
        assert_eq!(lookup.resolve().unwrap(), cp_jar);

        touch(&cwd.join("tools/cfr.jar"));
        assert_eq!(lookup.resolve().unwrap(), cwd.join("tools/cfr.jar"));

        touch(&bundled);
        assert_eq!(lookup.resolve().unwrap(), bundled);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn empty_lookup_is_tool_not_found() {
        let err = RecoveryToolLookup::default().resolve().unwrap_err();
        assert!(err.to_string().contains("--cfr"));
    }
}
