//! Optional Dependencies
//!
//! A benchmark may name executables it needs (`requires`) and interpreter
//! modules its script imports (`modules`). Both are resolved at plan time;
//! the import policy decides whether a miss skips the benchmark or aborts
//! the run.

use crate::run_config::BenchmarkRunConfig;
use benchmon_monitor::Work;
use fxhash::FxHashMap;
use std::cell::RefCell;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Placeholder replaced by the module name in an import check
pub const MODULE_PLACEHOLDER: &str = "{module}";

/// Default import check, suited to Python interpreters
pub const DEFAULT_IMPORT_CHECK: &str = "import {module}";

/// An optional dependency could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Optional dependency unavailable: {name}")]
pub struct OptionalDependencyUnavailable {
    /// Name as written in the suite
    pub name: String,
}

/// Resolve an executable against the process `PATH`
pub fn try_load_optional(name: &str) -> Result<PathBuf, OptionalDependencyUnavailable> {
    resolve_in(name, std::env::var_os("PATH").as_deref())
}

/// Resolve an executable against an explicit search path.
///
/// Names containing a path separator are checked as given.
pub fn resolve_in(
    name: &str,
    search_path: Option<&OsStr>,
) -> Result<PathBuf, OptionalDependencyUnavailable> {
    let unavailable = || OptionalDependencyUnavailable {
        name: name.to_string(),
    };

    if name.is_empty() {
        return Err(unavailable());
    }

    let candidate = Path::new(name);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return if is_executable(candidate) {
            Ok(candidate.to_path_buf())
        } else {
            Err(unavailable())
        };
    }

    let search_path = search_path.ok_or_else(unavailable)?;
    std::env::split_paths(search_path)
        .map(|dir| dir.join(name))
        .find(|path| is_executable(path))
        .ok_or_else(unavailable)
}

/// Check that `module` imports under `interpreter`.
///
/// `check` is a one-line script with a `{module}` placeholder. The check
/// runs in a child process with all output discarded; any failure to start
/// or a non-zero exit means the module is unavailable.
pub fn try_import_optional<S: AsRef<str>>(
    interpreter: &[S],
    check: &str,
    module: &str,
) -> Result<(), OptionalDependencyUnavailable> {
    let unavailable = || OptionalDependencyUnavailable {
        name: module.to_string(),
    };

    if !is_module_name(module) {
        return Err(unavailable());
    }

    let work = Work::script(interpreter, &check.replace(MODULE_PLACEHOLDER, module))
        .map_err(|_| unavailable())?;
    let status = Command::new(work.program())
        .args(work.args())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => {
            debug!("Import check for {} exited with {}", module, status);
            Err(unavailable())
        }
        Err(e) => {
            debug!("Import check for {} could not start: {}", module, e);
            Err(unavailable())
        }
    }
}

/// Dotted identifier such as `scipy.stats`
fn is_module_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            part.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
                && part.chars().all(|c| c.is_alphanumeric() || c == '_')
        })
}

/// Looks up optional dependencies while a plan is built
pub trait DependencyResolver {
    /// Resolve an executable named in `requires`
    fn executable(&self, name: &str) -> Result<PathBuf, OptionalDependencyUnavailable>;

    /// Check a module named in `modules`
    fn module(&self, name: &str) -> Result<(), OptionalDependencyUnavailable>;
}

/// Resolves against the host: `PATH` for executables, the suite
/// interpreter for modules. Each module is checked at most once.
#[derive(Debug)]
pub struct SystemResolver {
    interpreter: Vec<String>,
    import_check: String,
    modules: RefCell<FxHashMap<String, bool>>,
}

impl SystemResolver {
    /// Resolver using the run's interpreter and import check
    pub fn new(config: &BenchmarkRunConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            import_check: config.import_check.clone(),
            modules: RefCell::new(FxHashMap::default()),
        }
    }
}

impl DependencyResolver for SystemResolver {
    fn executable(&self, name: &str) -> Result<PathBuf, OptionalDependencyUnavailable> {
        try_load_optional(name)
    }

    fn module(&self, name: &str) -> Result<(), OptionalDependencyUnavailable> {
        if let Some(&available) = self.modules.borrow().get(name) {
            return if available {
                Ok(())
            } else {
                Err(OptionalDependencyUnavailable {
                    name: name.to_string(),
                })
            };
        }

        let result = try_import_optional(&self.interpreter, &self.import_check, name);
        self.modules
            .borrow_mut()
            .insert(name.to_string(), result.is_ok());
        result
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn make_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_resolve_in_search_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = make_file(dir.path(), "mytool", 0o755);
        make_file(dir.path(), "notexec", 0o644);

        let path = std::env::join_paths([dir.path()]).unwrap();
        assert_eq!(resolve_in("mytool", Some(&path)).unwrap(), tool);

        let err = resolve_in("notexec", Some(&path)).unwrap_err();
        assert_eq!(err.name, "notexec");
        assert!(resolve_in("missing", Some(&path)).is_err());
        assert!(resolve_in("mytool", None).is_err());
    }

    #[test]
    fn test_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = make_file(dir.path(), "runner", 0o755);
        let name = tool.to_str().unwrap();
        assert_eq!(resolve_in(name, None).unwrap(), tool);
        assert!(resolve_in("/definitely/not/here", None).is_err());
    }

    #[test]
    fn test_try_load_optional_finds_sh() {
        assert!(try_load_optional("sh").is_ok());
        assert!(try_load_optional("").is_err());
    }

    // `sh -c` stands in for an interpreter: the check succeeds only for "present"
    const SH: [&str; 2] = ["sh", "-c"];
    const SH_CHECK: &str = "test {module} = present";

    #[test]
    fn test_try_import_optional() {
        assert!(try_import_optional(&SH, SH_CHECK, "present").is_ok());

        let err = try_import_optional(&SH, SH_CHECK, "scipy.stats").unwrap_err();
        assert_eq!(err.name, "scipy.stats");

        let empty: [&str; 0] = [];
        assert!(try_import_optional(&empty, SH_CHECK, "present").is_err());
        assert!(try_import_optional(&["benchmon-no-such-interpreter"], SH_CHECK, "present").is_err());
    }

    #[test]
    fn test_module_names_are_checked_before_running() {
        assert!(is_module_name("numpy"));
        assert!(is_module_name("scipy.stats"));
        assert!(is_module_name("_private"));
        assert!(!is_module_name(""));
        assert!(!is_module_name("a..b"));
        assert!(!is_module_name("1abc"));
        assert!(!is_module_name("present; true"));

        // would succeed under sh if it were ever run
        assert!(try_import_optional(&SH, "true", "x; rm").is_err());
    }

    #[test]
    fn test_system_resolver_caches_modules() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("count");
        let config = BenchmarkRunConfig {
            interpreter: vec!["sh".to_string(), "-c".to_string()],
            import_check: format!("echo x >> {} && test {{module}} = present", marker.display()),
            ..Default::default()
        };
        let resolver = SystemResolver::new(&config);

        assert!(resolver.module("present").is_ok());
        assert!(resolver.module("present").is_ok());
        assert!(resolver.module("missing").is_err());
        assert!(resolver.module("missing").is_err());
        assert!(resolver.executable("sh").is_ok());

        let runs = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(runs.lines().count(), 2);
    }
}
