//! Host import mechanism.
//!
//! A [`Host`] turns a module path or a script file into a loaded [`Module`].
//! [`PythonHost`] drives an external Python interpreter and talks to it over
//! a one-line JSON reply.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Handle to loaded code, shared between the cache and callers.
pub type Handle = Arc<Module>;

/// How a module was brought into the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleKind {
    /// Built into the interpreter (no file origin)
    Builtin,
    /// Imported from the installed environment
    Package,
    /// Executed from a script file
    Script,
}

/// A loaded module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    /// Module name as the host knows it
    pub name: String,
    /// File the module was loaded from, if any
    pub origin: Option<PathBuf>,
    /// Declared version (`__version__`)
    pub version: Option<String>,
    /// Public attribute names
    pub exports: Vec<String>,
    pub kind: ModuleKind,
}

impl Module {
    pub fn new(name: impl Into<String>, kind: ModuleKind) -> Self {
        Module {
            name: name.into(),
            origin: None,
            version: None,
            exports: Vec::new(),
            kind,
        }
    }

    pub fn with_exports<I, S>(mut self, exports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exports = exports.into_iter().map(Into::into).collect();
        self
    }

    pub fn exports(&self, attr: &str) -> bool {
        self.exports.iter().any(|e| e == attr)
    }
}

/// The host language's import mechanism.
pub trait Host {
    /// Import a module by its dotted path (standard library or installed).
    fn import(&self, module_path: &str) -> Result<Module, HostError>;

    /// Execute a script file in isolation as a module named `module_name`.
    fn exec_file(&self, path: &Path, module_name: &str) -> Result<Module, HostError>;

    /// Separator substituted for `/` in module paths.
    fn separator(&self) -> char {
        '.'
    }
}

const IMPORT_BOOTSTRAP: &str = r#"
import importlib, json, sys
name = sys.argv[1]
try:
    m = importlib.import_module(name)
except ModuleNotFoundError as e:
    print(json.dumps({"status": "missing", "message": str(e)}))
    sys.exit(0)
except BaseException as e:
    print(json.dumps({"status": "error", "message": "%s: %s" % (type(e).__name__, e)}))
    sys.exit(0)
v = getattr(m, "__version__", None)
print(json.dumps({"status": "ok", "name": m.__name__, "file": getattr(m, "__file__", None),
                  "version": None if v is None else str(v),
                  "exports": sorted(a for a in dir(m) if not a.startswith("_"))}))
"#;

const EXEC_BOOTSTRAP: &str = r#"
import json, runpy, sys
path, name = sys.argv[1], sys.argv[2]
try:
    g = runpy.run_path(path, run_name=name)
except BaseException as e:
    print(json.dumps({"status": "error", "message": "%s: %s" % (type(e).__name__, e)}))
    sys.exit(0)
v = g.get("__version__")
print(json.dumps({"status": "ok", "name": name, "file": path,
                  "version": None if v is None else str(v),
                  "exports": sorted(k for k in g if not k.startswith("_"))}))
"#;

/// Reply line printed by the bootstrap programs.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Reply {
    Ok {
        name: String,
        file: Option<PathBuf>,
        version: Option<String>,
        exports: Vec<String>,
    },
    Missing {
        message: String,
    },
    Error {
        message: String,
    },
}

/// Host backed by an external Python interpreter.
#[derive(Debug, Clone)]
pub struct PythonHost {
    python: String,
    /// Extra directories prepended to PYTHONPATH
    search_path: Vec<PathBuf>,
}

impl PythonHost {
    pub fn new(python: impl Into<String>) -> Self {
        PythonHost {
            python: python.into(),
            search_path: Vec::new(),
        }
    }

    /// Make modules in `dir` importable.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_path.push(dir.into());
        self
    }

    fn run(&self, subject: &str, args: &[&str], kind: ModuleKind) -> Result<Module, HostError> {
        let mut command = Command::new(&self.python);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if !self.search_path.is_empty() {
            let mut paths = self.search_path.clone();
            if let Some(existing) = std::env::var_os("PYTHONPATH") {
                paths.extend(std::env::split_paths(&existing));
            }
            if let Ok(joined) = std::env::join_paths(paths) {
                command.env("PYTHONPATH", joined);
            }
        }

        let output = command.output().map_err(|source| HostError::Spawn {
            program: self.python.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        // The loaded code may print; the reply is always the last line.
        let Some(line) = stdout.lines().rev().find(|l| !l.trim().is_empty()) else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HostError::Failed {
                name: subject.to_string(),
                message: stderr.trim().to_string(),
            });
        };

        parse_reply(subject, line, kind)
    }
}

fn parse_reply(subject: &str, line: &str, kind: ModuleKind) -> Result<Module, HostError> {
    let reply: Reply =
        serde_json::from_str(line).map_err(|e| HostError::Protocol(e.to_string()))?;

    match reply {
        Reply::Ok {
            name,
            file,
            version,
            exports,
        } => {
            let kind = if kind == ModuleKind::Package && file.is_none() {
                ModuleKind::Builtin
            } else {
                kind
            };
            Ok(Module {
                name,
                origin: file,
                version,
                exports,
                kind,
            })
        }
        Reply::Missing { message } => {
            tracing::debug!(module = subject, %message, "module not importable");
            Err(HostError::ModuleNotFound(subject.to_string()))
        }
        Reply::Error { message } => Err(HostError::Failed {
            name: subject.to_string(),
            message,
        }),
    }
}

impl Host for PythonHost {
    fn import(&self, module_path: &str) -> Result<Module, HostError> {
        self.run(
            module_path,
            &["-c", IMPORT_BOOTSTRAP, module_path],
            ModuleKind::Package,
        )
    }

    fn exec_file(&self, path: &Path, module_name: &str) -> Result<Module, HostError> {
        if !path.is_file() {
            return Err(HostError::MissingFile(path.to_path_buf()));
        }
        let path_arg = path.to_string_lossy();
        self.run(
            module_name,
            &["-c", EXEC_BOOTSTRAP, path_arg.as_ref(), module_name],
            ModuleKind::Script,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ok_reply() {
        let line = r#"{"status": "ok", "name": "json", "file": "/usr/lib/python3/json/__init__.py", "version": "2.0.9", "exports": ["dumps", "loads"]}"#;
        let module = parse_reply("json", line, ModuleKind::Package).unwrap();
        assert_eq!(module.name, "json");
        assert_eq!(module.version.as_deref(), Some("2.0.9"));
        assert_eq!(module.kind, ModuleKind::Package);
        assert!(module.exports("loads"));
        assert!(!module.exports("parse"));
    }

    #[test]
    fn test_parse_builtin_reply() {
        let line = r#"{"status": "ok", "name": "sys", "file": null, "version": null, "exports": ["path"]}"#;
        let module = parse_reply("sys", line, ModuleKind::Package).unwrap();
        assert_eq!(module.kind, ModuleKind::Builtin);
        assert_eq!(module.origin, None);
    }

    #[test]
    fn test_parse_missing_reply() {
        let line = r#"{"status": "missing", "message": "No module named 'nope'"}"#;
        let err = parse_reply("nope", line, ModuleKind::Package).unwrap_err();
        assert!(matches!(err, HostError::ModuleNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_parse_error_reply() {
        let line = r#"{"status": "error", "message": "SyntaxError: invalid syntax"}"#;
        let err = parse_reply("broken", line, ModuleKind::Script).unwrap_err();
        assert!(err.to_string().contains("SyntaxError"));
    }

    #[test]
    fn test_parse_garbage() {
        let err = parse_reply("x", "hello from the module", ModuleKind::Package).unwrap_err();
        assert!(matches!(err, HostError::Protocol(_)));
    }

    #[test]
    fn test_exec_missing_file() {
        let host = PythonHost::new("python3");
        let err = host
            .exec_file(Path::new("/nonexistent/autoload/missing.py"), "missing")
            .unwrap_err();
        assert!(matches!(err, HostError::MissingFile(_)));
    }

    /// A host for the system interpreter, or `None` when it is not installed.
    #[cfg(unix)]
    fn system_python() -> Option<PythonHost> {
        let available = Command::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);
        available.then(|| PythonHost::new("python3"))
    }

    #[cfg(unix)]
    #[test]
    fn test_import_package_and_builtin() {
        let Some(host) = system_python() else {
            return;
        };

        let json = host.import("json").unwrap();
        assert_eq!(json.name, "json");
        assert_eq!(json.kind, ModuleKind::Package);
        assert!(json.exports("loads"));
        assert!(json.origin.is_some());

        let sys = host.import("sys").unwrap();
        assert_eq!(sys.kind, ModuleKind::Builtin);
        assert_eq!(sys.origin, None);

        let path = host.import("os.path").unwrap();
        assert!(path.exports("join"));
    }

    #[cfg(unix)]
    #[test]
    fn test_import_missing_module() {
        let Some(host) = system_python() else {
            return;
        };
        let err = host.import("definitely_not_a_module_xyz").unwrap_err();
        assert!(matches!(err, HostError::ModuleNotFound(name) if name == "definitely_not_a_module_xyz"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_script_that_prints() {
        let Some(host) = system_python() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greeting.py");
        std::fs::write(&path, "print('hello from the script')\nX = 1\n_hidden = 2\n").unwrap();

        let module = host.exec_file(&path, "greeting").unwrap();
        assert_eq!(module.name, "greeting");
        assert_eq!(module.kind, ModuleKind::Script);
        assert_eq!(module.exports, vec!["X"]);
        assert_eq!(module.origin.as_deref(), Some(path.as_path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_script_with_syntax_error() {
        let Some(host) = system_python() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.py");
        std::fs::write(&path, "def (:\n").unwrap();

        let err = host.exec_file(&path, "broken").unwrap_err();
        assert!(matches!(err, HostError::Failed { ref message, .. } if message.contains("SyntaxError")));
    }

    #[cfg(unix)]
    #[test]
    fn test_search_dir_makes_scripts_importable() {
        let Some(host) = system_python() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("my_helpers.py"), "VERSION = '1'\n__version__ = '0.3'\n").unwrap();

        let host = host.with_search_dir(dir.path());
        let module = host.import("my_helpers").unwrap();
        assert_eq!(module.kind, ModuleKind::Package);
        assert_eq!(module.version.as_deref(), Some("0.3"));
        assert!(module.exports("VERSION"));
    }

    #[test]
    fn test_spawn_failure() {
        let host = PythonHost::new("/nonexistent/bin/python-autoload");
        let err = host.import("json").unwrap_err();
        assert!(matches!(err, HostError::Spawn { .. }));
    }
}
