//! Installer: run an install action and report whether it worked.
//!
//! Process actions spawn the package manager with a bounded timeout.
//! Download actions fetch over HTTP with a bounded timeout and either
//! extract an archive or drop a script into the script directory.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use colored::Colorize;

use super::archive::{self, ArchiveFormat};
use super::registry::InstallAction;
use super::source;
use crate::config::Config;
use crate::error::InstallError;

const USER_AGENT: &str = "autoload";

/// Interval between checks on a running install process.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Bytes of stderr kept for diagnostics.
const STDERR_TAIL: u64 = 4096;

/// Executes install actions.
///
/// Implementations never fail loudly: every error is reported as `false`.
pub trait Install {
    fn install(&self, action: &InstallAction) -> bool;
}

/// Installer backed by the host's package manager and HTTP downloads.
pub struct Installer {
    python: String,
    install_timeout: Duration,
    script_dir: PathBuf,
    agent: ureq::Agent,
    quiet: bool,
}

impl Installer {
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.download_timeout)
            .user_agent(USER_AGENT)
            .build();

        Installer {
            python: config.python.clone(),
            install_timeout: config.install_timeout,
            script_dir: config.script_dir(),
            agent,
            quiet: false,
        }
    }

    /// Suppress the red failure line (diagnostics still go to `tracing`).
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    /// Run an action, surfacing the underlying error.
    pub fn try_install(&self, action: &InstallAction) -> Result<(), InstallError> {
        match action {
            InstallAction::Package { .. } | InstallAction::SourceControl { .. } => {
                let argv = action.argv().ok_or(InstallError::EmptyCommand)?;
                run_command(&argv, self.install_timeout)
            }
            InstallAction::Archive { url } => self.install_archive(url),
            InstallAction::Script { url } => self.install_script(url),
        }
    }

    fn install_archive(&self, url: &str) -> Result<(), InstallError> {
        let workdir = tempfile::Builder::new().prefix("autoload-").tempdir()?;
        let file_name = file_name_from_url(url);
        let downloaded = workdir.path().join(&file_name);
        self.download(url, &mut fs::File::create(&downloaded)?)?;

        let format = ArchiveFormat::from_name(&file_name).ok_or_else(|| {
            InstallError::Archive(format!("Unsupported archive type: {}", file_name))
        })?;
        let extracted = workdir.path().join("extracted");
        archive::extract(&downloaded, format, &extracted)?;

        if let Some(build_root) = archive::find_build_root(&extracted) {
            tracing::debug!(path = %build_root.display(), "installing extracted project");
            let argv = vec![
                self.python.clone(),
                "-m".to_string(),
                "pip".to_string(),
                "install".to_string(),
                build_root.to_string_lossy().into_owned(),
            ];
            return run_command(&argv, self.install_timeout);
        }

        let content = archive::content_root(&extracted)?;
        tracing::debug!(
            from = %content.display(),
            to = %self.script_dir.display(),
            "no build descriptor, copying sources"
        );
        fs::create_dir_all(&self.script_dir)?;
        archive::copy_tree(&content, &self.script_dir)
    }

    fn install_script(&self, url: &str) -> Result<(), InstallError> {
        fs::create_dir_all(&self.script_dir)?;
        let target = self.script_target(url);

        // Only a complete download replaces the target
        let mut partial = tempfile::NamedTempFile::new_in(&self.script_dir)?;
        self.download(url, partial.as_file_mut())?;
        partial.persist(&target).map_err(|e| InstallError::Io(e.error))?;
        Ok(())
    }

    /// Where a downloaded script lands, named after the module it provides.
    fn script_target(&self, url: &str) -> PathBuf {
        self.script_dir.join(format!("{}.py", source::url_stem(url)))
    }

    /// Stream the body of `url` into `dest`.
    fn download(&self, url: &str, dest: &mut impl Write) -> Result<(), InstallError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| InstallError::Download {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let mut reader = response.into_reader();
        io::copy(&mut reader, dest).map_err(|e| InstallError::Download {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

impl Install for Installer {
    fn install(&self, action: &InstallAction) -> bool {
        match self.try_install(action) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%action, error = %e, "install failed");
                if !self.quiet {
                    eprintln!("  {} {}", "install failed:".red(), e);
                }
                false
            }
        }
    }
}

/// Run a command to completion or until `timeout`, killing it on expiry.
pub fn run_command(argv: &[String], timeout: Duration) -> Result<(), InstallError> {
    let (program, args) = argv.split_first().ok_or(InstallError::EmptyCommand)?;

    // stderr goes to a file so a chatty process cannot block on a full pipe
    let mut stderr_file = tempfile::tempfile()?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr_file.try_clone()?))
        .spawn()
        .map_err(|source| InstallError::Spawn {
            program: program.clone(),
            source,
        })?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(InstallError::Timeout {
                program: program.clone(),
                secs: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    if status.success() {
        return Ok(());
    }

    Err(InstallError::ExitStatus {
        program: program.clone(),
        status: status.to_string(),
        stderr: read_tail(&mut stderr_file),
    })
}

fn read_tail(file: &mut fs::File) -> String {
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let start = len.saturating_sub(STDERR_TAIL);
    let mut tail = String::new();
    if file.seek(SeekFrom::Start(start)).is_ok() {
        let mut bytes = Vec::new();
        if file.read_to_end(&mut bytes).is_ok() {
            tail = String::from_utf8_lossy(&bytes).trim().to_string();
        }
    }
    tail
}

/// Last path segment of a URL, without query or fragment.
fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if name.is_empty() || name.contains(':') {
        "download".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.org/dist/pkg-1.0.tar.gz?sig=abc"),
            "pkg-1.0.tar.gz"
        );
        assert_eq!(file_name_from_url("https://example.org/raw/tool.py#L1"), "tool.py");
        assert_eq!(file_name_from_url("https://example.org/"), "download");
    }

    #[test]
    fn test_script_saved_under_import_name() {
        let installer = Installer::new(&Config::default());
        for url in [
            "https://example.org/raw/my-helpers.py",
            "https://example.org/raw/tool-2.1.py?raw=1",
            "https://example.org/raw/plain.py",
        ] {
            let target = installer.script_target(url);
            let import_name = source::classify(url, |_| false).import_name('.');
            assert_eq!(target.extension().and_then(|e| e.to_str()), Some("py"));
            assert_eq!(
                target.file_stem().and_then(|s| s.to_str()),
                Some(import_name.as_str()),
                "script from {}",
                url
            );
            assert!(target.starts_with(installer.script_dir()));
        }
    }

    #[test]
    fn test_empty_command() {
        let err = run_command(&[], Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, InstallError::EmptyCommand));
    }

    #[test]
    fn test_missing_program() {
        let err = run_command(
            &argv(&["/nonexistent/bin/autoload-pip"]),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, InstallError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_success_and_failure_status() {
        assert!(run_command(&argv(&["true"]), Duration::from_secs(5)).is_ok());

        let err = run_command(
            &argv(&["sh", "-c", "echo 'no matching distribution' >&2; exit 1"]),
            Duration::from_secs(5),
        )
        .unwrap_err();
        match err {
            InstallError::ExitStatus { stderr, .. } => {
                assert!(stderr.contains("no matching distribution"))
            }
            other => panic!("Expected exit status error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let started = Instant::now();
        let err = run_command(&argv(&["sleep", "5"]), Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, InstallError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_install_reports_bool() {
        let installer = Installer::new(&Config::default()).quiet(true);
        let ok = InstallAction::Package {
            command: argv(&["sh", "-c", "exit 0"]),
            package: "pkg".to_string(),
        };
        let failing = InstallAction::Package {
            command: argv(&["sh", "-c", "exit 3"]),
            package: "pkg".to_string(),
        };
        assert!(installer.install(&ok));
        assert!(!installer.install(&failing));
    }

    #[test]
    fn test_unreachable_download_is_false() {
        let mut config = Config::default();
        config.download_timeout = Duration::from_millis(500);
        let dir = tempfile::tempdir().unwrap();
        config.home = dir.path().to_path_buf();

        let installer = Installer::new(&config).quiet(true);
        let action = InstallAction::Script {
            url: "http://127.0.0.1:9/tool.py".to_string(),
        };
        assert!(!installer.install(&action));
    }
}
