//! Source classification: decide where a bare name's code comes from.

use std::fmt;

use serde::Serialize;

/// Suffixes marking a name as a local script file.
pub const LOCAL_SUFFIXES: &[&str] = &[".py"];

/// Archive extensions stripped when deriving an import name from a URL.
const ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".zip", ".whl", ".py"];

/// Supported source-control hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VcsHost {
    GitHub,
    GitLab,
}

impl VcsHost {
    pub const ALL: [VcsHost; 2] = [VcsHost::GitHub, VcsHost::GitLab];

    pub fn domain(self) -> &'static str {
        match self {
            VcsHost::GitHub => "github.com",
            VcsHost::GitLab => "gitlab.com",
        }
    }

    /// Public registry name describing this host.
    pub fn registry(self) -> &'static str {
        match self {
            VcsHost::GitHub => "github",
            VcsHost::GitLab => "gitlab",
        }
    }
}

/// Where a name's code should be acquired from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SourceKind {
    /// Raw URL (contains `://`)
    Url,
    /// Local script file
    Local,
    /// Public package index
    Index,
    /// Repository on a source-control host
    SourceControl(VcsHost),
    /// Named private registry
    PrivateRegistry(String),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Url => write!(f, "url"),
            SourceKind::Local => write!(f, "local"),
            SourceKind::Index => write!(f, "pypi"),
            SourceKind::SourceControl(host) => write!(f, "{}", host.registry()),
            SourceKind::PrivateRegistry(name) => write!(f, "{}", name),
        }
    }
}

/// A classified name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub kind: SourceKind,
    /// Normalized name (registry prefix or host domain removed)
    pub name: String,
}

impl Source {
    fn new(kind: SourceKind, name: impl Into<String>) -> Self {
        Source {
            kind,
            name: name.into(),
        }
    }

    /// The module path to import once this source has been installed.
    pub fn import_name(&self, separator: char) -> String {
        match &self.kind {
            SourceKind::Index | SourceKind::PrivateRegistry(_) | SourceKind::Local => {
                self.name.replace('/', &separator.to_string())
            }
            SourceKind::SourceControl(_) => {
                let repo = self.name.rsplit('/').next().unwrap_or(&self.name);
                repo.replace('-', "_")
            }
            SourceKind::Url => url_stem(&self.name),
        }
    }
}

/// Classify a name. First matching rule wins.
///
/// `is_private` reports whether a path segment names a registered private
/// registry.
pub fn classify(name: &str, is_private: impl Fn(&str) -> bool) -> Source {
    if name.contains("://") {
        return Source::new(SourceKind::Url, name);
    }

    if is_local(name) {
        return Source::new(SourceKind::Local, name);
    }

    if name.contains('/') {
        let parts: Vec<&str> = name.split('/').collect();

        if is_private(parts[0]) {
            let rest = name.split_once('/').map(|(_, rest)| rest).unwrap_or("");
            return Source::new(SourceKind::PrivateRegistry(parts[0].to_string()), rest);
        }

        for host in VcsHost::ALL {
            if let Some(pos) = name.find(host.domain()) {
                let path = name[pos + host.domain().len()..].trim_start_matches('/');
                let path = path.strip_suffix(".git").unwrap_or(path);
                return Source::new(SourceKind::SourceControl(host), path);
            }
        }

        // "user/repo" shorthand
        if parts.len() == 2 && !parts[0].contains('.') {
            return Source::new(SourceKind::SourceControl(VcsHost::GitHub), name);
        }

        return Source::new(SourceKind::Index, name);
    }

    Source::new(SourceKind::Index, name)
}

/// Whether a name refers to a local script file.
///
/// URLs are never local, whatever their suffix.
pub fn is_local(name: &str) -> bool {
    if name.contains("://") {
        return false;
    }
    LOCAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        || name.starts_with("./")
        || name.starts_with("../")
}

/// Derive a module name from the last segment of a URL.
///
/// This is both the import name after installing from the URL and the file
/// stem a downloaded script is saved under.
pub fn url_stem(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);

    let mut stem = file;
    for suffix in ARCHIVE_SUFFIXES {
        if let Some(stripped) = stem.strip_suffix(suffix) {
            stem = stripped;
            break;
        }
    }

    // Strip a "-1.2.3" version suffix from sdist names
    if let Some(pos) = version_suffix(stem) {
        stem = &stem[..pos];
    }

    stem.replace('-', "_")
}

/// Position of the `-` starting a version suffix: digits followed by a `.`
/// or the end of the name.
fn version_suffix(stem: &str) -> Option<usize> {
    stem.match_indices('-').map(|(pos, _)| pos).find(|&pos| {
        let rest = &stem[pos + 1..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        digits > 0 && matches!(rest.as_bytes().get(digits).copied(), None | Some(b'.'))
    })
}
