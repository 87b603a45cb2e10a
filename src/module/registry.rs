//! Registry table: named sources and how to install from them.
//!
//! Public registries are fixed at construction. Private registries may be
//! added or reconfigured at any time; the last write for a name wins.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use super::source::{classify, Source, SourceKind, VcsHost};

/// Name of the public package index registry.
pub const PUBLIC_INDEX: &str = "pypi";

/// Whether a registry is a built-in public one or a configurable private one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Describes one registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryDescriptor {
    pub name: String,
    pub description: String,
    /// Install command prefix; the package target is appended
    pub install_command: Option<Vec<String>>,
    pub index_url: Option<String>,
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub visibility: Visibility,
}

impl RegistryDescriptor {
    /// A private descriptor with only a description.
    pub fn private(name: impl Into<String>, description: impl Into<String>) -> Self {
        RegistryDescriptor {
            name: name.into(),
            description: description.into(),
            install_command: None,
            index_url: None,
            base_url: None,
            token: None,
            visibility: Visibility::Private,
        }
    }

    pub fn with_install_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.install_command = Some(command.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = Some(url.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// How to acquire missing code.
#[derive(Clone, PartialEq, Eq)]
pub enum InstallAction {
    /// Run the package manager with a package target
    Package {
        command: Vec<String>,
        package: String,
    },
    /// Run the package manager with a version-control URL target
    SourceControl {
        command: Vec<String>,
        repo_url: String,
        token: Option<String>,
    },
    /// Download, extract, and install an archive
    Archive { url: String },
    /// Download a single script into the script directory
    Script { url: String },
}

impl InstallAction {
    /// Full argument vector for process actions, with any token embedded.
    pub fn argv(&self) -> Option<Vec<String>> {
        match self {
            InstallAction::Package { command, package } => {
                let mut argv = command.clone();
                argv.push(package.clone());
                Some(argv)
            }
            InstallAction::SourceControl {
                command,
                repo_url,
                token,
            } => {
                let mut argv = command.clone();
                argv.push(vcs_target(repo_url, token.as_deref()));
                Some(argv)
            }
            InstallAction::Archive { .. } | InstallAction::Script { .. } => None,
        }
    }
}

// Tokens must never reach logs.
impl fmt::Display for InstallAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallAction::Package { command, package } => {
                write!(f, "{} {}", command.join(" "), package)
            }
            InstallAction::SourceControl {
                command,
                repo_url,
                token,
            } => {
                let redacted = token.as_ref().map(|_| "***");
                write!(f, "{} {}", command.join(" "), vcs_target(repo_url, redacted))
            }
            InstallAction::Archive { url } => write!(f, "download archive {}", url),
            InstallAction::Script { url } => write!(f, "download script {}", url),
        }
    }
}

impl fmt::Debug for InstallAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstallAction({})", self)
    }
}

/// Build a `git+https://...` target, embedding a token when given.
fn vcs_target(repo_url: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => format!(
            "git+{}",
            repo_url.replacen("https://", &format!("https://oauth2:{}@", token), 1)
        ),
        None => format!("git+{}", repo_url),
    }
}

/// Public and private registries.
#[derive(Debug, Clone)]
pub struct RegistryTable {
    /// Package manager invocation prefix (`python -m pip install`)
    pip: Vec<String>,
    public: IndexMap<String, RegistryDescriptor>,
    private: IndexMap<String, RegistryDescriptor>,
}

impl RegistryTable {
    /// Built-in registries for the given interpreter.
    ///
    /// `default_token` seeds the `private_gitlab` registry.
    pub fn new(python: &str, default_token: Option<String>) -> Self {
        let pip: Vec<String> = [python, "-m", "pip", "install"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut public = IndexMap::new();
        let builtins = [
            (
                PUBLIC_INDEX,
                "PyPI - Official Python Package Index",
                Some(pip.clone()),
            ),
            ("github", "GitHub repositories", Some(pip.clone())),
            ("gitlab", "GitLab repositories", Some(pip.clone())),
            ("url", "Direct URL download", None),
            ("local", "Local files and directories", None),
        ];
        for (name, description, command) in builtins {
            public.insert(
                name.to_string(),
                RegistryDescriptor {
                    name: name.to_string(),
                    description: description.to_string(),
                    install_command: command,
                    index_url: None,
                    base_url: None,
                    token: None,
                    visibility: Visibility::Public,
                },
            );
        }

        let mut table = RegistryTable {
            pip,
            public,
            private: IndexMap::new(),
        };

        let company = RegistryDescriptor::private("company", "Company private PyPI")
            .with_install_command(table.index_command())
            .with_index_url("https://pypi.company.com/simple/");
        table.add_registry("company", company);

        let mut gitlab = RegistryDescriptor::private("private_gitlab", "Private GitLab with token")
            .with_base_url("https://gitlab.company.com/");
        gitlab.token = default_token;
        table.add_registry("private_gitlab", gitlab);

        table
    }

    fn index_command(&self) -> Vec<String> {
        let mut command = self.pip.clone();
        command.push("--index-url".to_string());
        command
    }

    /// Insert or replace a private registry.
    pub fn add_registry(&mut self, name: &str, mut descriptor: RegistryDescriptor) {
        descriptor.name = name.to_string();
        descriptor.visibility = Visibility::Private;
        self.private.insert(name.to_string(), descriptor);
    }

    /// Quick private registry configuration. Replaces any previous entry.
    pub fn configure_private_registry(
        &mut self,
        name: &str,
        index_url: Option<&str>,
        token: Option<&str>,
        base_url: Option<&str>,
    ) {
        let mut descriptor =
            RegistryDescriptor::private(name, format!("Private registry: {}", name));
        if let Some(url) = index_url {
            descriptor = descriptor
                .with_index_url(url)
                .with_install_command(self.index_command());
        }
        if let Some(token) = token {
            descriptor = descriptor.with_token(token);
        }
        if let Some(url) = base_url {
            descriptor = descriptor.with_base_url(url);
        }
        self.add_registry(name, descriptor);
    }

    pub fn is_private(&self, name: &str) -> bool {
        self.private.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&RegistryDescriptor> {
        self.public.get(name).or_else(|| self.private.get(name))
    }

    /// Public descriptors, then private ones, each in insertion order.
    pub fn list(&self) -> Vec<&RegistryDescriptor> {
        self.public.values().chain(self.private.values()).collect()
    }

    /// Classify a name against this table's private registries.
    pub fn classify(&self, name: &str) -> Source {
        classify(name, |segment| self.is_private(segment))
    }

    /// Apply an explicit registry choice to a classified source.
    ///
    /// Public names win over private ones. Unknown names are logged and the
    /// detected source is kept.
    pub fn with_registry(&self, source: Source, raw_name: &str, registry: Option<&str>) -> Source {
        match registry {
            Some(registry) => self
                .override_source(registry, &source, raw_name)
                .unwrap_or(source),
            None => source,
        }
    }

    /// Map a classified source to an install action.
    ///
    /// Returns `None` when no installation is meaningful.
    pub fn resolve_install_action(&self, source: &Source) -> Option<InstallAction> {
        match &source.kind {
            SourceKind::Local => None,
            SourceKind::Index => Some(InstallAction::Package {
                command: self.pip.clone(),
                package: source.name.clone(),
            }),
            SourceKind::SourceControl(host) => {
                let repo_url = if source.name.starts_with("https://") {
                    source.name.clone()
                } else {
                    format!("https://{}/{}", host.domain(), source.name)
                };
                let token = match host {
                    VcsHost::GitLab => self
                        .private
                        .get("private_gitlab")
                        .and_then(|d| d.token.clone()),
                    VcsHost::GitHub => None,
                };
                Some(InstallAction::SourceControl {
                    command: self.pip.clone(),
                    repo_url,
                    token,
                })
            }
            SourceKind::PrivateRegistry(name) => {
                let descriptor = self.private.get(name)?;
                self.private_action(descriptor, &source.name)
            }
            SourceKind::Url => Some(url_action(&source.name, &self.pip)),
        }
    }

    fn override_source(&self, registry: &str, source: &Source, raw_name: &str) -> Option<Source> {
        let kind = match registry {
            PUBLIC_INDEX => SourceKind::Index,
            "github" => SourceKind::SourceControl(VcsHost::GitHub),
            "gitlab" => SourceKind::SourceControl(VcsHost::GitLab),
            "url" => SourceKind::Url,
            "local" => SourceKind::Local,
            _ if self.is_private(registry) => {
                return Some(Source {
                    kind: SourceKind::PrivateRegistry(registry.to_string()),
                    name: raw_name.to_string(),
                });
            }
            _ => {
                tracing::warn!(registry, "unknown registry, using detected source");
                return None;
            }
        };

        // Keep the normalized name when the override agrees with detection
        let name = if kind == source.kind {
            source.name.clone()
        } else {
            raw_name.to_string()
        };
        Some(Source { kind, name })
    }

    fn private_action(&self, descriptor: &RegistryDescriptor, package: &str) -> Option<InstallAction> {
        if let Some(index_url) = &descriptor.index_url {
            let mut command = descriptor
                .install_command
                .clone()
                .unwrap_or_else(|| self.index_command());
            command.push(index_url.clone());
            return Some(InstallAction::Package {
                command,
                package: package.to_string(),
            });
        }

        if let Some(base_url) = &descriptor.base_url {
            let repo_url = format!("{}/{}", base_url.trim_end_matches('/'), package);
            return Some(InstallAction::SourceControl {
                command: descriptor
                    .install_command
                    .clone()
                    .unwrap_or_else(|| self.pip.clone()),
                repo_url,
                token: descriptor.token.clone(),
            });
        }

        descriptor
            .install_command
            .clone()
            .map(|command| InstallAction::Package {
                command,
                package: package.to_string(),
            })
    }
}

fn url_action(url: &str, pip: &[String]) -> InstallAction {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".tar.gz") || path.ends_with(".tgz") || path.ends_with(".zip") {
        InstallAction::Archive {
            url: url.to_string(),
        }
    } else if path.ends_with(".py") {
        InstallAction::Script {
            url: url.to_string(),
        }
    } else {
        InstallAction::Package {
            command: pip.to_vec(),
            package: url.to_string(),
        }
    }
}
