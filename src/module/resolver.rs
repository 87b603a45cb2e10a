//! The `load` operation.
//!
//! Resolution tries, in order and stopping at the first success:
//! 1. the module cache (skipped when forcing a reload)
//! 2. a local script file (terminal: local sources are never installed)
//! 3. a direct import through the host
//! 4. installation followed by exactly one more import
//!
//! Every handle produced is cached under its alias, or the requested name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;

use super::aliases;
use super::cache::{Info, ModuleCache, PrintSettings};
use super::credentials::load_credentials;
use super::host::{Handle, Host, Module, PythonHost};
use super::installer::{Install, Installer};
use super::registry::{RegistryDescriptor, RegistryTable, PUBLIC_INDEX};
use super::source::{self, SourceKind};
use crate::config::Config;
use crate::error::{Cause, ConfigError, HostError, LoadError};
use crate::present::{self, LoadOrigin};

/// Options for a single load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Cache key to use instead of the requested name
    pub alias: Option<String>,
    /// Registry to install from, overriding detection
    pub registry: Option<String>,
    /// Install when the name cannot be imported
    pub install: bool,
    /// Bypass the cache and replace its entry
    pub force: bool,
    /// Suppress notices and auto-print
    pub silent: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            alias: None,
            registry: None,
            install: true,
            force: false,
            silent: false,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn install(mut self, install: bool) -> Self {
        self.install = install;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    fn with_alias(self, alias: Option<&str>) -> Self {
        match alias {
            Some(alias) => self.alias(alias),
            None => self,
        }
    }
}

/// Resolves names to loaded modules, installing them when missing.
///
/// Owns the cache and registry table; share it behind a mutex if several
/// threads need to load.
pub struct Resolver<H: Host = PythonHost, I: Install = Installer> {
    host: H,
    installer: I,
    cache: ModuleCache,
    registries: RegistryTable,
}

impl Resolver<PythonHost, Installer> {
    /// A resolver driving the configured interpreter.
    ///
    /// Private registries from the credentials file are registered, and the
    /// default private token is read from `config.token_env`.
    pub fn new(config: &Config) -> Self {
        let installer = Installer::new(config);
        let host = PythonHost::new(config.python.clone()).with_search_dir(config.script_dir());

        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|token| !token.is_empty());
        let mut registries = RegistryTable::new(&config.python, token);
        for descriptor in load_credentials(&config.credentials_path()) {
            let name = descriptor.name.clone();
            tracing::debug!(registry = %name, "registered private registry from credentials");
            registries.add_registry(&name, descriptor);
        }

        let settings = PrintSettings {
            auto_print: config.auto_print,
            print_limit: config.print_limit,
        };
        Resolver::with_parts(host, installer, registries, settings)
    }

    /// A resolver configured from `AUTOLOAD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Resolver::new(&Config::from_env()?))
    }
}

impl<H: Host, I: Install> Resolver<H, I> {
    pub fn with_parts(
        host: H,
        installer: I,
        registries: RegistryTable,
        settings: PrintSettings,
    ) -> Self {
        Resolver {
            host,
            installer,
            cache: ModuleCache::new(settings),
            registries,
        }
    }

    /// Load a name with default options.
    pub fn load(&mut self, name: &str) -> Result<Handle, LoadError> {
        self.load_with(name, &LoadOptions::default())
    }

    /// Load a name.
    pub fn load_with(&mut self, name: &str, options: &LoadOptions) -> Result<Handle, LoadError> {
        self.resolve(name, options, source::is_local(name))
    }

    /// Load a repository from a source-control host (`user/repo` or a
    /// host-qualified path).
    pub fn load_from_source_control(
        &mut self,
        repo: &str,
        alias: Option<&str>,
    ) -> Result<Handle, LoadError> {
        let mut options = LoadOptions::default().with_alias(alias);
        if !matches!(self.registries.classify(repo).kind, SourceKind::SourceControl(_)) {
            options = options.registry("github");
        }
        self.load_with(repo, &options)
    }

    /// Load a package from an index; `registry` defaults to the public one.
    pub fn load_from_index(
        &mut self,
        package: &str,
        alias: Option<&str>,
        registry: Option<&str>,
    ) -> Result<Handle, LoadError> {
        let options = LoadOptions::default()
            .with_alias(alias)
            .registry(registry.unwrap_or(PUBLIC_INDEX));
        self.load_with(package, &options)
    }

    /// Load from a raw URL (archive, wheel, or single script).
    pub fn load_from_url(&mut self, url: &str, alias: Option<&str>) -> Result<Handle, LoadError> {
        self.load_with(url, &LoadOptions::default().with_alias(alias))
    }

    /// Load a local script, whatever its path looks like.
    pub fn load_from_local_path(
        &mut self,
        path: &str,
        alias: Option<&str>,
    ) -> Result<Handle, LoadError> {
        self.resolve(path, &LoadOptions::default().with_alias(alias), true)
    }

    /// Load by short name (`np`, `pd`, `plt`, ...), falling back to the name
    /// itself.
    pub fn get(&mut self, short: &str) -> Result<Handle, LoadError> {
        let (name, alias) = aliases::expand(short);
        self.load_with(name, &LoadOptions::default().with_alias(alias))
    }

    /// Silently load every name, stopping at the first failure.
    pub fn require(&mut self, names: &[&str]) -> Result<Vec<Handle>, LoadError> {
        let options = LoadOptions::default().silent(true);
        names
            .iter()
            .map(|name| self.load_with(name, &options))
            .collect()
    }

    fn resolve(&mut self, name: &str, options: &LoadOptions, local: bool) -> Result<Handle, LoadError> {
        let key = options.alias.as_deref().unwrap_or(name);

        if !options.force {
            if let Some(handle) = self.cache.get(key) {
                tracing::debug!(key, "cache hit");
                self.show(&handle, key, LoadOrigin::Cached, options.silent);
                return Ok(handle);
            }
        } else if self.cache.contains(key) {
            self.notice(options.silent, &format!("Reloading {}", key));
        }

        if local {
            return self.load_local(name, key, options.silent);
        }

        let separator = self.host.separator();
        let module_path = name.replace('/', &separator.to_string());
        let import_error = match self.host.import(&module_path) {
            Ok(module) => return Ok(self.store(key, module, LoadOrigin::Resolved, options.silent)),
            Err(e) => e,
        };
        tracing::debug!(name, error = %import_error, "direct import failed");

        if !options.install {
            return Err(LoadError::not_found(name, Cause::Host(import_error)));
        }

        let source = self.registries.classify(name);
        let source = self
            .registries
            .with_registry(source, name, options.registry.as_deref());
        let Some(action) = self.registries.resolve_install_action(&source) else {
            return Err(LoadError::not_found(name, Cause::NoInstallAction));
        };

        self.notice(
            options.silent,
            &format!("Installing {} from {}...", name, source.kind),
        );
        if !self.installer.install(&action) {
            return Err(LoadError::not_found(name, Cause::InstallFailed));
        }

        let retry_path = source.import_name(separator);
        match self.host.import(&retry_path) {
            Ok(module) => Ok(self.store(key, module, LoadOrigin::Installed, options.silent)),
            Err(e) => Err(LoadError::not_found(name, Cause::StillMissing(e))),
        }
    }

    fn load_local(&mut self, name: &str, key: &str, silent: bool) -> Result<Handle, LoadError> {
        let Some(path) = find_script(Path::new(name)) else {
            return Err(LoadError::not_found(
                name,
                Cause::Host(HostError::MissingFile(PathBuf::from(name))),
            ));
        };

        let module_name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("module")
            .to_string();

        match self.host.exec_file(&path, &module_name) {
            Ok(module) => Ok(self.store(key, module, LoadOrigin::Local, silent)),
            Err(e) => Err(LoadError::not_found(name, Cause::Host(e))),
        }
    }

    fn store(&mut self, key: &str, module: Module, origin: LoadOrigin, silent: bool) -> Handle {
        let handle = Arc::new(module);
        self.cache.put(key, Arc::clone(&handle));
        self.show(&handle, key, origin, silent);
        handle
    }

    fn show(&self, handle: &Handle, key: &str, origin: LoadOrigin, silent: bool) {
        if !silent {
            present::present(&**handle, &origin.label(key), self.cache.settings());
        }
    }

    fn notice(&self, silent: bool, message: &str) {
        tracing::debug!("{}", message);
        if !silent {
            println!("{} {}", "→".cyan(), message);
        }
    }

    pub fn enable_auto_print(&mut self) {
        self.cache.settings_mut().auto_print = true;
        tracing::debug!("auto-print enabled");
    }

    pub fn disable_auto_print(&mut self) {
        self.cache.settings_mut().auto_print = false;
        tracing::debug!("auto-print disabled");
    }

    pub fn set_print_limit(&mut self, limit: usize) {
        self.cache.settings_mut().print_limit = limit;
    }

    /// Snapshot of the cache and print settings.
    pub fn info(&self) -> Info {
        self.cache.snapshot()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.contains(key)
    }

    pub fn add_registry(&mut self, name: &str, descriptor: RegistryDescriptor) {
        self.registries.add_registry(name, descriptor);
    }

    pub fn configure_private_registry(
        &mut self,
        name: &str,
        index_url: Option<&str>,
        token: Option<&str>,
        base_url: Option<&str>,
    ) {
        self.registries
            .configure_private_registry(name, index_url, token, base_url);
    }

    pub fn list_registries(&self) -> Vec<RegistryDescriptor> {
        self.registries.list().into_iter().cloned().collect()
    }

    pub fn registries(&self) -> &RegistryTable {
        &self.registries
    }
}

/// Locate a script, trying the path as given and then with `.py` appended.
fn find_script(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let with_ext = path.with_extension("py");
    if with_ext.is_file() {
        return Some(with_ext);
    }
    None
}
