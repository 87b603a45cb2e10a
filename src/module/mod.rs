//! Module resolution and loading.
//!
//! This module provides:
//! - Source classification of bare names
//! - The module cache
//! - Public and private registries
//! - Installation of missing code
//! - The resolver tying them together

pub mod aliases;
pub mod archive;
pub mod cache;
pub mod credentials;
pub mod host;
pub mod installer;
pub mod registry;
mod resolver;
pub mod source;

pub use cache::{Info, ModuleCache, PrintSettings};
pub use host::{Handle, Host, Module, ModuleKind, PythonHost};
pub use installer::{Install, Installer};
pub use registry::{InstallAction, RegistryDescriptor, RegistryTable, Visibility};
pub use resolver::{LoadOptions, Resolver};
pub use source::{classify, Source, SourceKind, VcsHost};
