//! Autoload: resolve a bare name to loaded code, installing it when missing.
//!
//! This is the library root that exports all modules.
//!
//! # Resolution
//!
//! A name is looked up in order:
//! - **Cache**: names already loaded, keyed by alias or name
//! - **Local file**: scripts referenced by path
//! - **Host import**: anything the interpreter can already import
//! - **Install**: index packages, source-control repos, private registries, URLs

#![allow(clippy::result_large_err)]
#![allow(clippy::new_without_default)]

pub mod config;
pub mod error;
pub mod module;
pub mod present;

pub use config::Config;
pub use error::{Cause, LoadError};
pub use module::{Handle, LoadOptions, Module, Resolver};
