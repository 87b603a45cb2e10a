//! Human-readable summaries of loaded values.
//!
//! Anything printable implements [`Describe`], which reduces it to one of a
//! closed set of [`Shape`]s. [`render`] turns a shape into text honoring the
//! auto-print settings.

use std::fmt::Display;

use colored::Colorize;

use crate::module::cache::PrintSettings;
use crate::module::host::{Module, ModuleKind};

/// Collections longer than this are summarized instead of listed.
const COLLECTION_THRESHOLD: usize = 10;

/// Number of items or attributes shown in a summary.
const PREVIEW_ITEMS: usize = 5;

/// The describable shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Something with a status code, e.g. an HTTP response
    Status {
        code: u16,
        url: String,
        body: Option<String>,
    },
    /// Tabular data
    Table { rows: usize, columns: usize },
    /// Sized collection
    Collection { len: usize, items: Vec<String> },
    Scalar(String),
    /// Named type with public attributes
    Record {
        type_name: String,
        attributes: Vec<String>,
    },
    Opaque { type_name: String },
}

/// Reduce a value to a [`Shape`].
pub trait Describe {
    fn describe(&self) -> Shape;
}

/// How a handle was obtained, shown next to its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    Cached,
    Resolved,
    Installed,
    Local,
}

impl LoadOrigin {
    pub fn label(self, key: &str) -> String {
        match self {
            LoadOrigin::Cached => format!("{} (cached)", key),
            LoadOrigin::Installed => format!("{} (installed)", key),
            LoadOrigin::Resolved | LoadOrigin::Local => key.to_string(),
        }
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Render a shape under `label`. Returns `None` when auto-print is off.
pub fn render(shape: &Shape, label: &str, settings: PrintSettings) -> Option<String> {
    if !settings.auto_print {
        return None;
    }
    let limit = settings.print_limit;

    let text = match shape {
        Shape::Status { code, url, body } => {
            let mut text = format!("{}: {} - {}", label, code, url);
            if let Some(body) = body {
                text.push_str(&format!("\nJSON: {}", truncate(body, limit)));
            }
            text
        }
        Shape::Table { rows, columns } => format!("{}: shape ({}, {})", label, rows, columns),
        Shape::Collection { len, items } if *len > COLLECTION_THRESHOLD => {
            let preview: Vec<&str> = items.iter().take(PREVIEW_ITEMS).map(String::as_str).collect();
            format!("{}: {} items\nFirst 5: [{}]...", label, len, preview.join(", "))
        }
        Shape::Collection { items, .. } => {
            format!("{}: {}", label, truncate(&format!("[{}]", items.join(", ")), limit))
        }
        Shape::Scalar(value) => format!("{}: {}", label, truncate(value, limit)),
        Shape::Record {
            type_name,
            attributes,
        } => {
            let preview: Vec<&str> = attributes
                .iter()
                .take(PREVIEW_ITEMS)
                .map(String::as_str)
                .collect();
            format!("{}: {} with [{}]...", label, type_name, preview.join(", "))
        }
        Shape::Opaque { type_name } => format!("{}: {} loaded", label, type_name),
    };

    Some(text)
}

/// Print a value's summary to stdout, if auto-print is on.
pub fn present(value: &dyn Describe, label: &str, settings: PrintSettings) {
    if let Some(text) = render(&value.describe(), label, settings) {
        println!("{} {}", "✓".green(), text);
    }
}

impl Describe for Module {
    fn describe(&self) -> Shape {
        let type_name = match self.kind {
            ModuleKind::Builtin => "builtin module",
            ModuleKind::Package => "module",
            ModuleKind::Script => "script",
        };
        if self.exports.is_empty() {
            Shape::Opaque {
                type_name: type_name.to_string(),
            }
        } else {
            Shape::Record {
                type_name: type_name.to_string(),
                attributes: self.exports.clone(),
            }
        }
    }
}

impl Describe for str {
    fn describe(&self) -> Shape {
        Shape::Scalar(self.to_string())
    }
}

impl Describe for String {
    fn describe(&self) -> Shape {
        Shape::Scalar(self.clone())
    }
}

macro_rules! describe_scalar {
    ($($ty:ty),*) => {
        $(impl Describe for $ty {
            fn describe(&self) -> Shape {
                Shape::Scalar(self.to_string())
            }
        })*
    };
}

describe_scalar!(bool, i32, i64, u32, u64, usize, f32, f64);

impl<T: Display> Describe for Vec<T> {
    fn describe(&self) -> Shape {
        Shape::Collection {
            len: self.len(),
            items: self.iter().map(|item| item.to_string()).collect(),
        }
    }
}

impl Describe for serde_json::Value {
    fn describe(&self) -> Shape {
        use serde_json::Value;
        match self {
            Value::Array(items) => Shape::Collection {
                len: items.len(),
                items: items.iter().map(|v| v.to_string()).collect(),
            },
            Value::Object(map) if map.len() > COLLECTION_THRESHOLD => Shape::Record {
                type_name: "object".to_string(),
                attributes: map.keys().cloned().collect(),
            },
            Value::String(s) => Shape::Scalar(s.clone()),
            other => Shape::Scalar(other.to_string()),
        }
    }
}
