//! # Printer Registry
//!
//! Maps a value's static type name to the printer that understands it.
//!
//! `QString` matches exactly; the generic containers match any
//! instantiation (`QVector<int>`, `QList<QVector<int>>`, …). Matching is
//! tolerant of the spelling differences debug info produces: whitespace
//! inside template argument lists, `const` qualification, and reference
//! decoration are all ignored.

use once_cell::sync::Lazy;
use tracing::trace;

use crate::resolver::normalized;

/// Which printer handles a matched type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterKind
{
    /// [`crate::printers::QStringPrinter`]
    String,
    /// [`crate::printers::QVectorPrinter`]
    Vector,
    /// [`crate::printers::QListPrinter`]
    List,
    /// [`crate::printers::QMapPrinter`]
    Map,
}

#[derive(Debug, Clone)]
struct Entry
{
    name: String,
    /// Exact name match when false; `name<…>` instantiation match when true.
    template: bool,
    kind: PrinterKind,
}

/// Name-to-printer dispatch table
///
/// ## Example
///
/// ```rust
/// use quarry_core::registry::{PrinterKind, Registry};
///
/// let registry = Registry::qt5();
/// assert_eq!(registry.find("QMap<int, QString>"), Some(PrinterKind::Map));
/// assert_eq!(registry.find("QRect"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registry
{
    entries: Vec<Entry>,
}

impl Registry
{
    /// Create an empty registry
    pub fn new() -> Self
    {
        Self::default()
    }

    /// The standard Qt5 table: all four container printers
    pub fn qt5() -> Self
    {
        let mut registry = Self::new();
        registry.register_exact("QString", PrinterKind::String);
        registry.register_template("QVector", PrinterKind::Vector);
        registry.register_template("QList", PrinterKind::List);
        registry.register_template("QMap", PrinterKind::Map);
        registry
    }

    /// Register a printer for an exact type name
    pub fn register_exact(&mut self, name: &str, kind: PrinterKind)
    {
        self.entries.push(Entry {
            name: normalized(name),
            template: false,
            kind,
        });
    }

    /// Register a printer for every instantiation of a class template
    pub fn register_template(&mut self, name: &str, kind: PrinterKind)
    {
        self.entries.push(Entry {
            name: normalized(name),
            template: true,
            kind,
        });
    }

    /// Find the printer for a value's static type name, if any
    pub fn find(&self, type_name: &str) -> Option<PrinterKind>
    {
        let name = canonical_value_type(type_name);
        let found = self.entries.iter().find_map(|entry| {
            let matched = if entry.template {
                name.len() > entry.name.len() + 1
                    && name.starts_with(&entry.name)
                    && name[entry.name.len()..].starts_with('<')
                    && name.ends_with('>')
            } else {
                name == entry.name
            };
            matched.then_some(entry.kind)
        });
        trace!(type_name, ?found, "printer lookup");
        found
    }
}

/// Reduce a static type name to the form the registry matches against:
/// normalized spelling, no `const`, no reference decoration.
fn canonical_value_type(name: &str) -> String
{
    let mut name = normalized(name);
    while name.ends_with('&') {
        name.pop();
    }
    if let Some(stripped) = name.strip_prefix("const ") {
        name = stripped.to_string();
    }
    name
}

/// Process-wide default registry (the Qt5 table)
pub fn default_registry() -> &'static Registry
{
    static REGISTRY: Lazy<Registry> = Lazy::new(Registry::qt5);
    &REGISTRY
}
