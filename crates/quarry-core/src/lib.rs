//! # quarry-core
//!
//! Qt5 container layout decoding over raw process memory.
//!
//! This crate turns the private in-memory layouts of Qt5's implicit-shared
//! containers — `QString`, `QVector<T>`, `QList<T>`, `QMap<K,V>` — into
//! summaries and labeled child trees, using nothing but raw bytes and type
//! metadata. The inspected process does not cooperate: no Qt code runs, no
//! accessor is called, the layouts are decoded directly.
//!
//! ## Architecture
//!
//! - [`memory`]: the [`memory::MemoryView`] seam plus snapshot and
//!   live-process (Linux) implementations
//! - [`resolver`]: type metadata — field offsets, sizes, template arguments —
//!   hand-registered or scanned from the binary's DWARF
//! - [`value`]: the typed-address cursor decodes are written against
//! - [`printers`]: one decoder per container
//! - [`registry`]: type-name dispatch to the right printer
//!
//! ## Why unsafe code is needed
//!
//! Reading another process's memory on Linux goes through the
//! `process_vm_readv` syscall, which takes raw iovec pointers. That one
//! call site is the only unsafe code in the crate; everything else operates
//! on owned buffers.

#![allow(unsafe_code)] // Required for process_vm_readv (see memory::ProcessMemory)

pub mod error;
pub mod memory;
pub mod printers;
pub mod registry;
pub mod resolver;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use error::{QuarryError, Result};
pub use printers::{Child, DisplayHint, QListPrinter, QMapPrinter, QStringPrinter, QVectorPrinter};
pub use registry::{default_registry, PrinterKind, Registry};
pub use resolver::{TypeClass, TypeHandle, TypeResolver, TypeTable};
pub use types::{Address, Endianness, PointerWidth, TargetInfo};
pub use value::{InspectContext, TypedValue};
