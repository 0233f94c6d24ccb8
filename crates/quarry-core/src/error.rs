//! # Error Types
//!
//! General error handling for the inspector.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::types::Address;

/// Main error type for inspection operations
///
/// This enum represents all the ways a decode can fail. The printers
/// themselves never validate inspected memory; every failure here originates
/// from one of the two collaborators a decode depends on:
///
/// 1. **Memory access**: the target address is unreadable (`MemoryRead`)
/// 2. **Type resolution**: the requested type, field, or template argument
///    is not known (`UnknownType`, `UnknownField`, `MissingTemplateArg`)
/// 3. **Debug info**: the binary's DWARF could not be parsed (`DebugInfo`)
/// 4. **I/O**: reading a binary or snapshot file failed (`Io`)
///
/// Failures propagate verbatim to the caller; no decode ever substitutes a
/// default value for memory it could not read.
#[derive(Error, Debug)]
pub enum QuarryError
{
    /// Target memory could not be read
    ///
    /// This happens when:
    /// - The address is not mapped in the inspected process
    /// - The address range falls outside every region of a snapshot
    /// - The kernel denied the read (missing ptrace permissions)
    #[error("unreadable memory at {address} ({len} bytes): {reason}")]
    MemoryRead
    {
        /// Address the read started at
        address: Address,
        /// Number of bytes requested
        len: usize,
        /// Underlying failure description
        reason: String,
    },

    /// No type with the given name is known to the resolver
    ///
    /// For template instantiations this usually means the inspected binary
    /// never materialized the concrete type (e.g. a `QMapNode<K,V>` that was
    /// optimized out), or that the name was spelled with different
    /// whitespace than the debug info uses.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// A struct type has no field with the requested name
    #[error("type {type_name} has no field named {field}")]
    UnknownField
    {
        /// Name of the struct type that was queried
        type_name: String,
        /// Field name that was not found
        field: String,
    },

    /// A container type is missing a template argument
    ///
    /// The printers derive element/key/value types from the container's
    /// template arguments; a container type registered without them cannot
    /// be decoded.
    #[error("{type_name} has no template argument {index}")]
    MissingTemplateArg
    {
        /// Name of the container type
        type_name: String,
        /// Zero-based argument index that was requested
        index: usize,
    },

    /// A scalar read was requested with an unsupported width
    ///
    /// Scalar reads are limited to 1, 2, 4, or 8 bytes. Anything else
    /// indicates the value being read is not a scalar at all.
    #[error("cannot read a {0}-byte scalar")]
    UnsupportedWidth(u64),

    /// A dereference was attempted on a non-pointer type
    #[error("{0} is not a pointer type")]
    NotAPointer(String),

    /// The binary's debug information could not be parsed
    ///
    /// Wraps `object`/`gimli` failures with context about which part of the
    /// parse went wrong.
    #[error("invalid debug info: {0}")]
    DebugInfo(String),

    /// Invalid argument passed to an inspection function
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (reading binaries, snapshot files, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, QuarryError>`
///
/// ```rust
/// use quarry_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, QuarryError>;
