//! # Types
//!
//! Target-agnostic types used throughout the inspector.
//!
//! These types describe the *inspected* process — its addresses, pointer
//! width, and byte order — independently of the machine the inspector runs
//! on. A 64-bit inspector must decode a 32-bit big-endian target correctly,
//! so none of these ever fall back to `usize` or native byte order.

use std::fmt;
use std::ops::{Add, Sub};

/// Strongly typed memory address in the inspected process
///
/// This wrapper around `u64` provides type safety when working with target
/// memory addresses. It prevents accidentally mixing addresses with other
/// `u64` values (like sizes, element counts, or raw field offsets).
///
/// ## Why use a newtype?
///
/// - **Type safety**: Prevents passing a byte offset where an address is expected
/// - **Self-documenting**: Makes it clear that a value lives in the target's address space
/// - **Single formatting point**: All addresses render as `0x…` via `Display`
///
/// ## Example
///
/// ```rust
/// use quarry_core::types::Address;
///
/// let addr = Address::from(0x1000);
/// let next_addr = addr + 0x100; // Add offset
/// assert_eq!(next_addr.value(), 0x1100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    ///
    /// In the container layouts decoded here a null link means "no node" /
    /// "no child"; the tree traversal tests against this constant.
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// Equivalent to `Address::from(value)` but usable in const contexts.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Whether this is the null address
    ///
    /// ## Example
    ///
    /// ```rust
    /// use quarry_core::types::Address;
    ///
    /// assert!(Address::ZERO.is_null());
    /// assert!(!Address::from(0x1000).is_null());
    /// ```
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Add a byte offset to this address, checking for overflow
    ///
    /// Returns `Some(new_address)` if the addition doesn't overflow, or `None` if it does.
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract a byte offset from this address, checking for underflow
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}

/// Pointer width of the inspected process
///
/// Qt5 ships on both 32-bit and 64-bit targets, and the width decides more
/// than pointer reads: `QList` stores an element inline in a pointer-sized
/// slot exactly when the element fits one, so classification must use the
/// *target's* width, never the inspector's.
///
/// ## Example
///
/// ```rust
/// use quarry_core::types::PointerWidth;
///
/// assert_eq!(PointerWidth::Eight.bytes(), 8);
/// assert_eq!(PointerWidth::Four.bytes(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerWidth
{
    /// 32-bit target (4-byte pointers)
    Four,
    /// 64-bit target (8-byte pointers)
    Eight,
}

impl PointerWidth
{
    /// Size of one pointer in bytes
    pub const fn bytes(self) -> u64
    {
        match self {
            PointerWidth::Four => 4,
            PointerWidth::Eight => 8,
        }
    }
}

impl fmt::Display for PointerWidth
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            PointerWidth::Four => write!(f, "32-bit"),
            PointerWidth::Eight => write!(f, "64-bit"),
        }
    }
}

/// Byte order of the inspected process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness
{
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

/// ABI description of the inspected process
///
/// Bundles the two facts every scalar read depends on. Constructed once per
/// inspection session — from the binary's debug info when available, or
/// explicitly for hand-assembled snapshots — and carried through every
/// decode via [`crate::value::InspectContext`].
///
/// ## Example
///
/// ```rust
/// use quarry_core::types::{PointerWidth, TargetInfo};
///
/// let target = TargetInfo::little(PointerWidth::Eight);
/// assert_eq!(target.pointer_width.bytes(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo
{
    /// Pointer width of the target
    pub pointer_width: PointerWidth,
    /// Byte order of the target
    pub endian: Endianness,
}

impl TargetInfo
{
    /// Create a target description
    pub const fn new(pointer_width: PointerWidth, endian: Endianness) -> Self
    {
        Self { pointer_width, endian }
    }

    /// Convenience constructor for little-endian targets
    ///
    /// Every desktop platform Qt5 ships on is little-endian, so this is the
    /// common case for hand-assembled snapshots and tests.
    pub const fn little(pointer_width: PointerWidth) -> Self
    {
        Self::new(pointer_width, Endianness::Little)
    }
}
