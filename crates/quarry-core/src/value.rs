//! # Typed Values
//!
//! The cursor the printers walk target memory with.
//!
//! A [`TypedValue`] is nothing but an address paired with a resolved type —
//! a read-only view over externally-owned memory. It never caches bytes; every
//! access goes back to the [`MemoryView`](crate::memory::MemoryView) so a
//! view is always constructed fresh from the current memory image and
//! discarded after rendering.

use crate::error::{QuarryError, Result};
use crate::memory::MemoryView;
use crate::resolver::{TypeClass, TypeHandle, TypeResolver};
use crate::types::{Address, Endianness, TargetInfo};

/// Everything one decode request needs: memory, types, and the target ABI
///
/// Borrowed by every printer and child iterator for the duration of a single
/// decode; nothing outlives the request.
pub struct InspectContext<'a>
{
    /// Memory of the inspected process
    pub memory: &'a dyn MemoryView,
    /// Type metadata for the inspected process
    pub types: &'a dyn TypeResolver,
    /// ABI of the inspected process
    pub target: TargetInfo,
}

impl<'a> InspectContext<'a>
{
    /// Bundle a memory view, a type resolver, and a target description
    pub fn new(memory: &'a dyn MemoryView, types: &'a dyn TypeResolver, target: TargetInfo) -> Self
    {
        Self { memory, types, target }
    }

    /// Read `len` raw bytes at `address`
    pub fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        let mut buf = vec![0u8; len];
        self.memory.read(address, &mut buf)?;
        Ok(buf)
    }

    /// Read an unsigned scalar of `size` bytes in target byte order
    ///
    /// `size` must be 1, 2, 4, or 8.
    pub fn read_uint(&self, address: Address, size: u64) -> Result<u64>
    {
        if !matches!(size, 1 | 2 | 4 | 8) {
            return Err(QuarryError::UnsupportedWidth(size));
        }

        let mut buf = [0u8; 8];
        self.memory.read(address, &mut buf[..size as usize])?;

        let mut value = 0u64;
        match self.target.endian {
            Endianness::Little => {
                for (shift, byte) in buf[..size as usize].iter().enumerate() {
                    value |= u64::from(*byte) << (shift * 8);
                }
            }
            Endianness::Big => {
                for byte in &buf[..size as usize] {
                    value = (value << 8) | u64::from(*byte);
                }
            }
        }
        Ok(value)
    }

    /// Read a pointer-sized scalar at `address` as a target address
    pub fn read_ptr(&self, address: Address) -> Result<Address>
    {
        self.read_uint(address, self.target.pointer_width.bytes()).map(Address::from)
    }
}

/// A typed, addressed view into target memory
///
/// ## Example
///
/// ```rust,no_run
/// use quarry_core::value::{InspectContext, TypedValue};
/// # fn demo(cx: &InspectContext<'_>, value: TypedValue) -> quarry_core::error::Result<()> {
/// let _size = value.field(cx, "size")?.read_int(cx)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedValue
{
    /// Address of the value in target memory
    pub address: Address,
    /// Resolved type of the value
    pub ty: TypeHandle,
}

impl TypedValue
{
    /// View the bytes at `address` as a value of type `ty`
    pub const fn new(address: Address, ty: TypeHandle) -> Self
    {
        Self { address, ty }
    }

    /// Reinterpret this view as another type at the same address
    pub const fn cast(self, ty: TypeHandle) -> Self
    {
        Self { address: self.address, ty }
    }

    /// View of a named field of this struct value
    pub fn field(&self, cx: &InspectContext<'_>, name: &str) -> Result<TypedValue>
    {
        let info = cx.types.field(self.ty, name)?;
        Ok(TypedValue::new(self.address + info.offset, info.ty))
    }

    /// Read this value as an unsigned integer of its own size
    pub fn read_uint(&self, cx: &InspectContext<'_>) -> Result<u64>
    {
        cx.read_uint(self.address, cx.types.byte_size(self.ty)?)
    }

    /// Read this value as a sign-extended integer of its own size
    pub fn read_int(&self, cx: &InspectContext<'_>) -> Result<i64>
    {
        let size = cx.types.byte_size(self.ty)?;
        let mut value = cx.read_uint(self.address, size)?;
        if size < 8 && value & (1 << (size * 8 - 1)) != 0 {
            value |= !((1u64 << (size * 8)) - 1);
        }
        Ok(value as i64)
    }

    /// Read this value as a target address
    ///
    /// Reads pointer-width bytes regardless of the view's type; the layouts
    /// decoded here store untyped links (`void*` slots, `quintptr` parent
    /// words) that only become typed after the read.
    pub fn read_ptr(&self, cx: &InspectContext<'_>) -> Result<Address>
    {
        cx.read_ptr(self.address)
    }

    /// Follow this pointer value to a view of its pointee
    pub fn deref(&self, cx: &InspectContext<'_>) -> Result<TypedValue>
    {
        let TypeClass::Pointer(pointee) = cx.types.classify(self.ty)? else {
            return Err(QuarryError::NotAPointer(cx.types.type_name(self.ty)?));
        };
        Ok(TypedValue::new(self.read_ptr(cx)?, pointee))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::memory::MemoryImage;
    use crate::resolver::{ScalarClass, TypeTable};
    use crate::types::PointerWidth;

    #[test]
    fn test_read_uint_endianness()
    {
        let mut image = MemoryImage::new();
        image.add_region(Address::from(0x100), vec![0x78, 0x56, 0x34, 0x12]);
        let table = TypeTable::new(PointerWidth::Eight);

        let little = InspectContext::new(&image, &table, TargetInfo::new(PointerWidth::Eight, Endianness::Little));
        assert_eq!(little.read_uint(Address::from(0x100), 4).unwrap(), 0x1234_5678);

        let big = InspectContext::new(&image, &table, TargetInfo::new(PointerWidth::Eight, Endianness::Big));
        assert_eq!(big.read_uint(Address::from(0x100), 4).unwrap(), 0x7856_3412);
    }

    #[test]
    fn test_read_int_sign_extends()
    {
        let mut image = MemoryImage::new();
        image.add_region(Address::from(0x100), vec![0xfe, 0xff, 0xff, 0xff]);
        let mut table = TypeTable::new(PointerWidth::Eight);
        let int = table.add_primitive("int", 4, ScalarClass::Signed);
        let cx = InspectContext::new(&image, &table, TargetInfo::little(PointerWidth::Eight));

        let value = TypedValue::new(Address::from(0x100), int);
        assert_eq!(value.read_int(&cx).unwrap(), -2);
        assert_eq!(value.read_uint(&cx).unwrap(), 0xffff_fffe);
    }

    #[test]
    fn test_read_uint_rejects_odd_widths()
    {
        let image = MemoryImage::new();
        let table = TypeTable::new(PointerWidth::Eight);
        let cx = InspectContext::new(&image, &table, TargetInfo::little(PointerWidth::Eight));
        assert!(cx.read_uint(Address::ZERO, 3).is_err());
    }
}
