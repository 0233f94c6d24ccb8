//! `QVector<T>` decoding.

use crate::error::Result;
use crate::printers::{Child, DisplayHint};
use crate::resolver::TypeHandle;
use crate::types::Address;
use crate::value::{InspectContext, TypedValue};

/// Decodes a `QVector<T>` into an indexed sequence of element views
///
/// The vector's shared data block stores the element count in `size` and
/// the byte distance from the block's own address to element storage in
/// `offset`; elements are a plain contiguous `T[size]` at `d + offset`.
pub struct QVectorPrinter<'a>
{
    cx: &'a InspectContext<'a>,
    value: TypedValue,
    elem: TypeHandle,
}

impl<'a> QVectorPrinter<'a>
{
    /// Wrap a value whose type is an instantiation of `QVector`
    ///
    /// Fails if the container type carries no template argument.
    pub fn new(cx: &'a InspectContext<'a>, value: TypedValue) -> Result<Self>
    {
        let elem = cx.types.template_arg(value.ty, 0)?;
        Ok(Self { cx, value, elem })
    }

    fn data(&self) -> Result<TypedValue>
    {
        self.value.field(self.cx, "d")?.deref(self.cx)
    }

    /// One-line summary, e.g. `QVector<int> of length 3`
    pub fn summary(&self) -> Result<String>
    {
        let size = self.data()?.field(self.cx, "size")?.read_int(self.cx)?;
        Ok(format!(
            "QVector<{}> of length {}",
            self.cx.types.type_name(self.elem)?,
            size
        ))
    }

    /// Lazy sequence of element views, in index order
    ///
    /// Element addresses are pure arithmetic over the storage base, so the
    /// iterator itself never touches target memory. Re-invoke to restart.
    pub fn children(&self) -> Result<VectorChildren>
    {
        let cx = self.cx;
        let data = self.data()?;
        let len = data.field(cx, "size")?.read_int(cx)? as u64;
        let offset = data.field(cx, "offset")?.read_int(cx)?;

        Ok(VectorChildren {
            elem: self.elem,
            elem_size: cx.types.byte_size(self.elem)?,
            base: data.address + offset as u64,
            len,
            index: 0,
        })
    }

    /// Rendering hint for the host
    pub const fn display_hint(&self) -> DisplayHint
    {
        DisplayHint::Array
    }
}

/// Iterator over a `QVector`'s elements
///
/// Finite: yields exactly the element count read at construction, then
/// `None` forever.
#[derive(Debug, Clone)]
pub struct VectorChildren
{
    elem: TypeHandle,
    elem_size: u64,
    base: Address,
    len: u64,
    index: u64,
}

impl Iterator for VectorChildren
{
    type Item = Child;

    fn next(&mut self) -> Option<Self::Item>
    {
        if self.index == self.len {
            return None;
        }
        let index = self.index;
        self.index += 1;
        let address = self.base + index * self.elem_size;
        Some(Child::indexed(index, TypedValue::new(address, self.elem)))
    }

    fn size_hint(&self) -> (usize, Option<usize>)
    {
        let remaining = (self.len - self.index) as usize;
        (remaining, Some(remaining))
    }
}
