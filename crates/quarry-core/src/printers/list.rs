//! `QList<T>` decoding.

use crate::error::Result;
use crate::printers::{Child, DisplayHint};
use crate::resolver::TypeHandle;
use crate::types::{Address, TargetInfo};
use crate::value::{InspectContext, TypedValue};

/// Whether `QList` stores elements of this size behind an owned pointer
/// rather than inline in a slot (`QTypeInfo<T>::isLarge`)
///
/// The comparison must use the *inspected* process's pointer width: a
/// 12-byte element is boxed on a 32-bit target and would still be boxed
/// there even when the inspector itself runs 64-bit.
pub fn is_large(elem_size: u64, target: TargetInfo) -> bool
{
    elem_size > target.pointer_width.bytes()
}

/// Decodes a `QList<T>` into an indexed sequence of element views
///
/// `QList` keeps a `[begin, end)` window over an array of pointer-sized
/// slots. Each slot holds either the element's bit pattern (small types) or
/// an owned pointer to heap storage (large types); which of the two is a
/// static property of `T`, decided once per decode, never per element.
pub struct QListPrinter<'a>
{
    cx: &'a InspectContext<'a>,
    value: TypedValue,
    elem: TypeHandle,
}

impl<'a> QListPrinter<'a>
{
    /// Wrap a value whose type is an instantiation of `QList`
    pub fn new(cx: &'a InspectContext<'a>, value: TypedValue) -> Result<Self>
    {
        let elem = cx.types.template_arg(value.ty, 0)?;
        Ok(Self { cx, value, elem })
    }

    fn data(&self) -> Result<TypedValue>
    {
        self.value.field(self.cx, "d")?.deref(self.cx)
    }

    fn window(&self, data: &TypedValue) -> Result<(i64, i64)>
    {
        let begin = data.field(self.cx, "begin")?.read_int(self.cx)?;
        let end = data.field(self.cx, "end")?.read_int(self.cx)?;
        Ok((begin, end))
    }

    /// One-line summary, e.g. `QList<QString> of length 2`
    pub fn summary(&self) -> Result<String>
    {
        let data = self.data()?;
        let (begin, end) = self.window(&data)?;
        Ok(format!(
            "QList<{}> of length {}",
            self.cx.types.type_name(self.elem)?,
            end - begin
        ))
    }

    /// Lazy sequence of element views, in index order
    pub fn children(&self) -> Result<ListChildren<'a>>
    {
        let cx = self.cx;
        let data = self.data()?;
        let (begin, end) = self.window(&data)?;

        let slot_size = cx.target.pointer_width.bytes();
        let array = data.field(cx, "array")?;
        let elem_size = cx.types.byte_size(self.elem)?;

        Ok(ListChildren {
            cx,
            elem: self.elem,
            boxed: is_large(elem_size, cx.target),
            slot_size,
            base: array.address + begin as u64 * slot_size,
            len: (end - begin) as u64,
            index: 0,
        })
    }

    /// Rendering hint for the host
    pub const fn display_hint(&self) -> DisplayHint
    {
        DisplayHint::Array
    }
}

/// Iterator over a `QList`'s elements
///
/// Boxed elements cost one pointer read per step; a failed read yields the
/// error and ends the sequence.
pub struct ListChildren<'a>
{
    cx: &'a InspectContext<'a>,
    elem: TypeHandle,
    boxed: bool,
    slot_size: u64,
    base: Address,
    len: u64,
    index: u64,
}

impl Iterator for ListChildren<'_>
{
    type Item = Result<Child>;

    fn next(&mut self) -> Option<Self::Item>
    {
        if self.index == self.len {
            return None;
        }
        let index = self.index;
        self.index += 1;

        let slot = self.base + index * self.slot_size;
        let view = if self.boxed {
            match self.cx.read_ptr(slot) {
                Ok(element) => TypedValue::new(element, self.elem),
                Err(err) => {
                    self.index = self.len;
                    return Some(Err(err));
                }
            }
        } else {
            TypedValue::new(slot, self.elem)
        };
        Some(Ok(Child::indexed(index, view)))
    }
}
