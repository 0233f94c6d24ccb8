//! `QString` decoding.

use crate::error::Result;
use crate::printers::DisplayHint;
use crate::types::Endianness;
use crate::value::{InspectContext, TypedValue};

/// Decodes a `QString` into its text
///
/// The string's shared data block stores the code-unit count in `size` and
/// the byte distance from the block's own address to the character storage
/// in `offset`. The text is `size * 2` bytes of UTF-16 starting at
/// `d + offset`, in the target's byte order.
pub struct QStringPrinter<'a>
{
    cx: &'a InspectContext<'a>,
    value: TypedValue,
}

impl<'a> QStringPrinter<'a>
{
    /// Wrap a value whose type is `QString`
    pub fn new(cx: &'a InspectContext<'a>, value: TypedValue) -> Self
    {
        Self { cx, value }
    }

    /// Decode the string's contents
    ///
    /// Unpaired surrogates decode to the replacement character; unreadable
    /// memory fails the whole decode.
    pub fn decode(&self) -> Result<String>
    {
        let cx = self.cx;
        let data = self.value.field(cx, "d")?.deref(cx)?;
        let size = data.field(cx, "size")?.read_int(cx)? as u64;
        let offset = data.field(cx, "offset")?.read_int(cx)?;

        let storage = data.address + offset as u64;
        let bytes = cx.read_bytes(storage, (size * 2) as usize)?;

        let mut units = Vec::with_capacity(size as usize);
        for pair in bytes.chunks_exact(2) {
            units.push(match cx.target.endian {
                Endianness::Little => u16::from_le_bytes([pair[0], pair[1]]),
                Endianness::Big => u16::from_be_bytes([pair[0], pair[1]]),
            });
        }
        Ok(String::from_utf16_lossy(&units))
    }

    /// Rendering hint for the host
    pub const fn display_hint(&self) -> DisplayHint
    {
        DisplayHint::String
    }
}
