//! `QMap<K,V>` decoding.
//!
//! `QMap` is an intrusive red-black tree. Every node embeds a `QMapNodeBase`
//! — `left`/`right` child pointers plus a parent word whose low two bits
//! carry the node color — and the map's data block embeds a *header* node
//! that serves double duty: its `left` points at the root, and its own
//! address is the one-past-the-end sentinel. Traversal therefore never
//! compares against null to stop; it compares against the header's address.

use crate::error::Result;
use crate::printers::{Child, DisplayHint};
use crate::resolver::{FieldInfo, TypeHandle};
use crate::types::Address;
use crate::value::{InspectContext, TypedValue};

/// Low bits of the parent word that hold the node color, not address bits.
const PARENT_TAG_MASK: u64 = 0b11;

/// Strip the color tag from a raw parent word, leaving the parent's address.
fn untag_parent(raw: u64) -> Address
{
    Address::new(raw & !PARENT_TAG_MASK)
}

/// Per-decode node geometry, resolved once before the walk starts.
#[derive(Debug, Clone, Copy)]
struct NodeLayout
{
    left: u64,
    right: u64,
    parent: u64,
    key: FieldInfo,
    value: FieldInfo,
}

/// Decodes a `QMap<K,V>` into alternating key/value entries in key order
///
/// The entry sequence has `2 * size` elements labeled by flat index: the
/// key at `[2k]` and its value at `[2k+1]` come from the same tree node.
/// Order is ascending key order — the tree's in-order walk — regardless of
/// insertion order.
pub struct QMapPrinter<'a>
{
    cx: &'a InspectContext<'a>,
    value: TypedValue,
    key_ty: TypeHandle,
    value_ty: TypeHandle,
}

impl<'a> QMapPrinter<'a>
{
    /// Wrap a value whose type is an instantiation of `QMap`
    ///
    /// Fails if the container type is missing either template argument.
    pub fn new(cx: &'a InspectContext<'a>, value: TypedValue) -> Result<Self>
    {
        let key_ty = cx.types.template_arg(value.ty, 0)?;
        let value_ty = cx.types.template_arg(value.ty, 1)?;
        Ok(Self {
            cx,
            value,
            key_ty,
            value_ty,
        })
    }

    fn data(&self) -> Result<TypedValue>
    {
        self.value.field(self.cx, "d")?.deref(self.cx)
    }

    /// One-line summary, e.g. `QMap<int, QString> of size 3`
    pub fn summary(&self) -> Result<String>
    {
        let size = self.data()?.field(self.cx, "size")?.read_int(self.cx)?;
        Ok(format!(
            "QMap<{}, {}> of size {}",
            self.cx.types.type_name(self.key_ty)?,
            self.cx.types.type_name(self.value_ty)?,
            size
        ))
    }

    /// Lazy sequence of `2 * size` alternating key/value entries
    ///
    /// Resolves the concrete `QMapNode<K,V>` instantiation for the payload
    /// field offsets, then positions a cursor on the leftmost node. An empty
    /// map leaves the cursor on the header itself, which is terminal.
    pub fn entries(&self) -> Result<MapEntries<'a>>
    {
        let cx = self.cx;

        let node_base = cx.types.lookup("QMapNodeBase")?;
        let node_ty = cx.types.lookup(&format!(
            "QMapNode<{},{}>",
            cx.types.type_name(self.key_ty)?,
            cx.types.type_name(self.value_ty)?
        ))?;

        let layout = NodeLayout {
            left: cx.types.field(node_base, "left")?.offset,
            right: cx.types.field(node_base, "right")?.offset,
            parent: cx.types.field(node_base, "p")?.offset,
            key: cx.types.field(node_ty, "key")?,
            value: cx.types.field(node_ty, "value")?,
        };

        let header = self.data()?.field(cx, "header")?.address;
        let root = cx.read_ptr(header + layout.left)?;
        let first = if root.is_null() {
            header
        } else {
            leftmost(cx, root, layout.left)?
        };

        Ok(MapEntries {
            cx,
            layout,
            header,
            node: first,
            index: 0,
        })
    }

    /// Rendering hint for the host
    pub const fn display_hint(&self) -> DisplayHint
    {
        DisplayHint::Map
    }
}

/// Descend `left` links until a node has no left child.
fn leftmost(cx: &InspectContext<'_>, mut node: Address, left_offset: u64) -> Result<Address>
{
    loop {
        let left = cx.read_ptr(node + left_offset)?;
        if left.is_null() {
            return Ok(node);
        }
        node = left;
    }
}

/// In-order cursor over a `QMap`'s tree
///
/// The walk is an explicit successor loop over node addresses — no
/// recursion, so stack depth is independent of tree height. Each node is
/// visited exactly once; the walk ends when the cursor lands back on the
/// header sentinel. A well-formed tree of `S` nodes yields `2 * S` entries.
pub struct MapEntries<'a>
{
    cx: &'a InspectContext<'a>,
    layout: NodeLayout,
    header: Address,
    node: Address,
    index: u64,
}

impl MapEntries<'_>
{
    fn parent_of(&self, node: Address) -> Result<Address>
    {
        let width = self.cx.target.pointer_width.bytes();
        let raw = self.cx.read_uint(node + self.layout.parent, width)?;
        Ok(untag_parent(raw))
    }

    /// Next node in ascending key order from the current one.
    ///
    /// Right subtree first; otherwise climb masked parent links while the
    /// current node is its parent's right child. Landing on the header (or
    /// running out of parents) means the walk is complete.
    fn successor(&self) -> Result<Address>
    {
        let right = self.cx.read_ptr(self.node + self.layout.right)?;
        if !right.is_null() {
            return leftmost(self.cx, right, self.layout.left);
        }

        let mut node = self.node;
        let mut parent = self.parent_of(node)?;
        while !parent.is_null() && node == self.cx.read_ptr(parent + self.layout.right)? {
            node = parent;
            parent = self.parent_of(node)?;
        }
        Ok(parent)
    }
}

impl Iterator for MapEntries<'_>
{
    type Item = Result<Child>;

    fn next(&mut self) -> Option<Self::Item>
    {
        if self.node.is_null() || self.node == self.header {
            return None;
        }
        let index = self.index;
        self.index += 1;

        if index % 2 == 0 {
            let key = TypedValue::new(self.node + self.layout.key.offset, self.layout.key.ty);
            return Some(Ok(Child::indexed(index, key)));
        }

        // The pair is complete only after the value; advance now so the next
        // even step reads from the successor node.
        let value = TypedValue::new(self.node + self.layout.value.offset, self.layout.value.ty);
        match self.successor() {
            Ok(next) => {
                self.node = next;
                Some(Ok(Child::indexed(index, value)))
            }
            Err(err) => {
                self.node = Address::ZERO;
                Some(Err(err))
            }
        }
    }
}
