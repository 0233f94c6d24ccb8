//! Decode Snapshot Example
//!
//! Decodes a `QMap<int, int>` out of a hand-assembled memory snapshot — no
//! live process, no DWARF. The container layouts are registered by hand the
//! same way a host with its own type source would do it.
//!
//! ## Usage:
//!
//! ```bash
//! cargo run --example decode_snapshot
//! ```

use quarry_core::memory::MemoryImage;
use quarry_core::printers::QMapPrinter;
use quarry_core::resolver::{ScalarClass, TypeTable};
use quarry_core::types::{Address, PointerWidth, TargetInfo};
use quarry_core::value::{InspectContext, TypedValue};

fn put(buf: &mut [u8], offset: usize, bytes: &[u8])
{
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn main() -> quarry_core::Result<()>
{
    // Describe the 64-bit Qt5 layouts the decode needs.
    let mut table = TypeTable::new(PointerWidth::Eight);
    let int = table.add_primitive("int", 4, ScalarClass::Signed);
    let quintptr = table.add_primitive("quintptr", 8, ScalarClass::Unsigned);

    let node_base = table.declare_struct("QMapNodeBase", 24);
    let node_base_ptr = table.add_pointer(node_base);
    table.set_fields(
        node_base,
        &[("p", 0, quintptr), ("left", 8, node_base_ptr), ("right", 16, node_base_ptr)],
    );
    let node = table.declare_struct("QMapNode<int,int>", 32);
    table.set_fields(node, &[("key", 24, int), ("value", 28, int)]);
    let map_data = table.declare_struct("QMapData<int,int>", 40);
    table.set_fields(map_data, &[("size", 4, int), ("header", 8, node_base)]);
    let map_data_ptr = table.add_pointer(map_data);
    let map = table.declare_struct("QMap<int,int>", 8);
    table.set_fields(map, &[("d", 0, map_data_ptr)]);
    table.set_template_args(map, &[int, int]);

    // Assemble the snapshot: a map {1: 10, 3: 30, 5: 50} with node 3 at the
    // root. Parent words carry color tag bits, as they would in a real heap.
    let mut image = MemoryImage::new();
    image.add_region(Address::from(0x1000), 0x5000u64.to_le_bytes().to_vec());

    let mut data = vec![0u8; 40];
    put(&mut data, 4, &3i32.to_le_bytes()); // size
    put(&mut data, 16, &0x6000u64.to_le_bytes()); // header.left -> root
    image.add_region(Address::from(0x5000), data);

    let mut nodes = vec![0u8; 0xc0];
    for (offset, parent, left, right, key, value) in [
        (0x00usize, 0x5008u64 | 1, 0x6040u64, 0x6080u64, 3i32, 30i32),
        (0x40, 0x6000 | 1, 0, 0, 1, 10),
        (0x80, 0x6000 | 2, 0, 0, 5, 50),
    ] {
        put(&mut nodes, offset, &parent.to_le_bytes());
        put(&mut nodes, offset + 8, &left.to_le_bytes());
        put(&mut nodes, offset + 16, &right.to_le_bytes());
        put(&mut nodes, offset + 24, &key.to_le_bytes());
        put(&mut nodes, offset + 28, &value.to_le_bytes());
    }
    image.add_region(Address::from(0x6000), nodes);

    // Decode.
    let target = TargetInfo::little(PointerWidth::Eight);
    let cx = InspectContext::new(&image, &table, target);
    let printer = QMapPrinter::new(&cx, TypedValue::new(Address::from(0x1000), map))?;

    println!("{}", printer.summary()?);
    for entry in printer.entries()? {
        let entry = entry?;
        println!("  {} = {}", entry.label, entry.value.read_int(&cx)?);
    }
    Ok(())
}
