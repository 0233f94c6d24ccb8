//! Tests for the container printers, run against hand-assembled snapshots
//! of Qt5 container memory.
//!
//! Layouts follow the 64-bit little-endian ABI: shared array data blocks
//! are 24 bytes (`size` at +4, `offset` at +16), `QListData::Data` keeps its
//! slot array at +16, and map nodes embed `QMapNodeBase` (parent word,
//! left, right) ahead of the key/value payload at +24.

use quarry_core::memory::MemoryImage;
use quarry_core::printers::list::is_large;
use quarry_core::printers::{Child, DisplayHint, QListPrinter, QMapPrinter, QStringPrinter, QVectorPrinter};
use quarry_core::resolver::{ScalarClass, TypeHandle, TypeTable};
use quarry_core::types::{Address, PointerWidth, TargetInfo};
use quarry_core::value::{InspectContext, TypedValue};
use quarry_core::QuarryError;

const TARGET: TargetInfo = TargetInfo::little(PointerWidth::Eight);

const VALUE_ADDR: u64 = 0x1000;

fn put(buf: &mut [u8], offset: usize, bytes: &[u8])
{
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// A shared array data block (`size` at +4, `offset` at +16) followed by its
/// element storage at +24.
fn array_data(size: i32, payload: &[u8]) -> Vec<u8>
{
    let mut block = vec![0u8; 24 + payload.len()];
    put(&mut block, 4, &size.to_le_bytes());
    put(&mut block, 16, &24i64.to_le_bytes());
    put(&mut block, 24, payload);
    block
}

/// An 8-byte container value holding only its `d` pointer.
fn container_value(image: &mut MemoryImage, d: u64)
{
    image.add_region(Address::from(VALUE_ADDR), d.to_le_bytes().to_vec());
}

struct Qt5Types
{
    table: TypeTable,
    qstring: TypeHandle,
    vector_int: TypeHandle,
    vector_qstring: TypeHandle,
    list_int: TypeHandle,
    list_big: TypeHandle,
    map_int_int: TypeHandle,
}

fn qt5_types() -> Qt5Types
{
    let mut table = TypeTable::new(PointerWidth::Eight);
    let int = table.add_primitive("int", 4, ScalarClass::Signed);
    let qptrdiff = table.add_primitive("qptrdiff", 8, ScalarClass::Signed);
    let quintptr = table.add_primitive("quintptr", 8, ScalarClass::Unsigned);

    let string_data = table.declare_struct("QStringData", 24);
    table.set_fields(string_data, &[("size", 4, int), ("offset", 16, qptrdiff)]);
    let string_data_ptr = table.add_pointer(string_data);
    let qstring = table.declare_struct("QString", 8);
    table.set_fields(qstring, &[("d", 0, string_data_ptr)]);

    let int_array_data = table.declare_struct("QTypedArrayData<int>", 24);
    table.set_fields(int_array_data, &[("size", 4, int), ("offset", 16, qptrdiff)]);
    let int_array_data_ptr = table.add_pointer(int_array_data);
    let vector_int = table.declare_struct("QVector<int>", 8);
    table.set_fields(vector_int, &[("d", 0, int_array_data_ptr)]);
    table.set_template_args(vector_int, &[int]);

    let qstring_array_data = table.declare_struct("QTypedArrayData<QString>", 24);
    table.set_fields(qstring_array_data, &[("size", 4, int), ("offset", 16, qptrdiff)]);
    let qstring_array_data_ptr = table.add_pointer(qstring_array_data);
    let vector_qstring = table.declare_struct("QVector<QString>", 8);
    table.set_fields(vector_qstring, &[("d", 0, qstring_array_data_ptr)]);
    table.set_template_args(vector_qstring, &[qstring]);

    let list_data = table.declare_struct("QListData::Data", 24);
    table.set_fields(list_data, &[("begin", 8, int), ("end", 12, int), ("array", 16, quintptr)]);
    let list_data_ptr = table.add_pointer(list_data);
    let list_int = table.declare_struct("QList<int>", 8);
    table.set_fields(list_int, &[("d", 0, list_data_ptr)]);
    table.set_template_args(list_int, &[int]);
    let big = table.add_opaque("Big", 32);
    let list_big = table.declare_struct("QList<Big>", 8);
    table.set_fields(list_big, &[("d", 0, list_data_ptr)]);
    table.set_template_args(list_big, &[big]);

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
    let map_int_int = table.declare_struct("QMap<int,int>", 8);
    table.set_fields(map_int_int, &[("d", 0, map_data_ptr)]);
    table.set_template_args(map_int_int, &[int, int]);

    Qt5Types {
        table,
        qstring,
        vector_int,
        vector_qstring,
        list_int,
        list_big,
        map_int_int,
    }
}

// ---------------------------------------------------------------------------
// QString

#[test]
fn test_string_decodes_exactly_size_code_units()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, 0x2000);

    // Six code units in storage, but size says five: the trailing '!' must
    // not be decoded.
    let text: Vec<u8> = "héllo!".encode_utf16().flat_map(u16::to_le_bytes).collect();
    image.add_region(Address::from(0x2000), array_data(5, &text));

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = QStringPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), types.qstring));
    assert_eq!(printer.decode().unwrap(), "héllo");
    assert_eq!(printer.display_hint(), DisplayHint::String);
}

#[test]
fn test_string_empty()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, 0x2000);
    image.add_region(Address::from(0x2000), array_data(0, &[]));

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = QStringPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), types.qstring));
    assert_eq!(printer.decode().unwrap(), "");
}

#[test]
fn test_string_unreadable_data_propagates()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    // d points at memory the snapshot never captured
    container_value(&mut image, 0x9000);

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = QStringPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), types.qstring));
    assert!(matches!(printer.decode(), Err(QuarryError::MemoryRead { .. })));
}

// ---------------------------------------------------------------------------
// QVector

#[test]
fn test_vector_elements_in_index_order()
{
    let types = qt5_types();
    let expected = [7i32, 11, 13, 17];
    let mut image = MemoryImage::new();
    container_value(&mut image, 0x3000);
    let payload: Vec<u8> = expected.iter().flat_map(|v| v.to_le_bytes()).collect();
    image.add_region(Address::from(0x3000), array_data(4, &payload));

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = QVectorPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), types.vector_int)).unwrap();
    assert_eq!(printer.summary().unwrap(), "QVector<int> of length 4");
    assert_eq!(printer.display_hint(), DisplayHint::Array);

    let children: Vec<Child> = printer.children().unwrap().collect();
    assert_eq!(children.len(), 4);
    for (index, child) in children.iter().enumerate() {
        assert_eq!(child.label, format!("[{index}]"));
        assert_eq!(child.value.address, Address::from(0x3000 + 24 + index as u64 * 4));
        assert_eq!(child.value.read_int(&cx).unwrap(), i64::from(expected[index]));
    }
}

#[test]
fn test_vector_empty_yields_no_children()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, 0x3000);
    image.add_region(Address::from(0x3000), array_data(0, &[]));

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = QVectorPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), types.vector_int)).unwrap();
    assert_eq!(printer.summary().unwrap(), "QVector<int> of length 0");
    assert_eq!(printer.children().unwrap().count(), 0);
}

#[test]
fn test_vector_children_restart_from_scratch()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, 0x3000);
    let payload: Vec<u8> = [1i32, 2, 3].iter().flat_map(|v| v.to_le_bytes()).collect();
    image.add_region(Address::from(0x3000), array_data(3, &payload));

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = QVectorPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), types.vector_int)).unwrap();

    // Pull one element, stop early, then re-invoke: the fresh sequence
    // starts back at index zero.
    let first_pull: Vec<Child> = printer.children().unwrap().take(1).collect();
    assert_eq!(first_pull[0].label, "[0]");
    let restarted: Vec<Child> = printer.children().unwrap().collect();
    assert_eq!(restarted.len(), 3);
    assert_eq!(restarted[0].label, "[0]");
    assert_eq!(restarted[0].value.address, first_pull[0].value.address);
}

#[test]
fn test_vector_of_strings_decodes_recursively()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, 0x3100);

    // Vector storage holds two QString values, i.e. two d pointers
    let payload: Vec<u8> = [0x2000u64, 0x2100].iter().flat_map(|v| v.to_le_bytes()).collect();
    image.add_region(Address::from(0x3100), array_data(2, &payload));
    for (base, text) in [(0x2000u64, "ab"), (0x2100, "cd")] {
        let units: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        image.add_region(Address::from(base), array_data(text.len() as i32, &units));
    }

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = QVectorPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), types.vector_qstring)).unwrap();
    assert_eq!(printer.summary().unwrap(), "QVector<QString> of length 2");

    let decoded: Vec<String> = printer
        .children()
        .unwrap()
        .map(|child| QStringPrinter::new(&cx, child.value).decode().unwrap())
        .collect();
    assert_eq!(decoded, ["ab", "cd"]);
}

// ---------------------------------------------------------------------------
// QList

/// `QListData::Data` with a `[begin, end)` window; `slots` land at the
/// window's slot positions inside the array at +16.
fn list_data(begin: i32, end: i32, slots: &[u64]) -> Vec<u8>
{
    let mut block = vec![0u8; 16 + (begin as usize + slots.len()) * 8];
    put(&mut block, 8, &begin.to_le_bytes());
    put(&mut block, 12, &end.to_le_bytes());
    for (index, slot) in slots.iter().enumerate() {
        put(&mut block, 16 + (begin as usize + index) * 8, &slot.to_le_bytes());
    }
    block
}

#[test]
fn test_list_small_elements_read_from_slot()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, 0x4000);
    // begin=1 exercises the window shift; int (4 bytes) stays inline in the
    // 8-byte slots
    image.add_region(Address::from(0x4000), list_data(1, 4, &[100, 200, 300]));

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = QListPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), types.list_int)).unwrap();
    assert_eq!(printer.summary().unwrap(), "QList<int> of length 3");
    assert_eq!(printer.display_hint(), DisplayHint::Array);

    let children: Vec<Child> = printer.children().unwrap().map(Result::unwrap).collect();
    assert_eq!(children.len(), 3);
    for (index, child) in children.iter().enumerate() {
        assert_eq!(child.label, format!("[{index}]"));
        // inline: the view IS the slot, no dereference
        let slot = 0x4000 + 16 + (1 + index as u64) * 8;
        assert_eq!(child.value.address, Address::from(slot));
        assert_eq!(child.value.read_int(&cx).unwrap(), [100, 200, 300][index]);
    }
}

#[test]
fn test_list_large_elements_dereference_slot()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, 0x4100);
    // Big is 32 bytes (> 8-byte pointers), so each slot owns a pointer
    image.add_region(Address::from(0x4100), list_data(0, 2, &[0x7000, 0x7040]));
    let mut heap = vec![0u8; 0x80];
    put(&mut heap, 0, &0xdead_beef_u64.to_le_bytes());
    put(&mut heap, 0x40, &0xfeed_face_u64.to_le_bytes());
    image.add_region(Address::from(0x7000), heap);

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = QListPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), types.list_big)).unwrap();
    assert_eq!(printer.summary().unwrap(), "QList<Big> of length 2");

    let children: Vec<Child> = printer.children().unwrap().map(Result::unwrap).collect();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].value.address, Address::from(0x7000));
    assert_eq!(children[1].value.address, Address::from(0x7040));
    assert_eq!(cx.read_uint(children[0].value.address, 8).unwrap(), 0xdead_beef);
    assert_eq!(cx.read_uint(children[1].value.address, 8).unwrap(), 0xfeed_face);
}

#[test]
fn test_list_empty_window()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, 0x4000);
    image.add_region(Address::from(0x4000), list_data(2, 2, &[]));

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = QListPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), types.list_int)).unwrap();
    assert_eq!(printer.summary().unwrap(), "QList<int> of length 0");
    assert_eq!(printer.children().unwrap().count(), 0);
}

#[test]
fn test_is_large_uses_target_pointer_width()
{
    assert!(!is_large(4, TARGET));
    assert!(!is_large(8, TARGET));
    assert!(is_large(9, TARGET));
    assert!(is_large(32, TARGET));

    // The same element flips to boxed on a 32-bit target
    let target32 = TargetInfo::little(PointerWidth::Four);
    assert!(!is_large(4, target32));
    assert!(is_large(8, target32));
}

// ---------------------------------------------------------------------------
// QMap

/// `QMapData` block: `size` at +4, embedded header node at +8 whose `left`
/// points at the root.
fn map_data(size: i32, root: u64) -> Vec<u8>
{
    let mut block = vec![0u8; 40];
    put(&mut block, 4, &size.to_le_bytes());
    put(&mut block, 16, &root.to_le_bytes());
    block
}

/// One `QMapNode<int,int>`: base links followed by key/value payload.
fn map_node(parent: u64, left: u64, right: u64, key: i32, value: i32) -> [u8; 32]
{
    let mut node = [0u8; 32];
    put(&mut node, 0, &parent.to_le_bytes());
    put(&mut node, 8, &left.to_le_bytes());
    put(&mut node, 16, &right.to_le_bytes());
    put(&mut node, 24, &key.to_le_bytes());
    put(&mut node, 28, &value.to_le_bytes());
    node
}

const MAP_DATA: u64 = 0x5000;
const HEADER: u64 = MAP_DATA + 8;

fn map_printer_over<'a>(cx: &'a InspectContext<'a>, types: &Qt5Types) -> QMapPrinter<'a>
{
    QMapPrinter::new(cx, TypedValue::new(Address::from(VALUE_ADDR), types.map_int_int)).unwrap()
}

#[test]
fn test_map_emits_sorted_key_value_pairs()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, MAP_DATA);
    image.add_region(Address::from(MAP_DATA), map_data(3, 0x6000));

    // Balanced tree for {1, 3, 5}; parent words carry color tags 1, 2 and 3,
    // all of which must be masked off before use as addresses.
    let mut nodes = vec![0u8; 0xc0];
    put(&mut nodes, 0x00, &map_node(HEADER | 1, 0x6040, 0x6080, 3, 30));
    put(&mut nodes, 0x40, &map_node(0x6000 | 2, 0, 0, 1, 10));
    put(&mut nodes, 0x80, &map_node(0x6000 | 3, 0, 0, 5, 50));
    image.add_region(Address::from(0x6000), nodes);

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = map_printer_over(&cx, &types);
    assert_eq!(printer.summary().unwrap(), "QMap<int, int> of size 3");
    assert_eq!(printer.display_hint(), DisplayHint::Map);

    let entries: Vec<Child> = printer.entries().unwrap().map(Result::unwrap).collect();
    assert_eq!(entries.len(), 6);

    let decoded: Vec<i64> = entries.iter().map(|entry| entry.value.read_int(&cx).unwrap()).collect();
    assert_eq!(decoded, [1, 10, 3, 30, 5, 50]);
    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(entry.label, format!("[{index}]"));
    }
}

#[test]
fn test_map_order_ignores_insertion_order()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, MAP_DATA);
    image.add_region(Address::from(MAP_DATA), map_data(3, 0x6000));

    // The shape a naive insert of {5, 1, 3} could leave behind: 5 at the
    // root, a left chain below it. Output must still be sorted.
    let mut nodes = vec![0u8; 0xc0];
    put(&mut nodes, 0x00, &map_node(HEADER | 1, 0x6040, 0, 5, 50));
    put(&mut nodes, 0x40, &map_node(0x6000 | 1, 0x6080, 0, 3, 30));
    put(&mut nodes, 0x80, &map_node(0x6040 | 2, 0, 0, 1, 10));
    image.add_region(Address::from(0x6000), nodes);

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let entries: Vec<Child> = map_printer_over(&cx, &types).entries().unwrap().map(Result::unwrap).collect();

    let keys: Vec<i64> = entries
        .iter()
        .step_by(2)
        .map(|entry| entry.value.read_int(&cx).unwrap())
        .collect();
    assert_eq!(keys, [1, 3, 5]);
    let values: Vec<i64> = entries
        .iter()
        .skip(1)
        .step_by(2)
        .map(|entry| entry.value.read_int(&cx).unwrap())
        .collect();
    assert_eq!(values, [10, 30, 50]);
}

#[test]
fn test_map_empty_terminates_on_header()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, MAP_DATA);
    // size 0, header.left null: the cursor starts on the header sentinel
    image.add_region(Address::from(MAP_DATA), map_data(0, 0));

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let printer = map_printer_over(&cx, &types);
    assert_eq!(printer.summary().unwrap(), "QMap<int, int> of size 0");
    assert_eq!(printer.entries().unwrap().count(), 0);
}

#[test]
fn test_map_traversal_visits_each_node_once_then_fuses()
{
    let types = qt5_types();
    let mut image = MemoryImage::new();
    container_value(&mut image, MAP_DATA);
    image.add_region(Address::from(MAP_DATA), map_data(3, 0x6000));
    let mut nodes = vec![0u8; 0xc0];
    put(&mut nodes, 0x00, &map_node(HEADER | 1, 0x6040, 0x6080, 3, 30));
    put(&mut nodes, 0x40, &map_node(0x6000 | 1, 0, 0, 1, 10));
    put(&mut nodes, 0x80, &map_node(0x6000 | 1, 0, 0, 5, 50));
    image.add_region(Address::from(0x6000), nodes);

    let cx = InspectContext::new(&image, &types.table, TARGET);
    let mut entries = map_printer_over(&cx, &types).entries().unwrap();

    // Exactly size nodes -> 2 * size entries, each node contributing one
    // key and one value from the same address
    let mut node_addresses = Vec::new();
    for _ in 0..3 {
        let key = entries.next().unwrap().unwrap();
        let value = entries.next().unwrap().unwrap();
        assert_eq!(key.value.address + 4, value.value.address);
        node_addresses.push(key.value.address);
    }
    node_addresses.dedup();
    assert_eq!(node_addresses.len(), 3);

    assert!(entries.next().is_none());
    assert!(entries.next().is_none());
}

#[test]
fn test_map_missing_node_instantiation_errors()
{
    // A table that knows QMap<int,int> but not QMapNode<int,int>
    let mut table = TypeTable::new(PointerWidth::Eight);
    let int = table.add_primitive("int", 4, ScalarClass::Signed);
    let quintptr = table.add_primitive("quintptr", 8, ScalarClass::Unsigned);
    let node_base = table.declare_struct("QMapNodeBase", 24);
    let node_base_ptr = table.add_pointer(node_base);
    table.set_fields(
        node_base,
        &[("p", 0, quintptr), ("left", 8, node_base_ptr), ("right", 16, node_base_ptr)],
    );
    let map_data_ty = table.declare_struct("QMapData<int,int>", 40);
    table.set_fields(map_data_ty, &[("size", 4, int), ("header", 8, node_base)]);
    let map_data_ptr = table.add_pointer(map_data_ty);
    let map = table.declare_struct("QMap<int,int>", 8);
    table.set_fields(map, &[("d", 0, map_data_ptr)]);
    table.set_template_args(map, &[int, int]);

    let mut image = MemoryImage::new();
    container_value(&mut image, MAP_DATA);
    image.add_region(Address::from(MAP_DATA), map_data(0, 0));

    let cx = InspectContext::new(&image, &table, TARGET);
    let printer = QMapPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), map)).unwrap();
    assert!(matches!(printer.entries(), Err(QuarryError::UnknownType(name)) if name == "QMapNode<int,int>"));
}

#[test]
fn test_map_requires_both_template_args()
{
    let mut table = TypeTable::new(PointerWidth::Eight);
    let int = table.add_primitive("int", 4, ScalarClass::Signed);
    let map = table.declare_struct("QMap<int,int>", 8);
    table.set_template_args(map, &[int]);

    let image = MemoryImage::new();
    let cx = InspectContext::new(&image, &table, TARGET);
    let result = QMapPrinter::new(&cx, TypedValue::new(Address::from(VALUE_ADDR), map));
    assert!(matches!(result, Err(QuarryError::MissingTemplateArg { index: 1, .. })));
}
