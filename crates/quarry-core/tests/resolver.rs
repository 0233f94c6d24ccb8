//! Tests for the hand-populated type table

use quarry_core::resolver::{ScalarClass, TypeClass, TypeResolver, TypeTable};
use quarry_core::types::PointerWidth;
use quarry_core::QuarryError;

fn table() -> TypeTable
{
    TypeTable::new(PointerWidth::Eight)
}

#[test]
fn test_lookup_by_exact_name()
{
    let mut table = table();
    let int = table.add_primitive("int", 4, ScalarClass::Signed);
    assert_eq!(table.lookup("int").unwrap(), int);
}

#[test]
fn test_lookup_unknown_type_errors()
{
    let table = table();
    assert!(matches!(table.lookup("QRect"), Err(QuarryError::UnknownType(name)) if name == "QRect"));
}

#[test]
fn test_lookup_normalizes_whitespace()
{
    let mut table = table();
    let node = table.declare_struct("QMapNode<int,QString>", 48);
    // the spelling with a space resolves to the same handle
    assert_eq!(table.lookup("QMapNode<int, QString>").unwrap(), node);

    let map = table.declare_struct("QMap<int, QString>", 8);
    assert_eq!(table.lookup("QMap<int,QString>").unwrap(), map);
}

#[test]
fn test_classify()
{
    let mut table = table();
    let uint = table.add_primitive("unsigned int", 4, ScalarClass::Unsigned);
    let int = table.add_primitive("int", 4, ScalarClass::Signed);
    let double = table.add_primitive("double", 8, ScalarClass::Float);
    let boolean = table.add_primitive("bool", 1, ScalarClass::Bool);
    let node = table.declare_struct("Node", 16);
    let node_ptr = table.add_pointer(node);
    let blob = table.add_opaque("Blob", 32);

    assert_eq!(table.classify(uint).unwrap(), TypeClass::UnsignedInt);
    assert_eq!(table.classify(int).unwrap(), TypeClass::SignedInt);
    assert_eq!(table.classify(double).unwrap(), TypeClass::Float);
    assert_eq!(table.classify(boolean).unwrap(), TypeClass::Bool);
    assert_eq!(table.classify(node_ptr).unwrap(), TypeClass::Pointer(node));
    assert_eq!(table.classify(node).unwrap(), TypeClass::Struct);
    assert_eq!(table.classify(blob).unwrap(), TypeClass::Opaque);
}

#[test]
fn test_pointer_size_follows_table_width()
{
    let mut narrow = TypeTable::new(PointerWidth::Four);
    let int = narrow.add_primitive("int", 4, ScalarClass::Signed);
    let ptr = narrow.add_pointer(int);
    assert_eq!(narrow.byte_size(ptr).unwrap(), 4);

    let mut wide = TypeTable::new(PointerWidth::Eight);
    let int = wide.add_primitive("int", 4, ScalarClass::Signed);
    let ptr = wide.add_pointer(int);
    assert_eq!(wide.byte_size(ptr).unwrap(), 8);
}

#[test]
fn test_add_pointer_dedups()
{
    let mut table = table();
    let int = table.add_primitive("int", 4, ScalarClass::Signed);
    let first = table.add_pointer(int);
    let second = table.add_pointer(int);
    assert_eq!(first, second);
    assert_eq!(table.type_name(first).unwrap(), "int*");
}

#[test]
fn test_self_referential_struct()
{
    let mut table = table();
    let node = table.declare_struct("QMapNodeBase", 24);
    let node_ptr = table.add_pointer(node);
    table.set_fields(node, &[("left", 8, node_ptr), ("right", 16, node_ptr)]);

    let left = table.field(node, "left").unwrap();
    assert_eq!(left.offset, 8);
    assert_eq!(table.classify(left.ty).unwrap(), TypeClass::Pointer(node));
}

#[test]
fn test_field_lookup_miss_errors()
{
    let mut table = table();
    let int = table.add_primitive("int", 4, ScalarClass::Signed);
    let node = table.declare_struct("Node", 8);
    table.set_fields(node, &[("value", 0, int)]);

    assert!(matches!(
        table.field(node, "missing"),
        Err(QuarryError::UnknownField { field, .. }) if field == "missing"
    ));
    // scalars have no fields at all
    assert!(table.field(int, "value").is_err());
}

#[test]
fn test_template_args()
{
    let mut table = table();
    let int = table.add_primitive("int", 4, ScalarClass::Signed);
    let qstring = table.declare_struct("QString", 8);
    let map = table.declare_struct("QMap<int,QString>", 8);
    table.set_template_args(map, &[int, qstring]);

    assert_eq!(table.template_arg(map, 0).unwrap(), int);
    assert_eq!(table.template_arg(map, 1).unwrap(), qstring);
    assert!(matches!(
        table.template_arg(map, 2),
        Err(QuarryError::MissingTemplateArg { index: 2, .. })
    ));
    assert!(table.template_arg(int, 0).is_err());
}

#[test]
fn test_alias()
{
    let mut table = table();
    let ulong = table.add_primitive("unsigned long", 8, ScalarClass::Unsigned);
    table.alias("quintptr", ulong);
    assert_eq!(table.lookup("quintptr").unwrap(), ulong);
    assert_eq!(table.type_name(ulong).unwrap(), "unsigned long");
}

#[test]
fn test_fields_enumeration()
{
    let mut table = table();
    let int = table.add_primitive("int", 4, ScalarClass::Signed);
    let node = table.declare_struct("Node", 8);
    table.set_fields(node, &[("key", 0, int), ("value", 4, int)]);

    let fields = table.fields(node);
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].0, "key");
    assert_eq!(fields[1].1.offset, 4);
    assert!(table.fields(int).is_empty());
}
