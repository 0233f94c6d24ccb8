//! Tests for type-name dispatch

use quarry_core::registry::{default_registry, PrinterKind, Registry};

#[test]
fn test_exact_match()
{
    let registry = Registry::qt5();
    assert_eq!(registry.find("QString"), Some(PrinterKind::String));
    // exact means exact: a different type sharing the prefix is no match
    assert_eq!(registry.find("QStringList"), None);
}

#[test]
fn test_template_match_any_instantiation()
{
    let registry = Registry::qt5();
    assert_eq!(registry.find("QVector<int>"), Some(PrinterKind::Vector));
    assert_eq!(registry.find("QVector<MyType>"), Some(PrinterKind::Vector));
    assert_eq!(registry.find("QList<unsigned long>"), Some(PrinterKind::List));
    assert_eq!(registry.find("QMap<int, QString>"), Some(PrinterKind::Map));
}

#[test]
fn test_template_match_requires_arguments()
{
    let registry = Registry::qt5();
    assert_eq!(registry.find("QVector"), None);
    assert_eq!(registry.find("QVector<>"), None);
}

#[test]
fn test_template_match_is_prefix_exact()
{
    let registry = Registry::qt5();
    assert_eq!(registry.find("QVectorIterator<int>"), None);
    assert_eq!(registry.find("MyQVector<int>"), None);
}

#[test]
fn test_nested_template_arguments()
{
    let registry = Registry::qt5();
    assert_eq!(registry.find("QList<QVector<int>>"), Some(PrinterKind::List));
    assert_eq!(registry.find("QMap<QString, QList<int>>"), Some(PrinterKind::Map));
}

#[test]
fn test_whitespace_and_decoration_ignored()
{
    let registry = Registry::qt5();
    assert_eq!(registry.find("QVector< int >"), Some(PrinterKind::Vector));
    assert_eq!(registry.find("const QVector<int>&"), Some(PrinterKind::Vector));
    assert_eq!(registry.find("const QString"), Some(PrinterKind::String));
}

#[test]
fn test_unknown_types_do_not_match()
{
    let registry = Registry::qt5();
    assert_eq!(registry.find("QRect"), None);
    assert_eq!(registry.find("std::vector<int>"), None);
}

#[test]
fn test_default_registry_is_qt5_table()
{
    let registry = default_registry();
    assert_eq!(registry.find("QString"), Some(PrinterKind::String));
    assert_eq!(registry.find("QMap<int,int>"), Some(PrinterKind::Map));
}

#[test]
fn test_custom_registration()
{
    let mut registry = Registry::new();
    registry.register_template("QHash", PrinterKind::Map);
    assert_eq!(registry.find("QHash<int, int>"), Some(PrinterKind::Map));
    assert_eq!(registry.find("QMap<int, int>"), None);
}
