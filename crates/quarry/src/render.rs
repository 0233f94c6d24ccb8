//! Recursive tree rendering of decoded values.
//!
//! The printers hand back container summaries and lazy child sequences;
//! turning those into indented console output — including recursing into
//! children that are themselves containers — is the host's job, and this is
//! that host.

use quarry_core::error::Result;
use quarry_core::printers::{Child, QListPrinter, QMapPrinter, QStringPrinter, QVectorPrinter};
use quarry_core::registry::{PrinterKind, Registry};
use quarry_core::resolver::TypeClass;
use quarry_core::value::{InspectContext, TypedValue};

/// Render one value (and, for containers, its children) to stdout
///
/// `depth` bounds recursion into nested containers; `limit` bounds how many
/// children of each container are pulled from its lazy sequence — stopping
/// early costs the printers nothing beyond the last pulled element.
pub fn render_value(
    cx: &InspectContext<'_>,
    registry: &Registry,
    label: &str,
    value: TypedValue,
    indent: usize,
    depth: usize,
    limit: usize,
) -> Result<()>
{
    let pad = "  ".repeat(indent);
    let type_name = cx.types.type_name(value.ty)?;

    match registry.find(&type_name) {
        Some(PrinterKind::String) => {
            let text = QStringPrinter::new(cx, value).decode()?;
            println!("{pad}{label} = \"{text}\"");
            Ok(())
        }
        Some(PrinterKind::Vector) => {
            let printer = QVectorPrinter::new(cx, value)?;
            println!("{pad}{label} = {}", printer.summary()?);
            if depth == 0 {
                return Ok(());
            }
            render_children(cx, registry, printer.children()?.map(Ok), indent + 1, depth - 1, limit)
        }
        Some(PrinterKind::List) => {
            let printer = QListPrinter::new(cx, value)?;
            println!("{pad}{label} = {}", printer.summary()?);
            if depth == 0 {
                return Ok(());
            }
            render_children(cx, registry, printer.children()?, indent + 1, depth - 1, limit)
        }
        Some(PrinterKind::Map) => {
            let printer = QMapPrinter::new(cx, value)?;
            println!("{pad}{label} = {}", printer.summary()?);
            if depth == 0 {
                return Ok(());
            }
            render_children(cx, registry, printer.entries()?, indent + 1, depth - 1, limit)
        }
        None => render_leaf(cx, &pad, label, value, &type_name),
    }
}

fn render_children<I>(
    cx: &InspectContext<'_>,
    registry: &Registry,
    mut children: I,
    indent: usize,
    depth: usize,
    limit: usize,
) -> Result<()>
where
    I: Iterator<Item = Result<Child>>,
{
    let mut shown = 0usize;
    while let Some(child) = children.next() {
        let child = child?;
        if shown == limit {
            println!("{}...", "  ".repeat(indent));
            break;
        }
        render_value(cx, registry, &child.label, child.value, indent, depth, limit)?;
        shown += 1;
    }
    Ok(())
}

fn render_leaf(cx: &InspectContext<'_>, pad: &str, label: &str, value: TypedValue, type_name: &str) -> Result<()>
{
    match cx.types.classify(value.ty)? {
        TypeClass::UnsignedInt => println!("{pad}{label} = {}", value.read_uint(cx)?),
        TypeClass::SignedInt => println!("{pad}{label} = {}", value.read_int(cx)?),
        TypeClass::Bool => println!("{pad}{label} = {}", value.read_uint(cx)? != 0),
        TypeClass::Float => match cx.types.byte_size(value.ty)? {
            4 => println!("{pad}{label} = {}", f32::from_bits(value.read_uint(cx)? as u32)),
            8 => println!("{pad}{label} = {}", f64::from_bits(value.read_uint(cx)?)),
            _ => println!("{pad}{label} = <{type_name}> at {}", value.address),
        },
        TypeClass::Pointer(_) => println!("{pad}{label} = {}", value.read_ptr(cx)?),
        TypeClass::Struct | TypeClass::Opaque => {
            println!("{pad}{label} = <{type_name}> at {}", value.address);
        }
    }
    Ok(())
}
