//! Type metadata resolution.
//!
//! The printers decode container layouts purely from type metadata — field
//! offsets, byte sizes, template arguments — which they query through the
//! [`TypeResolver`] trait. [`TypeTable`] is the in-memory implementation:
//! hosts either populate it by hand (session setup, tests) or let
//! [`dwarf::DwarfResolver`] fill it from the inspected binary's debug info.

pub mod dwarf;

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::error::{QuarryError, Result};
use crate::types::PointerWidth;

/// Opaque identifier for a resolved type
///
/// Handles are cheap to copy and only meaningful to the resolver that
/// produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle(u32);

/// How a scalar type's bit pattern should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarClass
{
    /// Unsigned integer (also covers plain enums and character types)
    Unsigned,
    /// Two's-complement signed integer
    Signed,
    /// IEEE-754 float
    Float,
    /// Boolean
    Bool,
}

/// Coarse classification of a resolved type
///
/// This is all the printers and renderers need to know about a type: enough
/// to pick an access path (inline scalar, one dereference, nested struct),
/// never the full shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass
{
    /// Unsigned integer
    UnsignedInt,
    /// Signed integer
    SignedInt,
    /// Floating point
    Float,
    /// Boolean
    Bool,
    /// Pointer to the given type
    Pointer(TypeHandle),
    /// Struct or class with named fields
    Struct,
    /// Known by name and size only
    Opaque,
}

/// Offset and type of a struct field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo
{
    /// Byte offset of the field from the start of the struct
    pub offset: u64,
    /// Type of the field
    pub ty: TypeHandle,
}

/// Queryable type metadata for the inspected process
///
/// All methods return typed errors on a miss; the printers propagate those
/// verbatim rather than guessing at layouts.
pub trait TypeResolver
{
    /// Resolve a type by name
    ///
    /// Implementations should tolerate whitespace differences inside
    /// template argument lists (`QMap<int, QString>` vs `QMap<int,QString>`).
    fn lookup(&self, name: &str) -> Result<TypeHandle>;

    /// Display name of a type
    fn type_name(&self, ty: TypeHandle) -> Result<String>;

    /// Size of a type in bytes
    fn byte_size(&self, ty: TypeHandle) -> Result<u64>;

    /// Coarse classification of a type
    fn classify(&self, ty: TypeHandle) -> Result<TypeClass>;

    /// Offset and type of a named field of a struct type
    fn field(&self, ty: TypeHandle, name: &str) -> Result<FieldInfo>;

    /// The `index`-th template argument of an instantiated class type
    fn template_arg(&self, ty: TypeHandle, index: usize) -> Result<TypeHandle>;
}

#[derive(Debug, Clone)]
pub(crate) struct FieldDef
{
    pub(crate) name: String,
    pub(crate) offset: u64,
    pub(crate) ty: TypeHandle,
}

#[derive(Debug, Clone)]
enum TypeData
{
    Primitive(ScalarClass),
    Pointer(TypeHandle),
    Struct
    {
        fields: Vec<FieldDef>,
        template_args: SmallVec<[TypeHandle; 2]>,
    },
    Opaque,
}

#[derive(Debug, Clone)]
struct TypeDef
{
    name: String,
    size: u64,
    data: TypeData,
}

/// In-memory [`TypeResolver`] implementation
///
/// The table is an append-only arena of type definitions with a name index.
/// Struct registration is two-phase — [`declare_struct`](Self::declare_struct)
/// first, fields later — so self-referential layouts like an intrusive tree
/// node pointing at its own type can be described.
///
/// ## Example
///
/// ```rust
/// use quarry_core::resolver::{ScalarClass, TypeResolver, TypeTable};
/// use quarry_core::types::PointerWidth;
///
/// let mut table = TypeTable::new(PointerWidth::Eight);
/// let int = table.add_primitive("int", 4, ScalarClass::Signed);
/// let node = table.declare_struct("Node", 24);
/// let node_ptr = table.add_pointer(node);
/// table.set_fields(node, &[("next", 0, node_ptr), ("value", 8, int)]);
///
/// assert_eq!(table.lookup("Node")?, node);
/// assert_eq!(table.field(node, "value")?.offset, 8);
/// # Ok::<(), quarry_core::error::QuarryError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TypeTable
{
    pointer_width: PointerWidth,
    defs: Vec<TypeDef>,
    by_name: HashMap<String, TypeHandle>,
}

impl TypeTable
{
    /// Create an empty table for a target with the given pointer width
    ///
    /// The width fixes the size of every pointer type registered later.
    pub fn new(pointer_width: PointerWidth) -> Self
    {
        Self {
            pointer_width,
            defs: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Pointer width this table was created for
    pub fn pointer_width(&self) -> PointerWidth
    {
        self.pointer_width
    }

    /// Number of registered types
    pub fn len(&self) -> usize
    {
        self.defs.len()
    }

    /// Whether the table has no types registered
    pub fn is_empty(&self) -> bool
    {
        self.defs.is_empty()
    }

    fn push(&mut self, def: TypeDef) -> TypeHandle
    {
        let handle = TypeHandle(self.defs.len() as u32);
        self.index_name(&def.name, handle);
        self.defs.push(def);
        handle
    }

    fn index_name(&mut self, name: &str, handle: TypeHandle)
    {
        if name.is_empty() {
            return;
        }
        self.by_name.entry(name.to_string()).or_insert(handle);
        let canonical = normalized(name);
        if canonical != name {
            self.by_name.entry(canonical).or_insert(handle);
        }
    }

    /// Register a scalar type
    pub fn add_primitive(&mut self, name: &str, size: u64, class: ScalarClass) -> TypeHandle
    {
        self.push(TypeDef {
            name: name.to_string(),
            size,
            data: TypeData::Primitive(class),
        })
    }

    /// Register a type known by name and size only
    ///
    /// Useful for element types whose internals don't matter to a decode
    /// (the size alone decides inline-vs-boxed storage in `QList`).
    pub fn add_opaque(&mut self, name: &str, size: u64) -> TypeHandle
    {
        self.push(TypeDef {
            name: name.to_string(),
            size,
            data: TypeData::Opaque,
        })
    }

    /// Register (or reuse) a pointer type to `pointee`
    ///
    /// The pointer's size is the table's pointer width. Registering the same
    /// pointee twice returns the existing handle.
    pub fn add_pointer(&mut self, pointee: TypeHandle) -> TypeHandle
    {
        let name = format!("{}*", self.defs[pointee.0 as usize].name);
        if let Some(&existing) = self.by_name.get(&name) {
            if let TypeData::Pointer(target) = self.defs[existing.0 as usize].data {
                if target == pointee {
                    return existing;
                }
            }
        }
        self.push(TypeDef {
            name,
            size: self.pointer_width.bytes(),
            data: TypeData::Pointer(pointee),
        })
    }

    /// Declare a struct type with its total size, fields to follow
    ///
    /// Returns a handle usable immediately — including inside its own field
    /// list, which is what intrusive node types need.
    pub fn declare_struct(&mut self, name: &str, size: u64) -> TypeHandle
    {
        self.push(TypeDef {
            name: name.to_string(),
            size,
            data: TypeData::Struct {
                fields: Vec::new(),
                template_args: SmallVec::new(),
            },
        })
    }

    /// Define the fields of a previously declared struct
    ///
    /// Each entry is `(name, byte offset, type)`. Replaces any fields set
    /// earlier.
    pub fn set_fields(&mut self, ty: TypeHandle, fields: &[(&str, u64, TypeHandle)])
    {
        let defs = fields
            .iter()
            .map(|(name, offset, field_ty)| FieldDef {
                name: (*name).to_string(),
                offset: *offset,
                ty: *field_ty,
            })
            .collect();
        if let TypeData::Struct { fields: slot, .. } = &mut self.defs[ty.0 as usize].data {
            *slot = defs;
        }
    }

    /// Record the template arguments of an instantiated class type
    pub fn set_template_args(&mut self, ty: TypeHandle, args: &[TypeHandle])
    {
        if let TypeData::Struct { template_args, .. } = &mut self.defs[ty.0 as usize].data {
            *template_args = SmallVec::from_slice(args);
        }
    }

    /// Register an additional name for an existing type
    ///
    /// Used for typedefs (`QString` vs its data class) and for spelling
    /// variants the debug info emits.
    pub fn alias(&mut self, name: &str, ty: TypeHandle)
    {
        self.index_name(name, ty);
    }

    pub(crate) fn struct_fields(&self, ty: TypeHandle) -> Option<&[FieldDef]>
    {
        match &self.defs[ty.0 as usize].data {
            TypeData::Struct { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// All fields of a struct type in declaration order (empty otherwise)
    ///
    /// The [`TypeResolver`] trait only looks fields up by name; this
    /// enumeration exists for hosts that render whole layouts.
    pub fn fields(&self, ty: TypeHandle) -> Vec<(String, FieldInfo)>
    {
        self.struct_fields(ty)
            .map(|fields| {
                fields
                    .iter()
                    .map(|field| {
                        (
                            field.name.clone(),
                            FieldInfo {
                                offset: field.offset,
                                ty: field.ty,
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn def(&self, ty: TypeHandle) -> &TypeDef
    {
        &self.defs[ty.0 as usize]
    }
}

impl TypeResolver for TypeTable
{
    fn lookup(&self, name: &str) -> Result<TypeHandle>
    {
        if let Some(&handle) = self.by_name.get(name) {
            return Ok(handle);
        }
        self.by_name
            .get(&normalized(name))
            .copied()
            .ok_or_else(|| QuarryError::UnknownType(name.to_string()))
    }

    fn type_name(&self, ty: TypeHandle) -> Result<String>
    {
        Ok(self.def(ty).name.clone())
    }

    fn byte_size(&self, ty: TypeHandle) -> Result<u64>
    {
        Ok(self.def(ty).size)
    }

    fn classify(&self, ty: TypeHandle) -> Result<TypeClass>
    {
        Ok(match &self.def(ty).data {
            TypeData::Primitive(ScalarClass::Unsigned) => TypeClass::UnsignedInt,
            TypeData::Primitive(ScalarClass::Signed) => TypeClass::SignedInt,
            TypeData::Primitive(ScalarClass::Float) => TypeClass::Float,
            TypeData::Primitive(ScalarClass::Bool) => TypeClass::Bool,
            TypeData::Pointer(pointee) => TypeClass::Pointer(*pointee),
            TypeData::Struct { .. } => TypeClass::Struct,
            TypeData::Opaque => TypeClass::Opaque,
        })
    }

    fn field(&self, ty: TypeHandle, name: &str) -> Result<FieldInfo>
    {
        let def = self.def(ty);
        let TypeData::Struct { fields, .. } = &def.data else {
            return Err(QuarryError::UnknownField {
                type_name: def.name.clone(),
                field: name.to_string(),
            });
        };
        fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| FieldInfo {
                offset: field.offset,
                ty: field.ty,
            })
            .ok_or_else(|| QuarryError::UnknownField {
                type_name: def.name.clone(),
                field: name.to_string(),
            })
    }

    fn template_arg(&self, ty: TypeHandle, index: usize) -> Result<TypeHandle>
    {
        let def = self.def(ty);
        let args: &[TypeHandle] = match &def.data {
            TypeData::Struct { template_args, .. } => template_args,
            _ => &[],
        };
        args.get(index).copied().ok_or_else(|| QuarryError::MissingTemplateArg {
            type_name: def.name.clone(),
            index,
        })
    }
}

/// Canonical spelling of a type name: whitespace stripped around template
/// and pointer punctuation, single spaces elsewhere.
pub(crate) fn normalized(name: &str) -> String
{
    const SEPARATORS: &[char] = &['<', '>', ',', '*', '&'];

    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space && !SEPARATORS.contains(&c) && !out.ends_with(SEPARATORS) {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_normalized_strips_template_whitespace()
    {
        assert_eq!(normalized("QMap<int, QString>"), "QMap<int,QString>");
        assert_eq!(normalized("QVector< int >"), "QVector<int>");
        assert_eq!(normalized("QMapNode<int,QString>"), "QMapNode<int,QString>");
    }

    #[test]
    fn test_normalized_keeps_multiword_primitives()
    {
        assert_eq!(normalized("unsigned int"), "unsigned int");
        assert_eq!(normalized("QList<unsigned  long>"), "QList<unsigned long>");
    }

    #[test]
    fn test_normalized_pointer_spelling()
    {
        assert_eq!(normalized("QMapNodeBase *"), "QMapNodeBase*");
    }
}
