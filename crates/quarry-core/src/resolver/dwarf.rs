//! DWARF-backed type resolution.
//!
//! Scans the debug info of the inspected binary once and materializes every
//! named type definition into a [`TypeTable`]: base types with their
//! encodings, pointer types, structure/class layouts with member byte
//! offsets and template arguments, typedefs as aliases. After the scan the
//! gimli machinery is dropped; queries run against the table alone.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use gimli::{
    constants, AttributeValue, DebuggingInformationEntry, Dwarf, EndianArcSlice, Reader, RunTimeEndian, SectionId,
    Unit, UnitOffset, UnitSectionOffset, UnitType,
};
use object::{Object, ObjectSection};
use tracing::debug;

use crate::error::{QuarryError, Result};
use crate::resolver::{FieldInfo, ScalarClass, TypeClass, TypeHandle, TypeResolver, TypeTable};
use crate::types::{Endianness, PointerWidth, TargetInfo};

type OwnedReader = EndianArcSlice<RunTimeEndian>;
type OwnedDwarf = Dwarf<OwnedReader>;

const MAX_TYPE_REF_DEPTH: usize = 32;

/// Map a gimli DWARF error to a `QuarryError` with context.
fn dwarf_error(context: &str, err: gimli::Error) -> QuarryError
{
    QuarryError::DebugInfo(format!("{context}: {err}"))
}

/// Type metadata scanned from a binary's DWARF
///
/// ## Example
///
/// ```rust,no_run
/// use quarry_core::resolver::dwarf::DwarfResolver;
/// use quarry_core::resolver::TypeResolver;
///
/// let resolver = DwarfResolver::load("/usr/bin/app")?;
/// let _map = resolver.lookup("QMap<int, QString>")?;
/// # Ok::<(), quarry_core::error::QuarryError>(())
/// ```
pub struct DwarfResolver
{
    table: TypeTable,
    target: TargetInfo,
}

impl DwarfResolver
{
    /// Parse the binary at `path` and scan its DWARF into a type table
    ///
    /// The target description (pointer width, byte order) is taken from the
    /// object file itself, so a 64-bit inspector loading a 32-bit binary
    /// produces 32-bit layouts.
    pub fn load(path: impl AsRef<Path>) -> Result<Self>
    {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let data = Arc::<[u8]>::from(bytes);
        let file = object::File::parse(&*data)
            .map_err(|err| QuarryError::DebugInfo(format!("failed to parse {}: {err}", path.display())))?;

        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };
        let target = TargetInfo::new(
            if file.is_64() { PointerWidth::Eight } else { PointerWidth::Four },
            if file.is_little_endian() {
                Endianness::Little
            } else {
                Endianness::Big
            },
        );

        let dwarf: OwnedDwarf = Dwarf::load(|id: SectionId| -> std::result::Result<OwnedReader, gimli::Error> {
            let section = file
                .section_by_name(id.name())
                .and_then(|section| section.uncompressed_data().ok())
                .map(|cow| Arc::<[u8]>::from(cow.into_owned()))
                .unwrap_or_else(|| Arc::<[u8]>::from(Vec::new()));
            Ok(EndianArcSlice::new(section, endian))
        })
        .map_err(|err| dwarf_error("loading DWARF sections", err))?;

        let mut units = Vec::new();
        let mut headers = dwarf.units();
        while let Some(header) = headers
            .next()
            .map_err(|err| dwarf_error("reading .debug_info unit header", err))?
        {
            units.push(dwarf.unit(header).map_err(|err| dwarf_error("parsing compilation unit", err))?);
        }
        let mut type_headers = dwarf.type_units();
        while let Some(header) = type_headers
            .next()
            .map_err(|err| dwarf_error("reading .debug_types unit header", err))?
        {
            units.push(dwarf.unit(header).map_err(|err| dwarf_error("parsing type unit", err))?);
        }

        let mut scanner = Scanner::new(&dwarf, &units, target.pointer_width);
        scanner.scan()?;
        let table = scanner.finish();

        debug!(path = %path.display(), types = table.len(), "scanned debug info");
        Ok(Self { table, target })
    }

    /// ABI of the binary this resolver was loaded from
    pub fn target(&self) -> TargetInfo
    {
        self.target
    }

    /// The scanned type table
    pub fn table(&self) -> &TypeTable
    {
        &self.table
    }

    /// Consume the resolver, keeping only the table
    pub fn into_table(self) -> TypeTable
    {
        self.table
    }
}

impl TypeResolver for DwarfResolver
{
    fn lookup(&self, name: &str) -> Result<TypeHandle>
    {
        self.table.lookup(name)
    }

    fn type_name(&self, ty: TypeHandle) -> Result<String>
    {
        self.table.type_name(ty)
    }

    fn byte_size(&self, ty: TypeHandle) -> Result<u64>
    {
        self.table.byte_size(ty)
    }

    fn classify(&self, ty: TypeHandle) -> Result<TypeClass>
    {
        self.table.classify(ty)
    }

    fn field(&self, ty: TypeHandle, name: &str) -> Result<FieldInfo>
    {
        self.table.field(ty, name)
    }

    fn template_arg(&self, ty: TypeHandle, index: usize) -> Result<TypeHandle>
    {
        self.table.template_arg(ty, index)
    }
}

/// One-shot DIE-to-table conversion state.
struct Scanner<'a>
{
    dwarf: &'a OwnedDwarf,
    units: &'a [Unit<OwnedReader>],
    table: TypeTable,
    /// DIE offset -> handle, so shared and self-referential types convert once.
    converted: HashMap<UnitSectionOffset<usize>, TypeHandle>,
    /// name -> defining DIE, used to redirect forward declarations.
    defs_by_name: HashMap<String, (usize, UnitOffset<usize>)>,
    /// (name, size) -> handle, so repeated per-unit base types dedup.
    primitives: HashMap<(String, u64), TypeHandle>,
    unknown: TypeHandle,
}

impl<'a> Scanner<'a>
{
    fn new(dwarf: &'a OwnedDwarf, units: &'a [Unit<OwnedReader>], pointer_width: PointerWidth) -> Self
    {
        let mut table = TypeTable::new(pointer_width);
        let unknown = table.add_opaque("void", 0);
        Self {
            dwarf,
            units,
            table,
            converted: HashMap::new(),
            defs_by_name: HashMap::new(),
            primitives: HashMap::new(),
            unknown,
        }
    }

    fn finish(self) -> TypeTable
    {
        self.table
    }

    fn scan(&mut self) -> Result<()>
    {
        // Pass 1: index every named definition, so forward declarations and
        // cross-unit references can be redirected to the real layout.
        let units = self.units;
        let mut roots = Vec::new();
        for (unit_index, unit) in units.iter().enumerate() {
            let mut cursor = unit.entries();
            while let Some((_delta, entry)) = cursor.next_dfs().map_err(|err| dwarf_error("traversing DIE tree", err))? {
                if !is_named_type_tag(entry.tag()) {
                    continue;
                }
                let Some(name) = self.entry_name(unit, entry)? else {
                    continue;
                };
                // Only complete definitions qualify; a sizeless declaration
                // indexed here would shadow the real layout.
                if entry.tag() != constants::DW_TAG_typedef && (is_declaration(entry)? || byte_size(entry)?.is_none()) {
                    continue;
                }
                roots.push((unit_index, entry.offset()));
                self.defs_by_name.entry(name).or_insert((unit_index, entry.offset()));
            }
        }

        // Pass 2: materialize them all.
        for (unit_index, offset) in roots {
            self.convert(unit_index, offset, 0)?;
        }
        Ok(())
    }

    fn convert(&mut self, unit_index: usize, offset: UnitOffset<usize>, depth: usize) -> Result<TypeHandle>
    {
        let units = self.units;
        let unit = &units[unit_index];
        let key = offset.to_unit_section_offset(unit);
        if let Some(&handle) = self.converted.get(&key) {
            return Ok(handle);
        }
        if depth >= MAX_TYPE_REF_DEPTH {
            return Ok(self.unknown);
        }

        let entry = unit.entry(offset).map_err(|err| dwarf_error("resolving type reference", err))?;
        let handle = match entry.tag() {
            constants::DW_TAG_base_type => self.convert_base(unit, &entry)?,
            constants::DW_TAG_pointer_type | constants::DW_TAG_reference_type | constants::DW_TAG_rvalue_reference_type => {
                let pointee = match self.type_attr(&entry)? {
                    Some(value) => self.convert_ref(unit_index, value, depth + 1)?,
                    None => self.unknown,
                };
                self.table.add_pointer(pointee)
            }
            constants::DW_TAG_structure_type | constants::DW_TAG_class_type | constants::DW_TAG_union_type => {
                return self.convert_struct(unit_index, offset, depth, key);
            }
            constants::DW_TAG_enumeration_type => {
                let name = self.entry_name(unit, &entry)?.unwrap_or_default();
                let size = byte_size(&entry)?.unwrap_or(4);
                self.dedup_primitive(&name, size, ScalarClass::Unsigned)
            }
            constants::DW_TAG_typedef => {
                let target = match self.type_attr(&entry)? {
                    Some(value) => self.convert_ref(unit_index, value, depth + 1)?,
                    None => self.unknown,
                };
                if let Some(name) = self.entry_name(unit, &entry)? {
                    self.table.alias(&name, target);
                }
                target
            }
            constants::DW_TAG_const_type | constants::DW_TAG_volatile_type | constants::DW_TAG_restrict_type => {
                match self.type_attr(&entry)? {
                    Some(value) => self.convert_ref(unit_index, value, depth + 1)?,
                    None => self.unknown,
                }
            }
            constants::DW_TAG_array_type => {
                let size = byte_size(&entry)?.unwrap_or(0);
                self.table.add_opaque("", size)
            }
            _ => self.unknown,
        };

        self.converted.insert(key, handle);
        Ok(handle)
    }

    fn convert_base(&mut self, unit: &Unit<OwnedReader>, entry: &DebuggingInformationEntry<'_, '_, OwnedReader>) -> Result<TypeHandle>
    {
        let name = self.entry_name(unit, entry)?.unwrap_or_default();
        let size = byte_size(entry)?.unwrap_or(0);
        let class = match entry
            .attr_value(constants::DW_AT_encoding)
            .map_err(|err| dwarf_error("reading DW_AT_encoding", err))?
        {
            Some(AttributeValue::Encoding(encoding)) => {
                if encoding == constants::DW_ATE_float {
                    ScalarClass::Float
                } else if encoding == constants::DW_ATE_boolean {
                    ScalarClass::Bool
                } else if encoding == constants::DW_ATE_signed || encoding == constants::DW_ATE_signed_char {
                    ScalarClass::Signed
                } else {
                    ScalarClass::Unsigned
                }
            }
            _ => ScalarClass::Unsigned,
        };
        Ok(self.dedup_primitive(&name, size, class))
    }

    fn dedup_primitive(&mut self, name: &str, size: u64, class: ScalarClass) -> TypeHandle
    {
        if let Some(&existing) = self.primitives.get(&(name.to_string(), size)) {
            return existing;
        }
        let handle = self.table.add_primitive(name, size, class);
        self.primitives.insert((name.to_string(), size), handle);
        handle
    }

    fn convert_struct(
        &mut self,
        unit_index: usize,
        offset: UnitOffset<usize>,
        depth: usize,
        key: UnitSectionOffset<usize>,
    ) -> Result<TypeHandle>
    {
        let units = self.units;
        let unit = &units[unit_index];
        let entry = unit.entry(offset).map_err(|err| dwarf_error("resolving struct entry", err))?;
        let name = self.entry_name(unit, &entry)?;
        let size = byte_size(&entry)?;

        // A declaration has no layout of its own; redirect to the definition
        // when one exists anywhere in the scanned units.
        if is_declaration(&entry)? || size.is_none() {
            if let Some(&(def_unit, def_offset)) = name.as_deref().and_then(|name| self.defs_by_name.get(name)) {
                if (def_unit, def_offset) != (unit_index, offset) {
                    let handle = self.convert(def_unit, def_offset, depth + 1)?;
                    self.converted.insert(key, handle);
                    return Ok(handle);
                }
            }
            let handle = self.table.add_opaque("", 0);
            self.converted.insert(key, handle);
            return Ok(handle);
        }

        // Reserve the handle before touching members so self-referential
        // layouts (intrusive tree nodes) terminate.
        let handle = self.table.declare_struct(name.as_deref().unwrap_or(""), size.unwrap_or(0));
        self.converted.insert(key, handle);

        let mut fields: Vec<(String, u64, TypeHandle)> = Vec::new();
        let mut template_args = Vec::new();
        let mut bases: Vec<(u64, TypeHandle)> = Vec::new();

        // Collect the child DIEs first; converting referenced types re-enters
        // the unit cursor machinery, so keep the tree walk self-contained.
        let mut members: Vec<(Option<String>, Option<u64>, Option<AttributeValue<OwnedReader>>, gimli::DwTag)> = Vec::new();
        {
            let mut tree = unit
                .entries_tree(Some(offset))
                .map_err(|err| dwarf_error("building struct tree", err))?;
            let root = tree.root().map_err(|err| dwarf_error("navigating struct root", err))?;
            let mut children = root.children();
            while let Some(child) = children
                .next()
                .map_err(|err| dwarf_error("iterating struct children", err))?
            {
                let child_entry = child.entry();
                let tag = child_entry.tag();
                if !matches!(
                    tag,
                    constants::DW_TAG_member | constants::DW_TAG_inheritance | constants::DW_TAG_template_type_parameter
                ) {
                    continue;
                }
                members.push((
                    self.entry_name(unit, child_entry)?,
                    member_offset(child_entry)?,
                    self.type_attr(child_entry)?,
                    tag,
                ));
            }
        }

        for (member_name, member_off, type_ref, tag) in members {
            let member_ty = match type_ref {
                Some(value) => self.convert_ref(unit_index, value, depth + 1)?,
                None => self.unknown,
            };
            match tag {
                constants::DW_TAG_member => {
                    // Static members carry no location; skip them.
                    if let (Some(member_name), Some(member_off)) = (member_name, member_off) {
                        fields.push((member_name, member_off, member_ty));
                    }
                }
                constants::DW_TAG_inheritance => {
                    bases.push((member_off.unwrap_or(0), member_ty));
                }
                constants::DW_TAG_template_type_parameter => {
                    template_args.push(member_ty);
                }
                _ => {}
            }
        }

        // Flatten base-class members so `node.field("left")` works on the
        // derived node type directly.
        for (base_offset, base_ty) in bases {
            let inherited: Vec<(String, u64, TypeHandle)> = self
                .table
                .struct_fields(base_ty)
                .map(|base_fields| {
                    base_fields
                        .iter()
                        .map(|field| (field.name.clone(), base_offset + field.offset, field.ty))
                        .collect()
                })
                .unwrap_or_default();
            for (field_name, field_offset, field_ty) in inherited {
                if !fields.iter().any(|(existing, _, _)| *existing == field_name) {
                    fields.push((field_name, field_offset, field_ty));
                }
            }
        }

        let field_refs: Vec<(&str, u64, TypeHandle)> = fields
            .iter()
            .map(|(field_name, field_offset, field_ty)| (field_name.as_str(), *field_offset, *field_ty))
            .collect();
        self.table.set_fields(handle, &field_refs);
        self.table.set_template_args(handle, &template_args);

        Ok(handle)
    }

    fn convert_ref(&mut self, unit_index: usize, value: AttributeValue<OwnedReader>, depth: usize) -> Result<TypeHandle>
    {
        match value {
            AttributeValue::UnitRef(offset) => self.convert(unit_index, offset, depth),
            AttributeValue::DebugInfoRef(offset) => {
                let target = UnitSectionOffset::from(offset);
                let units = self.units;
                for (index, unit) in units.iter().enumerate() {
                    if let Some(unit_offset) = target.to_unit_offset(unit) {
                        return self.convert(index, unit_offset, depth);
                    }
                }
                Ok(self.unknown)
            }
            AttributeValue::DebugTypesRef(signature) => {
                let units = self.units;
                for (index, unit) in units.iter().enumerate() {
                    match unit.header.type_() {
                        UnitType::Type {
                            type_signature,
                            type_offset,
                        }
                        | UnitType::SplitType {
                            type_signature,
                            type_offset,
                        } if type_signature == signature => {
                            return self.convert(index, type_offset, depth);
                        }
                        _ => {}
                    }
                }
                Ok(self.unknown)
            }
            _ => Ok(self.unknown),
        }
    }

    fn type_attr(
        &self,
        entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
    ) -> Result<Option<AttributeValue<OwnedReader>>>
    {
        entry
            .attr_value(constants::DW_AT_type)
            .map_err(|err| dwarf_error("reading DW_AT_type", err))
    }

    fn entry_name(
        &self,
        unit: &Unit<OwnedReader>,
        entry: &DebuggingInformationEntry<'_, '_, OwnedReader>,
    ) -> Result<Option<String>>
    {
        let Some(attr) = entry
            .attr(constants::DW_AT_name)
            .map_err(|err| dwarf_error("reading DW_AT_name", err))?
        else {
            return Ok(None);
        };
        let reader = self
            .dwarf
            .attr_string(unit, attr.value())
            .map_err(|err| dwarf_error("resolving DWARF string", err))?;
        let owned = reader
            .to_string_lossy()
            .map_err(|err| dwarf_error("decoding DWARF string", err))?
            .into_owned();
        Ok(Some(owned))
    }
}

fn is_named_type_tag(tag: gimli::DwTag) -> bool
{
    matches!(
        tag,
        constants::DW_TAG_base_type
            | constants::DW_TAG_structure_type
            | constants::DW_TAG_class_type
            | constants::DW_TAG_union_type
            | constants::DW_TAG_enumeration_type
            | constants::DW_TAG_typedef
    )
}

fn byte_size(entry: &DebuggingInformationEntry<'_, '_, OwnedReader>) -> Result<Option<u64>>
{
    Ok(entry
        .attr(constants::DW_AT_byte_size)
        .map_err(|err| dwarf_error("reading DW_AT_byte_size", err))?
        .and_then(|attr| attr.udata_value()))
}

fn member_offset(entry: &DebuggingInformationEntry<'_, '_, OwnedReader>) -> Result<Option<u64>>
{
    Ok(entry
        .attr(constants::DW_AT_data_member_location)
        .map_err(|err| dwarf_error("reading DW_AT_data_member_location", err))?
        .and_then(|attr| attr.udata_value()))
}

fn is_declaration(entry: &DebuggingInformationEntry<'_, '_, OwnedReader>) -> Result<bool>
{
    Ok(matches!(
        entry
            .attr_value(constants::DW_AT_declaration)
            .map_err(|err| dwarf_error("reading DW_AT_declaration", err))?,
        Some(AttributeValue::Flag(true))
    ))
}
