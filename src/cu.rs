//! Compilation-unit tree builder: walks `.debug_info` into a
//! forest of compilation units, each holding a tree of DIEs.

use crate::abbrev::AbbrevTable;
use crate::cursor::Cursor;
use crate::die::{read_attribute, Die, DieAttribute};
use crate::error::{DwarfError, Result};

/// The 11-byte compilation unit header.
#[derive(Clone, Copy, Debug)]
pub struct CuHeader {
    /// `.debug_info` contribution length, not counting this field.
    pub length: u32,
    pub version: u16,
    pub abbrev_offset: u32,
    pub addr_size: u8,
}

const CU_HEADER_LEN: usize = 11;

impl CuHeader {
    fn parse(cur: &mut Cursor) -> Result<CuHeader> {
        let length = cur.read_u32()?;
        let version = cur.read_u16()?;
        let abbrev_offset = cur.read_u32()?;
        let addr_size = cur.read_u8()?;
        if addr_size != 4 && addr_size != 8 {
            return Err(DwarfError::Malformed(format!(
                "unsupported CU address size {addr_size}"
            )));
        }
        Ok(CuHeader {
            length,
            version,
            abbrev_offset,
            addr_size,
        })
    }
}

#[derive(Clone, Debug)]
pub struct CompilationUnit<'a> {
    pub header: CuHeader,
    pub root: Die<'a>,
}

/// Parses every compilation unit out of a whole `.debug_info` section.
pub fn parse_units<'a>(
    info: &'a [u8],
    abbrevs: &AbbrevTable,
) -> Result<Vec<CompilationUnit<'a>>> {
    let mut cur = Cursor::new(info);
    let mut units = Vec::new();
    while !cur.is_empty() {
        units.push(parse_one_unit(&mut cur, abbrevs)?);
    }
    Ok(units)
}

fn parse_one_unit<'a>(cur: &mut Cursor<'a>, abbrevs: &AbbrevTable) -> Result<CompilationUnit<'a>> {
    let unit_start = cur.position();
    let header = CuHeader::parse(cur)?;
    if header.length == 0 {
        return Err(DwarfError::Malformed("zero-length compilation unit".into()));
    }
    let body_end = unit_start + 4 + header.length as usize;
    let abbrev_set = abbrevs
        .get_abbrev_set(header.abbrev_offset as usize)
        .ok_or_else(|| {
            DwarfError::MalformedReference(format!(
                "no abbrev set at offset {:#x}",
                header.abbrev_offset
            ))
        })?;

    let mut roots = parse_die_tree(cur, abbrev_set, header.addr_size, body_end)?;
    if roots.len() != 1 {
        return Err(DwarfError::Malformed(format!(
            "compilation unit has {} top-level DIEs, expected exactly 1",
            roots.len()
        )));
    }
    cur.set_position(body_end);
    Ok(CompilationUnit {
        header,
        root: roots.remove(0),
    })
}

/// Builds the DIE tree for one CU body using an explicit stack of
/// in-progress sibling lists, one per nesting depth, rather than recursion
/// or a linked sibling/child chain.
fn parse_die_tree<'a>(
    cur: &mut Cursor<'a>,
    abbrev_set: &crate::abbrev::AbbrevSet,
    addr_size: u8,
    end: usize,
) -> Result<Vec<Die<'a>>> {
    let mut stack: Vec<Vec<Die<'a>>> = vec![Vec::new()];

    while cur.position() < end {
        let die_offset = cur.position();
        let code = crate::leb::decode_uleb128_u64(cur)?;
        if code == 0 {
            if stack.len() == 1 {
                if stack[0].is_empty() {
                    return Err(DwarfError::Malformed(
                        "null DIE terminator before any DIE in compilation unit".into(),
                    ));
                }
                // End of the CU body: the root DIE's children (if any) were
                // already closed by their own terminator, so this is the
                // normal trailing zero after a childless root, not a level
                // to pop.
                break;
            }
            let finished = stack.pop().unwrap();
            let parent = stack.last_mut().unwrap().last_mut().expect(
                "a children list is only pushed right after its parent DIE, so one always exists",
            );
            parent.children = finished;
            continue;
        }

        let entry = abbrev_set.get_entry(code).ok_or_else(|| {
            DwarfError::MalformedReference(format!(
                "abbrev code {code} not found at DIE offset {die_offset:#x}"
            ))
        })?;

        let mut attributes = Vec::with_capacity(entry.attrs.len());
        for spec in &entry.attrs {
            let value = read_attribute(cur, spec.form, addr_size)?;
            attributes.push(DieAttribute {
                attribute: spec.attribute,
                value,
            });
        }
        if cur.position() > end {
            return Err(DwarfError::Malformed(
                "DIE attributes overran compilation unit length".into(),
            ));
        }

        let die = Die {
            offset: die_offset,
            abbrev_code: code,
            tag: entry.tag,
            attributes,
            children: Vec::new(),
        };
        stack.last_mut().unwrap().push(die);
        if entry.has_children {
            stack.push(Vec::new());
        }
    }

    if stack.len() != 1 {
        return Err(DwarfError::Malformed(
            "unterminated DIE children list at end of compilation unit".into(),
        ));
    }
    Ok(stack.pop().unwrap())
}
