//! Human-readable formatter. Used by tests and the CLI's
//! `--dump` flag; the exact layout is not normative, only that it surfaces
//! every semantically distinguishing field of the graph.

use std::fmt::{self, Write};

use crate::die::{AttrValueKind, Die};
use crate::dwarf::Dwarf;
use crate::tables::{attribute_name, form_name, tag_name};

pub fn dump(dwarf: &Dwarf<'_>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "# abbrev sets")?;
    for set in dwarf.abbrevs().sets() {
        writeln!(f, "offset {:#x}:", set.offset)?;
        for entry in &set.entries {
            writeln!(
                f,
                "  [{}] {} DW_CHILDREN={}",
                entry.code,
                tag_name(entry.tag).unwrap_or("unknown tag"),
                entry.has_children
            )?;
            for spec in &entry.attrs {
                writeln!(
                    f,
                    "    {:<24} {}",
                    attribute_name(spec.attribute).unwrap_or("unknown attribute"),
                    form_name(spec.form).unwrap_or("unknown form")
                )?;
            }
        }
    }

    writeln!(f, "\n# compilation units")?;
    for unit in dwarf.units() {
        writeln!(
            f,
            "CU offset len={} version={} abbrev_offset={:#x} addr_size={}",
            unit.header.length, unit.header.version, unit.header.abbrev_offset, unit.header.addr_size
        )?;
        dump_die(&unit.root, 1, f)?;
    }

    writeln!(f, "\n# line programs")?;
    for (i, program) in dwarf.line_programs().iter().enumerate() {
        writeln!(
            f,
            "program {i}: version={} files={} rows={}",
            program.prologue.version,
            program.prologue.files.len(),
            program.rows.len()
        )?;
        for row in &program.rows {
            writeln!(
                f,
                "  {:#010x} file={} line={} col={} stmt={} end_seq={}",
                row.address, row.file, row.line, row.column, row.is_stmt, row.end_sequence
            )?;
        }
    }

    writeln!(f, "\n# aranges")?;
    for set in dwarf.aranges() {
        writeln!(
            f,
            "set cu_offset={:#x} addr_size={} ranges={}",
            set.header.cu_offset,
            set.header.addr_size,
            set.ranges.len()
        )?;
        for range in &set.ranges {
            writeln!(f, "  {:#010x} + {:#x}", range.address, range.length)?;
        }
    }

    Ok(())
}

fn dump_die(die: &Die<'_>, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let indent = "  ".repeat(depth);
    writeln!(
        f,
        "{indent}{} @ {:#x}",
        tag_name(die.tag).unwrap_or("unknown tag"),
        die.offset
    )?;
    for attr in &die.attributes {
        let mut value = String::new();
        match &attr.value.kind {
            AttrValueKind::Str(s) => write!(value, "{:?}", String::from_utf8_lossy(s))?,
            AttrValueKind::Unsigned(v) => write!(value, "{v:#x}")?,
            AttrValueKind::Signed(v) => write!(value, "{v}")?,
            AttrValueKind::Block(b) => write!(value, "<{} byte block>", b.len())?,
            AttrValueKind::Reference(r) => write!(value, "-> {r:#x}")?,
        }
        writeln!(
            f,
            "{indent}  {:<20} {value}",
            attribute_name(attr.attribute).unwrap_or("unknown attribute")
        )?;
    }
    for child in &die.children {
        dump_die(child, depth + 1, f)?;
    }
    Ok(())
}
