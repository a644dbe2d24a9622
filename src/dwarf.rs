//! Dwarf façade: orchestrates the abbreviation, CU/DIE,
//! line-program, aranges, and string-table decoders against section slices
//! supplied by the ELF loader, and owns the resulting graph.
//!
//! Rust has no natural way to let one struct both own a memory map and
//! borrow slices of it (that's a self-referential struct); rather than reach
//! for an unsafe workaround, `Dwarf::open` borrows an already-opened [`Elf`]
//! instead of a path, and the caller keeps that `Elf` alive for as long as
//! the `Dwarf` is used. `src/bin/line2addr.rs` shows the resulting call
//! shape.

use std::fmt;

use log::info;

use crate::abbrev::AbbrevTable;
use crate::aranges::{parse_aranges, ArangesSet};
use crate::cu::{parse_units, CompilationUnit};
use crate::dump;
use crate::elf::Elf;
use crate::error::{DwarfError, Result};
use crate::line::{parse_line_programs, LineProgram};
use crate::strtab::StringTable;

pub struct Dwarf<'a> {
    pub(crate) abbrevs: AbbrevTable,
    pub(crate) units: Vec<CompilationUnit<'a>>,
    pub(crate) line_programs: Vec<LineProgram<'a>>,
    pub(crate) aranges: Vec<ArangesSet>,
    pub(crate) strtab: Option<StringTable<'a>>,
}

const REQUIRED_SECTIONS: [&str; 4] = [
    ".debug_abbrev",
    ".debug_info",
    ".debug_line",
    ".debug_aranges",
];

impl<'a> Dwarf<'a> {
    /// Builds the whole graph from an already-opened ELF file. `.debug_str`
    /// is the one optional section — its absence only surfaces later, as
    /// `OUT_OF_RANGE` on an attempted `strp` resolution.
    pub fn open(elf: &'a Elf) -> Result<Dwarf<'a>> {
        let mut sections = Vec::with_capacity(REQUIRED_SECTIONS.len());
        for name in REQUIRED_SECTIONS {
            let bytes = elf.get_section(name).ok_or(DwarfError::NoDebugInfo(name))?;
            sections.push(bytes);
        }
        let debug_abbrev = sections[0];
        let debug_info = sections[1];
        let debug_line = sections[2];
        let debug_aranges = sections[3];

        let abbrevs = AbbrevTable::parse(debug_abbrev)?;
        let units = parse_units(debug_info, &abbrevs)?;
        let line_programs = parse_line_programs(debug_line)?;
        let aranges = parse_aranges(debug_aranges)?;
        let strtab = elf.get_section(".debug_str").map(StringTable::new);

        info!(
            "opened dwarf graph: {} compilation unit(s), {} line program(s), {} arange set(s)",
            units.len(),
            line_programs.len(),
            aranges.len()
        );

        Ok(Dwarf {
            abbrevs,
            units,
            line_programs,
            aranges,
            strtab,
        })
    }

    pub fn units(&self) -> &[CompilationUnit<'a>] {
        &self.units
    }

    pub fn line_programs(&self) -> &[LineProgram<'a>] {
        &self.line_programs
    }

    pub fn aranges(&self) -> &[ArangesSet] {
        &self.aranges
    }

    pub fn abbrevs(&self) -> &AbbrevTable {
        &self.abbrevs
    }

    /// Resolves a `DW_FORM_strp` offset against `.debug_str`. `OUT_OF_RANGE`
    /// covers both a missing section and an offset past a present one.
    pub fn resolve_str(&self, offset: u64) -> Result<&'a [u8]> {
        match &self.strtab {
            Some(table) => table.get(offset),
            None => Err(DwarfError::OutOfRange {
                offset: offset as usize,
                len: 0,
            }),
        }
    }

    /// Consults every line program, in section order, for the first row
    /// whose file (matched by name, ignoring `dir_idx`) and line match.
    pub fn find_address(&self, file: &str, line: u32) -> Option<u64> {
        let file = file.as_bytes();
        for program in &self.line_programs {
            let Some(file_index) = program.prologue.file_index_matching(file) else {
                continue;
            };
            if let Some(row) = program
                .rows
                .iter()
                .find(|r| r.file == file_index && r.line == line)
            {
                return Some(row.address);
            }
        }
        None
    }
}

impl<'a> fmt::Display for Dwarf<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dump::dump(self, f)
    }
}

/// End-to-end scenarios over a hand-built synthetic ELF64 object, standing
/// in for the compiled-C fixtures spec.md section 8 describes (S1/S2/S3/S5/
/// S6) since this crate's build cannot invoke a C toolchain to produce them.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::leb::encode_uleb128;
    use std::io::Write;

    const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

    fn abbrev_section() -> Vec<u8> {
        // code=1, DW_TAG_compile_unit, no children, DW_AT_name/DW_FORM_string.
        let mut out = encode_uleb128(1);
        out.extend(encode_uleb128(0x11));
        out.push(0); // has_children = false
        out.extend(encode_uleb128(0x03)); // DW_AT_name
        out.extend(encode_uleb128(0x08)); // DW_FORM_string
        out.extend(encode_uleb128(0));
        out.extend(encode_uleb128(0));
        out.extend(encode_uleb128(0)); // terminate the set
        out
    }

    fn info_section(addr_size: u8) -> Vec<u8> {
        let mut body = encode_uleb128(1); // abbrev code 1
        body.extend(b"main.c\0");
        body.extend(encode_uleb128(0)); // terminate top-level DIE list

        let mut out = Vec::new();
        let length = (7 + body.len()) as u32;
        out.extend(length.to_le_bytes());
        out.extend(3u16.to_le_bytes()); // version
        out.extend(0u32.to_le_bytes()); // abbrev_offset
        out.push(addr_size);
        out.extend(&body);
        out
    }

    /// One line program: `DW_LNE_set_address(address)`, `DW_LNS_copy` (row
    /// at line 1), then `DW_LNE_end_sequence`.
    fn line_section(address: u64, addr_size: u8) -> Vec<u8> {
        let mut prologue_tail = Vec::new();
        prologue_tail.push(1); // min_inst_len
        prologue_tail.push(1); // default_is_stmt
        prologue_tail.push((-5i8) as u8); // line_base
        prologue_tail.push(14); // line_range
        prologue_tail.push(13); // opcode_base
        for _ in 1..13 {
            prologue_tail.push(1); // pretend every standard opcode takes 1 operand
        }
        prologue_tail.push(0); // include_dirs terminator
        prologue_tail.extend(b"main.c\0");
        prologue_tail.extend(encode_uleb128(0)); // dir_idx
        prologue_tail.extend(encode_uleb128(0)); // mtime
        prologue_tail.extend(encode_uleb128(0)); // size
        prologue_tail.push(0); // files terminator

        let mut body = vec![0x00]; // extended opcode prefix
        let addr_bytes = &address.to_le_bytes()[..addr_size as usize];
        let insn = {
            let mut v = vec![0x02]; // DW_LNE_set_address
            v.extend(addr_bytes);
            v
        };
        body.extend(encode_uleb128(insn.len() as u64));
        body.extend(&insn);
        body.push(0x01); // DW_LNS_copy
        body.push(0x00); // extended prefix
        body.extend(encode_uleb128(1));
        body.push(0x01); // DW_LNE_end_sequence

        let prologue_length = prologue_tail.len() as u32;
        let mut rest = Vec::new();
        rest.extend(prologue_length.to_le_bytes());
        rest.extend(&prologue_tail);
        rest.extend(&body);

        let mut out = Vec::new();
        let total_length = (2 + rest.len()) as u32;
        out.extend(total_length.to_le_bytes());
        out.extend(3u16.to_le_bytes()); // version
        out.extend(&rest);
        out
    }

    fn aranges_section(address: u64, addr_size: u8) -> Vec<u8> {
        let entry_size = 2 * addr_size as usize;
        let mut header = Vec::new();
        header.extend(2u16.to_le_bytes()); // version
        header.extend(0u32.to_le_bytes()); // cu_offset
        header.push(addr_size);
        header.push(0); // segment_size
        let pad_to = (4 + header.len()).div_ceil(entry_size) * entry_size;
        let mut body = header;
        body.resize(pad_to - 4, 0);
        if addr_size == 4 {
            body.extend((address as u32).to_le_bytes());
            body.extend(0x10u32.to_le_bytes());
        } else {
            body.extend(address.to_le_bytes());
            body.extend(0x10u64.to_le_bytes());
        }
        body.extend(vec![0u8; entry_size]); // terminator

        let length = body.len() as u32;
        let mut out = Vec::new();
        out.extend(length.to_le_bytes());
        out.extend(&body);
        out
    }

    /// Builds a minimal ELF64 file containing the given named sections.
    fn build_elf64(sections: &[(&str, &[u8])]) -> Vec<u8> {
        let mut shstrtab = vec![0u8];
        let mut name_offsets = Vec::new();
        for (name, _) in sections {
            name_offsets.push(shstrtab.len() as u32);
            shstrtab.extend(name.as_bytes());
            shstrtab.push(0);
        }
        name_offsets.push(shstrtab.len() as u32);
        shstrtab.extend(b".shstrtab\0");

        let mut file = vec![0u8; 0x40];
        file[0..4].copy_from_slice(&ELF_MAGIC);
        file[4] = 2; // EI_CLASS = ELFCLASS64

        let mut bodies_start = Vec::new();
        for (_, body) in sections {
            bodies_start.push(file.len());
            file.extend(*body);
        }
        let shstrtab_start = file.len();
        file.extend(&shstrtab);

        let shoff = file.len();
        let shentsize = 0x40usize;
        let shnum = sections.len() + 1;

        for (i, (_, body)) in sections.iter().enumerate() {
            let mut hdr = vec![0u8; shentsize];
            hdr[0..4].copy_from_slice(&name_offsets[i].to_le_bytes());
            hdr[0x18..0x20].copy_from_slice(&(bodies_start[i] as u64).to_le_bytes());
            hdr[0x20..0x28].copy_from_slice(&(body.len() as u64).to_le_bytes());
            file.extend(hdr);
        }
        let mut shstrtab_hdr = vec![0u8; shentsize];
        shstrtab_hdr[0..4].copy_from_slice(&name_offsets[sections.len()].to_le_bytes());
        shstrtab_hdr[0x18..0x20].copy_from_slice(&(shstrtab_start as u64).to_le_bytes());
        shstrtab_hdr[0x20..0x28].copy_from_slice(&(shstrtab.len() as u64).to_le_bytes());
        file.extend(shstrtab_hdr);

        file[0x28..0x30].copy_from_slice(&(shoff as u64).to_le_bytes());
        file[0x3a..0x3c].copy_from_slice(&(shentsize as u16).to_le_bytes());
        file[0x3c..0x3e].copy_from_slice(&(shnum as u16).to_le_bytes());
        file[0x3e..0x40].copy_from_slice(&(sections.len() as u16).to_le_bytes());

        file
    }

    /// Writes `bytes` to a fresh file under the OS temp dir and returns its path.
    fn write_temp_file(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "thyrion-test-{}-{}-{}",
            std::process::id(),
            name,
            bytes.len()
        ));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    fn synthetic_object(addr_size: u8, address: u64) -> Vec<(&'static str, Vec<u8>)> {
        vec![
            (".debug_abbrev", abbrev_section()),
            (".debug_info", info_section(addr_size)),
            (".debug_line", line_section(address, addr_size)),
            (".debug_aranges", aranges_section(address, addr_size)),
        ]
    }

    #[test]
    fn s1_trivial_program_resolves_file_and_line() {
        let owned = synthetic_object(8, 0x400000);
        let sections: Vec<(&str, &[u8])> = owned.iter().map(|(n, b)| (*n, b.as_slice())).collect();
        let path = write_temp_file("s1", &build_elf64(&sections));
        let elf = Elf::open(&path).unwrap();
        let dwarf = Dwarf::open(&elf).unwrap();

        assert_eq!(dwarf.units()[0].root.name(), Some(&b"main.c"[..]));
        assert_eq!(dwarf.find_address("main.c", 1), Some(0x400000));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn s2_missing_line_is_not_found() {
        let owned = synthetic_object(8, 0x400000);
        let sections: Vec<(&str, &[u8])> = owned.iter().map(|(n, b)| (*n, b.as_slice())).collect();
        let path = write_temp_file("s2", &build_elf64(&sections));
        let elf = Elf::open(&path).unwrap();
        let dwarf = Dwarf::open(&elf).unwrap();

        assert_eq!(dwarf.find_address("main.c", 99), None);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn s3_unknown_file_is_not_found() {
        let owned = synthetic_object(8, 0x400000);
        let sections: Vec<(&str, &[u8])> = owned.iter().map(|(n, b)| (*n, b.as_slice())).collect();
        let path = write_temp_file("s3", &build_elf64(&sections));
        let elf = Elf::open(&path).unwrap();
        let dwarf = Dwarf::open(&elf).unwrap();

        assert_eq!(dwarf.find_address("absent.c", 1), None);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn s4_32_bit_object_resolves_with_4_byte_addresses() {
        let owned = synthetic_object(4, 0x8048000);
        let sections: Vec<(&str, &[u8])> = owned.iter().map(|(n, b)| (*n, b.as_slice())).collect();
        let path = write_temp_file("s4", &build_elf64(&sections));
        let elf = Elf::open(&path).unwrap();
        let dwarf = Dwarf::open(&elf).unwrap();

        assert_eq!(dwarf.units()[0].header.addr_size, 4);
        assert_eq!(dwarf.find_address("main.c", 1), Some(0x8048000));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn s5_missing_debug_info_section_is_rejected() {
        let owned = synthetic_object(8, 0x400000);
        let sections: Vec<(&str, &[u8])> = owned
            .iter()
            .filter(|(n, _)| *n != ".debug_info")
            .map(|(n, b)| (*n, b.as_slice()))
            .collect();
        let path = write_temp_file("s5", &build_elf64(&sections));
        let elf = Elf::open(&path).unwrap();

        assert!(matches!(Dwarf::open(&elf), Err(DwarfError::NoDebugInfo(".debug_info"))));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn s6_truncated_debug_info_is_rejected() {
        let abbrev = abbrev_section();
        let owned_info = info_section(8);
        let truncated_info = owned_info[..owned_info.len() / 2].to_vec();
        let line = line_section(0x400000, 8);
        let aranges = aranges_section(0x400000, 8);
        let sections: Vec<(&str, &[u8])> = vec![
            (".debug_abbrev", &abbrev),
            (".debug_info", &truncated_info),
            (".debug_line", &line),
            (".debug_aranges", &aranges),
        ];
        let path = write_temp_file("s6", &build_elf64(&sections));
        let elf = Elf::open(&path).unwrap();

        assert!(Dwarf::open(&elf).is_err());
        std::fs::remove_file(&path).ok();
    }
}
