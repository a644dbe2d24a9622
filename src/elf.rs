//! ELF loader: memory-maps a file and resolves section headers by name.
//! Hand-rolled rather than pulled in from `goblin`/`object`: the layout
//! needed here is small and fully specified.

use std::fs::File;
use std::path::Path;

use log::{debug, trace};
use memmap2::Mmap;

use crate::cursor::Cursor;
use crate::error::{DwarfError, Result};

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

struct SectionHeader {
    name_offset: u32,
    offset: usize,
    size: usize,
}

/// A memory-mapped ELF file with its section headers resolved.
pub struct Elf {
    #[allow(dead_code)] // keeps the mapping alive for the `Dwarf<'a>` borrow
    mmap: Mmap,
    class: ElfClass,
    sections: Vec<SectionHeader>,
    shstrtab_offset: usize,
    shstrtab_size: usize,
}

impl Elf {
    pub fn open(path: &Path) -> Result<Elf> {
        let file = File::open(path)?;
        // Safety contract: the memory map is only ever read, and the file is
        // not expected to be mutated concurrently by another process during
        // a decoder run (single-reader model).
        let mmap = unsafe { Mmap::map(&file)? };
        debug!("mapped {} ({} bytes)", path.display(), mmap.len());

        let (class, sections, shstrtab_offset, shstrtab_size) = parse_headers(&mmap)?;

        Ok(Elf {
            mmap,
            class,
            sections,
            shstrtab_offset,
            shstrtab_size,
        })
    }

    pub fn class(&self) -> ElfClass {
        self.class
    }

    /// Returns a section's raw bytes by name, borrowed from the mapping for
    /// as long as this `Elf` lives.
    pub fn get_section(&self, name: &str) -> Option<&[u8]> {
        let shstrtab = &self.mmap[self.shstrtab_offset..self.shstrtab_offset + self.shstrtab_size];
        self.sections.iter().find_map(|s| {
            let mut cur = Cursor::at(shstrtab, s.name_offset as usize);
            let section_name = cur.read_cstr().ok()?;
            if section_name == name.as_bytes() {
                trace!("resolved section {name} at offset {:#x}, {} bytes", s.offset, s.size);
                Some(&self.mmap[s.offset..s.offset + s.size])
            } else {
                None
            }
        })
    }
}

fn parse_headers(bytes: &[u8]) -> Result<(ElfClass, Vec<SectionHeader>, usize, usize)> {
    let mut cur = Cursor::new(bytes);
    let magic = cur.read_bytes(4)?;
    if magic != ELF_MAGIC {
        return Err(DwarfError::NotElf);
    }
    let ei_class = cur.read_u8()?;
    let class = match ei_class {
        1 => ElfClass::Elf32,
        2 => ElfClass::Elf64,
        n => return Err(DwarfError::UnsupportedElfClass(n)),
    };

    let (e_shoff, e_shentsize, e_shnum, e_shstrndx) = match class {
        ElfClass::Elf32 => {
            cur.set_position(0x20);
            let e_shoff = cur.read_u32()? as usize;
            cur.set_position(0x2e);
            let e_shentsize = cur.read_u16()? as usize;
            let e_shnum = cur.read_u16()? as usize;
            let e_shstrndx = cur.read_u16()? as usize;
            (e_shoff, e_shentsize, e_shnum, e_shstrndx)
        }
        ElfClass::Elf64 => {
            cur.set_position(0x28);
            let e_shoff = cur.read_u64()? as usize;
            cur.set_position(0x3a);
            let e_shentsize = cur.read_u16()? as usize;
            let e_shnum = cur.read_u16()? as usize;
            let e_shstrndx = cur.read_u16()? as usize;
            (e_shoff, e_shentsize, e_shnum, e_shstrndx)
        }
    };

    let mut sections = Vec::with_capacity(e_shnum);
    for i in 0..e_shnum {
        let base = e_shoff + i * e_shentsize;
        let mut scur = Cursor::at(bytes, base);
        let name_offset = scur.read_u32()?;
        let (offset, size) = match class {
            ElfClass::Elf32 => {
                scur.set_position(base + 0x10);
                let offset = scur.read_u32()? as usize;
                let size = scur.read_u32()? as usize;
                (offset, size)
            }
            ElfClass::Elf64 => {
                scur.set_position(base + 0x18);
                let offset = scur.read_u64()? as usize;
                let size = scur.read_u64()? as usize;
                (offset, size)
            }
        };
        sections.push(SectionHeader {
            name_offset,
            offset,
            size,
        });
    }

    if e_shstrndx >= sections.len() {
        return Err(DwarfError::Malformed(format!(
            "e_shstrndx {e_shstrndx} out of range for {} sections",
            sections.len()
        )));
    }
    let shstrtab_offset = sections[e_shstrndx].offset;
    let shstrtab_size = sections[e_shstrndx].size;

    Ok((class, sections, shstrtab_offset, shstrtab_size))
}
