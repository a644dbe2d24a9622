//! Line-program interpreter: parses the `.debug_line`
//! prologue, then steps the line-number state machine to produce rows.
//!
//! A naive state machine snapshots the registers after every opcode and
//! seeds `line` from `default_is_stmt` — both wrong. This interpreter emits
//! a row only after `copy`, a special opcode, or `end_sequence`, and starts
//! `line` at 1, per the DWARF standard.

use crate::cursor::Cursor;
use crate::error::{DwarfError, Result};
use crate::leb::{decode_sleb128_i64, decode_uleb128_u64};

mod lns {
    pub const COPY: u8 = 0x01;
    pub const ADVANCE_PC: u8 = 0x02;
    pub const ADVANCE_LINE: u8 = 0x03;
    pub const SET_FILE: u8 = 0x04;
    pub const SET_COLUMN: u8 = 0x05;
    pub const NEGATE_STMT: u8 = 0x06;
    pub const SET_BASIC_BLOCK: u8 = 0x07;
    pub const CONST_ADD_PC: u8 = 0x08;
    pub const FIXED_ADVANCE_PC: u8 = 0x09;
    pub const SET_PROLOGUE_END: u8 = 0x0a;
    pub const SET_EPILOGUE_BEGIN: u8 = 0x0b;
    pub const SET_ISA: u8 = 0x0c;
}

mod lne {
    pub const END_SEQUENCE: u8 = 0x01;
    pub const SET_ADDRESS: u8 = 0x02;
    pub const DEFINE_FILE: u8 = 0x03;
    pub const SET_DISCRIMINATOR: u8 = 0x04;
}

#[derive(Clone, Debug)]
pub struct FileEntry<'a> {
    pub name: &'a [u8],
    pub dir_idx: u64,
    pub mtime: u64,
    pub size: u64,
}

#[derive(Clone, Debug)]
pub struct LinePrologue<'a> {
    pub total_length: u32,
    pub version: u16,
    pub prologue_length: u32,
    pub min_inst_len: u8,
    pub default_is_stmt: bool,
    pub line_base: i8,
    pub line_range: u8,
    pub opcode_base: u8,
    pub std_opcode_lengths: Vec<u8>,
    /// 1-indexed in DWARF; `include_dirs[0]` is directory index 1.
    pub include_dirs: Vec<&'a [u8]>,
    /// 1-indexed in DWARF; `files[0]` is file index 1.
    pub files: Vec<FileEntry<'a>>,
}

impl<'a> LinePrologue<'a> {
    /// Resolves a 1-based file index to its name, matching byte-for-byte
    /// (ignoring `dir_idx`) against `name`.
    pub fn file_index_matching(&self, name: &[u8]) -> Option<u32> {
        self.files
            .iter()
            .position(|f| f.name == name)
            .map(|i| (i + 1) as u32)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Row {
    pub address: u64,
    pub file: u32,
    pub line: u32,
    pub column: u32,
    pub is_stmt: bool,
    pub basic_block: bool,
    pub end_sequence: bool,
    pub prologue_end: bool,
    pub epilogue_begin: bool,
    pub isa: u64,
    pub discriminator: u64,
    pub opcode: u8,
}

#[derive(Clone, Debug)]
pub struct LineProgram<'a> {
    pub prologue: LinePrologue<'a>,
    pub rows: Vec<Row>,
}

/// Parses every line-number program in a `.debug_line` section (generally
/// one per compilation unit, concatenated).
pub fn parse_line_programs<'a>(bytes: &'a [u8]) -> Result<Vec<LineProgram<'a>>> {
    let mut cur = Cursor::new(bytes);
    let mut programs = Vec::new();
    while !cur.is_empty() {
        programs.push(parse_one_program(&mut cur)?);
    }
    Ok(programs)
}

fn parse_prologue<'a>(cur: &mut Cursor<'a>) -> Result<LinePrologue<'a>> {
    let total_length = cur.read_u32()?;
    let version = cur.read_u16()?;
    let prologue_length = cur.read_u32()?;
    let prologue_len_end = cur.position();

    let min_inst_len = cur.read_u8()?;
    let default_is_stmt = cur.read_u8()? != 0;
    let line_base = cur.read_i8()?;
    let line_range = cur.read_u8()?;
    let opcode_base = cur.read_u8()?;

    let mut std_opcode_lengths = Vec::with_capacity(opcode_base.saturating_sub(1) as usize);
    for _ in 1..opcode_base {
        std_opcode_lengths.push(cur.read_u8()?);
    }

    let mut include_dirs = Vec::new();
    loop {
        let dir = cur.read_cstr()?;
        if dir.is_empty() {
            break;
        }
        include_dirs.push(dir);
    }

    let mut files = Vec::new();
    loop {
        let name = cur.read_cstr()?;
        if name.is_empty() {
            break;
        }
        let dir_idx = decode_uleb128_u64(cur)?;
        let mtime = decode_uleb128_u64(cur)?;
        let size = decode_uleb128_u64(cur)?;
        files.push(FileEntry {
            name,
            dir_idx,
            mtime,
            size,
        });
    }

    let expected = prologue_len_end + prologue_length as usize;
    if cur.position() != expected {
        return Err(DwarfError::PrologueMisaligned {
            expected,
            actual: cur.position(),
        });
    }

    Ok(LinePrologue {
        total_length,
        version,
        prologue_length,
        min_inst_len,
        default_is_stmt,
        line_base,
        line_range,
        opcode_base,
        std_opcode_lengths,
        include_dirs,
        files,
    })
}

/// The state-machine registers. Split from [`Row`] since
/// `op_index`-adjacent bookkeeping (none implemented here — no VLIW support)
/// would otherwise live on the emitted row too.
struct Registers {
    address: u64,
    file: u32,
    line: i64,
    column: u32,
    is_stmt: bool,
    basic_block: bool,
    end_sequence: bool,
    prologue_end: bool,
    epilogue_begin: bool,
    isa: u64,
    discriminator: u64,
}

impl Registers {
    fn initial(default_is_stmt: bool) -> Registers {
        Registers {
            address: 0,
            file: 1,
            line: 1, // DWARF spec value; the original seeded this from default_is_stmt
            column: 0,
            is_stmt: default_is_stmt,
            basic_block: false,
            end_sequence: false,
            prologue_end: false,
            epilogue_begin: false,
            isa: 0,
            discriminator: 0,
        }
    }

    fn snapshot(&self, opcode: u8) -> Row {
        Row {
            address: self.address,
            file: self.file,
            line: self.line.max(0) as u32,
            column: self.column,
            is_stmt: self.is_stmt,
            basic_block: self.basic_block,
            end_sequence: self.end_sequence,
            prologue_end: self.prologue_end,
            epilogue_begin: self.epilogue_begin,
            isa: self.isa,
            discriminator: self.discriminator,
            opcode,
        }
    }

    fn clear_transient_flags(&mut self) {
        self.basic_block = false;
        self.prologue_end = false;
        self.epilogue_begin = false;
        self.discriminator = 0;
    }
}

fn parse_one_program<'a>(cur: &mut Cursor<'a>) -> Result<LineProgram<'a>> {
    let program_start = cur.position();
    let prologue = parse_prologue(cur)?;
    let program_end = program_start + 4 + prologue.total_length as usize;

    let mut regs = Registers::initial(prologue.default_is_stmt);
    let mut rows = Vec::new();

    while cur.position() < program_end {
        let opcode = cur.read_u8()?;

        if opcode == 0 {
            // extended opcode
            let insn_len = decode_uleb128_u64(cur)? as usize;
            let insn_end = cur.position() + insn_len;
            let ext_opcode = cur.read_u8()?;
            match ext_opcode {
                lne::END_SEQUENCE => {
                    regs.end_sequence = true;
                    rows.push(regs.snapshot(opcode));
                    regs = Registers::initial(prologue.default_is_stmt);
                }
                lne::SET_ADDRESS => {
                    regs.address = cur.read_addr_bytes(insn_end - cur.position())?;
                }
                lne::DEFINE_FILE => {
                    let _name = cur.read_cstr()?;
                    let _dir_idx = decode_uleb128_u64(cur)?;
                    let _mtime = decode_uleb128_u64(cur)?;
                    let _size = decode_uleb128_u64(cur)?;
                }
                lne::SET_DISCRIMINATOR => {
                    regs.discriminator = decode_uleb128_u64(cur)?;
                }
                other => return Err(DwarfError::UnknownOpcode(other)),
            }
            if cur.position() != insn_end {
                cur.set_position(insn_end);
            }
            continue;
        }

        if opcode < prologue.opcode_base {
            match opcode {
                lns::COPY => {
                    rows.push(regs.snapshot(opcode));
                    regs.clear_transient_flags();
                }
                lns::ADVANCE_PC => {
                    let operand = decode_uleb128_u64(cur)?;
                    regs.address += operand * prologue.min_inst_len as u64;
                }
                lns::ADVANCE_LINE => {
                    let operand = decode_sleb128_i64(cur)?;
                    regs.line += operand;
                }
                lns::SET_FILE => {
                    regs.file = decode_uleb128_u64(cur)? as u32;
                }
                lns::SET_COLUMN => {
                    regs.column = decode_uleb128_u64(cur)? as u32;
                }
                lns::NEGATE_STMT => {
                    regs.is_stmt = !regs.is_stmt;
                }
                lns::SET_BASIC_BLOCK => {
                    regs.basic_block = true;
                }
                lns::CONST_ADD_PC => {
                    let adj = 255u32 - prologue.opcode_base as u32;
                    regs.address += (adj / prologue.line_range as u32) as u64
                        * prologue.min_inst_len as u64;
                }
                lns::FIXED_ADVANCE_PC => {
                    let operand = cur.read_u16()?;
                    regs.address += operand as u64;
                }
                lns::SET_PROLOGUE_END => {
                    regs.prologue_end = true;
                }
                lns::SET_EPILOGUE_BEGIN => {
                    regs.epilogue_begin = true;
                }
                lns::SET_ISA => {
                    regs.isa = decode_uleb128_u64(cur)?;
                }
                other => return Err(DwarfError::UnknownOpcode(other)),
            }
            continue;
        }

        // special opcode
        let adj = (opcode - prologue.opcode_base) as u32;
        regs.address +=
            (adj / prologue.line_range as u32) as u64 * prologue.min_inst_len as u64;
        regs.line += prologue.line_base as i64 + (adj % prologue.line_range as u32) as i64;
        rows.push(regs.snapshot(opcode));
        regs.clear_transient_flags();
    }

    cur.set_position(program_end);
    Ok(LineProgram { prologue, rows })
}

impl<'a> Cursor<'a> {
    // extension used only by the extended-opcode DW_LNE_set_address handler,
    // whose operand width is the enclosing instruction's length rather than
    // the CU's addr_size (the line program has no CU header to read it from).
    fn read_addr_bytes(&mut self, n: usize) -> Result<u64> {
        if n > 8 {
            return Err(DwarfError::Malformed(format!(
                "DW_LNE_set_address operand too wide: {n} bytes"
            )));
        }
        let bytes = self.read_bytes(n)?;
        let mut buf = [0u8; 8];
        buf[..n].copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }
}
