//! Error taxonomy for the DWARF decoder (spec section 7).

use thiserror::Error;

/// Every failure mode the decoder can produce. `Dwarf::open` is all-or-nothing:
/// any of these aborts the open and releases whatever was built so far.
#[derive(Debug, Error)]
pub enum DwarfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not an ELF file (bad magic)")]
    NotElf,

    #[error("unsupported ELF class: {0}")]
    UnsupportedElfClass(u8),

    #[error("missing debug section: {0}")]
    NoDebugInfo(&'static str),

    #[error("read past end of section (wanted {want} bytes at offset {at}, section is {len} bytes)")]
    Truncated { at: usize, want: usize, len: usize },

    #[error("malformed DWARF data: {0}")]
    Malformed(String),

    #[error("malformed reference: {0}")]
    MalformedReference(String),

    #[error("unsupported DW_FORM: {0:#x}")]
    UnsupportedForm(u64),

    #[error("unknown line-program opcode: {0:#x}")]
    UnknownOpcode(u8),

    #[error("line-program prologue misaligned: expected cursor at {expected}, found {actual}")]
    PrologueMisaligned { expected: usize, actual: usize },

    #[error("offset {offset} out of range for table of length {len}")]
    OutOfRange { offset: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, DwarfError>;
