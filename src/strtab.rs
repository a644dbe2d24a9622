//! String table: offset-indexed access into `.debug_str`.

use crate::cursor::Cursor;
use crate::error::{DwarfError, Result};

/// A thin wrapper over the raw `.debug_str` bytes. `DW_FORM_strp` attribute
/// values are offsets into this table, pointing at the start of a
/// NUL-terminated string.
#[derive(Clone, Copy, Debug)]
pub struct StringTable<'a> {
    bytes: &'a [u8],
}

impl<'a> StringTable<'a> {
    pub fn new(bytes: &'a [u8]) -> StringTable<'a> {
        StringTable { bytes }
    }

    pub fn get(&self, offset: u64) -> Result<&'a [u8]> {
        let offset = offset as usize;
        if offset >= self.bytes.len() {
            return Err(DwarfError::OutOfRange {
                offset,
                len: self.bytes.len(),
            });
        }
        let mut cur = Cursor::at(self.bytes, offset);
        cur.read_cstr()
    }
}
