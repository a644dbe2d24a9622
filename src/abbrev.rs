//! Abbreviation decoder: parses `.debug_abbrev` into an
//! ordered sequence of abbreviation sets, each keyed by its start offset.

use crate::cursor::Cursor;
use crate::error::{DwarfError, Result};
use crate::leb::decode_uleb128_u64;

/// One `(attribute-id, form-id)` pair from an abbrev entry's attribute list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttrSpec {
    pub attribute: u64,
    pub form: u64,
}

/// A single abbreviation declaration: the shape of one DIE family.
#[derive(Clone, Debug)]
pub struct AbbrevEntry {
    pub code: u64,
    pub tag: u64,
    pub has_children: bool,
    pub attrs: Vec<AttrSpec>,
}

/// One abbreviation set, i.e. everything reachable from one
/// `debug_abbrev_offset` in a compilation unit header.
#[derive(Clone, Debug)]
pub struct AbbrevSet {
    /// Offset into `.debug_abbrev` of this set's first code byte.
    pub offset: usize,
    pub entries: Vec<AbbrevEntry>,
}

impl AbbrevSet {
    /// O(n) scan, per spec — abbrev sets are small in practice.
    pub fn get_entry(&self, code: u64) -> Option<&AbbrevEntry> {
        self.entries.iter().find(|e| e.code == code)
    }
}

/// All abbreviation sets found in a `.debug_abbrev` section.
#[derive(Clone, Debug, Default)]
pub struct AbbrevTable {
    sets: Vec<AbbrevSet>,
}

impl AbbrevTable {
    pub fn parse(bytes: &[u8]) -> Result<AbbrevTable> {
        let mut cur = Cursor::new(bytes);
        let mut sets = Vec::new();
        while !cur.is_empty() {
            sets.push(parse_one_set(&mut cur)?);
        }
        Ok(AbbrevTable { sets })
    }

    /// Returns the set whose recorded start offset equals `offset`.
    pub fn get_abbrev_set(&self, offset: usize) -> Option<&AbbrevSet> {
        self.sets.iter().find(|s| s.offset == offset)
    }

    pub fn sets(&self) -> &[AbbrevSet] {
        &self.sets
    }
}

fn parse_one_set(cur: &mut Cursor) -> Result<AbbrevSet> {
    let offset = cur.position();
    let mut entries = Vec::new();
    loop {
        let code = decode_uleb128_u64(cur)?;
        if code == 0 {
            break;
        }
        if entries.iter().any(|e: &AbbrevEntry| e.code == code) {
            return Err(DwarfError::Malformed(format!(
                "duplicate abbrev code {code} in set at offset {offset:#x}"
            )));
        }
        let tag = decode_uleb128_u64(cur)?;
        let has_children = match cur.read_u8()? {
            0 => false,
            1 => true,
            n => {
                return Err(DwarfError::Malformed(format!(
                    "bad DW_CHILDREN value {n}"
                )))
            }
        };
        let mut attrs = Vec::new();
        loop {
            let attribute = decode_uleb128_u64(cur)?;
            let form = decode_uleb128_u64(cur)?;
            if attribute == 0 && form == 0 {
                break;
            }
            attrs.push(AttrSpec { attribute, form });
        }
        entries.push(AbbrevEntry {
            code,
            tag,
            has_children,
            attrs,
        });
        // A set with no entries before the terminator is only valid if it's
        // genuinely empty (terminator right at the set's start); an entry
        // list followed immediately by end-of-section without termination
        // is caught by the cursor's own bounds checks on the next read.
        if cur.is_empty() {
            break;
        }
    }
    Ok(AbbrevSet { offset, entries })
}
