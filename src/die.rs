//! DIE attribute reader and the Debugging Information Entry
//! tree node type itself.

use crate::cursor::Cursor;
use crate::error::{DwarfError, Result};
use crate::leb::{decode_sleb128_i64, decode_uleb128_u64};

/// DW_FORM_* ids this crate understands the wire shape of. Anything else
/// is `UnsupportedForm`.
mod form_id {
    pub const ADDR: u64 = 0x01;
    pub const BLOCK2: u64 = 0x03;
    pub const BLOCK4: u64 = 0x04;
    pub const DATA2: u64 = 0x05;
    pub const DATA4: u64 = 0x06;
    pub const DATA8: u64 = 0x07;
    pub const STRING: u64 = 0x08;
    pub const BLOCK: u64 = 0x09;
    pub const BLOCK1: u64 = 0x0a;
    pub const DATA1: u64 = 0x0b;
    pub const FLAG: u64 = 0x0c;
    pub const SDATA: u64 = 0x0d;
    pub const STRP: u64 = 0x0e;
    pub const UDATA: u64 = 0x0f;
    pub const REF_ADDR: u64 = 0x10;
    pub const REF1: u64 = 0x11;
    pub const REF2: u64 = 0x12;
    pub const REF4: u64 = 0x13;
    pub const REF8: u64 = 0x14;
    pub const REF_UDATA: u64 = 0x15;
    pub const INDIRECT: u64 = 0x16;
}

/// The decoded payload of one DIE attribute value, tagged by the form that
/// produced it (kept separately so the dump/formatter can reproduce the
/// on-wire type even though several forms decode to the same Rust shape).
#[derive(Clone, Debug)]
pub enum AttrValueKind<'a> {
    Str(&'a [u8]),
    Unsigned(u64),
    Signed(i64),
    Block(&'a [u8]),
    /// A reference: a CU-relative offset (ref1/2/4/8/udata), a section
    /// offset (ref_addr), or a `.debug_str` offset (strp).
    Reference(u64),
}

#[derive(Clone, Debug)]
pub struct AttrValue<'a> {
    /// The form actually used on the wire (after resolving any `indirect`).
    pub form: u64,
    pub kind: AttrValueKind<'a>,
}

impl<'a> AttrValue<'a> {
    pub fn as_unsigned(&self) -> Option<u64> {
        match self.kind {
            AttrValueKind::Unsigned(v) => Some(v),
            AttrValueKind::Reference(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a [u8]> {
        match self.kind {
            AttrValueKind::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Reads one attribute value per `(form, addr_size)`. `cur` is positioned
/// just after the abbrev's `(name, form)` pair was consumed; on return it is
/// positioned just past this value.
pub fn read_attribute<'a>(cur: &mut Cursor<'a>, form: u64, addr_size: u8) -> Result<AttrValue<'a>> {
    use form_id::*;
    let kind = match form {
        ADDR => AttrValueKind::Unsigned(cur.read_addr(addr_size)?),
        BLOCK => {
            let len = decode_uleb128_u64(cur)? as usize;
            AttrValueKind::Block(cur.read_bytes(len)?)
        }
        BLOCK1 => {
            let len = cur.read_u8()? as usize;
            AttrValueKind::Block(cur.read_bytes(len)?)
        }
        BLOCK2 => {
            let len = cur.read_u16()? as usize;
            AttrValueKind::Block(cur.read_bytes(len)?)
        }
        BLOCK4 => {
            let len = cur.read_u32()? as usize;
            AttrValueKind::Block(cur.read_bytes(len)?)
        }
        DATA1 => AttrValueKind::Unsigned(cur.read_u8()? as u64),
        DATA2 => AttrValueKind::Unsigned(cur.read_u16()? as u64),
        DATA4 => AttrValueKind::Unsigned(cur.read_u32()? as u64),
        DATA8 => AttrValueKind::Unsigned(cur.read_u64()?),
        SDATA => AttrValueKind::Signed(decode_sleb128_i64(cur)?),
        UDATA => AttrValueKind::Unsigned(decode_uleb128_u64(cur)?),
        FLAG => AttrValueKind::Unsigned(cur.read_u8()? as u64),
        STRING => AttrValueKind::Str(cur.read_cstr()?),
        STRP => AttrValueKind::Reference(cur.read_u32()? as u64),
        REF1 => AttrValueKind::Reference(cur.read_u8()? as u64),
        REF2 => AttrValueKind::Reference(cur.read_u16()? as u64),
        REF4 => AttrValueKind::Reference(cur.read_u32()? as u64),
        REF8 => AttrValueKind::Reference(cur.read_u64()?),
        REF_UDATA => AttrValueKind::Reference(decode_uleb128_u64(cur)?),
        REF_ADDR => AttrValueKind::Reference(cur.read_u32()? as u64),
        INDIRECT => {
            let real_form = decode_uleb128_u64(cur)?;
            return read_attribute(cur, real_form, addr_size);
        }
        _ => return Err(DwarfError::UnsupportedForm(form)),
    };
    Ok(AttrValue { form, kind })
}

/// One attribute value attached to a DIE, keyed by its raw (possibly
/// unrecognized) `DW_AT_*` id.
#[derive(Clone, Debug)]
pub struct DieAttribute<'a> {
    pub attribute: u64,
    pub value: AttrValue<'a>,
}

/// A Debugging Information Entry. Children are owned directly (a `Vec`, not
/// a linked sibling chain) since the tree never needs cyclic or shared
/// ownership — a DIE's cross-references to other DIEs are recorded as raw
/// `.debug_info` offsets in its attribute list and resolved by lookup.
#[derive(Clone, Debug)]
pub struct Die<'a> {
    /// This DIE's offset into `.debug_info`, used as the target of
    /// reference-form attributes elsewhere in the tree.
    pub offset: usize,
    pub abbrev_code: u64,
    pub tag: u64,
    pub attributes: Vec<DieAttribute<'a>>,
    pub children: Vec<Die<'a>>,
}

impl<'a> Die<'a> {
    pub fn attr(&self, attribute: u64) -> Option<&AttrValue<'a>> {
        self.attributes
            .iter()
            .find(|a| a.attribute == attribute)
            .map(|a| &a.value)
    }

    pub fn name(&self) -> Option<&'a [u8]> {
        self.attr(0x03).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fixed_width_forms() {
        let bytes = [0x2a];
        let mut cur = Cursor::new(&bytes);
        let v = read_attribute(&mut cur, form_id::DATA1, 8).unwrap();
        assert_eq!(v.as_unsigned(), Some(0x2a));
    }

    #[test]
    fn reads_addr_form_using_cu_addr_size() {
        let bytes = [0x01, 0x00, 0x00, 0x00];
        let mut cur = Cursor::new(&bytes);
        let v = read_attribute(&mut cur, form_id::ADDR, 4).unwrap();
        assert_eq!(v.as_unsigned(), Some(1));
    }

    #[test]
    fn reads_block_without_copying() {
        let bytes = [0x03, 0xde, 0xad, 0xbe];
        let mut cur = Cursor::new(&bytes);
        let v = read_attribute(&mut cur, form_id::BLOCK, 8).unwrap();
        match v.kind {
            AttrValueKind::Block(b) => assert_eq!(b, &[0xde, 0xad, 0xbe]),
            _ => panic!("expected a block"),
        }
    }

    #[test]
    fn indirect_recurses_to_the_real_form() {
        // indirect -> real form is DATA1 (0x0b) -> value 7
        let bytes = [0x0b, 0x07];
        let mut cur = Cursor::new(&bytes);
        let v = read_attribute(&mut cur, form_id::INDIRECT, 8).unwrap();
        assert_eq!(v.form, form_id::DATA1);
        assert_eq!(v.as_unsigned(), Some(7));
    }

    #[test]
    fn unsupported_form_is_an_error() {
        let bytes = [0u8; 8];
        let mut cur = Cursor::new(&bytes);
        assert!(read_attribute(&mut cur, 0x19, 8).is_err()); // DW_FORM_flag_present, DWARF4
    }
}
