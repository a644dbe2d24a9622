//! Address-range table decoder: parses `.debug_aranges` into
//! per-compilation-unit lists of `(address, length)` ranges.

use crate::cursor::Cursor;
use crate::error::Result;

/// One `.debug_aranges` set header. The header is 12 bytes fixed,
/// independent of `addr_size`.
#[derive(Clone, Copy, Debug)]
pub struct ArangesHeader {
    pub length: u32,
    pub version: u16,
    pub cu_offset: u32,
    pub addr_size: u8,
    pub segment_size: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressRange {
    pub address: u64,
    pub length: u64,
}

#[derive(Clone, Debug)]
pub struct ArangesSet {
    pub header: ArangesHeader,
    pub ranges: Vec<AddressRange>,
}

/// Parses every set in a `.debug_aranges` section.
pub fn parse_aranges(bytes: &[u8]) -> Result<Vec<ArangesSet>> {
    let mut cur = Cursor::new(bytes);
    let mut sets = Vec::new();
    while !cur.is_empty() {
        sets.push(parse_one_set(&mut cur)?);
    }
    Ok(sets)
}

fn parse_one_set(cur: &mut Cursor) -> Result<ArangesSet> {
    let set_start = cur.position();
    let length = cur.read_u32()?;
    let version = cur.read_u16()?;
    let cu_offset = cur.read_u32()?;
    let addr_size = cur.read_u8()?;
    let segment_size = cur.read_u8()?;

    let header = ArangesHeader {
        length,
        version,
        cu_offset,
        addr_size,
        segment_size,
    };

    // The tuple table starts aligned to 2*addr_size relative to the start of
    // the set (i.e. including the 4-byte length field).
    let alignment = (2 * addr_size as usize).max(1);
    let header_len = cur.position() - set_start;
    let aligned = header_len.div_ceil(alignment) * alignment;
    cur.set_position(set_start + aligned);

    let set_end = set_start + 4 + length as usize;
    let mut ranges = Vec::new();
    while cur.position() < set_end {
        if segment_size != 0 {
            let _segment = cur.read_addr(segment_size)?;
        }
        let address = cur.read_addr(addr_size)?;
        let len = cur.read_addr(addr_size)?;
        if address == 0 && len == 0 {
            break;
        }
        ranges.push(AddressRange { address, length: len });
    }
    cur.set_position(set_end);

    Ok(ArangesSet { header, ranges })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_set(addr_size: u8, pairs: &[(u64, u64)]) -> Vec<u8> {
        let mut tuples = Vec::new();
        for (a, l) in pairs {
            if addr_size == 4 {
                tuples.extend((*a as u32).to_le_bytes());
                tuples.extend((*l as u32).to_le_bytes());
            } else {
                tuples.extend(a.to_le_bytes());
                tuples.extend(l.to_le_bytes());
            }
        }
        tuples.extend(if addr_size == 4 { vec![0u8; 8] } else { vec![0u8; 16] });

        let mut header = Vec::new();
        header.extend(2u16.to_le_bytes()); // version
        header.extend(0u32.to_le_bytes()); // cu_offset
        header.push(addr_size);
        header.push(0); // segment_size

        let entry_size = 2 * addr_size as usize;
        let pad_to = (4 + header.len()).div_ceil(entry_size) * entry_size;
        let mut body = header;
        body.resize(pad_to - 4, 0);
        body.extend(&tuples);

        let length = body.len() as u32;
        let mut out = Vec::new();
        out.extend(length.to_le_bytes());
        out.extend(&body);
        out
    }

    #[test]
    fn parses_one_set_with_two_ranges_and_terminator() {
        let bytes = build_set(8, &[(0x1000, 0x20), (0x2000, 0x40)]);
        let sets = parse_aranges(&bytes).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].ranges.len(), 2);
        assert_eq!(
            sets[0].ranges[0],
            AddressRange { address: 0x1000, length: 0x20 }
        );
    }

    #[test]
    fn four_byte_addresses_align_correctly() {
        let bytes = build_set(4, &[(0x100, 0x10)]);
        let sets = parse_aranges(&bytes).unwrap();
        assert_eq!(sets[0].header.addr_size, 4);
        assert_eq!(sets[0].ranges, vec![AddressRange { address: 0x100, length: 0x10 }]);
    }

    #[test]
    fn empty_set_has_no_ranges() {
        let bytes = build_set(8, &[]);
        let sets = parse_aranges(&bytes).unwrap();
        assert_eq!(sets[0].ranges.len(), 0);
    }
}
