//! LEB128 codec: decode unsigned/signed little-endian
//! base-128 integers from a [`Cursor`].
//!
//! See <https://en.wikipedia.org/wiki/LEB128> and the DWARF standard.

use crate::cursor::Cursor;
use crate::error::{DwarfError, Result};

/// Decodes a ULEB128 value, failing if it would not fit in `max_bits` (32 or 64).
pub fn decode_uleb128(cur: &mut Cursor, max_bits: u32) -> Result<u64> {
    let mut val: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = cur.read_u8()?;
        if shift < 64 {
            val |= ((byte & 0x7f) as u64) << shift;
        }
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 70 {
            return Err(DwarfError::Malformed("ULEB128 too long".into()));
        }
    }
    if max_bits < 64 && (val >> max_bits) != 0 {
        return Err(DwarfError::Malformed(format!(
            "ULEB128 value {val:#x} exceeds {max_bits}-bit width"
        )));
    }
    Ok(val)
}

/// Decodes a ULEB128 value as a plain `u64`, with no width limit beyond 64 bits.
pub fn decode_uleb128_u64(cur: &mut Cursor) -> Result<u64> {
    decode_uleb128(cur, 64)
}

/// Decodes an SLEB128 value, failing if it would not fit in `max_bits` (32 or 64).
pub fn decode_sleb128(cur: &mut Cursor, max_bits: u32) -> Result<i64> {
    let mut val: i64 = 0;
    let mut shift = 0u32;
    let mut byte;
    loop {
        byte = cur.read_u8()?;
        if shift < 64 {
            val |= ((byte & 0x7f) as i64) << shift;
        }
        shift += 7;
        if byte & 0x80 == 0 {
            break;
        }
        if shift >= 70 {
            return Err(DwarfError::Malformed("SLEB128 too long".into()));
        }
    }
    if shift < 64 && (byte & 0x40) != 0 {
        val |= -(1i64 << shift);
    }
    if max_bits < 64 {
        let min = -(1i64 << (max_bits - 1));
        let max = (1i64 << (max_bits - 1)) - 1;
        if val < min || val > max {
            return Err(DwarfError::Malformed(format!(
                "SLEB128 value {val} exceeds {max_bits}-bit width"
            )));
        }
    }
    Ok(val)
}

/// Decodes an SLEB128 value as a plain `i64`, with no width limit beyond 64 bits.
pub fn decode_sleb128_i64(cur: &mut Cursor) -> Result<i64> {
    decode_sleb128(cur, 64)
}

pub fn encode_uleb128(mut n: u64) -> Vec<u8> {
    let mut out = vec![];
    loop {
        let mut byte = (n as u8 & 0x7f) | 0x80;
        n >>= 7;
        if n == 0 {
            byte &= 0x7f;
        }
        out.push(byte);
        if n == 0 {
            break;
        }
    }
    out
}

pub fn encode_sleb128(mut n: i64) -> Vec<u8> {
    let mut out = vec![];
    let mut more = true;
    while more {
        let mut byte = (n as u8) & 0x7f;
        n >>= 7;
        if (n == 0 && (byte & 0x40) == 0) || (n == -1 && (byte & 0x40) != 0) {
            more = false;
        } else {
            byte |= 0x80;
        }
        out.push(byte);
    }
    out
}
