//! Variable-length signed integers for the binary format.
//!
//! The first byte carries the continuation flag (`0x80`), the sign flag
//! (`0x40`) and the low 6 bits of the magnitude. Every following byte carries
//! the continuation flag and the next 7 bits, least significant first.
//!
//! | value | bytes       |
//! |-------|-------------|
//! | 0     | `00`        |
//! | 63    | `3F`        |
//! | -1    | `41`        |
//! | 64    | `80 01`     |
//! | -200  | `C8 03`     |

use crate::error::{Result, VlxError};

const CONTINUE: u8 = 0x80;
const SIGN: u8 = 0x40;

/// Append the encoding of `value` to `out`.
pub fn encode_varint(value: i64, out: &mut Vec<u8>) {
    let mut magnitude = value.unsigned_abs();
    let mut first = (magnitude & 0x3F) as u8;
    if value < 0 {
        first |= SIGN;
    }
    magnitude >>= 6;
    if magnitude != 0 {
        first |= CONTINUE;
    }
    out.push(first);

    while magnitude != 0 {
        let mut byte = (magnitude & 0x7F) as u8;
        magnitude >>= 7;
        if magnitude != 0 {
            byte |= CONTINUE;
        }
        out.push(byte);
    }
}

/// Decode one varint starting at `*pos`, advancing `*pos` past it.
pub fn decode_varint(bytes: &[u8], pos: &mut usize) -> Result<i64> {
    let mut next = || -> Result<u8> {
        let byte = *bytes
            .get(*pos)
            .ok_or_else(|| VlxError::BinaryDecode("unexpected end of data in varint".into()))?;
        *pos += 1;
        Ok(byte)
    };

    let first = next()?;
    let negative = first & SIGN != 0;
    let mut magnitude = u64::from(first & 0x3F);
    let mut more = first & CONTINUE != 0;
    let mut shift = 6u32;

    while more {
        if shift >= 64 {
            return Err(VlxError::BinaryDecode("varint too long".into()));
        }
        let byte = next()?;
        magnitude |= u64::from(byte & 0x7F) << shift;
        more = byte & CONTINUE != 0;
        shift += 7;
    }

    let value = magnitude as i64;
    Ok(if negative { value.wrapping_neg() } else { value })
}
