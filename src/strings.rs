//! String decoding helpers for the Shell Link format.
//!
//! Two encodings show up in a `.lnk`: legacy 8-bit (ANSI code page) strings
//! and UTF-16LE. Every reader here is bounded so a corrupted length or a
//! missing terminator can never make us allocate without limit.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use crate::error::DecodeError;

/// Upper bound for NUL-terminated 8-bit strings (1 MiB).
pub const ANSI_CAP: usize = 1 << 20;
/// Upper bound for NUL-terminated UTF-16 strings, in code units.
pub const UNICODE_CAP: usize = 65_535;

/// Decode UTF-16 code units up to the first NUL. Unpaired surrogates become U+FFFD.
pub fn utf16_to_string(units: &[u16]) -> String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    char::decode_utf16(units[..end].iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Decode a UTF-16LE byte run, reading at most `max_units` code units.
pub fn utf16le_to_string(bytes: &[u8], max_units: usize) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .take(max_units)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect();
    utf16_to_string(&units)
}

/// Decode an 8-bit string. UTF-8 is kept as is, anything else is read as Latin-1.
pub fn ansi_to_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// NUL-terminated 8-bit string starting at `buf[0]`, capped at `cap` bytes.
pub fn read_c_string(buf: &[u8], cap: usize) -> String {
    let window = &buf[..buf.len().min(cap)];
    let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
    ansi_to_string(&window[..end])
}

/// NUL-terminated UTF-16LE string starting at `buf[0]`, capped at `max_units`.
pub fn read_w_string(buf: &[u8], max_units: usize) -> String {
    utf16le_to_string(buf, max_units)
}

/// Read one StringData entry: a 16-bit count followed by that many
/// UTF-16LE code units (`unicode`) or bytes. A zero count is an empty string.
pub fn read_string_data<R: Read>(
    reader: &mut R,
    unicode: bool,
    what: &'static str,
) -> Result<String, DecodeError> {
    let count = reader
        .read_u16::<LittleEndian>()
        .map_err(|_| DecodeError::Truncated { what })? as usize;
    if count == 0 {
        return Ok(String::new());
    }

    let byte_len = if unicode { count * 2 } else { count };
    let mut raw = vec![0u8; byte_len];
    reader
        .read_exact(&mut raw)
        .map_err(|_| DecodeError::Truncated { what })?;

    if unicode {
        Ok(utf16le_to_string(&raw, count))
    } else {
        Ok(ansi_to_string(&raw))
    }
}
