//! Best-effort path salvage from a raw LinkTargetIDList blob.
//!
//! Shell items are namespace-specific and mostly undocumented, so instead of
//! decoding them we scan every byte offset for something that looks like a
//! drive path or a UNC path, in both 8-bit and UTF-16LE form, and keep the
//! richest candidate. The result is only ever used as a last resort.

use crate::strings::utf16_to_string;
use crate::winpath::{is_drive_path, is_unc_path};

/// Longest candidate extracted from a single hit.
const CANDIDATE_CAP: usize = 4096;

fn is_sep(c: char) -> bool {
    c == '\\' || c == '/'
}

/// Non-empty path segments after the `X:\` root.
fn drive_segments(p: &str) -> usize {
    p[3..].split(is_sep).filter(|s| !s.is_empty()).count()
}

/// Non-empty path segments after `\\server\share`. Zero when the share is missing.
fn unc_rest_segments(p: &str) -> usize {
    let mut parts = p.split(is_sep).filter(|s| !s.is_empty());
    if parts.next().is_none() || parts.next().is_none() {
        return 0;
    }
    parts.count()
}

/// Path richness score. UNC paths outrank drive paths with the same depth.
pub fn score_candidate(s: &str) -> Option<usize> {
    if s.is_empty() {
        return None;
    }
    let len_bonus = s.chars().count() / 8;
    if is_unc_path(s) {
        Some(unc_rest_segments(s) * 100 + 50 + len_bonus)
    } else if is_drive_path(s) {
        Some(drive_segments(s) * 100 + 40 + len_bonus)
    } else {
        None
    }
}

/// 8-bit run from `start`, stopping at NUL or a control byte (tab excepted).
fn ansi_candidate(buf: &[u8], start: usize) -> Option<String> {
    let window = &buf[start..buf.len().min(start + CANDIDATE_CAP)];
    let end = window
        .iter()
        .position(|&c| c == 0 || (c < 0x20 && c != b'\t'))
        .unwrap_or(window.len());
    (end > 0).then(|| String::from_utf8_lossy(&window[..end]).into_owned())
}

/// UTF-16LE run from `start`, same stop rules as the 8-bit reader.
fn utf16_candidate(buf: &[u8], start: usize) -> Option<String> {
    let units: Vec<u16> = buf[start..]
        .chunks_exact(2)
        .take(CANDIDATE_CAP)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .take_while(|&u| u >= 0x20 || u == 0x09)
        .collect();
    (!units.is_empty()).then(|| utf16_to_string(&units))
}

fn is_sep_byte(c: u8) -> bool {
    c == b'\\' || c == b'/'
}

/// Scan the blob and return the highest-scoring path, if any.
pub fn best_path(buf: &[u8]) -> Option<String> {
    if buf.len() < 4 {
        return None;
    }

    let mut best: Option<(usize, String)> = None;
    let mut consider = |cand: Option<String>| {
        let Some(cand) = cand else { return };
        let Some(score) = score_candidate(&cand) else {
            return;
        };
        if best.as_ref().is_none_or(|(b, _)| score > *b) {
            best = Some((score, cand));
        }
    };

    let mut i = 0;
    while i + 4 < buf.len() {
        if buf[i].is_ascii_alphabetic() && buf[i + 1] == b':' && is_sep_byte(buf[i + 2]) {
            consider(ansi_candidate(buf, i));
        }
        if buf[i] == b'\\' && buf[i + 1] == b'\\' {
            consider(ansi_candidate(buf, i));
        }
        i += 1;
    }

    let mut i = 0;
    while i + 8 < buf.len() {
        if buf[i].is_ascii_alphabetic()
            && buf[i + 1] == 0
            && buf[i + 2] == b':'
            && buf[i + 3] == 0
            && is_sep_byte(buf[i + 4])
            && buf[i + 5] == 0
        {
            consider(utf16_candidate(buf, i));
        }
        if buf[i] == b'\\' && buf[i + 1] == 0 && buf[i + 2] == b'\\' && buf[i + 3] == 0 {
            consider(utf16_candidate(buf, i));
        }
        i += 1;
    }

    best.map(|(_, path)| path)
}
