//! Windows path classification and conversion helpers.
//!
//! Canonical UNC form used across the crate is `//server/share[/rest]`
//! (forward slashes, no trailing slash).

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Everything except RFC 3986 unreserved characters and `/`.
const URI_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

fn is_sep(c: u8) -> bool {
    c == b'\\' || c == b'/'
}

/// `X:\...` or `X:/...`
pub fn is_drive_path(p: &str) -> bool {
    let b = p.as_bytes();
    b.len() >= 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && is_sep(b[2])
}

/// Bare `X:` as stored in a CNRL device name.
pub fn is_drive_root(p: &str) -> bool {
    let b = p.as_bytes();
    b.len() == 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

/// Leading `\\` or `//`.
pub fn is_unc_path(p: &str) -> bool {
    p.len() >= 5 && (p.starts_with("\\\\") || p.starts_with("//"))
}

/// An absolute host path, which a UNC path is not.
pub fn is_posix_absolute(p: &str) -> bool {
    p.starts_with('/') && !p.starts_with("//")
}

pub fn to_posix_separators(p: &str) -> String {
    p.replace('\\', "/")
}

/// Upper-case drive letter of a drive path.
pub fn drive_letter(p: &str) -> Option<char> {
    is_drive_path(p).then(|| p.as_bytes()[0].to_ascii_uppercase() as char)
}

/// Everything after `X:`, including the leading separator.
pub fn drive_rest(p: &str) -> &str {
    if is_drive_path(p) { &p[2..] } else { "" }
}

/// Collapse any UNC spelling to `//server/share[/rest]` without trailing slashes.
pub fn canonical_unc(s: &str) -> String {
    let posix = to_posix_separators(s);
    let body = posix.strip_prefix("//").unwrap_or(&posix);
    let mut out = format!("//{}", body);
    while out.len() > 2 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Parts of a canonical UNC path. `rest` keeps its leading `/` or is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UncParts<'a> {
    pub server: &'a str,
    pub share: &'a str,
    pub rest: &'a str,
}

impl UncParts<'_> {
    /// `//server/share`
    pub fn root(&self) -> String {
        format!("//{}/{}", self.server, self.share)
    }

    /// `\\server\share`
    pub fn windows_root(&self) -> String {
        format!("\\\\{}\\{}", self.server, self.share)
    }
}

pub fn split_unc(unc: &str) -> Option<UncParts<'_>> {
    let body = unc.strip_prefix("//")?;
    let (server, after) = body.split_once('/')?;
    if server.is_empty() {
        return None;
    }
    let (share, rest) = match after.find('/') {
        Some(i) => (&after[..i], &after[i..]),
        None => (after, ""),
    };
    if share.is_empty() {
        return None;
    }
    Some(UncParts {
        server,
        share,
        rest,
    })
}

pub fn percent_encode_path(s: &str) -> String {
    utf8_percent_encode(s, URI_PATH).to_string()
}

/// `//srv/share/My Folder/a.txt` -> `smb://srv/share/My%20Folder/a.txt`
pub fn unc_to_smb_uri(unc: &str) -> Option<String> {
    let parts = split_unc(unc)?;
    let path = format!("/{}{}", parts.share, parts.rest);
    Some(format!("smb://{}{}", parts.server, percent_encode_path(&path)))
}

/// Join a host prefix with a remainder, producing exactly one `/` between them.
pub fn join_prefix(prefix: &str, rest: &str) -> String {
    if rest.is_empty() {
        return prefix.to_string();
    }
    match (prefix.ends_with('/'), rest.starts_with('/')) {
        (true, true) => format!("{}{}", &prefix[..prefix.len() - 1], rest),
        (false, false) => format!("{}/{}", prefix, rest),
        _ => format!("{}{}", prefix, rest),
    }
}

/// Strip trailing slashes but never reduce `/` to an empty string.
pub fn trim_trailing_slashes(p: &str) -> &str {
    let t = p.trim_end_matches('/');
    if t.is_empty() && p.starts_with('/') { "/" } else { t }
}
