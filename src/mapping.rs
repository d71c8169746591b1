//! User mapping rules: Windows drive letters and UNC roots to host prefixes.
//!
//! File format, one rule per line, `#` comments and blank lines ignored:
//!
//! ```text
//! F:=/media/me/F_Daten
//! //server/share=/mnt/share
//! \\server\share=/mnt/share
//! ```

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use crate::error::MappingError;
use crate::winpath::{canonical_unc, drive_letter, drive_rest, join_prefix, trim_trailing_slashes};

/// System roots a mapping may never point into.
const DENIED_ROOTS: [&str; 6] = ["/proc", "/sys", "/dev", "/run", "/snap", "/var/lib/snapd"];

/// Returns true for `/`, anything relative, and anything inside a denied root,
/// except the desktop auto-mount roots `/run/media/...` and `/run/user/<uid>/gvfs/...`.
pub fn is_dangerous_prefix(prefix: &str) -> bool {
    if prefix.is_empty() || prefix == "/" || !prefix.starts_with('/') {
        return true;
    }
    if prefix.starts_with("/run/media/") || is_gvfs_path(prefix) {
        return false;
    }
    DENIED_ROOTS.iter().any(|root| {
        prefix
            .strip_prefix(root)
            .is_some_and(|tail| tail.is_empty() || tail.starts_with('/'))
    })
}

/// `/run/user/<uid>/gvfs/<something>`
fn is_gvfs_path(p: &str) -> bool {
    let mut parts = p.trim_start_matches('/').split('/');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()),
        (Some("run"), Some("user"), Some(uid), Some("gvfs"), Some(mount))
            if !uid.is_empty() && uid.bytes().all(|b| b.is_ascii_digit()) && !mount.is_empty()
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum MappingEntry {
    Drive { letter: char, prefix: String },
    /// `root` is canonical `//server/share`.
    Unc { root: String, prefix: String },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a rule file. A missing file is an empty table.
    pub fn load(path: &Path) -> Result<Self, MappingError> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let table = Self::parse(&text);
                debug!(
                    "Loaded {} mapping rules from {}",
                    table.entries.len(),
                    path.display()
                );
                Ok(table)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No mapping file at {}", path.display());
                Ok(Self::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse rule text. Invalid or dangerous rules are skipped and logged.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::new();
        for (n, line) in text.lines().enumerate() {
            let s = line.trim();
            if s.is_empty() || s.starts_with('#') {
                continue;
            }
            if let Err(e) = table.add_rule_line(s) {
                warn!("mapping line {}: {}", n + 1, e);
            }
        }
        table
    }

    fn add_rule_line(&mut self, s: &str) -> Result<(), MappingError> {
        let b = s.as_bytes();
        if b.len() >= 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && b[2] == b'=' {
            return self.add_drive(b[0] as char, s[3..].trim());
        }
        let (left, right) = s
            .split_once('=')
            .ok_or_else(|| MappingError::InvalidRule(s.to_string()))?;
        let (left, right) = (left.trim(), right.trim());
        if !(left.starts_with("//") || left.starts_with("\\\\")) || right.is_empty() {
            return Err(MappingError::InvalidRule(s.to_string()));
        }
        self.add_unc(left, right)
    }

    pub fn add_drive(&mut self, letter: char, prefix: &str) -> Result<(), MappingError> {
        let prefix = checked_prefix(prefix)?;
        self.entries.push(MappingEntry::Drive {
            letter: letter.to_ascii_uppercase(),
            prefix,
        });
        Ok(())
    }

    pub fn add_unc(&mut self, unc_root: &str, prefix: &str) -> Result<(), MappingError> {
        let prefix = checked_prefix(prefix)?;
        self.entries.push(MappingEntry::Unc {
            root: canonical_unc(unc_root),
            prefix,
        });
        Ok(())
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every candidate for a `X:/...` path, most recently added rule first.
    pub fn drive_candidates(&self, path: &str) -> Vec<String> {
        let Some(letter) = drive_letter(path) else {
            return Vec::new();
        };
        let rest = drive_rest(path);
        self.entries
            .iter()
            .rev()
            .filter_map(|e| match e {
                MappingEntry::Drive { letter: l, prefix } if *l == letter => {
                    Some(join_prefix(prefix, rest))
                }
                _ => None,
            })
            .collect()
    }

    /// Candidate for a drive path from the most recent matching rule.
    pub fn try_drive(&self, path: &str) -> Option<String> {
        self.drive_candidates(path).into_iter().next()
    }

    /// Candidate for a canonical UNC path from the longest matching rule.
    ///
    /// A rule only matches at a path boundary, so `//srv/share` never
    /// matches `//srv/shareXYZ`. Server and share compare case-insensitively.
    pub fn try_unc(&self, unc: &str) -> Option<String> {
        let mut best: Option<(&str, usize)> = None;
        for e in &self.entries {
            let MappingEntry::Unc { root, prefix } = e else {
                continue;
            };
            let n = root.len();
            if best.is_some_and(|(_, len)| n < len) || unc.len() < n {
                continue;
            }
            if !unc.is_char_boundary(n) || !unc[..n].eq_ignore_ascii_case(root) {
                continue;
            }
            let tail = &unc[n..];
            if tail.is_empty() || tail.starts_with('/') {
                best = Some((prefix, n));
            }
        }
        best.map(|(prefix, n)| join_prefix(prefix, &unc[n..]))
    }
}

fn checked_prefix(prefix: &str) -> Result<String, MappingError> {
    let prefix = trim_trailing_slashes(prefix.trim());
    if is_dangerous_prefix(prefix) {
        return Err(MappingError::Rejected {
            prefix: prefix.to_string(),
        });
    }
    Ok(prefix.to_string())
}

fn append_line(path: &Path, line: &str) -> Result<(), MappingError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(f, "{}", line)?;
    Ok(())
}

/// Append `X:=/prefix` to the rule file, creating it if needed.
pub fn append_drive_rule(path: &Path, letter: char, prefix: &str) -> Result<(), MappingError> {
    let prefix = checked_prefix(prefix)?;
    append_line(path, &format!("{}:={}", letter.to_ascii_uppercase(), prefix))
}

/// Append `//server/share=/prefix` to the rule file, creating it if needed.
pub fn append_unc_rule(path: &Path, unc_root: &str, prefix: &str) -> Result<(), MappingError> {
    let prefix = checked_prefix(prefix)?;
    append_line(path, &format!("{}={}", canonical_unc(unc_root), prefix))
}
