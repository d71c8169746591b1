//! Per-shortcut memo of the host prefix that resolved it last time.
//!
//! Stored as `<absolute .lnk path>=<prefix>` lines. Reads are latest-wins so
//! older files with duplicate keys still work; writes rewrite the file
//! without duplicates through a temporary file and a rename.

use log::{debug, warn};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::mapping::is_dangerous_prefix;

#[derive(Debug, Clone)]
pub struct LinkCache {
    path: PathBuf,
}

/// Value stored on `line` for `key`. Shortcut paths may contain `=` (GVFS
/// mount names do), so the line is matched against the whole key rather than
/// split; stored prefixes are always absolute.
fn entry_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    if line.starts_with('#') {
        return None;
    }
    line.strip_prefix(key)?
        .strip_prefix('=')
        .filter(|v| v.starts_with('/'))
}

/// Write `contents` next to `path` and rename it into place. The temporary
/// file never outlives a failed attempt.
fn replace_file(path: &Path, contents: &str) -> io::Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let written = File::create(&tmp_path).and_then(|file| {
        let mut out = BufWriter::new(file);
        out.write_all(contents.as_bytes())?;
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        fs::rename(&tmp_path, path)
    });
    if written.is_err() {
        if let Err(e) = fs::remove_file(&tmp_path) {
            debug!("Cannot remove {}: {}", tmp_path.display(), e);
        }
    }
    written
}

impl LinkCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prefix recorded for this shortcut, last matching line winning.
    pub fn get(&self, lnk_path: &str) -> Option<String> {
        if lnk_path.is_empty() {
            return None;
        }
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Cannot read link cache {}: {}", self.path.display(), e);
                }
                return None;
            }
        };

        let mut found = None;
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(v) = entry_value(line, lnk_path) {
                found = Some(v.to_string());
            }
        }
        debug!("Link cache lookup {} -> {:?}", lnk_path, found);
        found
    }

    /// Record `prefix` for this shortcut. The live file is only ever replaced
    /// by a complete rewrite.
    pub fn set(&self, lnk_path: &str, prefix: &str) -> Result<(), CacheError> {
        if lnk_path.is_empty() || is_dangerous_prefix(prefix) {
            return Err(CacheError::Rejected {
                prefix: prefix.to_string(),
            });
        }
        let dir = self.path.parent().ok_or(CacheError::NoLocation)?;
        fs::create_dir_all(dir)?;

        let existing = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let row = format!("{}={}\n", lnk_path, prefix);
        let mut contents = String::with_capacity(existing.len() + row.len());
        let mut written = false;
        for line in existing.lines() {
            if entry_value(line, lnk_path).is_some() {
                // Collapse every older row for this key into one.
                if !written {
                    contents.push_str(&row);
                    written = true;
                }
            } else {
                contents.push_str(line);
                contents.push('\n');
            }
        }
        if !written {
            contents.push_str(&row);
        }
        replace_file(&self.path, &contents)?;
        debug!("Link cache set {} -> {}", lnk_path, prefix);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_match_the_whole_key() {
        assert_eq!(entry_value("/a.lnk=/mnt/x", "/a.lnk"), Some("/mnt/x"));
        assert_eq!(entry_value("/a.lnk.bak=/mnt/x", "/a.lnk"), None);
        assert_eq!(entry_value("# /a.lnk=/mnt/x", "# /a.lnk"), None);
        assert_eq!(entry_value("/a.lnk=", "/a.lnk"), None);

        let key = "/g/smb-share:server=nas,share=pub/R.lnk";
        let line = format!("{}=/g/smb-share:server=nas,share=pub", key);
        assert_eq!(entry_value(&line, key), Some("/g/smb-share:server=nas,share=pub"));
        assert_eq!(entry_value(&line, "/g/smb-share:server"), None);
    }

    #[test]
    fn failed_replace_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let target = dir.path().join("links.conf");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        assert!(replace_file(&target, "/k.lnk=/mnt/a\n").is_err());
        assert!(!dir.path().join("links.conf.tmp").exists());
        assert!(target.join("keep").exists());
    }
}
