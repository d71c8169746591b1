//! Live mount enumeration and scoring.
//!
//! Mounts change between runs, so nothing here is cached: every call reads
//! the mount table (and the GVFS directory) again.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::winpath::{canonical_unc, drive_rest, is_drive_path, join_prefix, split_unc};

/// A guess must score at least this much to be returned at all.
pub const MIN_GUESS_SCORE: i32 = 10;
/// ...and beat the runner-up by at least this much.
pub const MIN_SCORE_MARGIN: i32 = 2;

/// File systems that never hold user data.
const PSEUDO_FS: [&str; 20] = [
    "proc", "sysfs", "devtmpfs", "devpts", "cgroup", "cgroup2", "securityfs", "debugfs",
    "tracefs", "pstore", "bpf", "mqueue", "hugetlbfs", "configfs", "fusectl", "binfmt_misc",
    "autofs", "efivarfs", "nsfs", "rpc_pipefs",
];
/// Local file systems Windows drives usually come with.
const WINDOWS_FS: [&str; 7] = ["ntfs", "ntfs3", "fuseblk", "vfat", "exfat", "msdos", "drvfs"];
/// Network file systems.
const NETWORK_FS: [&str; 7] = ["cifs", "smb3", "smbfs", "nfs", "nfs4", "fuse.sshfs", "9p"];
const SMB_FS: [&str; 3] = ["cifs", "smb3", "smbfs"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MountCandidate {
    pub mount_path: String,
    pub fs_type: String,
    /// Source device, e.g. `//server/share` for CIFS.
    pub device: String,
}

/// A prefix that produced an existing host path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountMatch {
    pub prefix: String,
    pub path: String,
}

/// Decode the octal escapes (`\040` and friends) used in the mount table.
fn unescape_mount_field(s: &str) -> String {
    let b = s.as_bytes();
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        if b[i] == b'\\'
            && i + 3 < b.len()
            && b[i + 1..i + 4].iter().all(|c| (b'0'..=b'7').contains(c))
        {
            let v = b[i + 1..i + 4]
                .iter()
                .fold(0u32, |acc, c| acc * 8 + (c - b'0') as u32);
            if let Ok(byte) = u8::try_from(v) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(b[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse `/proc/mounts` text: `device mountpoint fstype options dump pass`.
pub fn parse_mount_table(text: &str) -> Vec<MountCandidate> {
    text.lines()
        .filter_map(|line| {
            let mut f = line.split_whitespace();
            let device = unescape_mount_field(f.next()?);
            let mount_path = unescape_mount_field(f.next()?);
            let fs_type = f.next()?.to_string();
            Some(MountCandidate {
                mount_path,
                fs_type,
                device,
            })
        })
        .collect()
}

fn under(path: &str, root: &str) -> bool {
    path.strip_prefix(root)
        .is_some_and(|t| t.is_empty() || t.starts_with('/'))
}

/// Pseudo file systems, system roots and transient per-user runtime dirs.
/// Desktop-managed mounts under `/run/media` and GVFS stay in.
pub fn is_system_mount(m: &MountCandidate) -> bool {
    let p = m.mount_path.as_str();
    if !p.starts_with('/') || p == "/" || PSEUDO_FS.contains(&m.fs_type.as_str()) {
        return true;
    }
    if under(p, "/run/media") || p.contains("/gvfs") {
        return false;
    }
    ["/proc", "/sys", "/dev", "/run", "/snap", "/var/lib/snapd", "/boot"]
        .iter()
        .any(|root| under(p, root))
}

/// Higher means "more likely to hold a Windows drive or share".
pub fn score_mount(m: &MountCandidate) -> i32 {
    let p = m.mount_path.as_str();
    let mut s = if p.starts_with("/mnt/") {
        25
    } else if p.starts_with("/media/") {
        22
    } else if p.starts_with("/run/media/") {
        20
    } else if p.starts_with("/run/user/") {
        12
    } else {
        0
    };
    let fs = m.fs_type.as_str();
    if WINDOWS_FS.contains(&fs) {
        s += 15;
    } else if NETWORK_FS.contains(&fs) || fs == "gvfs" {
        s += 10;
    }
    s + (p.len() / 8) as i32
}

/// Confidence gate: the best entry wins only if it clears the floor and
/// leads the runner-up by the minimum margin.
pub fn pick_confident<T>(mut scored: Vec<(i32, T)>) -> Option<T> {
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    let mut it = scored.into_iter();
    let (best, value) = it.next()?;
    if best < MIN_GUESS_SCORE {
        debug!("Best mount score {} below floor {}", best, MIN_GUESS_SCORE);
        return None;
    }
    if let Some((second, _)) = it.next() {
        if best - second < MIN_SCORE_MARGIN {
            debug!("Mount guess ambiguous: {} vs {}", best, second);
            return None;
        }
    }
    Some(value)
}

/// `smb-share:server=NAS,share=Public,user=me` -> value for `key`.
fn gvfs_value<'a>(name: &'a str, key: &str) -> Option<&'a str> {
    name.split([':', ','])
        .find_map(|kv| kv.strip_prefix(key)?.strip_prefix('='))
        .filter(|v| !v.is_empty())
}

fn existing_join(prefix: String, rest: &str) -> Option<MountMatch> {
    let path = join_prefix(&prefix, rest);
    if Path::new(&path).exists() {
        Some(MountMatch { prefix, path })
    } else {
        debug!("{} does not exist", path);
        None
    }
}

#[derive(Debug, Clone)]
pub struct MountProbe {
    mounts_file: PathBuf,
    gvfs_root: Option<PathBuf>,
}

impl MountProbe {
    pub fn new(mounts_file: impl Into<PathBuf>, gvfs_root: Option<PathBuf>) -> Self {
        Self {
            mounts_file: mounts_file.into(),
            gvfs_root,
        }
    }

    fn read_table(&self) -> Vec<MountCandidate> {
        match fs::read_to_string(&self.mounts_file) {
            Ok(text) => parse_mount_table(&text),
            Err(e) => {
                warn!("Cannot read {}: {}", self.mounts_file.display(), e);
                Vec::new()
            }
        }
    }

    fn gvfs_entries(&self) -> Vec<MountCandidate> {
        let Some(root) = &self.gvfs_root else {
            return Vec::new();
        };
        let Ok(dir) = fs::read_dir(root) else {
            return Vec::new();
        };
        dir.filter_map(Result::ok)
            .filter_map(|de| {
                let name = de.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    return None;
                }
                Some(MountCandidate {
                    mount_path: root.join(&name).to_string_lossy().into_owned(),
                    fs_type: "gvfs".into(),
                    device: name,
                })
            })
            .collect()
    }

    /// Live, non-system mount points plus GVFS entries, deduplicated.
    pub fn list_mounts(&self) -> Vec<MountCandidate> {
        let mut out: Vec<MountCandidate> = Vec::new();
        for m in self.read_table().into_iter().chain(self.gvfs_entries()) {
            if is_system_mount(&m) || out.iter().any(|o| o.mount_path == m.mount_path) {
                continue;
            }
            out.push(m);
        }
        out
    }

    /// Guess which mount holds a `X:/...` path. Returns nothing unless the
    /// guess passes the confidence gate.
    pub fn score_drive_guess(&self, drive_path: &str) -> Option<MountMatch> {
        if !is_drive_path(drive_path) {
            return None;
        }
        let rest = drive_rest(drive_path);
        let scored: Vec<(i32, MountMatch)> = self
            .list_mounts()
            .into_iter()
            .filter_map(|m| {
                let path = join_prefix(&m.mount_path, rest);
                Path::new(&path).exists().then(|| {
                    (
                        score_mount(&m),
                        MountMatch {
                            prefix: m.mount_path,
                            path,
                        },
                    )
                })
            })
            .collect();
        debug!("{} mounts contain {}", scored.len(), rest);
        let guess = pick_confident(scored);
        if let Some(g) = &guess {
            info!("Mount guess for {}: {}", drive_path, g.prefix);
        }
        guess
    }

    /// GVFS directory mounting `//server/share`, whatever its content.
    pub fn gvfs_mount_for(&self, server: &str, share: &str) -> Option<String> {
        self.gvfs_entries().into_iter().find_map(|m| {
            if !m.device.starts_with("smb-share:") {
                return None;
            }
            let s = gvfs_value(&m.device, "server")?;
            let sh = gvfs_value(&m.device, "share")?;
            (s.eq_ignore_ascii_case(server) && sh.eq_ignore_ascii_case(share))
                .then_some(m.mount_path)
        })
    }

    /// Live CIFS/SMB mount points of `//server/share`, in table order. A
    /// share may be mounted more than once, including through a subdirectory.
    pub fn cifs_mounts_for(&self, server: &str, share: &str) -> Vec<String> {
        self.read_table()
            .into_iter()
            .filter(|m| SMB_FS.contains(&m.fs_type.as_str()))
            .filter_map(|m| {
                let dev = canonical_unc(&m.device);
                let d = split_unc(&dev)?;
                (d.server.eq_ignore_ascii_case(server) && d.share.eq_ignore_ascii_case(share))
                    .then_some(m.mount_path)
            })
            .collect()
    }

    /// A GNOME-managed SMB mount for this UNC path whose join exists.
    pub fn find_gvfs(&self, unc: &str) -> Option<MountMatch> {
        let canon = canonical_unc(unc);
        let parts = split_unc(&canon)?;
        let prefix = self.gvfs_mount_for(parts.server, parts.share)?;
        existing_join(prefix, parts.rest)
    }

    /// A live CIFS/SMB mount of this share whose join exists. The mount root
    /// alone does not count when the path has a remainder.
    pub fn find_cifs(&self, unc: &str) -> Option<MountMatch> {
        let canon = canonical_unc(unc);
        let parts = split_unc(&canon)?;
        self.cifs_mounts_for(parts.server, parts.share)
            .into_iter()
            .find_map(|prefix| existing_join(prefix, parts.rest))
    }

    /// Mount points to offer in the assistant: those under which `rest`
    /// exists, or every mount when none does. Best score first.
    pub fn mounts_for_rest(&self, rest: &str) -> Vec<String> {
        let mut mounts = self.list_mounts();
        mounts.sort_by(|a, b| {
            score_mount(b)
                .cmp(&score_mount(a))
                .then_with(|| a.mount_path.cmp(&b.mount_path))
        });
        let good: Vec<String> = mounts
            .iter()
            .filter(|m| Path::new(&join_prefix(&m.mount_path, rest)).exists())
            .map(|m| m.mount_path.clone())
            .collect();
        if good.is_empty() {
            mounts.into_iter().map(|m| m.mount_path).collect()
        } else {
            good
        }
    }
}
