use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use prettytable::{Table, row};
use thiserror::Error;

use crate::lnk::ShellLinkRecord;
use crate::target::synthesize;

/// Fatal errors while decoding a shortcut. No partial record is ever returned.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a Shell Link file (bad header size or CLSID)")]
    NotAShellLink,
    #[error("truncated shortcut: {what}")]
    Truncated { what: &'static str },
    #[error("invalid LinkInfo size 0x{size:X}")]
    InvalidLinkInfo { size: u32 },
    #[error("I/O error reading shortcut: {0}")]
    Io(#[from] io::Error),
}

/// Terminal outcome for one shortcut that decoded fine but could not be opened.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no target path found in shortcut")]
    NoTargetFound,
    #[error("could not resolve this shortcut target\n{0}")]
    Unresolved(Box<Diagnostics>),
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("refusing dangerous mapping prefix '{prefix}'")]
    Rejected { prefix: String },
    #[error("invalid mapping rule: {0}")]
    InvalidRule(String),
    #[error("mapping file I/O: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("refusing dangerous cache prefix '{prefix}'")]
    Rejected { prefix: String },
    #[error("cache file has no parent directory")]
    NoLocation,
    #[error("cache file I/O: {0}")]
    Io(#[from] io::Error),
}

/// Everything we know about a shortcut that no strategy could resolve.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub lnk_path: PathBuf,
    pub windows_target: Option<String>,
    pub record: ShellLinkRecord,
}

impl Diagnostics {
    pub fn new(record: &ShellLinkRecord, lnk_path: &Path) -> Self {
        Self {
            lnk_path: lnk_path.to_path_buf(),
            windows_target: synthesize(record).map(|t| t.windows().to_string()),
            record: record.clone(),
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "(null)".into());
        let r = &self.record;

        let mut t = Table::new();
        t.add_row(row!["LNK file", self.lnk_path.display()]);
        t.add_row(row![
            "Windows target (raw)",
            show(&self.windows_target)
        ]);
        t.add_row(row![b -> "LocalBasePath", show(&r.local_base_path)]);
        t.add_row(row![b -> "LocalBasePathU", show(&r.local_base_path_unicode)]);
        t.add_row(row![b -> "NetName (CNRL)", show(&r.net_name)]);
        t.add_row(row![b -> "NetNameU (CNRL)", show(&r.net_name_unicode)]);
        t.add_row(row![b -> "DeviceName (CNRL)", show(&r.device_name)]);
        t.add_row(row![b -> "DeviceNameU (CNRL)", show(&r.device_name_unicode)]);
        t.add_row(row![b -> "CommonPathSuffix", show(&r.common_path_suffix)]);
        t.add_row(row![b -> "CommonPathSuffixU", show(&r.common_path_suffix_unicode)]);
        t.add_row(row![b -> "IDListPath", show(&r.id_list_best_path)]);
        t.add_row(row![b -> "RelativePath", show(&r.relative_path)]);
        t.add_row(row![b -> "WorkingDir", show(&r.working_dir)]);
        write!(f, "{}", t)
    }
}
