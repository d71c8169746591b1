//! Pick one Windows target path out of the redundant fields of a shortcut.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::lnk::ShellLinkRecord;
use crate::winpath::{is_drive_path, is_drive_root, is_unc_path, to_posix_separators};

/// A synthesized target: the Windows spelling and its forward-slash twin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolvedTarget {
    windows: String,
    posix: String,
}

impl ResolvedTarget {
    pub fn new(windows: impl Into<String>) -> Self {
        let windows = windows.into();
        let posix = to_posix_separators(&windows);
        Self { windows, posix }
    }

    pub fn windows(&self) -> &str {
        &self.windows
    }

    pub fn posix(&self) -> &str {
        &self.posix
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

/// `\\server\share` from any of `\\server\share`, `\server\share`,
/// `//server/share` or `server\share`.
fn normalize_unc_root(s: &str) -> String {
    let back = s.replace('/', "\\");
    if back.starts_with("\\\\") {
        back
    } else if back.starts_with('\\') {
        format!("\\{}", back)
    } else {
        format!("\\\\{}", back)
    }
}

fn ends_with_ci(s: &str, tail: &str) -> bool {
    s.len() >= tail.len()
        && s.is_char_boundary(s.len() - tail.len())
        && s[s.len() - tail.len()..].eq_ignore_ascii_case(tail)
}

/// Join base and suffix with exactly one backslash, unless the base already
/// ends with the suffix.
fn join_windows(base: &str, suffix: &str) -> String {
    if suffix.is_empty() || ends_with_ci(base, suffix) {
        return base.to_string();
    }
    let sep = |c: char| c == '\\' || c == '/';
    if base.ends_with(sep) || suffix.starts_with(sep) {
        format!("{}{}", base, suffix)
    } else {
        format!("{}\\{}", base, suffix)
    }
}

/// Build the best Windows target path for a decoded shortcut.
///
/// Precedence: UNC net name over a drive-letter local base, local base,
/// device name, then working dir + relative path, relative path, bare suffix.
/// The ID-list salvage replaces the result only when the result is not a
/// drive or UNC path and the salvage is.
pub fn synthesize(record: &ShellLinkRecord) -> Option<ResolvedTarget> {
    let local = non_empty(record.local_base());
    let net = non_empty(record.net_name())
        .map(normalize_unc_root)
        .filter(|n| is_unc_path(n));
    let device = non_empty(record.device_name());
    let suffix = non_empty(record.common_path_suffix());

    let mut base: Option<&str> = local;
    if let Some(net) = net.as_deref() {
        let local_is_usable = local.is_some_and(|l| !is_drive_path(l) && !is_drive_root(l));
        if !local_is_usable {
            base = Some(net);
        }
    }
    if base.is_none() {
        base = device;
    }

    let working_dir = non_empty(record.working_dir.as_deref());
    let relative = non_empty(record.relative_path.as_deref());

    let candidate = match (base, suffix) {
        (Some(b), Some(s)) => Some(join_windows(b, s)),
        (Some(b), None) => Some(b.to_string()),
        (None, _) => match (working_dir, relative) {
            (Some(w), Some(r)) => Some(format!("{}\\{}", w, r)),
            (None, Some(r)) => Some(r.to_string()),
            _ => suffix.map(str::to_string),
        },
    };

    let structured = |p: &str| is_drive_path(p) || is_unc_path(p);
    if !candidate.as_deref().is_some_and(structured) {
        if let Some(id_path) = non_empty(record.id_list_best_path.as_deref()) {
            if structured(id_path) {
                debug!("Using IDList path {} over {:?}", id_path, candidate);
                return Some(ResolvedTarget::new(id_path));
            }
        }
    }

    candidate.map(ResolvedTarget::new)
}
