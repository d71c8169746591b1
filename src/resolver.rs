//! Turn a synthesized Windows path into something openable on this host.
//!
//! Strategies run in a fixed order and the first one producing an existing
//! path wins:
//!
//! 1. the path is already an absolute host path
//! 2. the per-shortcut cache
//! 3. UNC: mapping table, GVFS, CIFS, assistant, then an `smb://` URI
//! 4. drive letter: mapping table, scored mount guess, assistant
//!
//! Prefixes found by mount probing or the assistant are remembered in the
//! link cache. The assistant also records a mapping rule.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::LinkCache;
use crate::config::Config;
use crate::error::{Diagnostics, ResolveError};
use crate::lnk::ShellLinkRecord;
use crate::mapping::{self, MappingEntry, MappingTable, is_dangerous_prefix};
use crate::mounts::MountProbe;
use crate::target::{ResolvedTarget, synthesize};
use crate::winpath::{
    UncParts, canonical_unc, drive_letter, drive_rest, is_drive_path, is_posix_absolute,
    is_unc_path, join_prefix, split_unc, trim_trailing_slashes, unc_to_smb_uri,
};

/// Upper bound on assistant prompts for one shortcut.
pub const MAX_ASSIST_ROUNDS: usize = 8;

/// Answer from the interactive chooser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Selected(String),
    /// The user wants to browse for a folder instead.
    Manual,
    Cancelled,
}

pub trait Chooser {
    fn choose(&self, title: &str, prompt: &str, candidates: &[String]) -> Choice;
}

pub trait DirectoryPicker {
    fn pick_directory(&self, title: &str) -> Option<String>;
}

/// Hands the final path or URI to the desktop.
pub trait Opener {
    fn open(&self, target: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum FinalTarget {
    Path(String),
    Uri(String),
}

impl FinalTarget {
    pub fn as_str(&self) -> &str {
        match self {
            FinalTarget::Path(p) | FinalTarget::Uri(p) => p,
        }
    }
}

/// Hand a resolved target to the desktop. `Ok(false)` means a host path the
/// opener refused. The `smb://` URI is the last strategy, so a refused URI
/// leaves the shortcut unresolved.
pub fn open_target(
    opener: &dyn Opener,
    target: &FinalTarget,
    record: &ShellLinkRecord,
    lnk_path: &Path,
) -> Result<bool, ResolveError> {
    info!("Opening {}", target.as_str());
    if opener.open(target.as_str()) {
        return Ok(true);
    }
    match target {
        FinalTarget::Path(_) => Ok(false),
        FinalTarget::Uri(uri) => {
            warn!("Opener refused {}", uri);
            Err(ResolveError::Unresolved(Box::new(Diagnostics::new(
                record, lnk_path,
            ))))
        }
    }
}

/// What the assistant is locating: a drive letter or a share.
enum Anchor<'a> {
    Drive(char),
    Unc(UncParts<'a>),
}

impl Anchor<'_> {
    fn label(&self) -> String {
        match self {
            Anchor::Drive(l) => format!("drive {}:", l),
            Anchor::Unc(p) => p.windows_root(),
        }
    }
}

pub struct Resolver {
    mappings: MappingTable,
    map_path: Option<PathBuf>,
    cache: LinkCache,
    probe: MountProbe,
    chooser: Option<Box<dyn Chooser>>,
    picker: Option<Box<dyn DirectoryPicker>>,
}

impl Resolver {
    pub fn new(mappings: MappingTable, cache: LinkCache, probe: MountProbe) -> Self {
        Self {
            mappings,
            map_path: None,
            cache,
            probe,
            chooser: None,
            picker: None,
        }
    }

    /// Build from configuration. An unreadable rule file leaves the table empty.
    pub fn from_config(config: &Config) -> Self {
        let mappings = MappingTable::load(&config.map_path).unwrap_or_else(|e| {
            warn!("Ignoring mapping file {}: {}", config.map_path.display(), e);
            MappingTable::new()
        });
        Self::new(
            mappings,
            LinkCache::new(config.cache_file()),
            MountProbe::new(&config.mounts_file, config.gvfs_root.clone()),
        )
        .with_map_path(&config.map_path)
    }

    /// Where assistant-learned rules are appended.
    pub fn with_map_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.map_path = Some(path.into());
        self
    }

    pub fn with_assistant(
        mut self,
        chooser: Box<dyn Chooser>,
        picker: Option<Box<dyn DirectoryPicker>>,
    ) -> Self {
        self.chooser = Some(chooser);
        self.picker = picker;
        self
    }

    pub fn mappings(&self) -> &MappingTable {
        &self.mappings
    }

    /// Synthesize and resolve the target of a decoded shortcut.
    /// `lnk_path` should be absolute: it keys the link cache.
    pub fn resolve(
        &mut self,
        record: &ShellLinkRecord,
        lnk_path: &Path,
    ) -> Result<FinalTarget, ResolveError> {
        let target = synthesize(record).ok_or(ResolveError::NoTargetFound)?;
        info!("Windows target: {}", target.windows());

        self.resolve_target(&target, &lnk_path.to_string_lossy())
            .ok_or_else(|| ResolveError::Unresolved(Box::new(Diagnostics::new(record, lnk_path))))
    }

    pub fn resolve_target(&mut self, target: &ResolvedTarget, lnk_key: &str) -> Option<FinalTarget> {
        let p = target.posix();

        if is_posix_absolute(p) {
            return exists(p).then(|| {
                info!("Target is a host path: {}", p);
                FinalTarget::Path(p.to_string())
            });
        }

        if is_unc_path(p) {
            let canon = canonical_unc(p);
            let parts = split_unc(&canon)?;
            if let Some(found) = self.from_cache(lnk_key, parts.rest) {
                return Some(found);
            }
            return self.resolve_unc(lnk_key, &canon, parts);
        }

        if is_drive_path(p) {
            if let Some(found) = self.from_cache(lnk_key, drive_rest(p)) {
                return Some(found);
            }
            return self.resolve_drive(lnk_key, p);
        }

        debug!("{} is neither a drive nor a UNC path", p);
        None
    }

    fn from_cache(&self, lnk_key: &str, rest: &str) -> Option<FinalTarget> {
        let prefix = self.cache.get(lnk_key)?;
        let candidate = join_prefix(&prefix, rest);
        debug!("Trying cached prefix: {}", candidate);
        exists(&candidate).then(|| {
            info!("Resolved from link cache: {}", candidate);
            FinalTarget::Path(candidate)
        })
    }

    fn remember(&self, lnk_key: &str, prefix: &str) {
        if let Err(e) = self.cache.set(lnk_key, prefix) {
            warn!("Link cache not updated: {}", e);
        }
    }

    fn resolve_unc(&mut self, lnk_key: &str, canon: &str, parts: UncParts<'_>) -> Option<FinalTarget> {
        if let Some(candidate) = self.mappings.try_unc(canon) {
            debug!("Trying mapping rule: {}", candidate);
            if exists(&candidate) {
                info!("Resolved via mapping table: {}", candidate);
                return Some(FinalTarget::Path(candidate));
            }
        }

        let mounted = self
            .probe
            .find_gvfs(canon)
            .inspect(|m| info!("Resolved via GVFS mount {}", m.prefix))
            .or_else(|| {
                self.probe
                    .find_cifs(canon)
                    .inspect(|m| info!("Resolved via CIFS mount {}", m.prefix))
            });
        if let Some(m) = mounted {
            self.remember(lnk_key, &m.prefix);
            return Some(FinalTarget::Path(m.path));
        }

        if let Some(path) = self.assist(lnk_key, Anchor::Unc(parts), parts.rest) {
            return Some(FinalTarget::Path(path));
        }

        let uri = unc_to_smb_uri(canon)?;
        info!("Falling back to {}", uri);
        Some(FinalTarget::Uri(uri))
    }

    fn resolve_drive(&mut self, lnk_key: &str, p: &str) -> Option<FinalTarget> {
        for candidate in self.mappings.drive_candidates(p) {
            debug!("Trying mapping rule: {}", candidate);
            if exists(&candidate) {
                info!("Resolved via mapping table: {}", candidate);
                return Some(FinalTarget::Path(candidate));
            }
        }

        if let Some(m) = self.probe.score_drive_guess(p) {
            self.remember(lnk_key, &m.prefix);
            return Some(FinalTarget::Path(m.path));
        }

        let letter = drive_letter(p)?;
        self.assist(lnk_key, Anchor::Drive(letter), drive_rest(p))
            .map(FinalTarget::Path)
    }

    /// Prefixes worth offering, most specific first, without duplicates.
    fn assistant_candidates(&self, anchor: &Anchor<'_>, rest: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        match anchor {
            Anchor::Unc(parts) => {
                let root = parts.root();
                out.extend(self.mappings.try_unc(&root));
                out.extend(self.probe.gvfs_mount_for(parts.server, parts.share));
                out.extend(self.probe.cifs_mounts_for(parts.server, parts.share));
            }
            Anchor::Drive(letter) => {
                out.extend(self.mappings.entries().iter().rev().filter_map(|e| match e {
                    MappingEntry::Drive { letter: l, prefix } if l == letter => Some(prefix.clone()),
                    _ => None,
                }));
            }
        }
        out.extend(self.probe.mounts_for_rest(rest));

        let mut seen: Vec<String> = Vec::new();
        for c in out {
            if !seen.contains(&c) {
                seen.push(c);
            }
        }
        seen
    }

    fn assist(&mut self, lnk_key: &str, anchor: Anchor<'_>, rest: &str) -> Option<String> {
        let chooser = self.chooser.as_ref()?;
        let candidates = self.assistant_candidates(&anchor, rest);
        let title = format!("Locate {}", anchor.label());
        let mut last_error: Option<String> = None;

        for round in 0..MAX_ASSIST_ROUNDS {
            let mut prompt = format!(
                "Where is {} available on this machine?\nLooking for: {}",
                anchor.label(),
                if rest.is_empty() { "/" } else { rest }
            );
            if let Some(err) = &last_error {
                prompt.push_str("\n\n");
                prompt.push_str(err);
            }
            debug!("Assistant round {} with {} candidates", round + 1, candidates.len());

            let picked = match chooser.choose(&title, &prompt, &candidates) {
                Choice::Selected(s) => s,
                Choice::Cancelled => {
                    debug!("Assistant cancelled");
                    return None;
                }
                Choice::Manual => match self.picker.as_ref().and_then(|p| p.pick_directory(&title)) {
                    Some(dir) => dir,
                    None if candidates.is_empty() => return None,
                    None => {
                        last_error = Some("No folder was selected.".into());
                        continue;
                    }
                },
            };

            match validate_choice(&picked, rest) {
                Ok((prefix, preview)) => {
                    self.learn(lnk_key, &anchor, &prefix);
                    info!("Resolved via assistant: {}", preview);
                    return Some(preview);
                }
                Err(e) => {
                    debug!("Assistant choice rejected: {}", e);
                    last_error = Some(e);
                }
            }
        }
        warn!("Giving up on {} after {} prompts", anchor.label(), MAX_ASSIST_ROUNDS);
        None
    }

    /// Persist an accepted prefix as a mapping rule and a cache entry.
    fn learn(&mut self, lnk_key: &str, anchor: &Anchor<'_>, prefix: &str) {
        let (added, appended) = match anchor {
            Anchor::Drive(letter) => (
                self.mappings.add_drive(*letter, prefix),
                self.map_path
                    .as_deref()
                    .map(|p| mapping::append_drive_rule(p, *letter, prefix)),
            ),
            Anchor::Unc(parts) => {
                let root = parts.root();
                (
                    self.mappings.add_unc(&root, prefix),
                    self.map_path
                        .as_deref()
                        .map(|p| mapping::append_unc_rule(p, &root, prefix)),
                )
            }
        };
        if let Err(e) = added.and(appended.unwrap_or(Ok(()))) {
            warn!("Mapping rule not saved: {}", e);
        }
        self.remember(lnk_key, prefix);
    }
}

fn exists(p: &str) -> bool {
    Path::new(p).exists()
}

/// Check an interactively chosen prefix. Returns the cleaned prefix and the
/// joined path, or a message for the next prompt.
fn validate_choice(choice: &str, rest: &str) -> Result<(String, String), String> {
    let prefix = trim_trailing_slashes(choice.trim());
    if !prefix.starts_with('/') {
        return Err(format!("'{}' is not an absolute path.", prefix));
    }
    if is_dangerous_prefix(prefix) {
        return Err(format!("'{}' is a system location and cannot be used.", prefix));
    }
    if !Path::new(prefix).is_dir() {
        return Err(format!("'{}' is not a folder.", prefix));
    }
    let preview = join_prefix(prefix, rest);
    if !exists(&preview) {
        return Err(format!("{} does not exist.", preview));
    }
    Ok((prefix.to_string(), preview))
}
