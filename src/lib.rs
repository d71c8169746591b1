// Sources:
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink
// - https://wiki.gnome.org/Projects/gvfs

//! Read Windows Shell Link shortcuts and find their targets on a POSIX host.
//!
//! ```no_run
//! use open_lnk::{Config, Resolver, read_shortcut};
//!
//! let config = Config::from_env();
//! let record = read_shortcut("/home/me/Desktop/Report.lnk".as_ref())?;
//! let mut resolver = Resolver::from_config(&config);
//! let target = resolver.resolve(&record, "/home/me/Desktop/Report.lnk".as_ref())?;
//! println!("{}", target.as_str());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use log::debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub mod cache;
pub mod config;
pub mod desktop;
pub mod error;
pub mod idlist;
pub mod lnk;
pub mod mapping;
pub mod mounts;
pub mod resolver;
pub mod strings;
pub mod target;
pub mod winpath;

pub use cache::LinkCache;
pub use config::Config;
pub use error::{CacheError, DecodeError, Diagnostics, MappingError, ResolveError};
pub use lnk::{ShellLinkHeader, ShellLinkRecord};
pub use mapping::{MappingEntry, MappingTable};
pub use mounts::{MountCandidate, MountProbe};
pub use resolver::{Choice, Chooser, DirectoryPicker, FinalTarget, Opener, Resolver, open_target};
pub use target::{ResolvedTarget, synthesize};

/// Decode the shortcut stored at `path`.
pub fn read_shortcut(path: &Path) -> Result<ShellLinkRecord, DecodeError> {
    debug!("Reading shortcut {}", path.display());
    let mut reader = BufReader::new(File::open(path)?);
    ShellLinkRecord::from_reader(&mut reader)
}
