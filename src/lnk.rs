// Sources:
// - https://learn.microsoft.com/openspecs/windows_protocols/ms-shllink
// - https://github.com/libyal/liblnk/blob/main/documentation/Windows%20Shortcut%20File%20(LNK)%20format.asciidoc

//! Shell Link (.lnk) decoder.
//!
//! Only the sections needed to rebuild a target path are decoded: the fixed
//! header, the target ID list (scanned, not parsed), LinkInfo with its
//! CommonNetworkRelativeLink, and the StringData fields. Extra data blocks
//! are ignored.

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{TimeZone, Utc};
use log::{debug, error, warn};
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::DecodeError;
use crate::idlist;
use crate::strings::{ANSI_CAP, UNICODE_CAP, read_c_string, read_string_data, read_w_string};

pub const HEADER_SIZE: u32 = 0x4C;

/// 00021401-0000-0000-C000-000000000046 in on-disk byte order.
pub const SHELL_LINK_CLSID: [u8; 16] = [
    0x01, 0x14, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

// LinkFlags (subset)
pub const HAS_LINK_TARGET_ID_LIST: u32 = 0x0000_0001;
pub const HAS_LINK_INFO: u32 = 0x0000_0002;
pub const HAS_NAME: u32 = 0x0000_0004;
pub const HAS_RELATIVE_PATH: u32 = 0x0000_0008;
pub const HAS_WORKING_DIR: u32 = 0x0000_0010;
pub const HAS_ARGUMENTS: u32 = 0x0000_0020;
pub const HAS_ICON_LOCATION: u32 = 0x0000_0040;
pub const IS_UNICODE: u32 = 0x0000_0080;

/// Smallest LinkInfo that can hold its own offset table.
const LINK_INFO_MIN_SIZE: u32 = 0x1C;
/// LinkInfo header size from which the two Unicode offsets are present.
const LINK_INFO_UNICODE_HEADER: u32 = 0x24;
/// Smallest CommonNetworkRelativeLink.
const CNRL_MIN_SIZE: u32 = 0x14;
/// CNRL size from which the Unicode net/device offsets are present.
const CNRL_UNICODE_SIZE: u32 = 0x1C;

/// The fixed 76-byte ShellLinkHeader.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShellLinkHeader {
    pub header_size: u32,
    pub clsid: [u8; 16],
    pub link_flags: u32,
    pub file_attributes: u32,
    pub creation_time: u64,
    pub access_time: u64,
    pub write_time: u64,
    pub file_size: u32,
    pub icon_index: u32,
    pub show_command: u32,
    pub hot_key: u16,
}

impl ShellLinkHeader {
    pub fn from_reader<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        let truncated = |_| DecodeError::Truncated { what: "header" };

        let header_size = r.read_u32::<LittleEndian>().map_err(truncated)?;
        let mut clsid = [0u8; 16];
        r.read_exact(&mut clsid).map_err(truncated)?;
        if header_size != HEADER_SIZE || clsid != SHELL_LINK_CLSID {
            error!(
                "Not a Shell Link: header size 0x{:X}, CLSID {:02X?}",
                header_size, clsid
            );
            return Err(DecodeError::NotAShellLink);
        }

        let link_flags = r.read_u32::<LittleEndian>().map_err(truncated)?;
        let file_attributes = r.read_u32::<LittleEndian>().map_err(truncated)?;
        let creation_time = r.read_u64::<LittleEndian>().map_err(truncated)?;
        let access_time = r.read_u64::<LittleEndian>().map_err(truncated)?;
        let write_time = r.read_u64::<LittleEndian>().map_err(truncated)?;
        let file_size = r.read_u32::<LittleEndian>().map_err(truncated)?;
        let icon_index = r.read_u32::<LittleEndian>().map_err(truncated)?;
        let show_command = r.read_u32::<LittleEndian>().map_err(truncated)?;
        let hot_key = r.read_u16::<LittleEndian>().map_err(truncated)?;
        // reserved1 (u16), reserved2 (u32), reserved3 (u32)
        let mut reserved = [0u8; 10];
        r.read_exact(&mut reserved).map_err(truncated)?;

        Ok(Self {
            header_size,
            clsid,
            link_flags,
            file_attributes,
            creation_time,
            access_time,
            write_time,
            file_size,
            icon_index,
            show_command,
            hot_key,
        })
    }

    pub fn has(&self, flag: u32) -> bool {
        self.link_flags & flag != 0
    }
}

/// The fields of a shortcut that matter for rebuilding its target.
///
/// ANSI and Unicode variants are kept side by side; use the accessors
/// (`local_base`, `net_name`, ...) to get the preferred one.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShellLinkRecord {
    pub header: ShellLinkHeader,
    pub local_base_path: Option<String>,
    pub local_base_path_unicode: Option<String>,
    pub net_name: Option<String>,
    pub net_name_unicode: Option<String>,
    pub device_name: Option<String>,
    pub device_name_unicode: Option<String>,
    pub common_path_suffix: Option<String>,
    pub common_path_suffix_unicode: Option<String>,
    pub name_string: Option<String>,
    pub relative_path: Option<String>,
    pub working_dir: Option<String>,
    pub arguments: Option<String>,
    pub icon_location: Option<String>,
    /// Best-effort salvage from the ID list. Never authoritative.
    pub id_list_best_path: Option<String>,
}

/// Unicode wins when it is present and non-empty.
fn prefer<'a>(unicode: &'a Option<String>, ansi: &'a Option<String>) -> Option<&'a str> {
    match unicode.as_deref() {
        Some(u) if !u.is_empty() => Some(u),
        _ => ansi.as_deref(),
    }
}

impl ShellLinkRecord {
    /// An empty record around a header, filled in by the section readers.
    pub fn new(header: ShellLinkHeader) -> Self {
        Self {
            header,
            local_base_path: None,
            local_base_path_unicode: None,
            net_name: None,
            net_name_unicode: None,
            device_name: None,
            device_name_unicode: None,
            common_path_suffix: None,
            common_path_suffix_unicode: None,
            name_string: None,
            relative_path: None,
            working_dir: None,
            arguments: None,
            icon_location: None,
            id_list_best_path: None,
        }
    }

    /// Decode a complete shortcut held in memory.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = Cursor::new(raw);
        let header = ShellLinkHeader::from_reader(&mut cursor)?;
        let unicode = header.has(IS_UNICODE);
        let mut record = Self::new(header);

        if record.header.has(HAS_LINK_TARGET_ID_LIST) {
            let size = cursor
                .read_u16::<LittleEndian>()
                .map_err(|_| DecodeError::Truncated { what: "IDList size" })?;
            let mut blob = vec![0u8; size as usize];
            cursor
                .read_exact(&mut blob)
                .map_err(|_| DecodeError::Truncated { what: "IDList data" })?;
            record.id_list_best_path = idlist::best_path(&blob);
            debug!(
                "IDList: {} bytes, salvaged {:?}",
                size, record.id_list_best_path
            );
        }

        if record.header.has(HAS_LINK_INFO) {
            let start = cursor.position() as usize;
            let size = record.read_link_info(&raw[start..])?;
            // Resume right after LinkInfo whatever sub-fields were present.
            cursor.seek(SeekFrom::Start((start + size as usize) as u64))?;
        }

        let fields: [(u32, &'static str); 5] = [
            (HAS_NAME, "name"),
            (HAS_RELATIVE_PATH, "relative path"),
            (HAS_WORKING_DIR, "working directory"),
            (HAS_ARGUMENTS, "arguments"),
            (HAS_ICON_LOCATION, "icon location"),
        ];
        for (flag, what) in fields {
            if !record.header.has(flag) {
                continue;
            }
            let value = read_string_data(&mut cursor, unicode, what)?;
            match flag {
                HAS_NAME => record.name_string = Some(value),
                HAS_RELATIVE_PATH => record.relative_path = Some(value),
                HAS_WORKING_DIR => record.working_dir = Some(value),
                HAS_ARGUMENTS => record.arguments = Some(value),
                _ => record.icon_location = Some(value),
            }
        }

        Ok(record)
    }

    /// Decode a shortcut from any reader.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        Self::from_bytes(&raw)
    }

    /// Parse LinkInfo starting at `buf[0]`. Returns its declared size.
    ///
    /// Offsets are relative to the LinkInfo start and must be below the
    /// declared size, otherwise the field is treated as absent.
    fn read_link_info(&mut self, buf: &[u8]) -> Result<u32, DecodeError> {
        let mut c = Cursor::new(buf);
        let size = c
            .read_u32::<LittleEndian>()
            .map_err(|_| DecodeError::Truncated { what: "LinkInfo size" })?;
        if size < LINK_INFO_MIN_SIZE {
            return Err(DecodeError::InvalidLinkInfo { size });
        }
        if size as usize > buf.len() {
            return Err(DecodeError::Truncated { what: "LinkInfo" });
        }
        let li = &buf[..size as usize];

        let mut next = |what: &'static str| {
            c.read_u32::<LittleEndian>()
                .map_err(|_| DecodeError::Truncated { what })
        };
        let header_size = next("LinkInfo header size")?;
        let _flags = next("LinkInfo flags")?;
        let _volume_off = next("volume ID offset")?;
        let base_off = next("local base path offset")?;
        let cnrl_off = next("network link offset")?;
        let suffix_off = next("path suffix offset")?;
        let (base_off_u, suffix_off_u) = if header_size >= LINK_INFO_UNICODE_HEADER {
            (
                next("unicode local base path offset")?,
                next("unicode path suffix offset")?,
            )
        } else {
            (0, 0)
        };

        let field = |off: u32| (off != 0 && off < size).then(|| &li[off as usize..]);

        self.local_base_path_unicode = field(base_off_u).map(|b| read_w_string(b, UNICODE_CAP));
        if self.local_base_path_unicode.as_deref().is_none_or(str::is_empty) {
            self.local_base_path = field(base_off).map(|b| read_c_string(b, ANSI_CAP));
        }
        self.common_path_suffix_unicode =
            field(suffix_off_u).map(|b| read_w_string(b, UNICODE_CAP));
        if self.common_path_suffix_unicode.as_deref().is_none_or(str::is_empty) {
            self.common_path_suffix = field(suffix_off).map(|b| read_c_string(b, ANSI_CAP));
        }

        if let Some(cnrl) = field(cnrl_off) {
            self.read_network_link(cnrl, size - cnrl_off);
        }

        debug!(
            "LinkInfo: size 0x{:X}, header 0x{:X}, base {:?}/{:?}, suffix {:?}/{:?}",
            size,
            header_size,
            self.local_base_path,
            self.local_base_path_unicode,
            self.common_path_suffix,
            self.common_path_suffix_unicode
        );
        Ok(size)
    }

    /// CommonNetworkRelativeLink. Structural problems here only drop the
    /// network fields; the rest of the record stays valid.
    fn read_network_link(&mut self, buf: &[u8], room: u32) {
        let mut c = Cursor::new(buf);
        let Ok(size) = c.read_u32::<LittleEndian>() else {
            warn!("CommonNetworkRelativeLink truncated");
            return;
        };
        if size < CNRL_MIN_SIZE || size > room {
            warn!("CommonNetworkRelativeLink size 0x{:X} out of range", size);
            return;
        }
        let mut offsets = [0u32; 4];
        for o in offsets.iter_mut() {
            match c.read_u32::<LittleEndian>() {
                Ok(v) => *o = v,
                Err(_) => return,
            }
        }
        let [_flags, net_off, dev_off, _provider] = offsets;
        let (net_off_u, dev_off_u) = if size >= CNRL_UNICODE_SIZE {
            (
                c.read_u32::<LittleEndian>().unwrap_or(0),
                c.read_u32::<LittleEndian>().unwrap_or(0),
            )
        } else {
            (0, 0)
        };

        let cn = &buf[..size as usize];
        let field = |off: u32| (off != 0 && off < size).then(|| &cn[off as usize..]);

        self.net_name_unicode = field(net_off_u).map(|b| read_w_string(b, UNICODE_CAP));
        if self.net_name_unicode.as_deref().is_none_or(str::is_empty) {
            self.net_name = field(net_off).map(|b| read_c_string(b, ANSI_CAP));
        }
        self.device_name_unicode = field(dev_off_u).map(|b| read_w_string(b, UNICODE_CAP));
        if self.device_name_unicode.as_deref().is_none_or(str::is_empty) {
            self.device_name = field(dev_off).map(|b| read_c_string(b, ANSI_CAP));
        }
        debug!(
            "CNRL: net {:?}/{:?}, device {:?}/{:?}",
            self.net_name, self.net_name_unicode, self.device_name, self.device_name_unicode
        );
    }

    pub fn local_base(&self) -> Option<&str> {
        prefer(&self.local_base_path_unicode, &self.local_base_path)
    }

    pub fn net_name(&self) -> Option<&str> {
        prefer(&self.net_name_unicode, &self.net_name)
    }

    pub fn device_name(&self) -> Option<&str> {
        prefer(&self.device_name_unicode, &self.device_name)
    }

    pub fn common_path_suffix(&self) -> Option<&str> {
        prefer(&self.common_path_suffix_unicode, &self.common_path_suffix)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "header": {
                "link_flags": link_flags_to_string(self.header.link_flags),
                "file_attributes": self.header.file_attributes,
                "created": filetime_to_rfc3339(self.header.creation_time),
                "accessed": filetime_to_rfc3339(self.header.access_time),
                "modified": filetime_to_rfc3339(self.header.write_time),
                "file_size": self.header.file_size,
                "show_command": self.header.show_command,
            },
            "local_base_path": self.local_base(),
            "net_name": self.net_name(),
            "device_name": self.device_name(),
            "common_path_suffix": self.common_path_suffix(),
            "name": self.name_string,
            "relative_path": self.relative_path,
            "working_dir": self.working_dir,
            "arguments": self.arguments,
            "icon_location": self.icon_location,
            "id_list_path": self.id_list_best_path,
        })
    }

    /// Human-readable table of the decoded shortcut.
    pub fn to_table(&self) -> String {
        let show = |v: Option<&str>| v.unwrap_or("-").to_string();

        let mut hdr = Table::new();
        hdr.add_row(row!["Shell Link Header"]);
        hdr.add_row(row![b -> "Flags", link_flags_to_string(self.header.link_flags)]);
        hdr.add_row(row![b -> "Created", filetime_to_rfc3339(self.header.creation_time)]);
        hdr.add_row(row![b -> "Accessed", filetime_to_rfc3339(self.header.access_time)]);
        hdr.add_row(row![b -> "Modified", filetime_to_rfc3339(self.header.write_time)]);
        hdr.add_row(row![b -> "Target size", self.header.file_size]);

        let mut t = Table::new();
        t.add_row(row!["Target fields"]);
        t.add_row(row![b -> "Local base path", show(self.local_base())]);
        t.add_row(row![b -> "Net name", show(self.net_name())]);
        t.add_row(row![b -> "Device name", show(self.device_name())]);
        t.add_row(row![b -> "Common path suffix", show(self.common_path_suffix())]);
        t.add_row(row![b -> "Relative path", show(self.relative_path.as_deref())]);
        t.add_row(row![b -> "Working dir", show(self.working_dir.as_deref())]);
        t.add_row(row![b -> "Arguments", show(self.arguments.as_deref())]);
        t.add_row(row![b -> "Name", show(self.name_string.as_deref())]);
        t.add_row(row![b -> "Icon location", show(self.icon_location.as_deref())]);
        t.add_row(row![b -> "IDList path", show(self.id_list_best_path.as_deref())]);

        format!("{}\n{}", hdr, t)
    }
}

/// FILETIME (100ns ticks since 1601) to RFC 3339, empty for zero/invalid.
fn filetime_to_rfc3339(ft: u64) -> String {
    if ft == 0 {
        return String::new();
    }
    const DELTA_MICROS: i64 = 11_644_473_600_000_000;
    let unix_micros = (ft / 10) as i64 - DELTA_MICROS;
    let secs = unix_micros.div_euclid(1_000_000);
    let nanos = (unix_micros.rem_euclid(1_000_000) * 1_000) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

fn link_flags_to_string(flags: u32) -> String {
    let names = [
        (HAS_LINK_TARGET_ID_LIST, "HasLinkTargetIDList"),
        (HAS_LINK_INFO, "HasLinkInfo"),
        (HAS_NAME, "HasName"),
        (HAS_RELATIVE_PATH, "HasRelativePath"),
        (HAS_WORKING_DIR, "HasWorkingDir"),
        (HAS_ARGUMENTS, "HasArguments"),
        (HAS_ICON_LOCATION, "HasIconLocation"),
        (IS_UNICODE, "IsUnicode"),
    ];
    let v: Vec<&str> = names
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if v.is_empty() {
        "None".into()
    } else {
        v.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filetime_epoch() {
        // 1970-01-01T00:00:00Z
        assert_eq!(
            filetime_to_rfc3339(116_444_736_000_000_000),
            "1970-01-01T00:00:00+00:00"
        );
        assert_eq!(filetime_to_rfc3339(0), "");
    }

    #[test]
    fn flags_render() {
        assert_eq!(
            link_flags_to_string(HAS_LINK_INFO | IS_UNICODE),
            "HasLinkInfo | IsUnicode"
        );
        assert_eq!(link_flags_to_string(0), "None");
    }

    #[test]
    fn prefer_skips_empty_unicode() {
        let u = Some(String::new());
        let a = Some("C:\\x".to_string());
        assert_eq!(prefer(&u, &a), Some("C:\\x"));
        let u = Some("D:\\y".to_string());
        assert_eq!(prefer(&u, &a), Some("D:\\y"));
    }
}
