//! Byte-level builders for Shell Link fixtures.
#![allow(dead_code)]

pub const CLSID: [u8; 16] = [
    0x01, 0x14, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

pub const HAS_ID_LIST: u32 = 0x01;
pub const HAS_LINK_INFO: u32 = 0x02;
pub const HAS_NAME: u32 = 0x04;
pub const HAS_RELATIVE_PATH: u32 = 0x08;
pub const HAS_WORKING_DIR: u32 = 0x10;
pub const HAS_ARGUMENTS: u32 = 0x20;
pub const HAS_ICON_LOCATION: u32 = 0x40;
pub const IS_UNICODE: u32 = 0x80;

pub fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

fn ansi_z(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.push(0);
    v
}

fn utf16_z(s: &str) -> Vec<u8> {
    let mut v = utf16le(s);
    v.extend([0, 0]);
    v
}

/// 76-byte header with the given flags and a known creation time.
pub fn header(flags: u32) -> Vec<u8> {
    let mut b = Vec::with_capacity(0x4C);
    b.extend(0x4Cu32.to_le_bytes());
    b.extend(CLSID);
    b.extend(flags.to_le_bytes());
    b.extend(0x20u32.to_le_bytes()); // FILE_ATTRIBUTE_ARCHIVE
    b.extend(116_444_736_000_000_000u64.to_le_bytes()); // 1970-01-01
    b.extend(0u64.to_le_bytes());
    b.extend(0u64.to_le_bytes());
    b.extend(1234u32.to_le_bytes());
    b.extend(0u32.to_le_bytes());
    b.extend(1u32.to_le_bytes()); // SW_SHOWNORMAL
    b.extend(0u16.to_le_bytes());
    b.extend([0u8; 10]);
    assert_eq!(b.len(), 0x4C);
    b
}

/// Description of a LinkInfo block. Strings are stored with the header
/// size 0x24 layout so both ANSI and Unicode offsets exist.
#[derive(Default)]
pub struct LinkInfo<'a> {
    pub local_base: Option<&'a str>,
    pub local_base_unicode: Option<&'a str>,
    pub suffix: Option<&'a str>,
    pub suffix_unicode: Option<&'a str>,
    pub net_name: Option<&'a str>,
    pub net_name_unicode: Option<&'a str>,
    pub device_name: Option<&'a str>,
    pub device_name_unicode: Option<&'a str>,
    /// Declared CommonNetworkRelativeLink size, replacing the real one.
    pub cnrl_size: Option<u32>,
    /// Stored ANSI NetName offset, replacing the real one.
    pub net_name_offset: Option<u32>,
    /// Zero bytes appended inside the declared size.
    pub padding: usize,
}

const LI_HEADER: u32 = 0x24;
const CNRL_HEADER: u32 = 0x1C;

fn place(body: &mut Vec<u8>, base: u32, bytes: Vec<u8>) -> u32 {
    let off = base + body.len() as u32;
    body.extend(bytes);
    off
}

fn cnrl(li: &LinkInfo) -> Vec<u8> {
    let mut body = Vec::new();
    let net_off = li
        .net_name
        .map_or(0, |s| place(&mut body, CNRL_HEADER, ansi_z(s)));
    let dev_off = li
        .device_name
        .map_or(0, |s| place(&mut body, CNRL_HEADER, ansi_z(s)));
    let net_off_u = li
        .net_name_unicode
        .map_or(0, |s| place(&mut body, CNRL_HEADER, utf16_z(s)));
    let dev_off_u = li
        .device_name_unicode
        .map_or(0, |s| place(&mut body, CNRL_HEADER, utf16_z(s)));
    let size = li
        .cnrl_size
        .unwrap_or(CNRL_HEADER + body.len() as u32);

    let mut b = Vec::new();
    b.extend(size.to_le_bytes());
    b.extend(0x3u32.to_le_bytes()); // ValidDevice | ValidNetType
    b.extend(li.net_name_offset.unwrap_or(net_off).to_le_bytes());
    b.extend(dev_off.to_le_bytes());
    b.extend(0x0002_0000u32.to_le_bytes()); // WNNC_NET_LANMAN
    b.extend(net_off_u.to_le_bytes());
    b.extend(dev_off_u.to_le_bytes());
    b.extend(body);
    b
}

impl LinkInfo<'_> {
    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let base_off = self
            .local_base
            .map_or(0, |s| place(&mut body, LI_HEADER, ansi_z(s)));
        let base_off_u = self
            .local_base_unicode
            .map_or(0, |s| place(&mut body, LI_HEADER, utf16_z(s)));
        let suffix_off = self
            .suffix
            .map_or(0, |s| place(&mut body, LI_HEADER, ansi_z(s)));
        let suffix_off_u = self
            .suffix_unicode
            .map_or(0, |s| place(&mut body, LI_HEADER, utf16_z(s)));
        let has_cnrl = self.net_name.is_some()
            || self.net_name_unicode.is_some()
            || self.device_name.is_some()
            || self.device_name_unicode.is_some();
        let cnrl_off = if has_cnrl {
            place(&mut body, LI_HEADER, cnrl(self))
        } else {
            0
        };
        body.extend(std::iter::repeat_n(0u8, self.padding));
        let size = LI_HEADER + body.len() as u32;

        let mut b = Vec::new();
        b.extend(size.to_le_bytes());
        b.extend(LI_HEADER.to_le_bytes());
        b.extend(0x1u32.to_le_bytes()); // VolumeIDAndLocalBasePath
        b.extend(0u32.to_le_bytes());
        b.extend(base_off.to_le_bytes());
        b.extend(cnrl_off.to_le_bytes());
        b.extend(suffix_off.to_le_bytes());
        b.extend(base_off_u.to_le_bytes());
        b.extend(suffix_off_u.to_le_bytes());
        b.extend(body);
        b
    }
}

/// Byte offset of each LinkInfo field inside a built block.
pub const LI_LOCAL_BASE_OFFSET: usize = 16;
pub const LI_LOCAL_BASE_UNICODE_OFFSET: usize = 28;

/// A whole shortcut. String fields are `(flag, value)` pairs.
#[derive(Default)]
pub struct Shortcut<'a> {
    pub id_list: Option<Vec<u8>>,
    pub link_info: Option<Vec<u8>>,
    pub strings: Vec<(u32, &'a str)>,
    pub unicode: bool,
}

impl Shortcut<'_> {
    pub fn build(&self) -> Vec<u8> {
        let mut flags = 0;
        if self.id_list.is_some() {
            flags |= HAS_ID_LIST;
        }
        if self.link_info.is_some() {
            flags |= HAS_LINK_INFO;
        }
        if self.unicode {
            flags |= IS_UNICODE;
        }
        for (flag, _) in &self.strings {
            flags |= flag;
        }

        let mut b = header(flags);
        if let Some(ids) = &self.id_list {
            b.extend((ids.len() as u16).to_le_bytes());
            b.extend(ids);
        }
        if let Some(li) = &self.link_info {
            b.extend(li);
        }
        let mut strings = self.strings.clone();
        strings.sort_by_key(|(flag, _)| *flag);
        for (_, s) in strings {
            if self.unicode {
                let units: Vec<u16> = s.encode_utf16().collect();
                b.extend((units.len() as u16).to_le_bytes());
                b.extend(units.iter().flat_map(|u| u.to_le_bytes()));
            } else {
                b.extend((s.len() as u16).to_le_bytes());
                b.extend(s.as_bytes());
            }
        }
        b
    }
}
