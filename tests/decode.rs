mod common;

use common::*;
use open_lnk::{DecodeError, ShellLinkRecord, synthesize};

fn decode(bytes: &[u8]) -> ShellLinkRecord {
    ShellLinkRecord::from_bytes(bytes).expect("fixture should decode")
}

#[test]
fn rejects_wrong_header_size() {
    let mut b = header(0);
    b[0] = 0x4D;
    assert!(matches!(
        ShellLinkRecord::from_bytes(&b),
        Err(DecodeError::NotAShellLink)
    ));
}

#[test]
fn rejects_wrong_clsid() {
    let mut b = header(0);
    b[19] = 0x47;
    assert!(matches!(
        ShellLinkRecord::from_bytes(&b),
        Err(DecodeError::NotAShellLink)
    ));
}

#[test]
fn truncated_header_is_an_error() {
    let b = header(0);
    assert!(matches!(
        ShellLinkRecord::from_bytes(&b[..40]),
        Err(DecodeError::Truncated { .. })
    ));
}

#[test]
fn bare_header_decodes_to_empty_record() {
    let r = decode(&header(0));
    assert_eq!(r.header.file_size, 1234);
    assert_eq!(r.local_base(), None);
    assert!(synthesize(&r).is_none());
    assert_eq!(
        r.to_json()["header"]["created"],
        "1970-01-01T00:00:00+00:00"
    );
}

#[test]
fn unicode_local_base_is_preferred() {
    let li = LinkInfo {
        local_base: Some("C:\\OLD"),
        local_base_unicode: Some("C:\\Users\\me"),
        suffix_unicode: Some("Docs\\a.txt"),
        ..Default::default()
    };
    let r = decode(
        &Shortcut {
            link_info: Some(li.build()),
            ..Default::default()
        }
        .build(),
    );
    assert_eq!(r.local_base(), Some("C:\\Users\\me"));
    assert_eq!(r.common_path_suffix(), Some("Docs\\a.txt"));
    let t = synthesize(&r).unwrap();
    assert_eq!(t.windows(), "C:\\Users\\me\\Docs\\a.txt");
    assert_eq!(t.posix(), "C:/Users/me/Docs/a.txt");
}

#[test]
fn empty_unicode_falls_back_to_ansi() {
    let li = LinkInfo {
        local_base: Some("D:\\Daten"),
        local_base_unicode: Some(""),
        ..Default::default()
    };
    let r = decode(
        &Shortcut {
            link_info: Some(li.build()),
            ..Default::default()
        }
        .build(),
    );
    assert_eq!(r.local_base(), Some("D:\\Daten"));
}

#[test]
fn offset_at_or_past_link_info_size_is_absent() {
    let li = LinkInfo {
        local_base: Some("C:\\x"),
        suffix: Some("a.txt"),
        ..Default::default()
    };
    let mut block = li.build();
    let size = u32::from_le_bytes(block[0..4].try_into().unwrap());
    block[LI_LOCAL_BASE_OFFSET..LI_LOCAL_BASE_OFFSET + 4].copy_from_slice(&size.to_le_bytes());
    block[LI_LOCAL_BASE_UNICODE_OFFSET..LI_LOCAL_BASE_UNICODE_OFFSET + 4]
        .copy_from_slice(&(size + 400).to_le_bytes());

    let r = decode(
        &Shortcut {
            link_info: Some(block),
            strings: vec![(HAS_RELATIVE_PATH, "..\\a.txt")],
            ..Default::default()
        }
        .build(),
    );
    assert_eq!(r.local_base(), None);
    assert_eq!(r.common_path_suffix(), Some("a.txt"));
    assert_eq!(r.relative_path.as_deref(), Some("..\\a.txt"));
}

#[test]
fn link_info_larger_than_file_is_truncated() {
    let mut block = LinkInfo {
        local_base: Some("C:\\x"),
        ..Default::default()
    }
    .build();
    block[0..4].copy_from_slice(&0x1000u32.to_le_bytes());
    let bytes = Shortcut {
        link_info: Some(block),
        ..Default::default()
    }
    .build();
    assert!(matches!(
        ShellLinkRecord::from_bytes(&bytes),
        Err(DecodeError::Truncated { .. })
    ));
}

#[test]
fn tiny_link_info_is_invalid() {
    let mut bytes = header(HAS_LINK_INFO);
    bytes.extend(0x10u32.to_le_bytes());
    bytes.extend([0u8; 12]);
    assert!(matches!(
        ShellLinkRecord::from_bytes(&bytes),
        Err(DecodeError::InvalidLinkInfo { size: 0x10 })
    ));
}

#[test]
fn string_data_follows_padded_link_info() {
    let li = LinkInfo {
        local_base: Some("C:\\Program Files\\App\\app.exe"),
        padding: 24,
        ..Default::default()
    };
    let r = decode(
        &Shortcut {
            link_info: Some(li.build()),
            strings: vec![
                (HAS_NAME, "My App"),
                (HAS_WORKING_DIR, "C:\\Program Files\\App"),
                (HAS_ARGUMENTS, ""),
                (HAS_ICON_LOCATION, "%SystemRoot%\\app.ico"),
            ],
            unicode: true,
            ..Default::default()
        }
        .build(),
    );
    assert_eq!(r.name_string.as_deref(), Some("My App"));
    assert_eq!(r.working_dir.as_deref(), Some("C:\\Program Files\\App"));
    assert_eq!(r.arguments.as_deref(), Some(""));
    assert_eq!(r.icon_location.as_deref(), Some("%SystemRoot%\\app.ico"));
    assert_eq!(r.relative_path, None);
}

#[test]
fn truncated_string_data_is_an_error() {
    let mut bytes = Shortcut {
        strings: vec![(HAS_RELATIVE_PATH, "..\\..\\some\\file.txt")],
        unicode: true,
        ..Default::default()
    }
    .build();
    bytes.truncate(bytes.len() - 3);
    assert!(matches!(
        ShellLinkRecord::from_bytes(&bytes),
        Err(DecodeError::Truncated { .. })
    ));
}

#[test]
fn unc_net_name_beats_drive_letter_base() {
    let li = LinkInfo {
        local_base: Some("M:\\reports"),
        suffix: Some("report.pdf"),
        net_name: Some("\\\\nas\\Public"),
        device_name: Some("M:"),
        ..Default::default()
    };
    let r = decode(
        &Shortcut {
            link_info: Some(li.build()),
            ..Default::default()
        }
        .build(),
    );
    assert_eq!(r.net_name(), Some("\\\\nas\\Public"));
    assert_eq!(r.device_name(), Some("M:"));
    assert_eq!(
        synthesize(&r).unwrap().windows(),
        "\\\\nas\\Public\\report.pdf"
    );
}

fn network_share(li: LinkInfo) -> ShellLinkRecord {
    decode(
        &Shortcut {
            link_info: Some(li.build()),
            strings: vec![(HAS_RELATIVE_PATH, "..\\report.pdf")],
            ..Default::default()
        }
        .build(),
    )
}

#[test]
fn bad_network_link_size_drops_only_network_fields() {
    // Below the minimum, then larger than what is left of LinkInfo.
    for size in [0x10, 0x400] {
        let r = network_share(LinkInfo {
            local_base: Some("M:\\reports"),
            suffix: Some("report.pdf"),
            net_name: Some("\\\\nas\\Public"),
            device_name: Some("M:"),
            cnrl_size: Some(size),
            ..Default::default()
        });
        assert_eq!(r.net_name(), None, "size 0x{:X}", size);
        assert_eq!(r.device_name(), None, "size 0x{:X}", size);
        assert_eq!(r.local_base(), Some("M:\\reports"));
        assert_eq!(r.relative_path.as_deref(), Some("..\\report.pdf"));
        assert_eq!(
            synthesize(&r).unwrap().windows(),
            "M:\\reports\\report.pdf"
        );
    }
}

#[test]
fn network_name_offset_at_or_past_its_size_is_absent() {
    let net = "\\\\nas\\Public";
    // Header plus both NUL-terminated names.
    let size = 0x1C + (net.len() + 1 + "M:".len() + 1) as u32;
    for offset in [size, size + 0x400] {
        let r = network_share(LinkInfo {
            suffix: Some("report.pdf"),
            net_name: Some(net),
            device_name: Some("M:"),
            net_name_offset: Some(offset),
            ..Default::default()
        });
        assert_eq!(r.net_name(), None, "offset 0x{:X}", offset);
        assert_eq!(r.device_name(), Some("M:"));
        assert_eq!(synthesize(&r).unwrap().windows(), "M:\\report.pdf");
    }
}

#[test]
fn unicode_network_names_beat_ansi() {
    let r = network_share(LinkInfo {
        suffix: Some("a.txt"),
        net_name: Some("\\\\old\\Share"),
        net_name_unicode: Some("\\\\nas\\Dätén"),
        device_name: Some("X:"),
        device_name_unicode: Some("Y:"),
        ..Default::default()
    });
    assert_eq!(r.net_name_unicode.as_deref(), Some("\\\\nas\\Dätén"));
    assert_eq!(r.net_name, None);
    assert_eq!(r.net_name(), Some("\\\\nas\\Dätén"));
    assert_eq!(r.device_name(), Some("Y:"));
    assert_eq!(
        synthesize(&r).unwrap().windows(),
        "\\\\nas\\Dätén\\a.txt"
    );
}

#[test]
fn device_name_is_used_without_local_base() {
    let li = LinkInfo {
        suffix: Some("a.txt"),
        device_name: Some("M:"),
        ..Default::default()
    };
    let r = decode(
        &Shortcut {
            link_info: Some(li.build()),
            ..Default::default()
        }
        .build(),
    );
    assert_eq!(synthesize(&r).unwrap().windows(), "M:\\a.txt");
}

#[test]
fn suffix_already_at_end_of_base_is_not_repeated() {
    let li = LinkInfo {
        local_base_unicode: Some("C:\\Users\\me\\Documents"),
        suffix_unicode: Some("documents"),
        ..Default::default()
    };
    let r = decode(
        &Shortcut {
            link_info: Some(li.build()),
            ..Default::default()
        }
        .build(),
    );
    assert_eq!(synthesize(&r).unwrap().windows(), "C:\\Users\\me\\Documents");
}

#[test]
fn working_dir_and_relative_path_without_link_info() {
    let r = decode(
        &Shortcut {
            strings: vec![
                (HAS_RELATIVE_PATH, "notes.txt"),
                (HAS_WORKING_DIR, "C:\\work"),
            ],
            ..Default::default()
        }
        .build(),
    );
    assert_eq!(synthesize(&r).unwrap().windows(), "C:\\work\\notes.txt");
}

#[test]
fn id_list_path_replaces_a_bare_file_name() {
    let mut ids = vec![0x14, 0x00, 0x1F, 0x50, 0xE0, 0x4F, 0xD0, 0x20];
    ids.extend(utf16le("C:\\data\\notes.txt"));
    ids.extend([0u8; 8]);
    let r = decode(
        &Shortcut {
            id_list: Some(ids),
            strings: vec![(HAS_RELATIVE_PATH, "notes.txt")],
            unicode: true,
            ..Default::default()
        }
        .build(),
    );
    assert_eq!(r.id_list_best_path.as_deref(), Some("C:\\data\\notes.txt"));
    assert_eq!(synthesize(&r).unwrap().windows(), "C:\\data\\notes.txt");
}

#[test]
fn id_list_never_overrides_a_structured_path() {
    let mut ids = vec![0x14, 0x00];
    ids.extend(b"\\\\other\\share\\deep\\er\\path.txt\0");
    let li = LinkInfo {
        local_base: Some("C:\\a.txt"),
        ..Default::default()
    };
    let r = decode(
        &Shortcut {
            id_list: Some(ids),
            link_info: Some(li.build()),
            ..Default::default()
        }
        .build(),
    );
    assert!(r.id_list_best_path.is_some());
    assert_eq!(synthesize(&r).unwrap().windows(), "C:\\a.txt");
}
